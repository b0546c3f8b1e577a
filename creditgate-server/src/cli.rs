use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "creditgate",
    about = "creditgate - quota-enforced generation gateway",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the HTTP server (default if no command specified)")]
    Serve {
        #[arg(short, long, env = "CREDITGATE_PORT", help = "Override server.port")]
        port: Option<u16>,
    },

    #[command(subcommand, about = "Inspect configuration")]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show the effective configuration")]
    Show {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Load and validate the configuration, then exit")]
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["creditgate"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_serve_port_and_config_show() {
        let cli = Cli::try_parse_from(["creditgate", "serve", "--port", "9100"]).expect("parses");
        assert!(matches!(cli.command, Some(Commands::Serve { port: Some(9100) })));

        let cli = Cli::try_parse_from(["creditgate", "config", "show", "--json"]).expect("parses");
        assert!(matches!(cli.command, Some(Commands::Config(ConfigCommands::Show { json: true }))));
    }
}
