use anyhow::Result;
use colored::Colorize;

use creditgate_core::config as core_config;
use creditgate_types::models::AppConfig;

use crate::cli::ConfigCommands;

pub fn handle_config_command(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show { json } => show_config(json),
        ConfigCommands::Check => check_config(),
    }
}

fn show_config(json: bool) -> Result<()> {
    let config = redacted(core_config::load_config().map_err(|e| anyhow::anyhow!(e))?);

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("{}", "Server:".cyan().bold());
    println!("  Listen: {}", config.server.get_socket_addr());
    println!("  Request timeout: {}s", config.server.request_timeout_secs);
    println!("  Trust forwarded-for: {}", config.server.trust_forwarded_for);
    println!("{}", "Rate limit:".cyan().bold());
    println!(
        "  {} guest / {} authenticated requests per {}s",
        config.rate_limit.guest_max_requests,
        config.rate_limit.authenticated_max_requests,
        config.rate_limit.window_secs
    );
    println!("{}", "Quota:".cyan().bold());
    println!("  UTC offset: {} min", config.quota.reference_utc_offset_minutes);
    println!(
        "  Promotional window: {} day(s), cap {} per request",
        config.quota.promotional_window_days, config.quota.promotional_per_request_cap
    );
    for (tier, limits) in [
        ("GUEST", config.quota.plans.guest),
        ("FREE", config.quota.plans.free),
        ("PRO", config.quota.plans.pro),
        ("ENTERPRISE", config.quota.plans.enterprise),
    ] {
        println!(
            "  {:<10} {:>6}/month, {:>3}/request, {:?}",
            tier, limits.monthly_limit, limits.per_request_cap, limits.overflow
        );
    }
    println!("{}", "Services:".cyan().bold());
    for (service_id, candidates) in &config.generation.services {
        let chain: Vec<String> = candidates
            .iter()
            .map(|c| {
                if c.supports_structured_output {
                    format!("{}+json", c.model_id)
                } else {
                    c.model_id.clone()
                }
            })
            .collect();
        println!("  {}: {}", service_id, chain.join(" -> "));
    }
    println!("{}", "Storage:".cyan().bold());
    println!(
        "  {}",
        if config.database_url.is_some() { "PostgreSQL" } else { "in-memory (not persisted)" }
    );
    Ok(())
}

fn check_config() -> Result<()> {
    let path = core_config::config_path().map_err(|e| anyhow::anyhow!(e))?;
    core_config::load_config().map_err(|e| anyhow::anyhow!(e))?;
    println!("{} Config OK: {}", "✓".green(), path.display());
    Ok(())
}

fn redacted(mut config: AppConfig) -> AppConfig {
    config.provider.api_key = mask_key(&config.provider.api_key);
    config.guest_token.secret = mask_key(&config.guest_token.secret);
    if config.database_url.is_some() {
        config.database_url = Some("<set>".to_string());
    }
    config
}

fn mask_key(key: &str) -> String {
    if key.len() <= 8 {
        return "*".repeat(key.len());
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}
