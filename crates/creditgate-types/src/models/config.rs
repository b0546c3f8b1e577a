//! Application configuration models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use super::candidate::ModelCandidate;
use super::plan::PlanTable;

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, Validate)]
pub struct AppConfig {
    /// HTTP listener settings
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    /// Per-IP short-horizon throttling
    #[serde(default)]
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    /// Monthly quota accounting
    #[serde(default)]
    #[validate(nested)]
    pub quota: QuotaConfig,
    /// Fallback chains and retry behaviour
    #[serde(default)]
    #[validate(nested)]
    pub generation: GenerationConfig,
    /// Upstream generative model provider
    #[serde(default)]
    #[validate(nested)]
    pub provider: ProviderConfig,
    /// Guest usage cookie
    #[serde(default)]
    #[validate(nested)]
    pub guest_token: GuestTokenConfig,
    /// PostgreSQL connection string; in-memory storage when absent
    #[serde(default)]
    pub database_url: Option<String>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1_u64))]
    #[serde(default = "default_host")]
    pub host: String,
    #[validate(range(min = 1_u16))]
    #[serde(default = "default_port")]
    pub port: u16,
    /// Overall deadline for one generation request, in seconds
    #[validate(range(min = 1_u64, max = 3600_u64))]
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Key the rate limiter on `x-forwarded-for` / `x-real-ip`. Only safe
    /// behind a proxy that overwrites those headers; off means socket peer only.
    #[serde(default = "default_trust_forwarded_for")]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            trust_forwarded_for: default_trust_forwarded_for(),
        }
    }
}

impl ServerConfig {
    /// Get the full bind socket address.
    pub fn get_socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Per-IP fixed-window throttling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct RateLimitConfig {
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Requests per window for callers without an account
    #[validate(range(min = 1_u32))]
    #[serde(default = "default_guest_max_requests")]
    pub guest_max_requests: u32,
    /// Requests per window for signed-in callers
    #[validate(range(min = 1_u32))]
    #[serde(default = "default_authenticated_max_requests")]
    pub authenticated_max_requests: u32,
    /// Map size above which expired records are swept on insert
    #[serde(default = "default_cleanup_threshold")]
    pub cleanup_threshold: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            guest_max_requests: default_guest_max_requests(),
            authenticated_max_requests: default_authenticated_max_requests(),
            cleanup_threshold: default_cleanup_threshold(),
        }
    }
}

/// Monthly quota accounting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct QuotaConfig {
    /// Fixed UTC offset, in minutes, that defines month boundaries
    #[serde(default)]
    pub reference_utc_offset_minutes: i32,
    /// Days after first activity during which quota is not enforced
    #[serde(default = "default_promotional_window_days")]
    pub promotional_window_days: u32,
    /// Per-request ceiling while the promotional window is active
    #[validate(range(min = 1_u32))]
    #[serde(default = "default_promotional_per_request_cap")]
    pub promotional_per_request_cap: u32,
    #[serde(default)]
    #[validate(nested)]
    pub plans: PlanTable,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            reference_utc_offset_minutes: 0,
            promotional_window_days: default_promotional_window_days(),
            promotional_per_request_cap: default_promotional_per_request_cap(),
            plans: PlanTable::default(),
        }
    }
}

/// Fallback chains and retry behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct GenerationConfig {
    /// Pause before retrying a candidate after a transient failure
    #[validate(range(max = 60_000_u64))]
    #[serde(default = "default_transient_backoff_ms")]
    pub transient_backoff_ms: u64,
    /// Ordered candidates per service id
    #[serde(default = "default_services")]
    pub services: BTreeMap<String, Vec<ModelCandidate>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            transient_backoff_ms: default_transient_backoff_ms(),
            services: default_services(),
        }
    }
}

/// Upstream generative model provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ProviderConfig {
    #[validate(url)]
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Per-call HTTP timeout, in seconds
    #[validate(range(min = 1_u64, max = 600_u64))]
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: String::new(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

/// Guest usage cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct GuestTokenConfig {
    #[validate(length(min = 1_u64))]
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// HMAC secret; an ephemeral one is generated when empty
    #[serde(default)]
    pub secret: String,
}

impl Default for GuestTokenConfig {
    fn default() -> Self {
        Self { cookie_name: default_cookie_name(), secret: String::new() }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub const fn default_port() -> u16 {
    8080
}

pub const fn default_request_timeout() -> u64 {
    90
}

const fn default_trust_forwarded_for() -> bool {
    true
}

const fn default_window_secs() -> u64 {
    60
}

const fn default_guest_max_requests() -> u32 {
    5
}

const fn default_authenticated_max_requests() -> u32 {
    20
}

const fn default_cleanup_threshold() -> usize {
    10_000
}

const fn default_promotional_window_days() -> u32 {
    7
}

const fn default_promotional_per_request_cap() -> u32 {
    10
}

const fn default_transient_backoff_ms() -> u64 {
    1000
}

fn default_provider_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

const fn default_provider_timeout() -> u64 {
    60
}

fn default_cookie_name() -> String {
    "cg_usage".to_string()
}

fn default_services() -> BTreeMap<String, Vec<ModelCandidate>> {
    BTreeMap::from([
        (
            "banner".to_string(),
            vec![
                ModelCandidate::plain("gemini-2.5-flash-image"),
                ModelCandidate::plain("gemini-2.0-flash-preview-image-generation"),
            ],
        ),
        (
            "copy".to_string(),
            vec![
                ModelCandidate::structured("gemini-2.5-pro"),
                ModelCandidate::structured("gemini-2.5-flash"),
                ModelCandidate::plain("gemini-2.0-flash"),
            ],
        ),
        (
            "chat".to_string(),
            vec![ModelCandidate::plain("gemini-2.5-flash"), ModelCandidate::plain("gemini-2.0-flash")],
        ),
    ])
}
