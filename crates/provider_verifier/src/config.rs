//! Configuration management for the provider verifier
//!
//! Settings are layered with figment: built-in defaults, then an optional
//! `Verifier.toml`, then `PROVIDER_VERIFIER_*` environment variables
//! (nested keys separated by `__`, e.g. `PROVIDER_VERIFIER_PROBES__GOOGLE_DELAY_MS`).

use crate::probes::{CREDENTIAL_TYPE_ENDPOINT, DEFAULT_USER_AGENTS, GXLU_ENDPOINT};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "Verifier.toml";
pub const ENV_PREFIX: &str = "PROVIDER_VERIFIER_";

/// Main verifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub cache: CacheConfig,
    pub dns: DnsConfig,
    pub probes: ProbeConfig,
    pub miner: MinerConfig,
    pub routing: RoutingConfig,
    pub observability: ObservabilityConfig,
}

impl VerifierConfig {
    /// Load from defaults, `Verifier.toml` in the working directory if it
    /// exists, and the environment.
    pub fn load() -> crate::Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(VerifierConfig::default()));

        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Ok(figment.extract()?)
    }
}

/// Cache location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the JSON cache files
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".local"),
        }
    }
}

/// MX resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Upper bound on a single MX resolution, in seconds
    pub timeout_secs: u64,
    /// External tool queried when the resolver fails; `None` disables it
    pub fallback_program: Option<String>,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            fallback_program: Some("dig".to_string()),
        }
    }
}

/// Side-channel probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub google_endpoint: String,
    pub microsoft_endpoint: String,
    /// Mandatory wait before each gxlu request, in milliseconds
    pub google_delay_ms: u64,
    /// Mandatory wait before each GetCredentialType request, in milliseconds
    pub microsoft_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agents: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            google_endpoint: GXLU_ENDPOINT.to_string(),
            microsoft_endpoint: CREDENTIAL_TYPE_ENDPOINT.to_string(),
            google_delay_ms: 2000,
            microsoft_delay_ms: 3000,
            request_timeout_secs: 10,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
        }
    }
}

/// Website mining settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    pub scheme: String,
    /// Paths fetched on the company domain, in order
    pub paths: Vec<String>,
    pub page_timeout_secs: u64,
    /// Wait before each page fetch, in milliseconds
    pub page_delay_ms: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            paths: crate::miner::CANDIDATE_PATHS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            page_timeout_secs: 8,
            page_delay_ms: 1000,
        }
    }
}

/// Router behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Send Google-hosted domains through the gxlu probe. Off by default:
    /// the router answers `unknown` for them.
    pub probe_google_domains: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable JSON structured logging
    pub json_logs: bool,
    /// Log level filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            log_level: "info".to_string(),
        }
    }
}
