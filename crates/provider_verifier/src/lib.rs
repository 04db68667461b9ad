//! # provider_verifier
//!
//! Mail provider detection and side-channel mailbox verification for company
//! domains, plus discovery of a company's email naming convention.
//!
//! ## Features
//!
//! - **Provider classification** from MX records via hickory-resolver, with a
//!   `dig` fallback when the resolver itself is unavailable
//! - **Mailbox existence probes** against Google (gxlu) and Microsoft 365
//!   (GetCredentialType), failing safe to `unknown`
//! - **Catch-all detection** with a deterministic canary address per domain
//! - **Naming-pattern inference** by mining company pages or by probing
//!   generated candidates
//! - **Persistent JSON caches** so repeated lookups never touch the network
//!
//! ## Example
//!
//! ```rust,no_run
//! use provider_verifier::{ParsedName, VerificationRouter, VerifierConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = VerifierConfig::load()?;
//!     let router = VerificationRouter::from_config(&config)?;
//!
//!     let verdict = router.verify("jane.smith@example.com", None).await;
//!     println!("verdict: {}", verdict);
//!
//!     let name = ParsedName::new("Jane", "Smith");
//!     if let Some(found) = router.discover_pattern(&name, "example.com").await {
//!         println!("{} uses {}", found.email, found.pattern);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catch_all;
pub mod config;
pub mod discovery;
pub mod dns;
pub mod miner;
pub mod pattern;
pub mod probes;
pub mod router;
pub mod telemetry;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Mail provider backing a domain, derived from its MX records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Google,
    Microsoft,
    Other,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Microsoft => "microsoft",
            Provider::Other => "other",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a mailbox existence check.
///
/// `Unknown` means "no evidence either way". It is never persisted, so a
/// later call is free to re-derive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Exists,
    NotExists,
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Exists => "exists",
            Verdict::NotExists => "not_exists",
            Verdict::Unknown => "unknown",
        }
    }

    /// The cacheable form of this verdict, if it is conclusive.
    pub fn known(self) -> Option<KnownVerdict> {
        match self {
            Verdict::Exists => Some(KnownVerdict::Exists),
            Verdict::NotExists => Some(KnownVerdict::NotExists),
            Verdict::Unknown => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conclusive verdict, the only kind the verification cache stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownVerdict {
    Exists,
    NotExists,
}

impl From<KnownVerdict> for Verdict {
    fn from(known: KnownVerdict) -> Self {
        match known {
            KnownVerdict::Exists => Verdict::Exists,
            KnownVerdict::NotExists => Verdict::NotExists,
        }
    }
}

/// A person's name as split by an upstream name parser.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedName {
    pub first: String,
    pub last: String,
    pub first_initial: String,
}

impl ParsedName {
    /// Build a name, taking the initial from the first name.
    pub fn new(first: impl Into<String>, last: impl Into<String>) -> Self {
        let first = first.into();
        let first_initial = first.chars().next().map(String::from).unwrap_or_default();
        Self {
            first,
            last: last.into(),
            first_initial,
        }
    }

    pub(crate) fn first_lower(&self) -> String {
        self.first.trim().to_lowercase()
    }

    pub(crate) fn last_lower(&self) -> String {
        self.last.trim().to_lowercase()
    }

    pub(crate) fn initial_lower(&self) -> String {
        let initial = self.first_initial.trim();
        if initial.is_empty() {
            self.first_lower().chars().next().map(String::from).unwrap_or_default()
        } else {
            initial.to_lowercase()
        }
    }
}

/// Large public mailbox providers where the side channels say nothing about
/// an individual company.
pub const PUBLIC_MAILBOX_DOMAINS: &[&str] = &[
    "gmail.com",
    "google.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
];

pub fn is_public_mailbox_domain(domain: &str) -> bool {
    PUBLIC_MAILBOX_DOMAINS.contains(&domain)
}

/// Lowercase and trim a domain or address.
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Errors that can occur while constructing verifier components
#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VerifierError>;

// Re-export main types
pub use cache::CacheStore;
pub use config::VerifierConfig;
pub use discovery::{discover_pattern, DiscoveredPattern, EmailOracle};
pub use pattern::NamingPattern;
pub use router::VerificationRouter;
