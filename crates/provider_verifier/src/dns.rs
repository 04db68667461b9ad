//! MX-based provider classification using hickory-resolver
//!
//! A domain's provider is read off its mail-exchange hostnames. When the
//! resolver itself breaks (as opposed to a clean "no such records" answer)
//! the raw output of an external `dig` query is classified instead.

use crate::cache::CacheStore;
use crate::{normalize, Provider};
use async_trait::async_trait;
use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    error::ResolveErrorKind,
    AsyncResolver, TokioAsyncResolver,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

const GOOGLE_KEYWORDS: &[&str] = &["google", "gmail", "aspmx", "googlemail"];
const MICROSOFT_KEYWORDS: &[&str] = &[
    "outlook",
    "microsoft",
    "hotmail",
    "office365",
    "protection.outlook",
];

#[derive(Error, Debug)]
pub enum MxError {
    /// The domain cleanly has no usable MX answer (NXDOMAIN, empty answer,
    /// no reachable nameservers).
    #[error("no MX records for {0}")]
    NoRecords(String),
    #[error("MX resolution failed: {0}")]
    Resolver(String),
    #[error("fallback MX query failed: {0}")]
    Fallback(String),
}

/// Source of MX exchange hostnames, in answer order.
#[async_trait]
pub trait MxResolver: Send + Sync {
    async fn mx_hosts(&self, domain: &str) -> Result<Vec<String>, MxError>;
}

/// Secondary lookup used when the resolver errors out.
#[async_trait]
pub trait MxFallback: Send + Sync {
    /// Raw, unparsed text describing the domain's MX records.
    async fn raw_mx(&self, domain: &str) -> Result<String, MxError>;
}

/// Provider for a single exchange hostname, if it names one.
pub fn classify_host(host: &str) -> Option<Provider> {
    let host = host.trim().to_lowercase();
    let host = host.trim_end_matches('.');
    if GOOGLE_KEYWORDS.iter().any(|kw| host.contains(kw)) {
        Some(Provider::Google)
    } else if MICROSOFT_KEYWORDS.iter().any(|kw| host.contains(kw)) {
        Some(Provider::Microsoft)
    } else {
        None
    }
}

/// First recognizable host wins; nothing recognizable is `Other`.
pub fn classify_hosts<I, S>(hosts: I) -> Provider
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    hosts
        .into_iter()
        .find_map(|host| classify_host(host.as_ref()))
        .unwrap_or(Provider::Other)
}

/// Classify free-form tool output. Google keywords anywhere take precedence.
pub fn classify_text(raw: &str) -> Provider {
    let raw = raw.to_lowercase();
    if GOOGLE_KEYWORDS.iter().any(|kw| raw.contains(kw)) {
        Provider::Google
    } else if MICROSOFT_KEYWORDS.iter().any(|kw| raw.contains(kw)) {
        Provider::Microsoft
    } else {
        Provider::Other
    }
}

/// MX lookups through hickory-resolver with a bounded wait.
pub struct HickoryMxResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl HickoryMxResolver {
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;

        let resolver = AsyncResolver::tokio(ResolverConfig::cloudflare(), opts);
        debug!("MX resolver initialized - timeout: {:?}", timeout);

        Self { resolver, timeout }
    }
}

#[async_trait]
impl MxResolver for HickoryMxResolver {
    async fn mx_hosts(&self, domain: &str) -> Result<Vec<String>, MxError> {
        let lookup = tokio::time::timeout(self.timeout, self.resolver.mx_lookup(domain))
            .await
            .map_err(|_| MxError::Resolver(format!("timed out after {:?}", self.timeout)))?;

        match lookup {
            Ok(response) => Ok(response
                .iter()
                .map(|mx| mx.exchange().to_utf8())
                .collect()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } | ResolveErrorKind::NoConnections => {
                    Err(MxError::NoRecords(domain.to_string()))
                }
                _ => Err(MxError::Resolver(e.to_string())),
            },
        }
    }
}

/// Runs `<program> +short MX <domain>` and returns its stdout.
pub struct DigFallback {
    program: String,
    timeout: Duration,
}

impl DigFallback {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MxFallback for DigFallback {
    async fn raw_mx(&self, domain: &str) -> Result<String, MxError> {
        let run = Command::new(&self.program)
            .args(["+short", "MX", domain])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| MxError::Fallback(format!("{} timed out", self.program)))?
            .map_err(|e| MxError::Fallback(format!("{}: {}", self.program, e)))?;

        Ok(String::from_utf8_lossy(&output.stdout).to_lowercase())
    }
}

/// Cached provider classification for domains.
pub struct MxClassifier {
    resolver: Arc<dyn MxResolver>,
    fallback: Option<Arc<dyn MxFallback>>,
    cache: Arc<CacheStore>,
}

impl MxClassifier {
    pub fn new(
        resolver: Arc<dyn MxResolver>,
        fallback: Option<Arc<dyn MxFallback>>,
        cache: Arc<CacheStore>,
    ) -> Self {
        Self {
            resolver,
            fallback,
            cache,
        }
    }

    /// Provider for `domain`, looked up once and cached whatever the answer.
    pub async fn classify(&self, domain: &str) -> Provider {
        let domain = normalize(domain);
        if domain.is_empty() {
            return Provider::Other;
        }
        if let Some(provider) = self.cache.provider(&domain) {
            debug!("MX cache hit: {} -> {}", domain, provider);
            return provider;
        }

        let provider = self.lookup(&domain).await;
        self.cache.store_provider(&domain, provider);
        if provider != Provider::Other {
            info!("MX detected: {} -> {}", domain, provider);
        }
        provider
    }

    /// Uncached classification.
    pub async fn lookup(&self, domain: &str) -> Provider {
        match self.resolver.mx_hosts(domain).await {
            Ok(hosts) => classify_hosts(&hosts),
            Err(MxError::NoRecords(_)) => {
                debug!("No MX records for {}", domain);
                Provider::Other
            }
            Err(e) => {
                debug!("MX lookup failed for {}: {} - trying fallback", domain, e);
                self.fallback_lookup(domain).await
            }
        }
    }

    async fn fallback_lookup(&self, domain: &str) -> Provider {
        let Some(fallback) = &self.fallback else {
            return Provider::Other;
        };
        match fallback.raw_mx(domain).await {
            Ok(raw) => classify_text(&raw),
            Err(e) => {
                debug!("Fallback MX lookup failed for {}: {}", domain, e);
                Provider::Other
            }
        }
    }
}
