//! Catch-all detection for Google-hosted domains
//!
//! A catch-all domain answers "exists" for any local part, which makes the
//! gxlu signal meaningless. We probe a canary address that no human would
//! own; if gxlu claims it exists, the domain is flagged for the lifetime of
//! the cache store.

use crate::cache::CacheStore;
use crate::probes::GoogleProbe;
use crate::Verdict;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

const CANARY_PREFIX: &str = "zxqtest";
const CANARY_SUFFIX: &str = "fake";

/// Deterministic, almost certainly unregistered address on `domain`.
pub fn canary_address(domain: &str) -> String {
    let digest = hex::encode(Sha256::digest(domain.as_bytes()));
    format!("{CANARY_PREFIX}{}{CANARY_SUFFIX}@{domain}", &digest[..8])
}

pub struct CatchAllDetector {
    probe: Arc<GoogleProbe>,
    cache: Arc<CacheStore>,
}

impl CatchAllDetector {
    pub fn new(probe: Arc<GoogleProbe>, cache: Arc<CacheStore>) -> Self {
        Self { probe, cache }
    }

    /// Whether `domain` accepts mail for any local part. Memoized per store.
    pub async fn is_catch_all(&self, domain: &str) -> bool {
        if let Some(flag) = self.cache.catch_all(domain) {
            return flag;
        }

        let canary = canary_address(domain);
        debug!("Probing catch-all canary {}", canary);
        let is_catch_all = self.probe.check(&canary).await == Verdict::Exists;

        self.cache.store_catch_all(domain, is_catch_all);
        if is_catch_all {
            info!("Catch-all detected (Google): {}", domain);
        }
        is_catch_all
    }
}
