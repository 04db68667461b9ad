//! Verification router tying classification, probes and caches together
//!
//! The router is the single entry point for "does this mailbox plausibly
//! exist". Conclusive answers are cached forever; `unknown` never is.
//!
//! Google-hosted domains answer `unknown` unless
//! [`RoutingConfig::probe_google_domains`] is set. The gxlu probe and the
//! catch-all detector stay reachable through [`VerificationRouter::verify_google`].

use crate::cache::CacheStore;
use crate::catch_all::CatchAllDetector;
use crate::config::{RoutingConfig, VerifierConfig};
use crate::discovery::{self, DiscoveredPattern, EmailOracle};
use crate::dns::{DigFallback, HickoryMxResolver, MxClassifier, MxFallback, MxResolver};
use crate::miner::{HttpPageFetcher, PageFetcher, WebsiteMiner};
use crate::pattern::NamingPattern;
use crate::probes::{probe_client, GoogleProbe, MicrosoftProbe};
use crate::{is_public_mailbox_domain, normalize, ParsedName, Provider, Verdict};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Main verifier coordinating provider detection and mailbox probes
pub struct VerificationRouter {
    cache: Arc<CacheStore>,
    classifier: MxClassifier,
    google: Arc<GoogleProbe>,
    microsoft: MicrosoftProbe,
    catch_all: CatchAllDetector,
    miner: WebsiteMiner,
    routing: RoutingConfig,
}

impl VerificationRouter {
    /// Build a router with the production resolver, `dig` fallback and page
    /// fetcher, opening the caches under `config.cache.dir`.
    pub fn from_config(config: &VerifierConfig) -> crate::Result<Self> {
        info!("Initializing verification router");

        let cache = Arc::new(CacheStore::open(&config.cache.dir));
        let dns_timeout = Duration::from_secs(config.dns.timeout_secs);
        let resolver: Arc<dyn MxResolver> = Arc::new(HickoryMxResolver::new(dns_timeout));
        let fallback = config
            .dns
            .fallback_program
            .as_ref()
            .map(|program| Arc::new(DigFallback::new(program, dns_timeout)) as Arc<dyn MxFallback>);
        let pages: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(
            Duration::from_secs(config.miner.page_timeout_secs),
            config.probes.user_agents.clone(),
        )?);

        Self::with_parts(config, cache, resolver, fallback, pages)
    }

    /// Build a router around caller-supplied resolver, fallback and fetcher.
    pub fn with_parts(
        config: &VerifierConfig,
        cache: Arc<CacheStore>,
        resolver: Arc<dyn MxResolver>,
        fallback: Option<Arc<dyn MxFallback>>,
        pages: Arc<dyn PageFetcher>,
    ) -> crate::Result<Self> {
        let client = probe_client(Duration::from_secs(config.probes.request_timeout_secs))?;
        let google = Arc::new(GoogleProbe::new(client.clone(), &config.probes));

        let router = Self {
            classifier: MxClassifier::new(resolver, fallback, cache.clone()),
            microsoft: MicrosoftProbe::new(client, &config.probes),
            catch_all: CatchAllDetector::new(google.clone(), cache.clone()),
            miner: WebsiteMiner::new(pages, cache.clone(), &config.miner),
            google,
            cache,
            routing: config.routing.clone(),
        };

        info!(
            "Verification router ready - google routing: {}",
            router.routing.probe_google_domains
        );
        Ok(router)
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Provider backing `domain`.
    pub async fn provider(&self, domain: &str) -> Provider {
        self.classifier.classify(domain).await
    }

    /// Whether `email` plausibly exists. `domain` defaults to the part after `@`.
    #[instrument(skip(self))]
    pub async fn verify(&self, email: &str, domain: Option<&str>) -> Verdict {
        let email = normalize(email);
        if email.matches('@').count() != 1 {
            debug!("Rejecting malformed address");
            return Verdict::Unknown;
        }
        let domain = match domain {
            Some(domain) => normalize(domain),
            None => email
                .split_once('@')
                .map(|(_, domain)| domain.to_string())
                .unwrap_or_default(),
        };

        if let Some(verdict) = self.cache.verdict(&email) {
            debug!("Verification cache hit: {}", verdict);
            return verdict;
        }

        if is_public_mailbox_domain(&domain) {
            debug!("Public mailbox domain {}, not probing", domain);
            return Verdict::Unknown;
        }

        let verdict = match self.provider(&domain).await {
            Provider::Google if self.routing.probe_google_domains => {
                self.verify_google(&email, &domain).await
            }
            Provider::Google => {
                debug!("Google routing disabled for {}", domain);
                Verdict::Unknown
            }
            Provider::Microsoft => self.microsoft.check(&email).await,
            Provider::Other => Verdict::Unknown,
        };

        if self.cache.store_verdict(&email, verdict) {
            debug!("Cached verdict {} for {}", verdict, email);
        }
        verdict
    }

    /// gxlu verification guarded by the skip-list and catch-all detection.
    /// Not cached; the router caches what it returns from here.
    pub async fn verify_google(&self, email: &str, domain: &str) -> Verdict {
        let email = normalize(email);
        let domain = normalize(domain);
        if is_public_mailbox_domain(&domain) {
            return Verdict::Unknown;
        }
        if self.catch_all.is_catch_all(&domain).await {
            debug!("Google catch-all: {}", domain);
            return Verdict::Unknown;
        }
        self.google.check(&email).await
    }

    pub async fn is_catch_all(&self, domain: &str) -> bool {
        self.catch_all.is_catch_all(&normalize(domain)).await
    }

    /// Naming pattern published on the company's own pages.
    pub async fn mine_pattern(&self, domain: &str) -> Option<NamingPattern> {
        self.miner.mine(domain).await
    }

    /// Naming pattern confirmed by probing candidates for `name`.
    pub async fn discover_pattern(
        &self,
        name: &ParsedName,
        domain: &str,
    ) -> Option<DiscoveredPattern> {
        discovery::discover_pattern(self, name, domain).await
    }
}

#[async_trait]
impl EmailOracle for VerificationRouter {
    async fn provider(&self, domain: &str) -> Provider {
        VerificationRouter::provider(self, domain).await
    }

    async fn verify(&self, email: &str, domain: Option<&str>) -> Verdict {
        VerificationRouter::verify(self, email, domain).await
    }
}
