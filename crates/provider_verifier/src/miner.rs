//! Naming-pattern mining from company web pages
//!
//! Personal addresses published on a company's own pages usually reveal its
//! naming convention. We fetch a handful of likely pages, pull out addresses
//! on the company domain, drop role accounts, and read the template off the
//! first address that looks like a name.

use crate::cache::CacheStore;
use crate::config::MinerConfig;
use crate::normalize;
use crate::pattern::NamingPattern;
use crate::probes::{random_user_agent, ProbeError};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pages most likely to list staff addresses, fetched in this order.
pub const CANDIDATE_PATHS: &[&str] = &[
    "/about",
    "/team",
    "/about-us",
    "/contact",
    "/leadership",
    "/people",
    "/",
];

/// Role accounts that say nothing about personal naming.
pub const GENERIC_LOCAL_PARTS: &[&str] = &[
    "info", "hello", "press", "sales", "support", "contact", "admin", "help", "team", "hr",
    "jobs", "careers", "office", "marketing", "media", "security", "privacy", "legal",
    "feedback", "billing", "noreply", "no-reply", "webmaster",
];

/// Source of page bodies.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ProbeError>;
}

/// Fetches pages over HTTP(S), following redirects.
pub struct HttpPageFetcher {
    client: Client,
    user_agents: Vec<String>,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration, user_agents: Vec<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            user_agents,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ProbeError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent(&self.user_agents))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProbeError::UnexpectedStatus(response.status()));
        }
        Ok(response.text().await?)
    }
}

/// Matcher for addresses on `domain`, case-insensitive.
pub fn address_regex(domain: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)[a-z0-9_.+-]+@{}", regex::escape(domain)))
}

/// All matches of `re` in `text`, in order of appearance.
pub fn extract_addresses(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Lowercased, de-duplicated addresses that look like they belong to a person.
pub fn personal_addresses<I, S>(addresses: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .map(|address| address.as_ref().to_lowercase())
        .filter(|address| seen.insert(address.clone()))
        .filter(|address| {
            let local = address.split('@').next().unwrap_or_default();
            if GENERIC_LOCAL_PARTS.contains(&local) {
                return false;
            }
            local.contains(|c: char| matches!(c, '.' | '_' | '-')) || local.chars().count() >= 5
        })
        .collect()
}

/// Template implied by a single local part, if it splits into two name parts.
pub fn infer_pattern(local: &str) -> Option<NamingPattern> {
    let (separator, pattern) = [
        ('.', NamingPattern::FirstDotLast),
        ('_', NamingPattern::FirstUnderscoreLast),
        ('-', NamingPattern::FirstHyphenLast),
    ]
    .into_iter()
    .find(|(separator, _)| local.contains(*separator))?;

    let parts: Vec<&str> = local.split(separator).collect();
    match parts.as_slice() {
        [first, last] if first.chars().count() > 1 && last.chars().count() > 1 => Some(pattern),
        _ => None,
    }
}

pub struct WebsiteMiner {
    fetcher: Arc<dyn PageFetcher>,
    cache: Arc<CacheStore>,
    scheme: String,
    paths: Vec<String>,
    delay: Duration,
}

impl WebsiteMiner {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cache: Arc<CacheStore>, config: &MinerConfig) -> Self {
        Self {
            fetcher,
            cache,
            scheme: config.scheme.clone(),
            paths: config.paths.clone(),
            delay: Duration::from_millis(config.page_delay_ms),
        }
    }

    /// Naming pattern published on the company's pages, cached per domain
    /// (including "nothing found").
    pub async fn mine(&self, domain: &str) -> Option<NamingPattern> {
        let domain = normalize(domain);
        if domain.is_empty() {
            return None;
        }
        if let Some(cached) = self.cache.mined_pattern(&domain) {
            debug!("Mined pattern cache hit: {} -> {:?}", domain, cached);
            return cached;
        }

        let re = match address_regex(&domain) {
            Ok(re) => re,
            Err(e) => {
                warn!("Cannot build address matcher for {}: {}", domain, e);
                return None;
            }
        };

        let mut found = Vec::new();
        for path in &self.paths {
            let url = format!("{}://{}{}", self.scheme, domain, path);
            tokio::time::sleep(self.delay).await;
            match self.fetcher.fetch(&url).await {
                Ok(body) => found.extend(extract_addresses(&re, &body)),
                Err(e) => debug!("Skipping {}: {}", url, e),
            }
        }

        let personal = personal_addresses(&found);
        let pattern = personal.first().and_then(|best| {
            let local = best.split('@').next().unwrap_or_default();
            let pattern = infer_pattern(local);
            if let Some(pattern) = pattern {
                info!("Website mining: {} -> {} (from {})", domain, pattern, best);
            }
            pattern
        });

        self.cache.store_mined_pattern(&domain, pattern);
        pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Instant;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
        arrivals: Mutex<Vec<Instant>>,
    }

    impl FakeSite {
        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }
    }

    #[async_trait]
    impl PageFetcher for FakeSite {
        async fn fetch(&self, url: &str) -> Result<String, ProbeError> {
            self.requested.lock().push(url.to_string());
            self.arrivals.lock().push(Instant::now());
            self.pages
                .get(url)
                .cloned()
                .ok_or(ProbeError::UnexpectedStatus(reqwest::StatusCode::NOT_FOUND))
        }
    }

    fn miner(site: Arc<FakeSite>, dir: &TempDir) -> WebsiteMiner {
        let config = MinerConfig {
            page_delay_ms: 0,
            ..MinerConfig::default()
        };
        WebsiteMiner::new(site, Arc::new(CacheStore::open(dir.path())), &config)
    }

    #[test]
    fn test_extracts_only_target_domain() {
        let html = r#"<a href="mailto:Jane.Doe@Acme.com">Jane</a> bob@other.com
                      <p>j_smith+news@acme.com, info@acme.com</p>"#;
        let re = address_regex("acme.com").unwrap();
        assert_eq!(
            extract_addresses(&re, html),
            vec!["Jane.Doe@Acme.com", "j_smith+news@acme.com", "info@acme.com"]
        );
        assert!(extract_addresses(&re, "nothing here").is_empty());
        // the dot in the domain is literal
        assert!(extract_addresses(&re, "jane@acmexcom").is_empty());
    }

    #[test]
    fn test_personal_filter() {
        let personal = personal_addresses([
            "info@acme.com",
            "Jane.Doe@acme.com",
            "jane.doe@acme.com",
            "bob@acme.com",
            "johndoe@acme.com",
            "no-reply@acme.com",
        ]);
        assert_eq!(personal, vec!["jane.doe@acme.com", "johndoe@acme.com"]);
    }

    #[test]
    fn test_template_inference() {
        assert_eq!(infer_pattern("john.doe"), Some(NamingPattern::FirstDotLast));
        assert_eq!(infer_pattern("john_doe"), Some(NamingPattern::FirstUnderscoreLast));
        assert_eq!(infer_pattern("john-doe"), Some(NamingPattern::FirstHyphenLast));
        assert_eq!(infer_pattern("johndoe"), None);
        assert_eq!(infer_pattern("j.doe"), None);
        assert_eq!(infer_pattern("john.q.doe"), None);
        // `.` wins even when other separators are present
        assert_eq!(infer_pattern("john.doe_x"), Some(NamingPattern::FirstDotLast));
    }

    #[tokio::test]
    async fn test_mine_uses_first_personal_address() {
        let dir = TempDir::new().unwrap();
        let site = Arc::new(
            FakeSite::default()
                .page("https://acme.com/team", "sales@acme.com mary_jones@acme.com")
                .page("https://acme.com/", "peter.parker@acme.com"),
        );
        let miner = miner(site.clone(), &dir);

        assert_eq!(miner.mine("Acme.com").await, Some(NamingPattern::FirstUnderscoreLast));
        assert_eq!(site.requested.lock().len(), CANDIDATE_PATHS.len());
        assert_eq!(site.requested.lock()[0], "https://acme.com/about");
    }

    #[tokio::test]
    async fn test_no_pattern_is_cached_too() {
        let dir = TempDir::new().unwrap();
        let site = Arc::new(FakeSite::default().page("https://acme.com/about", "johndoe@acme.com"));
        let miner = miner(site.clone(), &dir);

        assert_eq!(miner.mine("acme.com").await, None);
        assert_eq!(miner.mine("acme.com").await, None);
        assert_eq!(site.requested.lock().len(), CANDIDATE_PATHS.len());

        let reopened = CacheStore::open(dir.path());
        assert_eq!(reopened.mined_pattern("acme.com"), Some(None));
    }

    #[tokio::test]
    async fn test_every_page_fetch_waits_the_configured_delay() {
        let dir = TempDir::new().unwrap();
        let site = Arc::new(FakeSite::default());
        let config = MinerConfig {
            page_delay_ms: 40,
            paths: vec!["/about".into(), "/team".into(), "/".into()],
            ..MinerConfig::default()
        };
        let miner = WebsiteMiner::new(site.clone(), Arc::new(CacheStore::open(dir.path())), &config);

        let start = Instant::now();
        assert_eq!(miner.mine("acme.com").await, None);

        let delay = Duration::from_millis(40);
        let mut previous = start;
        for arrival in site.arrivals.lock().iter() {
            assert!(*arrival - previous >= delay);
            previous = *arrival;
        }
        assert_eq!(site.arrivals.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_domain_fetches_nothing() {
        let dir = TempDir::new().unwrap();
        let site = Arc::new(FakeSite::default());
        let miner = miner(site.clone(), &dir);

        assert_eq!(miner.mine("  ").await, None);
        assert!(site.requested.lock().is_empty());
    }
}
