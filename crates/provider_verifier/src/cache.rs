//! Persistent JSON caches
//!
//! Each cache is a flat key→value JSON document loaded fully at startup and
//! rewritten fully after every update. Loading never fails: a missing or
//! corrupt file yields an empty cache, and individual entries that do not
//! decode are carried through saves untouched. Saving is best-effort;
//! failures are logged and the in-memory copy keeps serving. There is no cross-process
//! locking and no atomic replace, so a single writer is assumed.

use crate::pattern::NamingPattern;
use crate::{KnownVerdict, Provider, Verdict};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File holding MX classifications and mined patterns.
pub const DOMAIN_CACHE_FILE: &str = "mx_cache.json";
/// File holding conclusive mailbox verdicts.
pub const EMAIL_CACHE_FILE: &str = "email_verify_cache.json";

const MINED_KEY_PREFIX: &str = "mined_";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// A key→value mapping backed by one JSON file.
#[derive(Debug)]
pub struct JsonCache<V> {
    path: PathBuf,
    entries: BTreeMap<String, V>,
    /// Entries this cache cannot decode, written back as they were read
    foreign: BTreeMap<String, Value>,
}

impl<V> JsonCache<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Load the cache at `path`, starting empty if it is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let document = match Self::try_load(&path) {
            Ok(document) => document,
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Ignoring unreadable cache {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        let mut entries = BTreeMap::new();
        let mut foreign = BTreeMap::new();
        for (key, value) in document {
            match V::deserialize(&value) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(e) => {
                    warn!("Keeping undecodable entry {} in {}: {}", key, path.display(), e);
                    foreign.insert(key, value);
                }
            }
        }
        debug!("Loaded {} cache entries from {}", entries.len(), path.display());
        Self {
            path,
            entries,
            foreign,
        }
    }

    /// Raw JSON object at `path`. Fails only if the file is unreadable or
    /// not a JSON object.
    pub fn try_load(path: &Path) -> Result<BTreeMap<String, Value>, CacheError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the full mapping back to disk, indented for diffability.
    pub fn save(&self) -> Result<(), CacheError> {
        let mut document = self.foreign.clone();
        for (key, value) in &self.entries {
            document.insert(key.clone(), serde_json::to_value(value)?);
        }
        let json = serde_json::to_string_pretty(&document)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert an entry and persist the whole mapping.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Result<(), CacheError> {
        let key = key.into();
        self.foreign.remove(&key);
        self.entries.insert(key, value);
        self.save()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Value stored in the domain cache.
///
/// Provider entries live under the bare domain, mined patterns under
/// `mined_<domain>` with `null` meaning "mined, nothing found".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainEntry {
    Provider(Provider),
    MinedPattern(Option<NamingPattern>),
}

/// All cached state shared by the verifier components.
#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,
    domains: Mutex<JsonCache<DomainEntry>>,
    emails: Mutex<JsonCache<KnownVerdict>>,
    catch_all: Mutex<HashMap<String, bool>>,
}

impl CacheStore {
    /// Open (or start) the caches under `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(
                "Cannot create cache directory {}: {} (continuing without durable cache)",
                dir.display(),
                e
            );
        }

        let domains = JsonCache::load(dir.join(DOMAIN_CACHE_FILE));
        let emails = JsonCache::load(dir.join(EMAIL_CACHE_FILE));
        info!(
            "Cache store opened at {} - {} domain entries, {} email verdicts",
            dir.display(),
            domains.len(),
            emails.len()
        );

        Self {
            dir,
            domains: Mutex::new(domains),
            emails: Mutex::new(emails),
            catch_all: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn provider(&self, domain: &str) -> Option<Provider> {
        match self.domains.lock().get(domain) {
            Some(DomainEntry::Provider(provider)) => Some(*provider),
            _ => None,
        }
    }

    pub fn store_provider(&self, domain: &str, provider: Provider) {
        let mut domains = self.domains.lock();
        persist(domains.insert(domain, DomainEntry::Provider(provider)), domains.path());
    }

    /// `Some(None)` means the domain was mined and nothing was found.
    pub fn mined_pattern(&self, domain: &str) -> Option<Option<NamingPattern>> {
        match self.domains.lock().get(&mined_key(domain)) {
            Some(DomainEntry::MinedPattern(pattern)) => Some(*pattern),
            _ => None,
        }
    }

    pub fn store_mined_pattern(&self, domain: &str, pattern: Option<NamingPattern>) {
        let mut domains = self.domains.lock();
        persist(
            domains.insert(mined_key(domain), DomainEntry::MinedPattern(pattern)),
            domains.path(),
        );
    }

    pub fn verdict(&self, email: &str) -> Option<Verdict> {
        self.emails.lock().get(email).copied().map(Verdict::from)
    }

    /// Persist a verdict if it is conclusive. Returns whether it was stored.
    pub fn store_verdict(&self, email: &str, verdict: Verdict) -> bool {
        let Some(known) = verdict.known() else {
            return false;
        };
        let mut emails = self.emails.lock();
        persist(emails.insert(email, known), emails.path());
        true
    }

    pub fn catch_all(&self, domain: &str) -> Option<bool> {
        self.catch_all.lock().get(domain).copied()
    }

    pub fn store_catch_all(&self, domain: &str, is_catch_all: bool) {
        self.catch_all.lock().insert(domain.to_string(), is_catch_all);
    }
}

fn mined_key(domain: &str) -> String {
    format!("{MINED_KEY_PREFIX}{domain}")
}

fn persist(result: Result<(), CacheError>, path: &Path) {
    if let Err(e) = result {
        warn!("Failed to save cache {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let cache: JsonCache<String> = JsonCache::load(dir.path().join("absent.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache: JsonCache<String> = JsonCache::load(&path);
        assert!(cache.is_empty());
        assert!(matches!(
            JsonCache::<String>::try_load(&path),
            Err(CacheError::Format(_))
        ));
    }

    #[test]
    fn test_insert_persists_indented_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.json");

        let mut cache: JsonCache<String> = JsonCache::load(&path);
        cache.insert("acme.com", "google".to_string()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"acme.com\": \"google\""));

        let reloaded: JsonCache<String> = JsonCache::load(&path);
        assert_eq!(reloaded.get("acme.com").map(String::as_str), Some("google"));
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut cache: JsonCache<String> = JsonCache::load(dir.path().join("missing/dir/c.json"));
        assert!(cache.insert("k", "v".to_string()).is_err());
        // in-memory copy keeps serving
        assert!(cache.contains("k"));
    }

    #[test]
    fn test_undecodable_entries_survive_a_save() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(DOMAIN_CACHE_FILE),
            r#"{"acme.com":"google","contoso.com":"microsoft","mined_x.com":"{last}.{first}","odd.io":42}"#,
        )
        .unwrap();

        let store = CacheStore::open(dir.path());
        assert_eq!(store.provider("acme.com"), Some(Provider::Google));
        assert_eq!(store.provider("contoso.com"), Some(Provider::Microsoft));
        assert_eq!(store.mined_pattern("x.com"), None);
        assert_eq!(store.provider("odd.io"), None);

        store.store_provider("new.com", Provider::Other);
        let raw = std::fs::read_to_string(dir.path().join(DOMAIN_CACHE_FILE)).unwrap();
        assert!(raw.contains("\"acme.com\": \"google\""));
        assert!(raw.contains("\"contoso.com\": \"microsoft\""));
        assert!(raw.contains("\"new.com\": \"other\""));
        assert!(raw.contains("\"mined_x.com\": \"{last}.{first}\""));
        assert!(raw.contains("\"odd.io\": 42"));

        // a decodable value replaces the undecodable one
        store.store_mined_pattern("x.com", Some(NamingPattern::FirstDotLast));
        let reopened = CacheStore::open(dir.path());
        assert_eq!(reopened.mined_pattern("x.com"), Some(Some(NamingPattern::FirstDotLast)));
        assert_eq!(reopened.provider("new.com"), Some(Provider::Other));
    }

    #[test]
    fn test_non_object_document_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(&path, r#"["acme.com"]"#).unwrap();

        let cache: JsonCache<String> = JsonCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unknown_verdicts_are_never_stored() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path());

        assert!(!store.store_verdict("a@acme.com", Verdict::Unknown));
        assert!(store.store_verdict("b@acme.com", Verdict::NotExists));
        assert_eq!(store.verdict("a@acme.com"), None);
        assert_eq!(store.verdict("b@acme.com"), Some(Verdict::NotExists));

        let raw = std::fs::read_to_string(dir.path().join(EMAIL_CACHE_FILE)).unwrap();
        assert!(!raw.contains("unknown"));
        assert!(!raw.contains("a@acme.com"));
    }

    #[test]
    fn test_providers_and_mined_patterns_share_a_file() {
        let dir = TempDir::new().unwrap();
        {
            let store = CacheStore::open(dir.path());
            store.store_provider("acme.com", Provider::Microsoft);
            store.store_mined_pattern("acme.com", Some(NamingPattern::FirstDotLast));
            store.store_mined_pattern("empty.io", None);
        }

        let store = CacheStore::open(dir.path());
        assert_eq!(store.provider("acme.com"), Some(Provider::Microsoft));
        assert_eq!(store.mined_pattern("acme.com"), Some(Some(NamingPattern::FirstDotLast)));
        assert_eq!(store.mined_pattern("empty.io"), Some(None));
        assert_eq!(store.mined_pattern("other.io"), None);
        assert_eq!(store.provider("empty.io"), None);

        let raw = std::fs::read_to_string(dir.path().join(DOMAIN_CACHE_FILE)).unwrap();
        assert!(raw.contains("\"mined_acme.com\": \"{first}.{last}\""));
        assert!(raw.contains("\"mined_empty.io\": null"));
    }

    #[test]
    fn test_catch_all_flags_are_not_persisted() {
        let dir = TempDir::new().unwrap();
        {
            let store = CacheStore::open(dir.path());
            store.store_catch_all("acme.com", true);
            assert_eq!(store.catch_all("acme.com"), Some(true));
        }
        let store = CacheStore::open(dir.path());
        assert_eq!(store.catch_all("acme.com"), None);
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        let store = CacheStore::open(&nested);
        store.store_provider("acme.com", Provider::Other);
        assert!(nested.join(DOMAIN_CACHE_FILE).exists());
    }
}
