//! Naming-pattern discovery by probing generated candidates
//!
//! Only Microsoft 365 domains are probed: it is the one provider whose
//! signal the router trusts. Candidates are tried in a fixed priority order
//! and the search stops at the first inconclusive answer rather than keep
//! hammering a target that has stopped giving clear signals.

use crate::pattern::NamingPattern;
use crate::{normalize, ParsedName, Provider, Verdict};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Candidate templates in probing order.
pub const DISCOVERY_ORDER: [NamingPattern; 5] = [
    NamingPattern::FirstDotLast,
    NamingPattern::InitialLast,
    NamingPattern::FirstLast,
    NamingPattern::FirstUnderscoreLast,
    NamingPattern::First,
];

/// The existence oracle discovery runs against.
#[async_trait]
pub trait EmailOracle: Send + Sync {
    async fn provider(&self, domain: &str) -> Provider;
    async fn verify(&self, email: &str, domain: Option<&str>) -> Verdict;
}

/// A confirmed address and the template that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredPattern {
    pub email: String,
    pub pattern: NamingPattern,
}

/// Ordered `(address, template)` candidates for a name on `domain`.
pub fn candidates(name: &ParsedName, domain: &str) -> Vec<(String, NamingPattern)> {
    let domain = normalize(domain);
    DISCOVERY_ORDER
        .iter()
        .map(|pattern| (format!("{}@{}", pattern.render(name), domain), *pattern))
        .collect()
}

/// Find the first candidate the oracle confirms.
///
/// Returns `None` for non-Microsoft domains, incomplete names, the first
/// `unknown` answer, or when every candidate is rejected.
pub async fn discover_pattern<O>(
    oracle: &O,
    name: &ParsedName,
    domain: &str,
) -> Option<DiscoveredPattern>
where
    O: EmailOracle + ?Sized,
{
    let domain = normalize(domain);
    if oracle.provider(&domain).await != Provider::Microsoft {
        return None;
    }
    if name.first_lower().is_empty() || name.last_lower().is_empty() {
        return None;
    }

    for (email, pattern) in candidates(name, &domain) {
        match oracle.verify(&email, Some(domain.as_str())).await {
            Verdict::Exists => {
                info!("Pattern discovered: {} -> {} (via {})", domain, pattern, email);
                return Some(DiscoveredPattern { email, pattern });
            }
            Verdict::NotExists => continue,
            Verdict::Unknown => {
                debug!("Inconclusive answer for {}, abandoning discovery on {}", email, domain);
                break;
            }
        }
    }
    None
}
