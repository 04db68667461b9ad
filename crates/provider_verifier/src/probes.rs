//! Provider side-channel mailbox probes
//!
//! Neither probe sends mail. Google's gxlu endpoint sets a `COMPASS` cookie
//! only for existing accounts; Microsoft's GetCredentialType reports an
//! `IfExistsResult` code. Both behaviors are undocumented, so anything
//! ambiguous collapses to [`Verdict::Unknown`].
//!
//! Every request is preceded by a fixed sleep to stay under the providers'
//! rate limits.

use crate::config::ProbeConfig;
use crate::Verdict;
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, SET_COOKIE, USER_AGENT};
use reqwest::{redirect, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const GXLU_ENDPOINT: &str = "https://mail.google.com/mail/gxlu";
pub const CREDENTIAL_TYPE_ENDPOINT: &str =
    "https://login.microsoftonline.com/common/GetCredentialType";

const EXISTENCE_COOKIE: &str = "COMPASS";

/// Browser User-Agents rotated across requests.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
];

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    UnexpectedStatus(StatusCode),
}

/// HTTP client for the probes: fixed timeout, redirects never followed.
pub fn probe_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .redirect(redirect::Policy::none())
        .build()
}

/// Pick a random User-Agent, falling back to the first default.
pub(crate) fn random_user_agent(agents: &[String]) -> &str {
    agents
        .choose(&mut rand::thread_rng())
        .map(String::as_str)
        .unwrap_or(DEFAULT_USER_AGENTS[0])
}

/// Verdict implied by a gxlu response's `Set-Cookie` headers.
pub fn verdict_from_cookies<'a, I>(cookies: I) -> Verdict
where
    I: IntoIterator<Item = &'a str>,
{
    if cookies.into_iter().any(|c| c.contains(EXISTENCE_COOKIE)) {
        Verdict::Exists
    } else {
        Verdict::NotExists
    }
}

/// Verdict implied by an `IfExistsResult` code.
pub fn verdict_from_code(code: Option<i64>) -> Verdict {
    match code {
        Some(0) => Verdict::Exists,
        Some(1) => Verdict::NotExists,
        _ => Verdict::Unknown,
    }
}

/// Google Workspace probe via the gxlu endpoint.
#[derive(Debug, Clone)]
pub struct GoogleProbe {
    client: Client,
    endpoint: String,
    delay: Duration,
    user_agents: Vec<String>,
}

impl GoogleProbe {
    pub fn new(client: Client, config: &ProbeConfig) -> Self {
        Self {
            client,
            endpoint: config.google_endpoint.clone(),
            delay: Duration::from_millis(config.google_delay_ms),
            user_agents: config.user_agents.clone(),
        }
    }

    /// Raw gxlu request. Transport faults are returned, not collapsed.
    pub async fn probe(&self, email: &str) -> Result<Verdict, ProbeError> {
        tokio::time::sleep(self.delay).await;

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("email", email)])
            .header(USER_AGENT, random_user_agent(&self.user_agents))
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok());
        Ok(verdict_from_cookies(cookies))
    }

    /// gxlu verdict with any fault reported as `Unknown`.
    pub async fn check(&self, email: &str) -> Verdict {
        self.probe(email).await.unwrap_or_else(|e| {
            debug!("gxlu error: {}: {}", email, e);
            Verdict::Unknown
        })
    }
}

#[derive(Debug, Deserialize)]
struct CredentialTypeResponse {
    #[serde(rename = "IfExistsResult")]
    if_exists_result: Option<i64>,
}

/// Microsoft 365 probe via GetCredentialType.
#[derive(Debug, Clone)]
pub struct MicrosoftProbe {
    client: Client,
    endpoint: String,
    delay: Duration,
    user_agents: Vec<String>,
}

impl MicrosoftProbe {
    pub fn new(client: Client, config: &ProbeConfig) -> Self {
        Self {
            client,
            endpoint: config.microsoft_endpoint.clone(),
            delay: Duration::from_millis(config.microsoft_delay_ms),
            user_agents: config.user_agents.clone(),
        }
    }

    /// Raw GetCredentialType request. An unrecognized code is `Ok(Unknown)`;
    /// transport, status and decode faults are errors.
    pub async fn probe(&self, email: &str) -> Result<Verdict, ProbeError> {
        tokio::time::sleep(self.delay).await;

        let response = self
            .client
            .post(&self.endpoint)
            .header(USER_AGENT, random_user_agent(&self.user_agents))
            .json(&serde_json::json!({ "Username": email }))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ProbeError::UnexpectedStatus(response.status()));
        }

        let body: CredentialTypeResponse = response.json().await?;
        let verdict = verdict_from_code(body.if_exists_result);
        if verdict == Verdict::Unknown {
            debug!("ms365 code {:?} for {}", body.if_exists_result, email);
        }
        Ok(verdict)
    }

    pub async fn check(&self, email: &str) -> Verdict {
        self.probe(email).await.unwrap_or_else(|e| {
            debug!("ms365 error: {}: {}", email, e);
            Verdict::Unknown
        })
    }
}
