use crate::error::{Result, RippleError};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = "ripple/0.1.0";
const TOKEN_ENV: &str = "RIPPLE_REVIEW_TOKEN";

/// A review request on the hosting provider. The (repo, branch) pair is
/// the identity used for idempotent lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub repo: String,
    pub number: u64,
    pub url: String,
}

/// Review-request operations keyed by repo + branch.
pub trait ReviewTransport: Send + Sync {
    fn find_open(&self, repo: &str, branch: &str) -> Result<Option<PullRequest>>;

    fn create(
        &self,
        repo: &str,
        branch: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest>;

    fn comment(&self, pr: &PullRequest, body: &str) -> Result<()>;
}

/// Blocking JSON client against a GitHub-style review API.
#[derive(Debug)]
pub struct HttpReviewTransport {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpReviewTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Self::validate_base_url(base_url)?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                RippleError::ReviewRequest(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            token: std::env::var(TOKEN_ENV).ok(),
        })
    }

    fn validate_base_url(base_url: &str) -> Result<String> {
        let parsed = Url::parse(base_url).map_err(|_| {
            RippleError::Validation(format!("Invalid review API URL: {base_url}"))
        })?;

        match parsed.scheme() {
            "https" | "http" => {}
            scheme => {
                return Err(RippleError::Validation(format!(
                    "Unsupported review API scheme: {scheme}"
                )));
            }
        }

        Ok(base_url.trim_end_matches('/').to_string())
    }

    fn request(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PrResponse {
    number: u64,
    html_url: String,
}

impl ReviewTransport for HttpReviewTransport {
    fn find_open(&self, repo: &str, branch: &str) -> Result<Option<PullRequest>> {
        let endpoint = format!("{}/repos/{repo}/pulls", self.base_url);

        if std::env::var("RIPPLE_VERBOSE").is_ok() {
            eprintln!("[VERBOSE] Looking up open review request: {endpoint} head={branch}");
        }

        let response = self
            .request(self.client.get(&endpoint))
            .query(&[("state", "open"), ("head", branch)])
            .send()
            .map_err(|e| RippleError::ReviewRequest(format!("lookup failed: {e}")))?;

        if !response.status().is_success() {
            return Err(RippleError::ReviewRequest(format!(
                "lookup returned HTTP {} for {repo}",
                response.status()
            )));
        }

        let open: Vec<PrResponse> = response
            .json()
            .map_err(|e| RippleError::ReviewRequest(format!("invalid lookup response: {e}")))?;

        Ok(open.into_iter().next().map(|pr| PullRequest {
            repo: repo.to_string(),
            number: pr.number,
            url: pr.html_url,
        }))
    }

    fn create(
        &self,
        repo: &str,
        branch: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let endpoint = format!("{}/repos/{repo}/pulls", self.base_url);

        let response = self
            .request(self.client.post(&endpoint))
            .json(&json!({
                "title": title,
                "head": branch,
                "base": base,
                "body": body,
            }))
            .send()
            .map_err(|e| RippleError::ReviewRequest(format!("create failed: {e}")))?;

        if !response.status().is_success() {
            return Err(RippleError::ReviewRequest(format!(
                "create returned HTTP {} for {repo}",
                response.status()
            )));
        }

        let pr: PrResponse = response
            .json()
            .map_err(|e| RippleError::ReviewRequest(format!("invalid create response: {e}")))?;

        Ok(PullRequest {
            repo: repo.to_string(),
            number: pr.number,
            url: pr.html_url,
        })
    }

    fn comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
        let endpoint = format!(
            "{}/repos/{}/issues/{}/comments",
            self.base_url, pr.repo, pr.number
        );

        let response = self
            .request(self.client.post(&endpoint))
            .json(&json!({ "body": body }))
            .send()
            .map_err(|e| RippleError::ReviewRequest(format!("comment failed: {e}")))?;

        if !response.status().is_success() {
            return Err(RippleError::ReviewRequest(format!(
                "comment returned HTTP {} for {}#{}",
                response.status(),
                pr.repo,
                pr.number
            )));
        }

        Ok(())
    }
}
