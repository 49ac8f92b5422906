use crate::error::{Result, RippleError};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = "ripple/0.1.0";

/// Client for the resolved-version registry: the external source of truth
/// for which module version a dependent repository currently builds with.
#[derive(Debug)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Self::validate_base_url(base_url)?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RippleError::Check(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Fetch the version of `module` the registry has resolved for `repo`.
    /// Returns `None` when the registry has no record for the pair.
    pub fn resolved_version(&self, repo: &str, module: &str) -> Result<Option<String>> {
        let endpoint = format!("{}/v1/resolved", self.base_url);

        if std::env::var("RIPPLE_VERBOSE").is_ok() {
            eprintln!("[VERBOSE] Querying registry: {endpoint} repo={repo} module={module}");
        }

        let response = self
            .client
            .get(&endpoint)
            .query(&[("repo", repo), ("module", module)])
            .send()
            .map_err(|e| RippleError::Check(format!("registry request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            if std::env::var("RIPPLE_VERBOSE").is_ok() {
                eprintln!("[VERBOSE] Registry has no record for {repo} / {module}");
            }
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(RippleError::Check(format!(
                "registry returned HTTP {} for {repo}",
                response.status()
            )));
        }

        let resolved: ResolvedVersion = response
            .json()
            .map_err(|e| RippleError::Check(format!("invalid registry response: {e}")))?;

        Ok(Some(resolved.version))
    }

    fn validate_base_url(base_url: &str) -> Result<String> {
        let parsed = Url::parse(base_url)
            .map_err(|_| RippleError::Validation(format!("Invalid registry URL: {base_url}")))?;

        match parsed.scheme() {
            "https" | "http" => {}
            scheme => {
                return Err(RippleError::Validation(format!(
                    "Unsupported registry scheme: {scheme}"
                )));
            }
        }

        Ok(base_url.trim_end_matches('/').to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ResolvedVersion {
    version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_registry() {
        assert!(RegistryClient::new("https://deps.example.com", Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn trims_trailing_slash() {
        let client =
            RegistryClient::new("https://deps.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "https://deps.example.com");
    }

    #[test]
    fn rejects_invalid_scheme() {
        let err = RegistryClient::new("ftp://deps.example.com", Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, RippleError::Validation(_)));
    }
}
