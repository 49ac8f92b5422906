use crate::agents::ManifestEditor;
use crate::error::{Result, RippleError};
use crate::manifest::{Dependent, Settings, Target};
use crate::registry::RegistryClient;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Source of truth for freshness checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckStrategy {
    /// Inspect the dependent's declaration file on disk.
    Local,
    /// Query the resolved-version registry.
    Remote,
    /// Remote when a registry is configured, local otherwise.
    #[default]
    Auto,
}

impl FromStr for CheckStrategy {
    type Err = RippleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(CheckStrategy::Local),
            "remote" => Ok(CheckStrategy::Remote),
            "auto" => Ok(CheckStrategy::Auto),
            _ => Err(RippleError::Validation(format!(
                "Invalid check strategy: {s}"
            ))),
        }
    }
}

impl CheckStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStrategy::Local => "local",
            CheckStrategy::Remote => "remote",
            CheckStrategy::Auto => "auto",
        }
    }

    /// Whether lookups under this strategy may be served from the cache.
    pub fn remote_capable(&self) -> bool {
        matches!(self, CheckStrategy::Remote | CheckStrategy::Auto)
    }
}

/// One way of resolving the version a dependent currently declares.
pub trait FreshnessSource: Send + Sync {
    /// The dependent's current version of the target module, or `None`
    /// when the dependent does not declare it at all.
    fn declared_version(&self, dependent: &Dependent, target: &Target) -> Result<Option<String>>;

    /// True when results are worth caching (i.e. the lookup is remote).
    fn cacheable(&self) -> bool {
        false
    }
}

/// Reads the declaration file inside the dependent's working copy.
pub struct LocalDeclarationSource;

impl FreshnessSource for LocalDeclarationSource {
    fn declared_version(&self, dependent: &Dependent, target: &Target) -> Result<Option<String>> {
        let declaration = dependent.path.join(&dependent.manifest);
        ManifestEditor::read_declared_version(&declaration, &target.module)
    }
}

/// Asks the registry which version the dependent currently resolves.
pub struct RemoteRegistrySource {
    client: RegistryClient,
}

impl RemoteRegistrySource {
    pub fn new(client: RegistryClient) -> Self {
        Self { client }
    }
}

impl FreshnessSource for RemoteRegistrySource {
    fn declared_version(&self, dependent: &Dependent, target: &Target) -> Result<Option<String>> {
        self.client
            .resolved_version(&dependent.repo, &target.module)
    }

    fn cacheable(&self) -> bool {
        true
    }
}

/// Resolve the configured strategy to a concrete source. `auto` picks the
/// registry when one is configured and falls back to local inspection.
pub fn select_source(settings: &Settings) -> Result<Arc<dyn FreshnessSource>> {
    let timeout = Duration::from_secs(settings.check_timeout_secs);

    match settings.check_strategy {
        CheckStrategy::Local => Ok(Arc::new(LocalDeclarationSource)),
        CheckStrategy::Remote => {
            let url = settings.registry_url.as_deref().ok_or_else(|| {
                RippleError::Validation(
                    "check_strategy = \"remote\" requires settings.registry_url".into(),
                )
            })?;
            Ok(Arc::new(RemoteRegistrySource::new(RegistryClient::new(
                url, timeout,
            )?)))
        }
        CheckStrategy::Auto => match settings.registry_url.as_deref() {
            Some(url) => Ok(Arc::new(RemoteRegistrySource::new(RegistryClient::new(
                url, timeout,
            )?))),
            None => Ok(Arc::new(LocalDeclarationSource)),
        },
    }
}
