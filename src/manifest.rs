use crate::checker::strategy::CheckStrategy;
use crate::error::{Result, RippleError};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DECLARATION_FILE: &str = "deps.toml";
pub const DEFAULT_BRANCH_TEMPLATE: &str = "deps/bump-{module}-{version}";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STATE_DIR: &str = ".ripple/state";

/// The upstream module and version being propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub module: String,
    pub version: String,
}

impl Target {
    pub fn new(module: &str, version: &str) -> Result<Self> {
        let module = module.trim();
        let version = version.trim();

        if module.is_empty() {
            return Err(RippleError::Validation("Target module is required".into()));
        }
        if version.is_empty() {
            return Err(RippleError::Validation("Target version is required".into()));
        }

        Ok(Self {
            module: module.to_string(),
            version: version.to_string(),
        })
    }
}

/// Resolved settings for one run. Manifest values override the defaults;
/// CLI flags override the manifest (applied in the workflow layer).
#[derive(Debug, Clone)]
pub struct Settings {
    pub check_strategy: CheckStrategy,
    pub cache_ttl_secs: u64,
    pub check_parallelism: usize,
    pub check_timeout_secs: u64,
    pub skip_up_to_date: bool,
    pub force_all: bool,
    pub registry_url: Option<String>,
    pub review_api_url: Option<String>,
    pub review_base_branch: String,
    pub notify_webhook_url: Option<String>,
    pub state_dir: PathBuf,
    pub branch_template: String,
    pub tests: Vec<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_strategy: CheckStrategy::Auto,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            check_parallelism: 0,
            check_timeout_secs: DEFAULT_CHECK_TIMEOUT_SECS,
            skip_up_to_date: true,
            force_all: false,
            registry_url: None,
            review_api_url: None,
            review_base_branch: "main".to_string(),
            notify_webhook_url: None,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            branch_template: DEFAULT_BRANCH_TEMPLATE.to_string(),
            tests: Vec::new(),
        }
    }
}

/// One downstream repository declared in the rollout manifest.
#[derive(Debug, Clone)]
pub struct Dependent {
    pub repo: String,
    pub path: PathBuf,
    /// Dependency declaration file, relative to `path`.
    pub manifest: PathBuf,
    pub tests: Vec<Vec<String>>,
    pub extra_commands: Vec<Vec<String>>,
    pub branch_template: Option<String>,
}

/// Parsed rollout manifest: settings plus the candidate dependents.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub settings: Settings,
    pub dependents: Vec<Dependent>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    settings: Option<RawSettings>,
    #[serde(default)]
    dependents: Vec<RawDependent>,
}

#[derive(Debug, Deserialize, Default)]
struct RawSettings {
    check_strategy: Option<CheckStrategy>,
    cache_ttl_secs: Option<u64>,
    check_parallelism: Option<usize>,
    check_timeout_secs: Option<u64>,
    skip_up_to_date: Option<bool>,
    force_all: Option<bool>,
    registry_url: Option<String>,
    review_api_url: Option<String>,
    review_base_branch: Option<String>,
    notify_webhook_url: Option<String>,
    state_dir: Option<PathBuf>,
    branch_template: Option<String>,
    tests: Option<Vec<Vec<String>>>,
}

#[derive(Debug, Deserialize)]
struct RawDependent {
    repo: String,
    path: PathBuf,
    manifest: Option<PathBuf>,
    tests: Option<Vec<Vec<String>>>,
    #[serde(default)]
    extra_commands: Vec<Vec<String>>,
    branch_template: Option<String>,
}

impl Manifest {
    /// Load and validate a rollout manifest from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RippleError::ManifestLoad(format!("cannot read '{}': {e}", path.display()))
        })?;

        let raw: RawManifest = toml::from_str(&content).map_err(|e| {
            RippleError::ManifestLoad(format!("cannot parse '{}': {e}", path.display()))
        })?;

        let settings = Self::resolve_settings(raw.settings.unwrap_or_default());
        let dependents = Self::resolve_dependents(raw.dependents, &settings)?;

        Ok(Self {
            settings,
            dependents,
        })
    }

    fn resolve_settings(raw: RawSettings) -> Settings {
        let defaults = Settings::default();
        Settings {
            check_strategy: raw.check_strategy.unwrap_or(defaults.check_strategy),
            cache_ttl_secs: raw.cache_ttl_secs.unwrap_or(defaults.cache_ttl_secs),
            check_parallelism: raw.check_parallelism.unwrap_or(defaults.check_parallelism),
            check_timeout_secs: raw.check_timeout_secs.unwrap_or(defaults.check_timeout_secs),
            skip_up_to_date: raw.skip_up_to_date.unwrap_or(defaults.skip_up_to_date),
            force_all: raw.force_all.unwrap_or(defaults.force_all),
            registry_url: raw.registry_url,
            review_api_url: raw.review_api_url,
            review_base_branch: raw.review_base_branch.unwrap_or(defaults.review_base_branch),
            notify_webhook_url: raw.notify_webhook_url,
            state_dir: raw.state_dir.unwrap_or(defaults.state_dir),
            branch_template: raw.branch_template.unwrap_or(defaults.branch_template),
            tests: raw.tests.unwrap_or_default(),
        }
    }

    fn resolve_dependents(
        raw: Vec<RawDependent>,
        settings: &Settings,
    ) -> Result<Vec<Dependent>> {
        let mut seen = HashSet::new();
        let mut dependents = Vec::with_capacity(raw.len());

        for entry in raw {
            let repo = entry.repo.trim().to_string();
            if repo.is_empty() {
                return Err(RippleError::ManifestLoad(
                    "dependent entry is missing a repo identifier".into(),
                ));
            }
            if !seen.insert(repo.clone()) {
                return Err(RippleError::ManifestLoad(format!(
                    "dependent '{repo}' is declared more than once"
                )));
            }
            if entry.path.as_os_str().is_empty() {
                return Err(RippleError::ManifestLoad(format!(
                    "dependent '{repo}' is missing a working-copy path"
                )));
            }

            dependents.push(Dependent {
                repo,
                path: entry.path,
                manifest: entry
                    .manifest
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DECLARATION_FILE)),
                tests: entry.tests.unwrap_or_else(|| settings.tests.clone()),
                extra_commands: entry.extra_commands,
                branch_template: entry.branch_template,
            });
        }

        Ok(dependents)
    }

    /// Dependents narrowed by an optional repo-id glob pattern.
    pub fn select_dependents(&self, filter: Option<&str>) -> Result<Vec<Dependent>> {
        match filter {
            None => Ok(self.dependents.clone()),
            Some(pattern) => {
                let matcher = PatternMatcher::new(pattern)?;
                Ok(self
                    .dependents
                    .iter()
                    .filter(|d| matcher.matches(&d.repo))
                    .cloned()
                    .collect())
            }
        }
    }
}

/// Case-insensitive glob matcher; bare substrings match anywhere.
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(RippleError::Validation(
                "Filter pattern cannot be empty".to_string(),
            ));
        }

        let adjusted = if trimmed.contains(['*', '?']) {
            trimmed.to_string()
        } else {
            format!("*{}*", trimmed)
        };

        let regex = Self::compile_glob(&adjusted)?;
        Ok(Self { regex })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    fn compile_glob(pattern: &str) -> Result<Regex> {
        let mut regex = String::from("(?i)^");
        for ch in pattern.chars() {
            match ch {
                '*' => regex.push_str(".*"),
                '?' => regex.push('.'),
                '.' | '+' | '(' | ')' | '|' | '^' | '$' | '{' | '}' | '[' | ']' | '\\' => {
                    regex.push('\\');
                    regex.push(ch);
                }
                _ => regex.push(ch),
            }
        }
        regex.push('$');

        Regex::new(&regex).map_err(|e| {
            RippleError::Validation(format!("Invalid filter pattern '{}': {}", pattern, e))
        })
    }
}
