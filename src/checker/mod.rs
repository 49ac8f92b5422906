use crate::error::Result;
use crate::manifest::{Dependent, Settings, Target};
use crate::version::VersionComparator;
use std::sync::Arc;
use std::time::Duration;

pub mod cache;
pub mod strategy;

use cache::CheckCache;
pub use strategy::CheckStrategy;
use strategy::FreshnessSource;

/// Where a check answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSource {
    Cache,
    Fresh,
}

/// Result of checking one dependent against the target.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub up_to_date: bool,
    /// The version the dependent currently declares/resolves, when known.
    pub declared: Option<String>,
    pub source: CheckSource,
    pub error: Option<String>,
}

/// Decides whether a dependent already carries the target version.
///
/// Lookups go through the selected [`FreshnessSource`]; remote lookups are
/// served from a TTL cache shared across all workers of one planning pass.
/// The per-check timeout is enforced by the underlying HTTP client, so a
/// check never blocks past `check_timeout_secs`. An inconclusive check
/// (source error) reports the dependent as stale rather than current.
pub struct Checker {
    source: Arc<dyn FreshnessSource>,
    cache: CheckCache,
}

impl Checker {
    pub fn new(source: Arc<dyn FreshnessSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: CheckCache::new(ttl),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let source = strategy::select_source(settings)?;
        Ok(Self::new(
            source,
            Duration::from_secs(settings.cache_ttl_secs),
        ))
    }

    pub fn check(&self, dependent: &Dependent, target: &Target) -> CheckOutcome {
        let lookup = if self.source.cacheable() {
            let key = (dependent.repo.clone(), target.version.clone());
            self.cache
                .get_or_fetch(key, || self.source.declared_version(dependent, target))
        } else {
            (self.source.declared_version(dependent, target), false)
        };

        match lookup {
            (Ok(declared), from_cache) => {
                let up_to_date = declared
                    .as_deref()
                    .is_some_and(|d| VersionComparator::satisfies(d, &target.version));
                CheckOutcome {
                    up_to_date,
                    declared,
                    source: if from_cache {
                        CheckSource::Cache
                    } else {
                        CheckSource::Fresh
                    },
                    error: None,
                }
            }
            (Err(e), _) => CheckOutcome {
                up_to_date: false,
                declared: None,
                source: CheckSource::Fresh,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache.hits()
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache.misses()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RippleError;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn dependent(repo: &str, path: PathBuf) -> Dependent {
        Dependent {
            repo: repo.to_string(),
            path,
            manifest: PathBuf::from("deps.toml"),
            tests: Vec::new(),
            extra_commands: Vec::new(),
            branch_template: None,
        }
    }

    fn target() -> Target {
        Target::new("corelib", "1.4.2").unwrap()
    }

    struct FixedSource {
        declared: Option<String>,
        calls: AtomicUsize,
        cacheable: bool,
    }

    impl FreshnessSource for FixedSource {
        fn declared_version(&self, _: &Dependent, _: &Target) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.declared.clone())
        }

        fn cacheable(&self) -> bool {
            self.cacheable
        }
    }

    struct FailingSource;

    impl FreshnessSource for FailingSource {
        fn declared_version(&self, _: &Dependent, _: &Target) -> Result<Option<String>> {
            Err(RippleError::Check("registry unreachable".into()))
        }

        fn cacheable(&self) -> bool {
            true
        }
    }

    #[test]
    fn reports_up_to_date_when_declared_satisfies_target() {
        let source = Arc::new(FixedSource {
            declared: Some("1.5.0".into()),
            calls: AtomicUsize::new(0),
            cacheable: false,
        });
        let checker = Checker::new(source, Duration::from_secs(60));

        let outcome = checker.check(&dependent("acme/billing", PathBuf::from(".")), &target());
        assert!(outcome.up_to_date);
        assert_eq!(outcome.declared.as_deref(), Some("1.5.0"));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn missing_declaration_is_stale() {
        let source = Arc::new(FixedSource {
            declared: None,
            calls: AtomicUsize::new(0),
            cacheable: false,
        });
        let checker = Checker::new(source, Duration::from_secs(60));

        let outcome = checker.check(&dependent("acme/billing", PathBuf::from(".")), &target());
        assert!(!outcome.up_to_date);
    }

    #[test]
    fn source_errors_fail_open() {
        let checker = Checker::new(Arc::new(FailingSource), Duration::from_secs(60));

        let outcome = checker.check(&dependent("acme/billing", PathBuf::from(".")), &target());
        assert!(!outcome.up_to_date);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn cacheable_source_is_consulted_once_per_key() {
        let source = Arc::new(FixedSource {
            declared: Some("1.4.2".into()),
            calls: AtomicUsize::new(0),
            cacheable: true,
        });
        let checker = Checker::new(Arc::clone(&source) as Arc<dyn FreshnessSource>, Duration::from_secs(60));
        let dep = dependent("acme/billing", PathBuf::from("."));

        let first = checker.check(&dep, &target());
        let second = checker.check(&dep, &target());

        assert_eq!(first.source, CheckSource::Fresh);
        assert_eq!(second.source, CheckSource::Cache);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(checker.cache_hits(), 1);
        assert_eq!(checker.cache_misses(), 1);
    }

    #[test]
    fn local_source_reads_declaration_from_disk() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("deps.toml"),
            "[dependencies]\ncorelib = \"1.4.1\"\n",
        )
        .unwrap();

        let checker = Checker::new(
            Arc::new(strategy::LocalDeclarationSource),
            Duration::from_secs(60),
        );
        let dep = dependent("acme/billing", dir.path().to_path_buf());

        let outcome = checker.check(&dep, &target());
        assert!(!outcome.up_to_date);
        assert_eq!(outcome.declared.as_deref(), Some("1.4.1"));
    }
}
