use crate::checker::{CheckOutcome, CheckSource, CheckStrategy, Checker};
use crate::context::CancelToken;
use crate::error::{Result, RippleError};
use crate::manifest::{Dependent, Settings, Target};
use crate::agents::version_control::render_branch_name;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One dependent's planned update action. Immutable after planning.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub repo: String,
    pub path: PathBuf,
    /// Declaration file, relative to `path`.
    pub manifest: PathBuf,
    pub module: String,
    pub branch: String,
    pub tests: Vec<Vec<String>>,
    pub extra_commands: Vec<Vec<String>>,
}

/// Aggregate statistics for one planning pass.
///
/// `skipped_up_to_date + work_items + check_errors == total_dependents`;
/// dependents with check errors become work items too (fail-open) but are
/// tallied under `check_errors`.
#[derive(Debug, Clone)]
pub struct PlanStats {
    pub total_dependents: usize,
    pub skipped_up_to_date: usize,
    pub work_items: usize,
    pub check_errors: usize,
    pub check_duration: Duration,
    pub strategy: CheckStrategy,
    pub parallel_checks: bool,
    /// Effective worker count for the check phase.
    pub parallelism: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// The sole handoff artifact between planning and execution.
#[derive(Debug, Clone)]
pub struct Plan {
    pub target: Target,
    pub items: Vec<WorkItem>,
    pub stats: PlanStats,
}

/// Decides which dependents need the bump, dispatching freshness checks
/// across a bounded worker pool. Checks run concurrently but work items
/// are always emitted in manifest declaration order, so plan output is
/// reproducible regardless of check completion timing.
pub struct Planner {
    checker: Arc<Checker>,
    settings: Settings,
}

impl Planner {
    pub fn new(checker: Arc<Checker>, settings: Settings) -> Self {
        Self { checker, settings }
    }

    pub fn plan(
        &self,
        dependents: &[Dependent],
        target: &Target,
        cancel: &CancelToken,
    ) -> Result<Plan> {
        let parallelism = effective_parallelism(self.settings.check_parallelism);
        let started = Instant::now();

        // Force-all bypasses the Checker entirely: every dependent
        // becomes a work item and no checks are spent on diagnostics.
        let outcomes = if self.settings.force_all {
            Vec::new()
        } else {
            self.run_checks(dependents, target, parallelism, cancel)
        };

        if cancel.is_cancelled() {
            return Err(RippleError::Cancelled);
        }

        let check_duration = started.elapsed();

        let mut items = Vec::new();
        let mut skipped_up_to_date = 0usize;
        let mut work_items = 0usize;
        let mut check_errors = 0usize;

        for (index, dependent) in dependents.iter().enumerate() {
            if self.settings.force_all {
                work_items += 1;
                items.push(self.work_item(dependent, target));
                continue;
            }

            let outcome = outcomes
                .get(index)
                .and_then(|o| o.as_ref())
                .ok_or_else(|| {
                    RippleError::Planning(format!("no check result for '{}'", dependent.repo))
                })?;

            if let Some(error) = &outcome.error {
                if std::env::var("RIPPLE_VERBOSE").is_ok() {
                    eprintln!(
                        "[VERBOSE] Check failed for {}, treating as stale: {error}",
                        dependent.repo
                    );
                }
                check_errors += 1;
                items.push(self.work_item(dependent, target));
            } else if outcome.up_to_date && self.settings.skip_up_to_date {
                if std::env::var("RIPPLE_VERBOSE").is_ok() {
                    eprintln!(
                        "[VERBOSE] {} already declares {}{}",
                        dependent.repo,
                        outcome.declared.as_deref().unwrap_or("a newer version"),
                        if outcome.source == CheckSource::Cache {
                            " (cached)"
                        } else {
                            ""
                        }
                    );
                }
                skipped_up_to_date += 1;
            } else {
                work_items += 1;
                items.push(self.work_item(dependent, target));
            }
        }

        let stats = PlanStats {
            total_dependents: dependents.len(),
            skipped_up_to_date,
            work_items,
            check_errors,
            check_duration,
            strategy: self.settings.check_strategy,
            parallel_checks: parallelism > 1,
            parallelism,
            cache_hits: self.checker.cache_hits(),
            cache_misses: self.checker.cache_misses(),
        };

        Ok(Plan {
            target: target.clone(),
            items,
            stats,
        })
    }

    fn run_checks(
        &self,
        dependents: &[Dependent],
        target: &Target,
        parallelism: usize,
        cancel: &CancelToken,
    ) -> Vec<Option<CheckOutcome>> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &Dependent)>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, CheckOutcome)>();

        for job in dependents.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            // Receivers outlive this loop; send cannot fail here.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let mut outcomes: Vec<Option<CheckOutcome>> = vec![None; dependents.len()];

        let pb = ProgressBar::new(dependents.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  [{bar:40}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        pb.set_message("Checking dependents");

        std::thread::scope(|scope| {
            for _ in 0..parallelism {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let checker = &self.checker;
                scope.spawn(move || {
                    while let Ok((index, dependent)) = job_rx.recv() {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let outcome = checker.check(dependent, target);
                        if result_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            for (index, outcome) in result_rx.iter() {
                pb.inc(1);
                outcomes[index] = Some(outcome);
            }
        });
        pb.finish_and_clear();

        outcomes
    }

    fn work_item(&self, dependent: &Dependent, target: &Target) -> WorkItem {
        let template = dependent
            .branch_template
            .as_deref()
            .unwrap_or(&self.settings.branch_template);

        WorkItem {
            repo: dependent.repo.clone(),
            path: dependent.path.clone(),
            manifest: dependent.manifest.clone(),
            module: target.module.clone(),
            branch: render_branch_name(template, &target.module, &target.version),
            tests: dependent.tests.clone(),
            extra_commands: dependent.extra_commands.clone(),
        }
    }
}

/// 0 means auto-detect from available concurrency, never below 1.
pub fn effective_parallelism(configured: usize) -> usize {
    if configured == 0 {
        num_cpus::get().max(1)
    } else {
        configured
    }
}
