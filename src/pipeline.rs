use crate::context::RunContext;
use crate::error::{Result, RippleError};
use crate::planner::Plan;
use crate::state::{ItemState, ItemStatus, RunStatus, Summary};
use colored::Colorize;

/// Per-item outcome surfaced to the operator.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub repo: String,
    pub status: ItemStatus,
    pub reason: Option<String>,
    pub pr_url: Option<String>,
    /// True when a prior run already completed this item and it was
    /// skipped without re-invoking the executor or broker.
    pub resumed: bool,
}

/// Outcome of executing one plan.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub items: Vec<ItemReport>,
    pub status: RunStatus,
    pub resumed: usize,
}

/// Drive every work item through apply -> review-request -> notify,
/// persisting state after each transition so an interrupted run resumes
/// at the first non-terminal item.
///
/// An item's Completed record is written only after its review request is
/// settled, so resume can skip Completed items without ever dropping a
/// review request. Broker and state calls for one item are strictly
/// sequential; failures are isolated per item.
pub fn execute(ctx: &RunContext, plan: &Plan) -> Result<RunReport> {
    let module = &plan.target.module;
    let version = &plan.target.version;

    let mut summary = match ctx.state.load_summary(module, version) {
        Ok(summary) => summary,
        Err(RippleError::StateNotFound { .. }) => Summary::new(module, version),
        Err(e) => return Err(e),
    };

    let planned: Vec<String> = plan.items.iter().map(|i| i.repo.clone()).collect();
    summary.merge_repos(&planned);
    summary.set_status(RunStatus::InProgress);
    ctx.state.save_summary(&summary)?;

    let mut items = Vec::with_capacity(plan.items.len());
    let mut resumed = 0usize;
    let mut any_failed = false;
    let mut interrupted = false;

    for item in &plan.items {
        if ctx.cancel.is_cancelled() {
            interrupted = true;
            break;
        }

        let prior = ctx.state.load_item(module, version, &item.repo)?;
        if let Some(prior) = prior.filter(|p| p.status == ItemStatus::Completed) {
            resumed += 1;
            items.push(ItemReport {
                repo: item.repo.clone(),
                status: ItemStatus::Completed,
                reason: prior.reason,
                pr_url: prior.pr_url,
                resumed: true,
            });
            continue;
        }

        let state = ItemState::new(&item.repo).advance(ItemStatus::Applying, None);
        ctx.state.save_item(module, version, &state)?;

        let outcome = ctx.executor.apply(&plan.target, item);

        let report = match outcome.status {
            ItemStatus::Completed => {
                match ctx.broker.ensure_pr(&plan.target, item) {
                    Ok(pr) => {
                        let mut state =
                            state.advance(ItemStatus::Completed, Some(outcome.reason.clone()));
                        if let Some(pr) = &pr {
                            state = state.with_pr_url(&pr.url);
                        }
                        ctx.state.save_item(module, version, &state)?;

                        if let Some(pr) = &pr {
                            let comment = format!("ripple: {}", outcome.reason);
                            if let Err(e) = ctx.broker.comment(pr, &comment) {
                                warn(&format!("comment on {} failed: {e}", item.repo));
                            }
                        }

                        ItemReport {
                            repo: item.repo.clone(),
                            status: ItemStatus::Completed,
                            reason: Some(outcome.reason.clone()),
                            pr_url: pr.map(|pr| pr.url),
                            resumed: false,
                        }
                    }
                    Err(e) => {
                        // The apply itself succeeded; the item is marked
                        // Failed so resume retries the review request.
                        let reason = format!("review request failed: {e}");
                        let state = state.advance(ItemStatus::Failed, Some(reason.clone()));
                        ctx.state.save_item(module, version, &state)?;
                        any_failed = true;

                        ItemReport {
                            repo: item.repo.clone(),
                            status: ItemStatus::Failed,
                            reason: Some(reason),
                            pr_url: None,
                            resumed: false,
                        }
                    }
                }
            }
            status => {
                let state = state.advance(status, Some(outcome.reason.clone()));
                ctx.state.save_item(module, version, &state)?;
                if status == ItemStatus::Failed {
                    any_failed = true;
                }

                ItemReport {
                    repo: item.repo.clone(),
                    status,
                    reason: Some(outcome.reason.clone()),
                    pr_url: None,
                    resumed: false,
                }
            }
        };

        let text = format!(
            "[ripple] {module} {version} / {}: {} ({})",
            item.repo,
            report.status.as_str(),
            report.reason.as_deref().unwrap_or("no reason recorded"),
        );
        if let Err(e) = ctx.broker.notify(&text) {
            warn(&format!("notification for {} failed: {e}", item.repo));
        }

        items.push(report);

        summary.set_status(RunStatus::InProgress);
        ctx.state.save_summary(&summary)?;
    }

    let status = if interrupted {
        RunStatus::Interrupted
    } else if any_failed {
        RunStatus::CompletedWithFailures
    } else {
        RunStatus::Completed
    };
    summary.set_status(status);
    ctx.state.save_summary(&summary)?;

    Ok(RunReport {
        items,
        status,
        resumed,
    })
}

fn warn(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.yellow());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::command_runner::{CommandOutput, CommandRunner};
    use crate::agents::version_control::VersionControl;
    use crate::broker::review::{PullRequest, ReviewTransport};
    use crate::broker::Broker;
    use crate::checker::Checker;
    use crate::checker::strategy::LocalDeclarationSource;
    use crate::context::CancelToken;
    use crate::executor::Executor;
    use crate::manifest::{Settings, Target};
    use crate::planner::{Plan, PlanStats, Planner, WorkItem};
    use crate::state::StateManager;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;

    struct CountingRunner {
        calls: AtomicUsize,
        fail_for: Option<String>,
    }

    impl CommandRunner for CountingRunner {
        fn run(&self, _argv: &[String], workdir: &Path) -> crate::error::Result<CommandOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fails = self
                .fail_for
                .as_deref()
                .is_some_and(|f| workdir.to_string_lossy().contains(f));
            Ok(CommandOutput {
                success: !fails,
                exit_code: Some(if fails { 1 } else { 0 }),
                output: "test output".to_string(),
            })
        }
    }

    struct NoopVcs;

    impl VersionControl for NoopVcs {
        fn dirty_paths(&self, _workdir: &Path) -> crate::error::Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn prepare_branch(&self, _workdir: &Path, _branch: &str) -> crate::error::Result<()> {
            Ok(())
        }
        fn commit_and_push(
            &self,
            _workdir: &Path,
            _file: &Path,
            _message: &str,
            _branch: &str,
        ) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        open: Mutex<Vec<PullRequest>>,
        creates: AtomicUsize,
        fail_creates: bool,
    }

    impl ReviewTransport for FakeTransport {
        fn find_open(
            &self,
            repo: &str,
            _branch: &str,
        ) -> crate::error::Result<Option<PullRequest>> {
            Ok(self
                .open
                .lock()
                .unwrap()
                .iter()
                .find(|pr| pr.repo == repo)
                .cloned())
        }

        fn create(
            &self,
            repo: &str,
            _branch: &str,
            _base: &str,
            _title: &str,
            _body: &str,
        ) -> crate::error::Result<PullRequest> {
            if self.fail_creates {
                return Err(RippleError::ReviewRequest("api down".into()));
            }
            let number = self.creates.fetch_add(1, Ordering::SeqCst) as u64 + 1;
            let pr = PullRequest {
                repo: repo.to_string(),
                number,
                url: format!("https://git.example.com/{repo}/pull/{number}"),
            };
            self.open.lock().unwrap().push(pr.clone());
            Ok(pr)
        }

        fn comment(&self, _pr: &PullRequest, _body: &str) -> crate::error::Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        _state_dir: tempfile::TempDir,
        _workdirs: Vec<tempfile::TempDir>,
        runner: Arc<CountingRunner>,
        transport: Arc<FakeTransport>,
        plan: Plan,
    }

    fn fixture(repos: &[&str], fail_for: Option<&str>, fail_creates: bool) -> (RunContext, Fixture) {
        let state_dir = tempdir().unwrap();

        let mut workdirs = Vec::new();
        let mut items = Vec::new();
        for repo in repos {
            let dir = tempdir().unwrap();
            // Embed the repo name in the workdir so runners can key on it.
            let workdir = dir.path().join(repo.replace('/', "-"));
            std::fs::create_dir_all(&workdir).unwrap();
            std::fs::write(
                workdir.join("deps.toml"),
                "[dependencies]\ncorelib = \"1.4.1\"\n",
            )
            .unwrap();

            items.push(WorkItem {
                repo: repo.to_string(),
                path: workdir,
                manifest: PathBuf::from("deps.toml"),
                module: "corelib".to_string(),
                branch: "deps/bump-corelib-1.4.2".to_string(),
                tests: vec![vec!["make".to_string(), "test".to_string()]],
                extra_commands: Vec::new(),
            });
            workdirs.push(dir);
        }

        let target = Target::new("corelib", "1.4.2").unwrap();
        let plan = Plan {
            target,
            stats: PlanStats {
                total_dependents: items.len(),
                skipped_up_to_date: 0,
                work_items: items.len(),
                check_errors: 0,
                check_duration: Duration::from_millis(1),
                strategy: crate::checker::CheckStrategy::Local,
                parallel_checks: false,
                parallelism: 1,
                cache_hits: 0,
                cache_misses: 0,
            },
            items,
        };

        let runner = Arc::new(CountingRunner {
            calls: AtomicUsize::new(0),
            fail_for: fail_for.map(|f| f.to_string()),
        });
        let transport = Arc::new(FakeTransport {
            fail_creates,
            ..FakeTransport::default()
        });

        let settings = Settings::default();
        let checker = Arc::new(Checker::new(
            Arc::new(LocalDeclarationSource),
            Duration::from_secs(60),
        ));
        let ctx = RunContext {
            settings: settings.clone(),
            planner: Planner::new(checker, settings),
            executor: Executor::new(
                Arc::clone(&runner) as Arc<dyn CommandRunner>,
                Arc::new(NoopVcs),
                false,
            ),
            broker: Broker::new(
                Some(Arc::clone(&transport) as Arc<dyn ReviewTransport>),
                None,
                "main",
            ),
            state: StateManager::new(state_dir.path()),
            cancel: CancelToken::default(),
        };

        (
            ctx,
            Fixture {
                _state_dir: state_dir,
                _workdirs: workdirs,
                runner,
                transport,
                plan,
            },
        )
    }

    #[test]
    fn runs_every_item_and_opens_review_requests() {
        let (ctx, fx) = fixture(&["acme/billing", "acme/search"], None, false);

        let report = execute(&ctx, &fx.plan).unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.items.len(), 2);
        assert!(report.items.iter().all(|i| i.status == ItemStatus::Completed));
        assert!(report.items.iter().all(|i| i.pr_url.is_some()));
        assert_eq!(fx.transport.creates.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn one_failing_item_does_not_stop_the_batch() {
        let (ctx, fx) = fixture(&["acme/billing", "acme/search"], Some("search"), false);
        // The failing workdir is the second item's tempdir path.
        let report = execute(&ctx, &fx.plan);
        let report = report.unwrap();

        assert_eq!(report.status, RunStatus::CompletedWithFailures);
        let billing = &report.items[0];
        assert_eq!(billing.status, ItemStatus::Completed);
        let search = &report.items[1];
        assert_eq!(search.status, ItemStatus::Failed);
        assert!(search.pr_url.is_none());
    }

    #[test]
    fn completed_items_are_skipped_on_resume() {
        let (ctx, fx) = fixture(&["acme/billing"], None, false);

        let first = execute(&ctx, &fx.plan).unwrap();
        assert_eq!(first.status, RunStatus::Completed);
        let calls_after_first = fx.runner.calls.load(Ordering::SeqCst);
        assert!(calls_after_first > 0);

        let second = execute(&ctx, &fx.plan).unwrap();
        assert_eq!(second.status, RunStatus::Completed);
        assert_eq!(second.resumed, 1);
        assert!(second.items[0].resumed);

        // Neither the executor nor the broker ran again.
        assert_eq!(fx.runner.calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(fx.transport.creates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn review_request_failure_marks_the_item_failed_for_retry() {
        let (ctx, fx) = fixture(&["acme/billing"], None, true);

        let report = execute(&ctx, &fx.plan).unwrap();
        assert_eq!(report.status, RunStatus::CompletedWithFailures);
        assert_eq!(report.items[0].status, ItemStatus::Failed);

        let saved = ctx
            .state
            .load_item("corelib", "1.4.2", "acme/billing")
            .unwrap()
            .unwrap();
        assert_eq!(saved.status, ItemStatus::Failed);
        assert!(saved.reason.unwrap().contains("review request failed"));
    }

    #[test]
    fn cancellation_interrupts_before_dispatch() {
        let (ctx, fx) = fixture(&["acme/billing"], None, false);
        ctx.cancel.cancel();

        let report = execute(&ctx, &fx.plan).unwrap();
        assert_eq!(report.status, RunStatus::Interrupted);
        assert!(report.items.is_empty());
        assert_eq!(fx.runner.calls.load(Ordering::SeqCst), 0);

        let summary = ctx.state.load_summary("corelib", "1.4.2").unwrap();
        assert_eq!(summary.status, RunStatus::Interrupted);
        // Planned items were recorded for the resume to pick up.
        assert_eq!(summary.repos, vec!["acme/billing"]);
    }

    #[test]
    fn summary_item_list_survives_narrower_resumes() {
        let (ctx, fx) = fixture(&["acme/billing", "acme/search"], None, false);
        execute(&ctx, &fx.plan).unwrap();

        let mut narrower = fx.plan.clone();
        narrower.items.truncate(1);
        execute(&ctx, &narrower).unwrap();

        let summary = ctx.state.load_summary("corelib", "1.4.2").unwrap();
        assert_eq!(summary.repos, vec!["acme/billing", "acme/search"]);
    }
}
