use crate::agents::{GitAgent, ProcessRunner};
use crate::broker::Broker;
use crate::checker::Checker;
use crate::error::Result;
use crate::executor::Executor;
use crate::manifest::Settings;
use crate::planner::Planner;
use crate::state::StateManager;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation signal shared by every component of a run.
/// Cancelling stops new checks and items from being dispatched; in-flight
/// operations finish within their own timeouts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one run needs, constructed once up front and passed
/// explicitly. Tests substitute collaborators by building the context
/// from parts instead of mutating shared globals.
pub struct RunContext {
    pub settings: Settings,
    pub planner: Planner,
    pub executor: Executor,
    pub broker: Broker,
    pub state: StateManager,
    pub cancel: CancelToken,
}

impl RunContext {
    /// Wire up the real collaborators for a CLI invocation.
    pub fn for_run(settings: Settings, dry_run: bool) -> Result<Self> {
        let checker = Arc::new(Checker::from_settings(&settings)?);
        let planner = Planner::new(checker, settings.clone());
        let executor = Executor::new(Arc::new(ProcessRunner), Arc::new(GitAgent), dry_run);
        let broker = Broker::from_settings(&settings)?;
        let state = StateManager::new(settings.state_dir.clone());

        Ok(Self {
            settings,
            planner,
            executor,
            broker,
            state,
            cancel: CancelToken::default(),
        })
    }
}
