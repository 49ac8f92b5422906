use crate::agents::command_runner::output_excerpt;
use crate::agents::manifest_editor::EditOutcome;
use crate::agents::{CommandRunner, ManifestEditor, VersionControl};
use crate::error::Result;
use crate::manifest::Target;
use crate::planner::WorkItem;
use crate::state::ItemStatus;
use crate::utils::path_validator::PathValidator;
use std::sync::Arc;

/// Terminal result of applying one work item.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub status: ItemStatus,
    pub reason: String,
}

impl ApplyOutcome {
    fn completed(reason: String) -> Self {
        Self {
            status: ItemStatus::Completed,
            reason,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            status: ItemStatus::Failed,
            reason,
        }
    }

    fn skipped(reason: String) -> Self {
        Self {
            status: ItemStatus::Skipped,
            reason,
        }
    }
}

/// Applies one work item: rewrite the dependency declaration, run the
/// configured verification commands, then commit and push.
///
/// State machine per item: `Pending -> Applying -> {Completed | Failed |
/// Skipped}`. Every failure is folded into a Failed outcome so one item
/// never aborts the rest of the plan.
pub struct Executor {
    runner: Arc<dyn CommandRunner>,
    vcs: Arc<dyn VersionControl>,
    dry_run: bool,
}

impl Executor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        vcs: Arc<dyn VersionControl>,
        dry_run: bool,
    ) -> Self {
        Self {
            runner,
            vcs,
            dry_run,
        }
    }

    pub fn apply(&self, target: &Target, item: &WorkItem) -> ApplyOutcome {
        match self.try_apply(target, item) {
            Ok(outcome) => outcome,
            Err(e) => ApplyOutcome::failed(e.to_string()),
        }
    }

    fn try_apply(&self, target: &Target, item: &WorkItem) -> Result<ApplyOutcome> {
        if self.dry_run {
            return Ok(ApplyOutcome::skipped(format!(
                "dry-run: would bump {} to {} in {}",
                item.module, target.version, item.repo
            )));
        }

        let workdir = PathValidator::validate_workdir(&item.path)?;

        // A dirty declaration file is a resumable leftover of a previous
        // attempt; anything else dirty is someone's work in progress.
        let manifest_rel = item.manifest.to_string_lossy();
        let unrelated: Vec<String> = self
            .vcs
            .dirty_paths(&workdir)?
            .into_iter()
            .filter(|path| path.as_str() != manifest_rel)
            .collect();
        if !unrelated.is_empty() {
            return Ok(ApplyOutcome::failed(format!(
                "working copy has uncommitted changes: {}",
                unrelated.join(", ")
            )));
        }

        self.vcs.prepare_branch(&workdir, &item.branch)?;

        let declaration = workdir.join(&item.manifest);
        PathValidator::validate_file_path(&declaration, &workdir)?;
        let edit = ManifestEditor::apply_version(&declaration, &item.module, &target.version)?;

        for argv in item.tests.iter().chain(item.extra_commands.iter()) {
            let output = self.runner.run(argv, &workdir)?;
            if !output.success {
                let exit = output
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                return Ok(ApplyOutcome::failed(format!(
                    "command `{}` failed (exit {exit}): {}",
                    argv.join(" "),
                    output_excerpt(&output.output)
                )));
            }
        }

        let message = format!("chore(deps): bump {} to {}", item.module, target.version);
        self.vcs
            .commit_and_push(&workdir, &item.manifest, &message, &item.branch)?;

        let reason = match edit {
            EditOutcome::Updated {
                previous: Some(previous),
            } => format!("updated {} {} -> {}", item.module, previous, target.version),
            EditOutcome::Updated { previous: None } => {
                format!("added {} {}", item.module, target.version)
            }
            EditOutcome::AlreadyCurrent => format!(
                "already at {}; verified and published",
                target.version
            ),
        };

        Ok(ApplyOutcome::completed(reason))
    }
}
