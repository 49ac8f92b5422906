use crate::error::{Result, RippleError};
use crate::utils::template;
use jiff::Zoned;
use std::path::Path;
use std::process::{Command, Output};

const MAX_BRANCH_LEN: usize = 80;

/// Version-control operations the pipeline needs from a working copy.
pub trait VersionControl: Send + Sync {
    /// Relative paths with uncommitted changes in the working copy.
    fn dirty_paths(&self, workdir: &Path) -> Result<Vec<String>>;

    /// Create or re-enter the rollout branch for this item.
    fn prepare_branch(&self, workdir: &Path, branch: &str) -> Result<()>;

    /// Stage the declaration file, commit (skipping an empty commit on
    /// resume), and push the branch to the default remote.
    fn commit_and_push(
        &self,
        workdir: &Path,
        file: &Path,
        message: &str,
        branch: &str,
    ) -> Result<()>;
}

/// Git implementation with hardened input validation.
pub struct GitAgent;

impl VersionControl for GitAgent {
    fn dirty_paths(&self, workdir: &Path) -> Result<Vec<String>> {
        let output = Self::run_git(workdir, &["status", "--porcelain"])?;
        Self::ensure_success(&output, "git status")?;

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| line.len() > 3)
            .map(|line| line[3..].trim().to_string())
            .collect())
    }

    fn prepare_branch(&self, workdir: &Path, branch: &str) -> Result<()> {
        Self::validate_ref_name(branch)?;
        // -B so a resumed rollout re-enters its existing branch.
        let output = Self::run_git(workdir, &["checkout", "-B", branch])?;
        Self::ensure_success(&output, "git checkout -B")?;
        Ok(())
    }

    fn commit_and_push(
        &self,
        workdir: &Path,
        file: &Path,
        message: &str,
        branch: &str,
    ) -> Result<()> {
        Self::validate_ref_name(branch)?;

        let file_str = file.to_string_lossy();
        let output = Self::run_git(workdir, &["add", file_str.as_ref()])?;
        Self::ensure_success(&output, "git add")?;

        let status = Self::run_git(workdir, &["status", "--porcelain"])?;
        Self::ensure_success(&status, "git status")?;
        if status.stdout.is_empty() {
            // Nothing new to commit; a previous attempt already did.
            if std::env::var("RIPPLE_VERBOSE").is_ok() {
                eprintln!("[VERBOSE] Nothing to commit on '{branch}', pushing as-is");
            }
        } else {
            let output = Self::run_git(workdir, &["commit", "-m", message])?;
            Self::ensure_success(&output, "git commit")?;
        }

        let output = Self::run_git(workdir, &["push", "-u", "origin", branch])?;
        Self::ensure_success(&output, "git push")?;
        Ok(())
    }
}

impl GitAgent {
    fn run_git(workdir: &Path, args: &[&str]) -> Result<Output> {
        Self::validate_workdir(workdir)?;

        Command::new("git")
            .current_dir(workdir)
            .args(args)
            .output()
            .map_err(|e| {
                RippleError::GitOperation(format!(
                    "failed to execute git command '{}': {e}",
                    args.join(" ")
                ))
            })
    }

    fn ensure_success(output: &Output, command: &str) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }

        Err(RippleError::GitOperation(format!(
            "{} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr)
        )))
    }

    fn validate_workdir(path: &Path) -> Result<()> {
        let dangerous = [';', '|', '&', '$', '`', '\n', '\r'];
        let path_str = path.to_string_lossy();
        if let Some(ch) = dangerous.iter().find(|c| path_str.contains(**c)) {
            return Err(RippleError::GitOperation(format!(
                "Path contains dangerous character: '{}'",
                ch
            )));
        }

        if !path.is_absolute() {
            return Err(RippleError::GitOperation(
                "Only absolute paths are allowed for git operations".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_ref_name(branch: &str) -> Result<()> {
        let ok = !branch.is_empty()
            && branch
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
        if ok {
            Ok(())
        } else {
            Err(RippleError::GitOperation(format!(
                "Unsafe branch name: '{branch}'"
            )))
        }
    }
}

/// Render a rollout branch name from a template. Placeholder values are
/// reduced to git-safe characters and the whole name is length-bounded.
pub fn render_branch_name(template_str: &str, module: &str, version: &str) -> String {
    let date = Zoned::now().strftime("%Y-%m-%d").to_string();
    let mut branch = template::expand(
        template_str,
        &[
            ("module", &template::ref_safe(module)),
            ("version", &template::ref_safe(version)),
            ("date", &date),
        ],
    );

    branch = branch
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '/' => c,
            _ => '-',
        })
        .collect();

    if branch.len() > MAX_BRANCH_LEN {
        branch.truncate(MAX_BRANCH_LEN);
    }

    branch
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn renders_branch_from_template() {
        let branch = render_branch_name("deps/bump-{module}-{version}", "corelib", "1.4.2");
        assert_eq!(branch, "deps/bump-corelib-1.4.2");
    }

    #[test]
    fn sanitizes_module_paths_in_branch() {
        let branch = render_branch_name(
            "deps/bump-{module}-{version}",
            "github.com/acme/corelib",
            "1.4.2",
        );
        assert_eq!(branch, "deps/bump-github.com-acme-corelib-1.4.2");
        assert!(GitAgent::validate_ref_name(&branch).is_ok());
    }

    #[test]
    fn truncates_oversized_branch_names() {
        let module = "m".repeat(200);
        let branch = render_branch_name("deps/bump-{module}-{version}", &module, "1.4.2");
        assert!(branch.len() <= MAX_BRANCH_LEN);
    }

    #[test]
    fn rejects_relative_workdir() {
        let err = GitAgent::validate_workdir(&PathBuf::from("some/relative")).unwrap_err();
        assert!(matches!(err, RippleError::GitOperation(_)));
    }

    #[test]
    fn rejects_dangerous_workdir() {
        let err = GitAgent::validate_workdir(&PathBuf::from("/tmp/evil;rm")).unwrap_err();
        assert!(matches!(err, RippleError::GitOperation(_)));
    }

    #[test]
    fn rejects_unsafe_ref_names() {
        assert!(GitAgent::validate_ref_name("deps/bump-corelib-1.4.2").is_ok());
        assert!(GitAgent::validate_ref_name("bad name").is_err());
        assert!(GitAgent::validate_ref_name("").is_err());
    }
}
