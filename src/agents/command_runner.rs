use crate::error::{Result, RippleError};
use std::path::Path;
use std::process::Command;

const EXCERPT_MAX_CHARS: usize = 400;

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output: String,
}

/// Runs an ordered argument list in a working directory.
pub trait CommandRunner: Send + Sync {
    fn run(&self, argv: &[String], workdir: &Path) -> Result<CommandOutput>;
}

/// Spawns real processes and captures their combined output.
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, argv: &[String], workdir: &Path) -> Result<CommandOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            RippleError::CommandExecution("empty command in manifest".to_string())
        })?;

        if std::env::var("RIPPLE_VERBOSE").is_ok() {
            eprintln!(
                "[VERBOSE] Executing: {} (in {})",
                argv.join(" "),
                workdir.display()
            );
        }

        let output = Command::new(program)
            .args(args)
            .current_dir(workdir)
            .output()
            .map_err(|e| {
                RippleError::CommandExecution(format!(
                    "failed to spawn '{}': {e}",
                    argv.join(" ")
                ))
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

/// Tail of a command's output, bounded for reasons and review comments.
/// Failures almost always report at the end of the stream.
pub fn output_excerpt(output: &str) -> String {
    let trimmed = output.trim_end();
    if trimmed.len() <= EXCERPT_MAX_CHARS {
        return trimmed.to_string();
    }

    let start = trimmed.len() - EXCERPT_MAX_CHARS;
    // Avoid splitting a UTF-8 code point.
    let start = (start..trimmed.len())
        .find(|i| trimmed.is_char_boundary(*i))
        .unwrap_or(start);
    format!("...{}", &trimmed[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[cfg(unix)]
    #[test]
    fn captures_successful_command() {
        let dir = tempdir().unwrap();
        let output = ProcessRunner
            .run(&["echo".to_string(), "hello".to_string()], dir.path())
            .unwrap();
        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert!(output.output.contains("hello"));
    }

    #[cfg(unix)]
    #[test]
    fn reports_failing_command() {
        let dir = tempdir().unwrap();
        let output = ProcessRunner
            .run(&["false".to_string()], dir.path())
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(1));
    }

    #[test]
    fn missing_program_is_an_error() {
        let dir = tempdir().unwrap();
        let err = ProcessRunner
            .run(&["ripple-definitely-not-a-command".to_string()], dir.path())
            .unwrap_err();
        assert!(matches!(err, RippleError::CommandExecution(_)));
    }

    #[test]
    fn empty_argv_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(ProcessRunner.run(&[], dir.path()).is_err());
    }

    #[test]
    fn excerpt_keeps_short_output() {
        assert_eq!(output_excerpt("short failure\n"), "short failure");
    }

    #[test]
    fn excerpt_truncates_from_the_front() {
        let long = "x".repeat(1000);
        let excerpt = output_excerpt(&long);
        assert!(excerpt.starts_with("..."));
        assert_eq!(excerpt.len(), 3 + EXCERPT_MAX_CHARS);
    }
}
