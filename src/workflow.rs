use crate::cli::CheckArgs;
use crate::context::RunContext;
use crate::error::{Result, RippleError};
use crate::manifest::{Manifest, Settings, Target};
use crate::pipeline;
use crate::report;
use crate::state::{ItemStatus, RunStatus};
use crate::version::Version;
use colored::Colorize;
use std::collections::HashSet;

/// Plan which dependents need the bump, without applying anything.
pub fn execute_plan(
    manifest_path: &str,
    module: &str,
    version: &str,
    check: &CheckArgs,
) -> Result<()> {
    println!("{}", "Planning dependency rollout...".cyan().bold());

    let (manifest, target, settings) = load_inputs(manifest_path, module, version, check)?;
    let dependents = manifest.select_dependents(check.filter.as_deref())?;

    println!("\n{}", "2. Checking dependents...".yellow());
    let ctx = RunContext::for_run(settings, true)?;
    let plan = ctx.planner.plan(&dependents, &target, &ctx.cancel)?;
    println!("{}", "✓ Check completed".green());

    report::print_plan(&plan);
    report::print_plan_stats(&plan.stats);

    if !plan.items.is_empty() {
        println!("\n{}", "To apply this plan, run:".dimmed());
        println!("  {}", format!("ripple run {module} {version}").cyan());
    }

    Ok(())
}

/// Apply the bump across stale dependents, open review requests, notify.
pub fn execute_run(
    manifest_path: &str,
    module: &str,
    version: &str,
    check: &CheckArgs,
    dry_run: bool,
) -> Result<()> {
    println!("{}", "Starting dependency rollout...".cyan().bold());

    let (manifest, target, settings) = load_inputs(manifest_path, module, version, check)?;
    let dependents = manifest.select_dependents(check.filter.as_deref())?;

    let ctx = RunContext::for_run(settings, dry_run)?;
    if !ctx.broker.has_review_transport() && !dry_run {
        println!(
            "{}",
            "⚠ No review API configured; review requests will be skipped".yellow()
        );
    }

    println!("\n{}", "2. Checking dependents...".yellow());
    let plan = ctx.planner.plan(&dependents, &target, &ctx.cancel)?;
    println!("{}", "✓ Check completed".green());

    report::print_plan_stats(&plan.stats);

    if plan.items.is_empty() {
        println!("\n{}", "✨ Every dependent is already up to date!".green().bold());
        return Ok(());
    }

    println!(
        "\n{}",
        format!("3. Executing {} work item(s)...", plan.items.len()).yellow()
    );
    let run_report = pipeline::execute(&ctx, &plan)?;

    report::print_run_report(&run_report);
    print_final_status(run_report.status, module, version);
    Ok(())
}

/// Re-enter an interrupted rollout at the first non-terminal item.
///
/// The resumed plan covers exactly the repos recorded in the summary and
/// bypasses freshness checks: an item whose working copy already carries
/// the bump (because a previous attempt crashed mid-way) must still flow
/// through the pipeline to get its review request.
pub fn execute_resume(
    manifest_path: &str,
    module: &str,
    version: &str,
    dry_run: bool,
) -> Result<()> {
    println!("{}", "Resuming dependency rollout...".cyan().bold());

    println!("\n{}", "1. Loading rollout manifest and saved state...".yellow());
    let manifest = Manifest::load(manifest_path)?;
    let target = Target::new(module, version)?;

    let mut settings = manifest.settings.clone();
    settings.force_all = true;

    let ctx = RunContext::for_run(settings, dry_run)?;
    let summary = match ctx.state.load_summary(&target.module, &target.version) {
        Ok(summary) => summary,
        Err(e @ RippleError::StateNotFound { .. }) => {
            println!(
                "{}",
                format!("No prior rollout found; start one with: ripple run {module} {version}")
                    .yellow()
            );
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let recorded: HashSet<&String> = summary.repos.iter().collect();
    let dependents: Vec<_> = manifest
        .dependents
        .iter()
        .filter(|d| recorded.contains(&d.repo))
        .cloned()
        .collect();

    println!(
        "{}",
        format!(
            "✓ Found saved state with {} item(s), last status: {}",
            summary.repos.len(),
            summary.status.as_str()
        )
        .green()
    );

    let plan = ctx.planner.plan(&dependents, &target, &ctx.cancel)?;

    println!(
        "\n{}",
        format!("2. Re-entering pipeline for {} item(s)...", plan.items.len()).yellow()
    );
    let run_report = pipeline::execute(&ctx, &plan)?;

    report::print_run_report(&run_report);
    print_final_status(run_report.status, module, version);
    Ok(())
}

/// Show the persisted state of one rollout.
pub fn execute_status(manifest_path: &str, module: &str, version: &str) -> Result<()> {
    println!("{}", "Rollout status...".cyan().bold());

    let manifest = Manifest::load(manifest_path)?;
    let target = Target::new(module, version)?;
    let state = crate::state::StateManager::new(manifest.settings.state_dir.clone());

    let summary = match state.load_summary(&target.module, &target.version) {
        Ok(summary) => summary,
        Err(e @ RippleError::StateNotFound { .. }) => {
            println!(
                "{}",
                format!("No rollout recorded for {module}@{version}").yellow()
            );
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    println!(
        "\n{} {} {}",
        summary.module.white().bold(),
        "→".dimmed(),
        summary.version.green().bold()
    );
    println!("  status: {}", summary.status.as_str());
    println!("  started: {}", summary.created_at.strftime("%Y-%m-%d %H:%M %Z"));
    println!("  updated: {}", summary.updated_at.strftime("%Y-%m-%d %H:%M %Z"));

    let items = state.load_items(&summary)?;
    println!("\n{}", "Items:".cyan().bold());
    for item in items {
        let status = match item.status {
            ItemStatus::Completed => item.status.as_str().green(),
            ItemStatus::Failed => item.status.as_str().red(),
            _ => item.status.as_str().yellow(),
        };
        let mut line = format!("  • {} {}", item.repo.white().bold(), status);
        line.push_str(&format!(
            " {}",
            format!("[{}]", item.updated_at.strftime("%Y-%m-%d %H:%M")).dimmed()
        ));
        if let Some(reason) = &item.reason {
            line.push_str(&format!(" {}", format!("- {reason}").dimmed()));
        }
        println!("{line}");
        if let Some(pr_url) = &item.pr_url {
            println!("      {}", pr_url.bright_cyan());
        }
    }

    Ok(())
}

fn load_inputs(
    manifest_path: &str,
    module: &str,
    version: &str,
    check: &CheckArgs,
) -> Result<(Manifest, Target, Settings)> {
    println!("\n{}", "1. Loading rollout manifest...".yellow());
    let manifest = Manifest::load(manifest_path)?;
    println!(
        "{}",
        format!("✓ {} dependent(s) declared", manifest.dependents.len()).green()
    );

    let target = Target::new(module, version)?;
    if !Version::parse(&target.version).is_stable() {
        println!(
            "{}",
            format!("⚠ Target version {} is a pre-release", target.version).yellow()
        );
    }

    let settings = apply_overrides(manifest.settings.clone(), check)?;
    Ok((manifest, target, settings))
}

fn apply_overrides(mut settings: Settings, check: &CheckArgs) -> Result<Settings> {
    if let Some(strategy) = &check.strategy {
        settings.check_strategy = strategy.parse()?;
    }
    if let Some(parallel) = check.check_parallel {
        settings.check_parallelism = parallel;
    }
    if let Some(ttl) = check.cache_ttl_secs {
        settings.cache_ttl_secs = ttl;
    }
    if let Some(timeout) = check.check_timeout_secs {
        settings.check_timeout_secs = timeout;
    }
    if check.force_all {
        settings.force_all = true;
    }
    if check.no_skip_up_to_date {
        settings.skip_up_to_date = false;
    }
    Ok(settings)
}

fn print_final_status(status: RunStatus, module: &str, version: &str) {
    match status {
        RunStatus::Completed => {
            println!("\n{}", "✨ Rollout completed successfully!".green().bold());
        }
        RunStatus::CompletedWithFailures => {
            println!(
                "\n{}",
                "Rollout finished with failures; fix the causes and resume with:".red()
            );
            println!("  {}", format!("ripple resume {module} {version}").cyan());
        }
        RunStatus::Interrupted => {
            println!("\n{}", "Rollout interrupted; continue with:".yellow());
            println!("  {}", format!("ripple resume {module} {version}").cyan());
        }
        RunStatus::InProgress => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::CheckStrategy;

    #[test]
    fn cli_flags_override_manifest_settings() {
        let check = CheckArgs {
            strategy: Some("local".to_string()),
            check_parallel: Some(6),
            cache_ttl_secs: Some(30),
            check_timeout_secs: Some(10),
            force_all: true,
            no_skip_up_to_date: true,
            filter: None,
        };

        let settings = apply_overrides(Settings::default(), &check).unwrap();
        assert_eq!(settings.check_strategy, CheckStrategy::Local);
        assert_eq!(settings.check_parallelism, 6);
        assert_eq!(settings.cache_ttl_secs, 30);
        assert_eq!(settings.check_timeout_secs, 10);
        assert!(settings.force_all);
        assert!(!settings.skip_up_to_date);
    }

    #[test]
    fn invalid_strategy_override_is_a_validation_error() {
        let check = CheckArgs {
            strategy: Some("hybrid".to_string()),
            ..CheckArgs::default()
        };
        let err = apply_overrides(Settings::default(), &check).unwrap_err();
        assert!(matches!(err, RippleError::Validation(_)));
    }

    #[test]
    fn unmodified_settings_pass_through() {
        let settings = apply_overrides(Settings::default(), &CheckArgs::default()).unwrap();
        assert_eq!(settings.check_strategy, CheckStrategy::Auto);
        assert!(settings.skip_up_to_date);
        assert!(!settings.force_all);
    }
}
