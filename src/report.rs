use crate::pipeline::RunReport;
use crate::planner::{Plan, PlanStats};
use crate::state::ItemStatus;
use colored::Colorize;

pub const SLOW_CHECK_THRESHOLD_SECS: f64 = 30.0;
pub const LOW_PARALLELISM_THRESHOLD: usize = 4;
pub const SUGGESTED_CHECK_PARALLELISM: usize = 8;
pub const CACHE_RATE_MIN_SAMPLES: u64 = 5;
pub const CACHE_RATE_WARN_BELOW_PERCENT: u64 = 50;

/// Performance advisories derived from one planning pass. Warnings, not
/// errors: the run proceeds regardless.
pub fn advisories(stats: &PlanStats) -> Vec<String> {
    let mut out = Vec::new();

    let secs = stats.check_duration.as_secs_f64();
    if secs > SLOW_CHECK_THRESHOLD_SECS {
        out.push(format!("Dependency checks took {secs:.1}s (>30s)"));
        if !stats.parallel_checks || stats.parallelism < LOW_PARALLELISM_THRESHOLD {
            out.push(format!(
                "Consider increasing parallelism with --check-parallel={SUGGESTED_CHECK_PARALLELISM}"
            ));
        }
    }

    if stats.strategy.remote_capable() {
        let samples = stats.cache_hits + stats.cache_misses;
        if samples > CACHE_RATE_MIN_SAMPLES {
            let rate = stats.cache_hits * 100 / samples;
            if rate < CACHE_RATE_WARN_BELOW_PERCENT {
                out.push(format!(
                    "Low cache hit rate ({rate}%), repeated runs may be slower than expected"
                ));
            }
        }
    }

    out
}

/// Print plan statistics the way operators read them.
pub fn print_plan_stats(stats: &PlanStats) {
    println!("\n{}", "Plan summary:".cyan().bold());
    println!("  {} dependents checked", stats.total_dependents.to_string().yellow());
    println!(
        "  {} skipped (up to date)",
        stats.skipped_up_to_date.to_string().yellow()
    );
    println!("  {} work items created", stats.work_items.to_string().yellow());
    if stats.check_errors > 0 {
        println!(
            "  {} check errors (included as work items)",
            stats.check_errors.to_string().red()
        );
    }
    println!(
        "  checks took {:.1}s ({}, parallelism {})",
        stats.check_duration.as_secs_f64(),
        stats.strategy.as_str(),
        stats.parallelism
    );
    if stats.strategy.remote_capable() {
        println!(
            "  cache: {} hits / {} misses",
            stats.cache_hits.to_string().green(),
            stats.cache_misses.to_string().yellow()
        );
    }

    for warning in advisories(stats) {
        println!("{} {}", "⚠".yellow().bold(), warning.yellow());
    }
}

/// Print the planned work items.
pub fn print_plan(plan: &Plan) {
    if plan.items.is_empty() {
        println!("\n{}", "✨ Every dependent is already up to date!".green().bold());
        return;
    }

    println!("\n{}", "📦 Planned updates:".cyan().bold());
    for item in &plan.items {
        println!(
            "  • {} {} {} ({})",
            item.repo.white().bold(),
            "→".dimmed(),
            plan.target.version.green().bold(),
            item.branch.dimmed()
        );
    }
}

/// Print per-item execution results.
pub fn print_run_report(report: &RunReport) {
    println!("\n{}", "Rollout results:".cyan().bold());

    for item in &report.items {
        let status = match item.status {
            ItemStatus::Completed => item.status.as_str().green().bold(),
            ItemStatus::Failed => item.status.as_str().red().bold(),
            _ => item.status.as_str().yellow(),
        };

        let mut line = format!("  • {} {}", item.repo.white().bold(), status);
        if item.resumed {
            line.push_str(&format!(" {}", "(resumed, skipped)".dimmed()));
        }
        if let Some(reason) = &item.reason {
            line.push_str(&format!(" {}", format!("- {reason}").dimmed()));
        }
        println!("{line}");

        if let Some(pr_url) = &item.pr_url {
            println!("      {}", pr_url.bright_cyan());
        }
    }

    if report.resumed > 0 {
        println!(
            "\n{}",
            format!(
                "{} item(s) already completed by a previous run were not re-executed",
                report.resumed
            )
            .dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::CheckStrategy;
    use std::time::Duration;

    fn stats(
        duration_secs: u64,
        parallel: bool,
        parallelism: usize,
        strategy: CheckStrategy,
        hits: u64,
        misses: u64,
    ) -> PlanStats {
        PlanStats {
            total_dependents: (hits + misses) as usize,
            skipped_up_to_date: 0,
            work_items: 0,
            check_errors: 0,
            check_duration: Duration::from_secs(duration_secs),
            strategy,
            parallel_checks: parallel,
            parallelism,
            cache_hits: hits,
            cache_misses: misses,
        }
    }

    #[test]
    fn slow_sequential_checks_warn_and_suggest_parallelism() {
        let warnings = advisories(&stats(35, false, 1, CheckStrategy::Local, 0, 0));
        assert!(warnings.contains(&"Dependency checks took 35.0s (>30s)".to_string()));
        assert!(
            warnings.contains(&"Consider increasing parallelism with --check-parallel=8".to_string())
        );
    }

    #[test]
    fn slow_parallel_checks_only_warn_about_duration() {
        let warnings = advisories(&stats(35, true, 8, CheckStrategy::Local, 0, 0));
        assert_eq!(warnings, vec!["Dependency checks took 35.0s (>30s)".to_string()]);
    }

    #[test]
    fn fast_checks_emit_no_warnings() {
        let warnings = advisories(&stats(10, false, 1, CheckStrategy::Local, 0, 0));
        assert!(warnings.is_empty());
    }

    #[test]
    fn low_cache_hit_rate_warns_under_remote_strategy() {
        let warnings = advisories(&stats(1, true, 8, CheckStrategy::Remote, 2, 8));
        assert_eq!(
            warnings,
            vec!["Low cache hit rate (20%), repeated runs may be slower than expected".to_string()]
        );
    }

    #[test]
    fn healthy_cache_hit_rate_does_not_warn() {
        let warnings = advisories(&stats(1, true, 8, CheckStrategy::Remote, 8, 2));
        assert!(warnings.is_empty());
    }

    #[test]
    fn small_samples_never_warn_about_cache_rate() {
        let warnings = advisories(&stats(1, true, 8, CheckStrategy::Remote, 1, 2));
        assert!(warnings.is_empty());
    }

    #[test]
    fn local_strategy_never_warns_about_cache_rate() {
        let warnings = advisories(&stats(1, true, 8, CheckStrategy::Local, 0, 10));
        assert!(warnings.is_empty());
    }
}
