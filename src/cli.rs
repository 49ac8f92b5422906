use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ripple",
    about = "Propagate a dependency version bump to every downstream repository",
    version,
    author
)]
pub struct Cli {
    /// Path to the rollout manifest (defaults to ripple.toml)
    #[arg(short, long, default_value = "ripple.toml")]
    pub manifest: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Check-phase flags shared by `plan` and `run`; each overrides the
/// corresponding manifest setting.
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Freshness check strategy: local, remote, or auto
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<String>,

    /// Parallel check workers (0 = auto-detect)
    #[arg(long = "check-parallel", value_name = "N")]
    pub check_parallel: Option<usize>,

    /// Cache TTL for remote check results, in seconds
    #[arg(long = "cache-ttl-secs", value_name = "SECS")]
    pub cache_ttl_secs: Option<u64>,

    /// Per-check timeout, in seconds
    #[arg(long = "check-timeout-secs", value_name = "SECS")]
    pub check_timeout_secs: Option<u64>,

    /// Update every dependent regardless of freshness checks
    #[arg(long = "force-all")]
    pub force_all: bool,

    /// Include dependents that are already up to date
    #[arg(long = "no-skip-up-to-date")]
    pub no_skip_up_to_date: bool,

    /// Narrow dependents by repo id using glob syntax (e.g. "acme/*")
    #[arg(long, value_name = "GLOB")]
    pub filter: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decide which dependents need the bump without applying anything
    Plan {
        /// Module being propagated (e.g. github.com/acme/corelib)
        module: String,

        /// Target version to propagate
        version: String,

        #[command(flatten)]
        check: CheckArgs,
    },

    /// Apply the bump across stale dependents and open review requests
    Run {
        /// Module being propagated
        module: String,

        /// Target version to propagate
        version: String,

        #[command(flatten)]
        check: CheckArgs,

        /// Plan and report without mutating any repository
        #[arg(long)]
        dry_run: bool,
    },

    /// Continue an interrupted rollout from persisted state
    Resume {
        /// Module of the interrupted rollout
        module: String,

        /// Version of the interrupted rollout
        version: String,

        /// Re-enter the pipeline without mutating any repository
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the persisted state of a rollout
    Status {
        /// Module of the rollout
        module: String,

        /// Version of the rollout
        version: String,
    },
}
