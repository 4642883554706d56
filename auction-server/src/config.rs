use clap::{
    crate_authors,
    crate_description,
    crate_name,
    crate_version,
    Args,
    Parser,
};

mod server;

#[derive(Parser, Debug)]
#[command(name = crate_name!())]
#[command(author = crate_authors!())]
#[command(about = crate_description!())]
#[command(version = crate_version!())]
pub enum Options {
    /// Run the auction server service.
    Run(RunOptions),
}

#[derive(Args, Clone, Debug)]
pub struct RunOptions {
    /// Server Options
    #[command(flatten)]
    pub server: server::Options,

    #[command(flatten)]
    pub auction: AuctionOptions,
}

const DEFAULT_LEADER_TTL_SECS: &str = "30";
const DEFAULT_SCHEDULER_POLL_INTERVAL_SECS: &str = "1";
const DEFAULT_EXTENSION_WINDOW_SECS: &str = "30";
const DEFAULT_KV_HEALTH_TIMEOUT_SECS: &str = "5";
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: &str = "30";

#[derive(Args, Clone, Debug)]
#[command(next_help_heading = "Auction Options")]
#[group(id = "Auction")]
pub struct AuctionOptions {
    /// Stable identity of this instance in leader election. A random one is
    /// generated when omitted.
    #[arg(long = "instance-id")]
    #[arg(env = "INSTANCE_ID")]
    pub instance_id: Option<String>,

    /// TTL of the leader key in seconds; heartbeats run at a third of it.
    #[arg(long = "leader-ttl-secs")]
    #[arg(default_value = DEFAULT_LEADER_TTL_SECS)]
    #[arg(env = "LEADER_TTL_SECS")]
    pub leader_ttl_secs: u64,

    /// How often the scheduler looks for due lifecycle jobs, in seconds.
    #[arg(long = "scheduler-poll-interval-secs")]
    #[arg(default_value = DEFAULT_SCHEDULER_POLL_INTERVAL_SECS)]
    #[arg(env = "SCHEDULER_POLL_INTERVAL_SECS")]
    pub scheduler_poll_interval_secs: u64,

    /// Soft-close window: a bid accepted this close to the end pushes the
    /// end out by the same duration, in seconds.
    #[arg(long = "extension-window-secs")]
    #[arg(default_value = DEFAULT_EXTENSION_WINDOW_SECS)]
    #[arg(env = "EXTENSION_WINDOW_SECS")]
    pub extension_window_secs: u64,

    /// Deadline for the startup probe of the coordination store, in seconds.
    #[arg(long = "kv-health-timeout-secs")]
    #[arg(default_value = DEFAULT_KV_HEALTH_TIMEOUT_SECS)]
    #[arg(env = "KV_HEALTH_TIMEOUT_SECS")]
    pub kv_health_timeout_secs: u64,

    /// Budget for a graceful shutdown before the process gives up, in
    /// seconds.
    #[arg(long = "shutdown-timeout-secs")]
    #[arg(default_value = DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    #[arg(env = "SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,
}
