use clap::Parser;

/// Load-aware priority task scheduler.
///
/// Starts an interactive console where tasks are submitted and runs are
/// triggered. With `--run`, schedules the preloaded `--task` list once and
/// exits.
#[derive(Parser, Debug, Default)]
#[command(name = "powersched", about = "Load-aware priority task scheduler")]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/powersched/config.toml)
    #[arg(long, env = "POWERSCHED_CONFIG")]
    pub config: Option<String>,

    /// Report a fixed CPU utilization instead of sampling the host
    #[arg(long, value_name = "PCT")]
    pub load: Option<f32>,

    /// Length of one time unit in milliseconds (overrides config and env)
    #[arg(long, value_name = "MS")]
    pub time_unit_ms: Option<u64>,

    /// Emit events as JSON lines instead of colored text
    #[arg(long)]
    pub json: bool,

    /// Preload a task, given as PRIORITY:TIME (repeatable)
    #[arg(long = "task", value_name = "PRIORITY:TIME")]
    pub tasks: Vec<String>,

    /// Run the preloaded tasks once and exit
    #[arg(long)]
    pub run: bool,

    /// Disable the periodic CPU status monitor
    #[arg(long)]
    pub no_status: bool,
}
