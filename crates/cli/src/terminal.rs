use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use powersched_core::{SchedulerConfig, Task};
use powersched_scheduler::{EventKind, RunOutcome, SchedulerEvent, SchedulerMetrics};

use crate::commands::HELP;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const PROMPT: Color = Color::Green;
    const TASK: Color = Color::Cyan;
    const DONE: Color = Color::DarkGreen;
    const WARN: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Pick the display color for an event.
fn color_for(kind: &EventKind) -> Color {
    match kind {
        EventKind::RunStarted { .. } | EventKind::RunFinished { .. } => Colors::HEADER,
        EventKind::TaskStarted { .. } => Colors::TASK,
        EventKind::TaskCompleted { .. } | EventKind::SchedulerReady => Colors::DONE,
        EventKind::Throttled { .. } | EventKind::Warning { .. } => Colors::WARN,
        EventKind::Failed { .. } => Colors::ERROR,
        EventKind::TaskSubmitted { .. } | EventKind::Notice { .. } => Color::Reset,
        EventKind::LoadSampled { .. } | EventKind::RunIdle | EventKind::StatusSampled { .. } => {
            Colors::DIM
        }
    }
}

/// One queued task as shown by `list`.
fn task_line(task: &Task, config: &SchedulerConfig) -> String {
    format!(
        "Task {} | Prio: {} | Time: {}s",
        task.id(),
        task.priority(),
        config.units_secs(task.execution_time())
    )
}

/// Console messages in JSON mode, shaped like the event kinds.
fn json_message(level: &str, message: &str) -> String {
    serde_json::json!({ "type": level, "message": message }).to_string()
}

/// Manages terminal output for the console and batch modes.
pub struct Terminal {
    json: bool,
}

impl Terminal {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print the startup banner.
    pub fn print_banner(&self, config: &SchedulerConfig, core_count: usize) -> Result<()> {
        if self.json {
            return Ok(());
        }
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("powersched"),
            ResetColor,
            Print(" - Load-aware priority scheduler\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "Cores: {} | Throttle above {:.0}% | 1 unit = {}ms\n",
                core_count, config.throttle_threshold_percent, config.time_unit_ms
            )),
            Print("Type 'help' for commands, 'quit' to exit.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn prompt(&self) -> Result<()> {
        if self.json {
            return Ok(());
        }
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::PROMPT),
            Print("sched> "),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Render one scheduler event as a log line or a JSON object.
    pub fn render_event(&self, event: &SchedulerEvent) -> Result<()> {
        let mut stdout = io::stdout();
        if self.json {
            writeln!(stdout, "{}", serde_json::to_string(event)?)?;
        } else {
            execute!(
                stdout,
                SetForegroundColor(color_for(&event.kind)),
                Print(format!("{}\n", event)),
                ResetColor,
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print the queued tasks in submission order.
    pub fn print_tasks(&self, tasks: &[Task], config: &SchedulerConfig) -> Result<()> {
        let mut stdout = io::stdout();
        if self.json {
            writeln!(stdout, "{}", serde_json::to_string(tasks)?)?;
            return Ok(());
        }
        if tasks.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("No tasks queued.\n"),
                ResetColor,
            )?;
            return Ok(());
        }

        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!("Queued Tasks ({}):\n", tasks.len())),
            ResetColor,
        )?;
        for task in tasks {
            execute!(stdout, Print(format!("  {}\n", task_line(task, config))))?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print the latest CPU reading and session counters.
    pub fn print_status(&self, metrics: &SchedulerMetrics, busy: bool, queued: usize) -> Result<()> {
        let mut stdout = io::stdout();
        if self.json {
            writeln!(stdout, "{}", serde_json::to_string(metrics)?)?;
            return Ok(());
        }

        let cores = metrics
            .core_count
            .map_or_else(|| "?".to_string(), |c| c.to_string());
        let load = metrics
            .last_utilization
            .map_or_else(|| "unknown".to_string(), |u| format!("{:.1}%", u));
        let state = if busy { "scheduling" } else { "idle" };

        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!("CPU Cores: {} | CPU Load: {} | {}\n", cores, load, state)),
            ResetColor,
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "Queued: {} | Submitted: {} | Runs: {} ok / {} failed\n",
                queued, metrics.tasks_submitted, metrics.runs_completed, metrics.runs_failed
            )),
            Print(format!(
                "Executed: {} | Throttled: {} | Sample errors: {} | Avg task: {:.2}s\n",
                metrics.tasks_executed,
                metrics.tasks_throttled,
                metrics.sample_failures,
                metrics.avg_task_duration.as_secs_f64()
            )),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print the result of a batch run.
    pub fn print_outcome(&self, outcome: &RunOutcome) -> Result<()> {
        if self.json {
            return Ok(());
        }
        match outcome {
            RunOutcome::Success(summary) => self.print_info(&format!(
                "Run {} finished: {} executed, {} throttled in {:.2}s",
                summary.run_id,
                summary.tasks_executed,
                summary.tasks_throttled,
                summary.elapsed.as_secs_f64()
            )),
            RunOutcome::Empty => self.print_info("Nothing was scheduled."),
            RunOutcome::Failed(e) => self.print_error(&e.to_string()),
        }
    }

    pub fn print_help(&self) -> Result<()> {
        let mut stdout = io::stdout();
        if self.json {
            let commands: Vec<_> = HELP
                .iter()
                .map(|(usage, about)| serde_json::json!({ "usage": usage, "about": about }))
                .collect();
            let help = serde_json::json!({ "type": "help", "commands": commands });
            writeln!(stdout, "{}", help)?;
            stdout.flush()?;
            return Ok(());
        }
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("Commands:\n"),
            ResetColor,
        )?;
        for (usage, about) in HELP {
            execute!(stdout, Print(format!("  {:<24} {}\n", usage, about)))?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        if self.json {
            writeln!(stdout, "{}", json_message("error", msg))?;
            stdout.flush()?;
            return Ok(());
        }
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an info message.
    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        if self.json {
            writeln!(stdout, "{}", json_message("info", msg))?;
            stdout.flush()?;
            return Ok(());
        }
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}
