mod cli;
mod commands;
mod config;
mod runs;
mod terminal;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use powersched_core::config::load_dotenv;
use powersched_scheduler::{
    ChannelSink, EventKind, FanoutSink, FixedLoadSampler, LoadSampler, MetricsSink, RunOutcome,
    Scheduler, SchedulerError, SchedulerEvent, StatusMonitor, SystemLoadSampler, TracingSink,
};

use crate::cli::CliArgs;
use crate::commands::{split_task_spec, Command};
use crate::config::CliConfig;
use crate::runs::ActiveRun;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    // Load config: file, then env, then flags
    let config = CliConfig::load(args.config.as_deref())
        .context("failed to load configuration")?
        .resolve(&args)?;
    config.scheduler.log_summary();

    let terminal = Terminal::new(config.display.json);

    let sampler: Arc<dyn LoadSampler> = match args.load {
        Some(pct) => {
            info!(utilization = pct, "using fixed load sampler");
            let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
            Arc::new(FixedLoadSampler::new(cores, pct))
        }
        None => Arc::new(SystemLoadSampler::new()),
    };

    // Events go to the console, the session counters, and the log.
    let (channel, mut events) = ChannelSink::channel();
    let metrics = MetricsSink::new();
    let sink = FanoutSink::default()
        .with(Arc::new(channel))
        .with(Arc::new(metrics.clone()))
        .with(Arc::new(TracingSink));

    let mut scheduler = Scheduler::with_config(config.scheduler.clone(), sampler, Arc::new(sink));

    for spec in &args.tasks {
        let (priority, time) = split_task_spec(spec)
            .ok_or_else(|| anyhow!("invalid --task '{}', expected PRIORITY:TIME", spec))?;
        scheduler
            .submit_text(priority, time)
            .with_context(|| format!("invalid --task '{}'", spec))?;
    }

    if args.run {
        return run_batch(&scheduler, &terminal, &mut events).await;
    }

    terminal.print_banner(scheduler.config(), scheduler.sampler().core_count())?;
    drain(&terminal, &mut events)?;

    let status = config.display.show_status.then(|| {
        StatusMonitor::spawn(
            scheduler.sampler(),
            scheduler.sink(),
            config.scheduler.status_interval(),
            config.scheduler.sample_window(),
        )
    });

    let result = repl(&mut scheduler, &terminal, &metrics, &mut events).await;

    if let Some(monitor) = status {
        monitor.stop().await;
    }
    if scheduler.is_busy() {
        warn!("exiting while a run is in progress");
    }
    result
}

/// Schedule the preloaded tasks once, streaming events until the run ends.
async fn run_batch(
    scheduler: &Scheduler,
    terminal: &Terminal,
    events: &mut UnboundedReceiver<SchedulerEvent>,
) -> Result<()> {
    let handle = match scheduler.start_run() {
        Ok(handle) => handle,
        Err(SchedulerError::EmptyRun) => {
            drain(terminal, events)?;
            terminal.print_info("No tasks available. Nothing to schedule.")?;
            return Ok(());
        }
        Err(e) => return Err(e).context("failed to start run"),
    };

    let mut wait = tokio::task::spawn_blocking(move || handle.wait());
    let outcome = loop {
        tokio::select! {
            Some(event) = events.recv() => terminal.render_event(&event)?,
            joined = &mut wait => break joined.context("run worker join failed")?,
        }
    };
    drain(terminal, events)?;
    terminal.print_outcome(&outcome)?;

    match outcome {
        RunOutcome::Failed(e) => Err(anyhow!(e).context("run failed")),
        _ => Ok(()),
    }
}

/// Interactive console: reads commands from stdin while rendering events
/// as they arrive from the worker and the status monitor.
async fn repl(
    scheduler: &mut Scheduler,
    terminal: &Terminal,
    metrics: &MetricsSink,
    events: &mut UnboundedReceiver<SchedulerEvent>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut active = ActiveRun::default();
    terminal.prompt()?;

    loop {
        active.reap();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    leave(terminal, &mut active)?;
                    break;
                };
                match commands::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => {
                        leave(terminal, &mut active)?;
                        break;
                    }
                    Ok(Some(command)) => execute(command, scheduler, terminal, metrics, &mut active)?,
                    Err(e) => terminal.print_error(&e.to_string())?,
                }
                // Submission and run notices are already queued; show them first.
                drain(terminal, events)?;
                terminal.prompt()?;
            }
            Some(event) = events.recv() => {
                if should_render(terminal, &event) {
                    terminal.render_event(&event)?;
                }
            }
        }
    }
    Ok(())
}

/// Say goodbye without waiting on an in-flight run; its worker thread ends
/// with the process.
fn leave(terminal: &Terminal, active: &mut ActiveRun) -> Result<()> {
    if active.detach() {
        terminal.print_info("A run is still in progress; exiting without waiting for it.")?;
    }
    terminal.print_info("Goodbye.")
}

fn execute(
    command: Command,
    scheduler: &mut Scheduler,
    terminal: &Terminal,
    metrics: &MetricsSink,
    active: &mut ActiveRun,
) -> Result<()> {
    match command {
        Command::Add { priority, time } => {
            if let Err(e) = scheduler.submit_text(&priority, &time) {
                terminal.print_error(&e.to_string())?;
            }
        }
        Command::List => terminal.print_tasks(scheduler.tasks(), scheduler.config())?,
        // The worker reports through the event stream; the handle is only
        // kept to log the outcome.
        Command::Run => match scheduler.start_run() {
            Ok(handle) => active.start(handle),
            Err(e) => terminal.print_error(&e.to_string())?,
        },
        Command::Status => {
            terminal.print_status(&metrics.snapshot(), scheduler.is_busy(), scheduler.tasks().len())?
        }
        Command::Reset => match scheduler.reset() {
            Ok(()) => terminal.print_info("Task queue cleared.")?,
            Err(e) => terminal.print_error(&e.to_string())?,
        },
        Command::Help => terminal.print_help()?,
        Command::Quit => {}
    }
    Ok(())
}

/// Periodic status lines would interleave with typing, so in text mode they
/// only feed the `status` command.
fn should_render(terminal: &Terminal, event: &SchedulerEvent) -> bool {
    terminal.is_json() || !matches!(event.kind, EventKind::StatusSampled { .. })
}

/// Render every event already waiting in the channel.
fn drain(terminal: &Terminal, events: &mut UnboundedReceiver<SchedulerEvent>) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        if should_render(terminal, &event) {
            terminal.render_event(&event)?;
        }
    }
    Ok(())
}
