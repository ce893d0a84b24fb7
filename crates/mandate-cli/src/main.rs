//! Demo host for the mandate engine.
//!
//! Plays the role of the embedding environment: it owns simulated time,
//! delivers due timer wakeups and resolves issued async operations, one
//! invocation at a time.

mod routines;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::Parser;
use serde_json::json;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mandate_core::app::{FireOutcome, WakeupOutcome};
use mandate_core::domain::{StepTemplate, TaskId, TaskTemplate};
use mandate_core::impls::{InMemoryInvoker, ManualTimer};
use mandate_core::ports::FixedClock;
use mandate_core::typed::{DynHandler, Routine};
use mandate_core::{App, AppBuilder, EngineConfig};

use routines::{Announce, AnnounceHandler, Tally, TallyHandler, Transfer, TransferHandler};

#[derive(Parser)]
#[command(name = "mandate")]
#[command(about = "Run scheduled governance mandates against in-memory ports")]
struct Cli {
    /// Engine config (JSON). Defaults apply when omitted.
    #[arg(long, env = "MANDATE_CONFIG")]
    config: Option<PathBuf>,

    /// Recurrence of the payout schedule.
    #[arg(long, default_value = "@every 2m")]
    recurrence: String,

    /// Number of host ticks to simulate.
    #[arg(long, default_value_t = 10)]
    ticks: u32,

    /// Simulated seconds per tick.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..=86_400))]
    tick_secs: u32,

    /// Real time to pause between ticks.
    #[arg(long, default_value_t = 0)]
    tick_ms: u64,

    /// Treasury balance the transfer routine pays from.
    #[arg(long, default_value_t = 1_000)]
    balance: u64,

    /// Log filter, e.g. `info` or `mandate_core=debug`.
    #[arg(long, env = "MANDATE_LOG", default_value = "info")]
    log: String,
}

fn init_tracing(directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directive))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            EngineConfig::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
        }
        None => Ok(EngineConfig::default()),
    }
}

struct Host {
    app: App,
    clock: Arc<FixedClock>,
    timer: Arc<ManualTimer>,
    invoker: Arc<InMemoryInvoker>,
    tasks: Vec<TaskId>,
}

impl Host {
    /// Deliver every due wakeup, including ones registered while delivering.
    async fn deliver_wakeups(&mut self) -> Result<()> {
        loop {
            let due = self.timer.take_due().await;
            if due.is_empty() {
                return Ok(());
            }
            for (timer_id, wakeup) in due {
                let outcome = self.app.handle_wakeup(wakeup).await?;
                match outcome {
                    WakeupOutcome::Fired(FireOutcome::Fired { task_id, status }) => {
                        info!(timer = %timer_id.0, %task_id, ?status, "mandate instantiated");
                        self.tasks.push(task_id);
                    }
                    other => info!(timer = %timer_id.0, outcome = ?other, "wakeup delivered"),
                }
            }
        }
    }

    /// Resolve every issued operation by running its routine.
    async fn resolve_operations(&self) -> Result<()> {
        for issued in self.invoker.drain().await {
            let op = issued.operation;
            let (success, payload) = match self.app.registry().get(&op.function) {
                Some(handler) => match handler.handle_dyn(op.bindings).await {
                    Ok(value) => (true, value),
                    Err(err) => (false, json!({ "error": err.message })),
                },
                None => (false, json!({ "error": format!("no routine {}", op.function) })),
            };
            let outcome = self.app.resume(&op.continuation, success, payload).await?;
            info!(handle = %issued.handle.0, ?outcome, "operation resolved");
        }
        Ok(())
    }

    async fn report(&self) -> Result<()> {
        for task_id in &self.tasks {
            let view = self.app.get_task_status(*task_id).await?;
            let steps: Vec<String> = view
                .steps
                .iter()
                .map(|s| format!("{}:{:?}", s.ordinal, s.status))
                .collect();
            println!("{} {:?} [{}]", view.task_id, view.status, steps.join(" "));
            if let Some(last) = view.steps.last().and_then(|s| s.result.as_ref()) {
                println!("  {last}");
            }
            for step in view.steps.iter().filter(|s| s.error.is_some()) {
                if let Some(err) = &step.error {
                    println!("  step {} failed: {err}", step.ordinal);
                }
            }
        }
        for schedule in self.app.schedules().await? {
            println!(
                "schedule {} {} fired {} times, enabled={}",
                schedule.id, schedule.recurrence, schedule.fired_count, schedule.enabled
            );
        }
        let counts = self.app.counts().await?;
        println!(
            "tasks: {} pending, {} running, {} completed, {} failed",
            counts.pending, counts.running, counts.completed, counts.failed
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log)?;
    let config = load_config(cli.config.as_ref())?;

    let start = Utc
        .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .context("invalid start time")?;
    let clock = Arc::new(FixedClock::new(start));
    let timer = Arc::new(ManualTimer::new(clock.clone()));
    let invoker = Arc::new(InMemoryInvoker::new());

    let app = AppBuilder::new()
        .register::<Tally, _>(TallyHandler)?
        .register::<Transfer, _>(TransferHandler {
            balance: cli.balance,
        })?
        .register::<Announce, _>(AnnounceHandler)?
        .expect_routines(&[Tally::NAME, Transfer::NAME, Announce::NAME])
        .with_clock(clock.clone())
        .with_timer(timer.clone())
        .with_invoker(invoker.clone())
        .with_config(config)
        .build()?;

    let tally = app.create_code_unit(Tally::NAME).await?;
    let transfer = app.create_code_unit(Transfer::NAME).await?;
    let announce = app.create_code_unit(Announce::NAME).await?;
    let template = app
        .register_template(TaskTemplate::new(
            "grants payout",
            vec![
                StepTemplate::sync(tally).with_args(json!({
                    "proposal": "grant-42",
                    "yes": 31,
                    "no": 9,
                    "quorum": 25
                })),
                StepTemplate::async_op(transfer)
                    .with_args(json!({ "to": "grants-wallet", "amount": 400 })),
                StepTemplate::sync(announce).with_delay(30),
            ],
        ))
        .await?;
    let schedule = app.create_schedule(template, &cli.recurrence).await?;
    info!(%schedule, recurrence = %cli.recurrence, "schedule armed");

    let mut host = Host {
        app,
        clock,
        timer,
        invoker,
        tasks: Vec::new(),
    };

    for tick in 1..=cli.ticks {
        host.clock.advance(chrono::Duration::seconds(i64::from(cli.tick_secs)));
        host.deliver_wakeups().await?;
        host.resolve_operations().await?;
        host.deliver_wakeups().await?;
        if let Some(next) = host.timer.next_due().await {
            info!(tick, %next, "tick done");
        } else {
            warn!(tick, "no timers pending");
        }
        if cli.tick_ms > 0 {
            sleep(Duration::from_millis(cli.tick_ms)).await;
        }
    }

    host.app.disable_schedule(schedule).await?;
    host.report().await
}
