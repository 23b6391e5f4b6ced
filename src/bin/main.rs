use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use emulator::runner::{self, Exit, RunConfig};
use emulator::session::Session;
use emulator::vm::{Error, Snapshot, Step};
use tracing_subscriber::EnvFilter;

/// Assemble an RV32 subset program, print its listing, and optionally
/// execute it.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
  /// Assembly source file
  file: PathBuf,

  /// Execute this many single steps, printing the registers after each
  #[arg(long, conflicts_with = "run")]
  steps: Option<u64>,

  /// Run until the program halts or faults, or until Ctrl-C
  #[arg(long)]
  run: bool,

  /// Delay between steps while running, in milliseconds
  #[arg(long, default_value_t = 1)]
  interval_ms: u64,

  /// Stop running after this many instructions
  #[arg(long, requires = "run")]
  step_limit: Option<u64>,

  /// Print the final machine state as JSON instead of a register panel
  #[arg(long)]
  json: bool,

  /// Log filter directives; overrides RUST_LOG
  #[arg(long)]
  log: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  let args = Args::parse();
  init_tracing(args.log.as_deref());

  let source = std::fs::read_to_string(&args.file)
    .with_context(|| format!("failed to read {}", args.file.display()))?;
  let mut session = Session::with_source(source);
  println!("{}", session.listing());
  if let Err(errors) = session.program() {
    anyhow::bail!("{} error(s) in {}", errors.len(), args.file.display());
  }

  let snapshot = if let Some(steps) = args.steps {
    step(&mut session, steps)?;
    session.snapshot()
  } else if args.run {
    let config = RunConfig {
      interval: Duration::from_millis(args.interval_ms),
      step_limit: args.step_limit,
    };
    run(session, config).await?
  } else {
    return Ok(());
  };

  if args.json {
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
  } else {
    println!("\n{snapshot}");
  }
  Ok(())
}

fn step(session: &mut Session, steps: u64) -> anyhow::Result<()> {
  for _ in 0..steps {
    match session.step() {
      Ok(Step::Executed) => println!("\n{}", session.snapshot()),
      Ok(Step::Halted) => {
        println!("\nhalted");
        break;
      }
      Err(err @ Error::Fault { .. }) => return Err(err.into()),
      Err(err) => return Err(err).context("cannot step"),
    }
  }
  Ok(())
}

async fn run(session: Session, config: RunConfig) -> anyhow::Result<Snapshot> {
  let session = runner::shared(session);
  let mut handle = runner::spawn(session.clone(), config, |_| {});

  let joined = tokio::select! {
    joined = &mut handle => joined,
    signal = tokio::signal::ctrl_c() => {
      signal.context("failed to listen for Ctrl-C")?;
      session.lock().await.stop();
      handle.await
    }
  };

  match joined.context("run loop panicked")?? {
    Exit::Fault { pc, fault } => anyhow::bail!("fault at instruction {pc}: {fault}"),
    exit => tracing::info!(?exit, "run ended"),
  }
  let snapshot = session.lock().await.snapshot();
  Ok(snapshot)
}

fn init_tracing(directives: Option<&str>) {
  let filter = match directives {
    Some(directives) => EnvFilter::new(directives),
    None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();
}
