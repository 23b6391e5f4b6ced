//! Continuous execution.
//!
//! A run loop steps the session once, hands a snapshot to its observer, then
//! sleeps for [`RunConfig::interval`] before the next step. The sleep is the
//! only suspension point, so stop requests and reloads land between two whole
//! instructions. Each loop is tagged with the [`Generation`] it claimed when it
//! started and checks it before every step; a reload or a newer run moves the
//! generation on and the old loop exits without touching the new state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::session::{Generation, Session};
use crate::vm::{Error, Fault, Halt, Snapshot, Step};

pub type SharedSession = Arc<Mutex<Session>>;

pub fn shared(session: Session) -> SharedSession {
  Arc::new(Mutex::new(session))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
  /// Pause between two steps.
  pub interval: Duration,
  /// Give up after this many executed instructions.
  pub step_limit: Option<u64>,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      interval: Duration::from_millis(1),
      step_limit: None,
    }
  }
}

/// Why a run loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
  /// The program counter left the program.
  Halted,
  /// The machine was stopped.
  Stopped,
  /// A reload or another run took over the session.
  Superseded,
  /// [`RunConfig::step_limit`] instructions ran. The machine is still running.
  StepLimit,
  Fault { pc: usize, fault: Fault },
}

impl From<Halt> for Exit {
  fn from(halt: Halt) -> Self {
    match halt {
      Halt::End => Exit::Halted,
      Halt::Stopped => Exit::Stopped,
      Halt::Fault { pc, fault } => Exit::Fault { pc, fault },
    }
  }
}

/// Step `session` until it halts, calling `observe` after every step.
///
/// Fails only when the session's source does not compile.
pub async fn run<F>(
  session: SharedSession,
  config: RunConfig,
  mut observe: F,
) -> Result<Exit, Error>
where
  F: FnMut(&Snapshot),
{
  let generation = session.lock().await.begin_run();
  tracing::debug!(%generation, ?config, "run started");

  let mut executed = 0u64;
  let exit = loop {
    if config.step_limit.is_some_and(|limit| executed >= limit) {
      break Exit::StepLimit;
    }

    if let Some(exit) = step(&session, generation, &mut observe).await? {
      break exit;
    }
    executed += 1;

    tokio::time::sleep(config.interval).await;
  };

  tracing::debug!(%generation, executed, ?exit, "run finished");
  Ok(exit)
}

async fn step<F>(
  session: &SharedSession,
  generation: Generation,
  observe: &mut F,
) -> Result<Option<Exit>, Error>
where
  F: FnMut(&Snapshot),
{
  let mut session = session.lock().await;
  if session.generation() != generation {
    return Ok(Some(Exit::Superseded));
  }

  let exit = match session.step() {
    Ok(Step::Executed) => None,
    Ok(Step::Halted) => Some(Exit::Halted),
    // halted before this run began, or stopped between two steps
    Err(Error::MachineHalted) => {
      let exit = session.vm().halt().map_or(Exit::Stopped, Exit::from);
      return Ok(Some(exit));
    }
    Err(Error::Fault { pc, fault }) => Some(Exit::Fault { pc, fault }),
    Err(err) => return Err(err),
  };
  observe(&session.snapshot());
  Ok(exit)
}

/// Reload the session from its current source, then [`run`] it.
pub async fn reload_and_run<F>(
  session: SharedSession,
  config: RunConfig,
  observe: F,
) -> Result<Exit, Error>
where
  F: FnMut(&Snapshot),
{
  session
    .lock()
    .await
    .reload()
    .map_err(|errors| Error::InvalidProgram(errors.clone()))?;
  run(session, config, observe).await
}

/// [`run`] on a background task.
pub fn spawn<F>(
  session: SharedSession,
  config: RunConfig,
  observe: F,
) -> JoinHandle<Result<Exit, Error>>
where
  F: FnMut(&Snapshot) + Send + 'static,
{
  tokio::spawn(run(session, config, observe))
}
