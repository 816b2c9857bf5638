//! Actor implementation for the trial engine.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

use super::TrialError;
use super::commands::TrialEngineCommand;
use super::core::TrialEngine;
use super::handle::TrialEngineHandle;
use crate::client::FlagClient;
use crate::config::FlagrunConfig;
use crate::trial::RunSnapshot;

/// Spawns the trial engine actor and returns its handle.
///
/// The engine starts idle. When `client` is `None` runs can still be started,
/// but every scheduled iteration is skipped until a client is attached via
/// [`TrialEngineHandle::attach_client`].
///
/// # Errors
/// - `TrialError::InvalidConfiguration` - Initial run configuration is invalid
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), flagrun_core::engine::TrialError> {
/// use flagrun_core::config::FlagrunConfig;
/// use flagrun_core::engine::spawn_trial_engine;
///
/// let handle = spawn_trial_engine(FlagrunConfig::default(), None)?;
/// handle.start().await?;
/// # Ok(())
/// # }
/// ```
pub fn spawn_trial_engine(
    config: FlagrunConfig,
    client: Option<Arc<dyn FlagClient>>,
) -> Result<TrialEngineHandle, TrialError> {
    let (sender, receiver) = mpsc::channel(config.engine.command_buffer);
    let (snapshot_sender, snapshot_receiver) = watch::channel(RunSnapshot::default());
    let (event_sender, _) = broadcast::channel(config.engine.event_buffer);

    let engine = TrialEngine::new(config, client, snapshot_sender, event_sender.clone())?;

    tokio::spawn(async move {
        run_actor_loop(engine, receiver).await;
    });

    Ok(TrialEngineHandle::new(sender, snapshot_receiver, event_sender))
}

/// Runs the main actor message processing loop.
///
/// Waits for either the next command or the next scheduled iteration.
/// An iteration is awaited to completion inside the loop body, so commands
/// that arrive meanwhile queue up and are handled at the iteration boundary.
async fn run_actor_loop(mut engine: TrialEngine, mut receiver: mpsc::Receiver<TrialEngineCommand>) {
    tracing::debug!("Trial engine actor started");

    loop {
        let deadline = engine.next_tick();

        tokio::select! {
            command = receiver.recv() => {
                let Some(command) = command else {
                    break;
                };
                if !handle_command(&mut engine, command) {
                    break;
                }
            }
            () = wait_for_tick(deadline) => {
                engine.run_scheduled_tick().await;
            }
        }
    }

    tracing::debug!("Trial engine actor stopped");
}

/// Sleeps until `deadline`, or forever when nothing is scheduled.
async fn wait_for_tick(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handles a single command for the trial engine.
/// Returns true to continue processing, false to shutdown.
fn handle_command(engine: &mut TrialEngine, command: TrialEngineCommand) -> bool {
    match command {
        TrialEngineCommand::Start { responder } => {
            let snapshot = engine.start();
            let _ = responder.send(snapshot);
        }

        TrialEngineCommand::Stop { responder } => {
            let stats = engine.stop();
            let _ = responder.send(stats);
        }

        TrialEngineCommand::UpdateConfiguration {
            configuration,
            responder,
        } => {
            let result = engine.update_configuration(configuration);
            let _ = responder.send(result);
        }

        TrialEngineCommand::AttachClient { client, responder } => {
            engine.attach_client(client);
            let _ = responder.send(());
        }

        TrialEngineCommand::GetSnapshot { responder } => {
            let _ = responder.send(engine.snapshot());
        }

        TrialEngineCommand::Shutdown { responder } => {
            tracing::debug!("Trial engine actor shutting down");
            engine.stop();
            let _ = responder.send(());
            return false;
        }
    }

    true
}
