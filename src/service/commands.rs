//! Command types for talking to the map service thread.
//!
//! Every command carries its own response channel. Commands are processed one
//! at a time in arrival order, so a rebuild requested while another is running
//! waits its turn.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::{RebuildSummary, ServiceError};

/// Commands accepted by the map service thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapCommand {
    /// Build a fresh grid and publish it.
    Rebuild,
    /// Stop the service thread after answering.
    Shutdown,
}

/// Response data from command execution.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    /// A new map was built and published.
    Rebuilt(RebuildSummary),
    /// The service is stopping.
    ShuttingDown,
}

/// Answer to one command.
pub type CommandResult = Result<CommandResponse, ServiceError>;

/// Command with response channel for acknowledgment.
pub struct CommandWithResponse {
    /// The request.
    pub command: MapCommand,
    /// Where the service thread sends its answer.
    pub response_tx: Sender<CommandResult>,
}

impl std::fmt::Debug for CommandWithResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandWithResponse")
            .field("command", &self.command)
            .field("response_tx", &"...")
            .finish()
    }
}

/// Sending half of the service command queue.
pub type CommandSender = Sender<CommandWithResponse>;
/// Receiving half of the service command queue.
pub type CommandReceiver = Receiver<CommandWithResponse>;

/// Send a command and wait for the service thread to answer.
pub fn send_command_sync(
    sender: &CommandSender,
    command: MapCommand,
    timeout: Duration,
) -> CommandResult {
    let (response_tx, response_rx) = crossbeam_channel::bounded(1);

    sender
        .send(CommandWithResponse {
            command,
            response_tx,
        })
        .map_err(|_| ServiceError::NotRunning)?;

    match response_rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ServiceError::Timeout(timeout)),
        // Thread exited without answering
        Err(RecvTimeoutError::Disconnected) => Err(ServiceError::NotRunning),
    }
}

/// Handle for requesting on-demand rebuilds.
///
/// Cheap to clone; every clone talks to the same service thread.
#[derive(Clone, Debug)]
pub struct RebuildTrigger {
    tx: CommandSender,
    timeout: Duration,
}

impl RebuildTrigger {
    pub(super) fn new(tx: CommandSender, timeout: Duration) -> Self {
        Self { tx, timeout }
    }

    pub(super) fn sender(&self) -> &CommandSender {
        &self.tx
    }

    /// Same trigger with a different response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Rebuild the grid and block until it is published.
    ///
    /// On failure the previously published map is still being served.
    pub fn rebuild(&self) -> Result<RebuildSummary, ServiceError> {
        match send_command_sync(&self.tx, MapCommand::Rebuild, self.timeout)? {
            CommandResponse::Rebuilt(summary) => Ok(summary),
            CommandResponse::ShuttingDown => Err(ServiceError::NotRunning),
        }
    }
}
