// Sequence executor
//
// Groups run strictly one after another. Inside a group every token gets
// its own press thread while the calling thread waits out the group's
// duration; the scope then joins the presses. Each timed press clears its
// own input, so nothing pressed by another sequence is touched.

use super::device::DeviceError;
use super::virtual_controller::{PressOutcome, VirtualController};
use crate::chat::outbound::MessageSink;
use crate::engine::input::{CommandSequence, Input, InputGroup, SlotAction, Token};
use log::{debug, error};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default press length of save/load slot buttons
pub const SLOT_PRESS_MS: u64 = 200;

/// Message sent when a press would complete the reset combo
pub const INTERLOCK_MESSAGE: &str = "No resetting";

/// Execution failures
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("controller {controller}: device failed in group {group}: {source}")]
    Device {
        controller: usize,
        group: usize,
        #[source]
        source: DeviceError,
    },

    #[error("no controller on port {0}")]
    UnknownController(usize),

    #[error("failed to start input thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Runs parsed sequences against virtual controllers
pub struct Executor {
    notifier: Arc<dyn MessageSink>,
    slot_press: Duration,
}

impl Executor {
    pub fn new(notifier: Arc<dyn MessageSink>) -> Self {
        Self {
            notifier,
            slot_press: Duration::from_millis(SLOT_PRESS_MS),
        }
    }

    /// Override the fixed press length of slot actions
    pub fn with_slot_press(mut self, press: Duration) -> Self {
        self.slot_press = press;
        self
    }

    /// Execute a whole sequence, blocking until its last group finishes.
    ///
    /// A device failure abandons the rest of the sequence at the group
    /// boundary.
    pub fn execute(
        &self,
        sequence: &CommandSequence,
        controller: &VirtualController,
    ) -> Result<(), EngineError> {
        let _running = controller.begin_sequence();

        for (index, group) in sequence.groups().iter().enumerate() {
            if let Err(err) = self.execute_group(index, group, controller) {
                error!(
                    "controller {}: abandoning sequence at group {}: {}",
                    controller.id(),
                    index,
                    err
                );
                return Err(err);
            }
        }
        Ok(())
    }

    fn execute_group(
        &self,
        index: usize,
        group: &InputGroup,
        controller: &VirtualController,
    ) -> Result<(), EngineError> {
        let wait = Duration::from_millis(u64::from(group.duration_ms()));
        debug!(
            "controller {}: group {} with {} tokens for {} ms",
            controller.id(),
            index,
            group.len(),
            group.duration_ms()
        );

        let results = thread::scope(|scope| -> Result<Vec<Result<(), DeviceError>>, EngineError> {
            let mut presses = Vec::with_capacity(group.len());
            for token in group.tokens() {
                let press = thread::Builder::new()
                    .spawn_scoped(scope, move || self.run_token(token, controller))?;
                presses.push(press);
            }

            if !wait.is_zero() {
                thread::sleep(wait);
            }

            Ok(presses
                .into_iter()
                .map(|press| {
                    press
                        .join()
                        .unwrap_or_else(|_| Err(DeviceError::Rejected("press thread panicked".into())))
                })
                .collect())
        })?;

        // Timed presses clear themselves; holds belong to whoever made them
        results
            .into_iter()
            .collect::<Result<(), DeviceError>>()
            .map_err(|source| EngineError::Device {
                controller: controller.id(),
                group: index,
                source,
            })
    }

    /// One press operation, dispatched on the token's input
    fn run_token(&self, token: &Token, controller: &VirtualController) -> Result<(), DeviceError> {
        match token.input {
            Input::Pause | Input::Wait => {
                thread::sleep(Duration::from_millis(u64::from(token.duration_ms)));
                Ok(())
            }
            Input::Slot(action) => self.press_slot(action, controller),
            Input::Button(_) if token.release => controller.clear(token),
            Input::Button(_) => {
                match controller.assert(token)? {
                    PressOutcome::Asserted => {}
                    PressOutcome::InterlockTripped => {
                        self.notifier.send_message(INTERLOCK_MESSAGE);
                        return Ok(());
                    }
                    PressOutcome::Unbound => return Ok(()),
                }
                if token.hold {
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(u64::from(token.duration_ms)));
                controller.clear(token)
            }
        }
    }

    /// Press a save/load slot button for the fixed slot duration
    pub fn press_slot(
        &self,
        action: SlotAction,
        controller: &VirtualController,
    ) -> Result<(), DeviceError> {
        if controller.set_slot(action, true)? {
            thread::sleep(self.slot_press);
            controller.set_slot(action, false)?;
        }
        Ok(())
    }
}
