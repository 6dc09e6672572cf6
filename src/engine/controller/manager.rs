// Controller manager - Owns every virtual controller and dispatches sequences

use super::device::{DeviceError, LoggingDevice, VirtualDevice};
use super::executor::{EngineError, Executor};
use super::virtual_controller::VirtualController;
use crate::chat::outbound::MessageSink;
use crate::engine::input::{CommandSequence, Profile, SlotAction};
use log::{debug, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Main controller manager that coordinates all virtual controllers
pub struct ControllerManager {
    /// Profile shared by every controller
    profile: Arc<Profile>,

    /// One controller per port
    controllers: Vec<Arc<VirtualController>>,

    executor: Arc<Executor>,
}

impl ControllerManager {
    /// Create a manager with one controller per device
    pub fn new(profile: Arc<Profile>, devices: Vec<Box<dyn VirtualDevice>>, executor: Executor) -> Self {
        let controllers = devices
            .into_iter()
            .enumerate()
            .map(|(port, device)| Arc::new(VirtualController::new(port, profile.clone(), device)))
            .collect();

        Self {
            profile,
            controllers,
            executor: Arc::new(executor),
        }
    }

    /// Create `count` controllers backed by logging devices
    pub fn with_logging_devices(profile: Arc<Profile>, count: usize, notifier: Arc<dyn MessageSink>) -> Self {
        let devices = (0..count)
            .map(|port| Box::new(LoggingDevice::new(port)) as Box<dyn VirtualDevice>)
            .collect();
        Self::new(profile, devices, Executor::new(notifier))
    }

    pub fn profile(&self) -> &Arc<Profile> {
        &self.profile
    }

    /// Get the controller on a port
    pub fn controller(&self, port: usize) -> Option<&Arc<VirtualController>> {
        self.controllers.get(port)
    }

    fn require(&self, port: usize) -> Result<&Arc<VirtualController>, EngineError> {
        self.controller(port).ok_or(EngineError::UnknownController(port))
    }

    /// Get the number of controllers
    pub fn num_controllers(&self) -> usize {
        self.controllers.len()
    }

    /// Run a sequence on the calling thread
    pub fn execute(&self, sequence: &CommandSequence, port: usize) -> Result<(), EngineError> {
        let controller = self.require(port)?;
        self.executor.execute(sequence, controller)
    }

    /// Run a sequence on its own thread and return immediately
    pub fn spawn(
        &self,
        sequence: CommandSequence,
        port: usize,
    ) -> Result<JoinHandle<Result<(), EngineError>>, EngineError> {
        let controller = self.require(port)?.clone();
        let executor = self.executor.clone();
        let total_ms = sequence.total_ms();

        let handle = thread::Builder::new()
            .name(format!("controller-{port}"))
            .spawn(move || executor.execute(&sequence, &controller))?;
        debug!("controller {}: sequence of {} ms started", port, total_ms);
        Ok(handle)
    }

    /// Press a save/load slot button on a port, blocking for the press
    pub fn press_slot(&self, action: SlotAction, port: usize) -> Result<(), EngineError> {
        let controller = self.require(port)?;
        let _running = controller.begin_sequence();
        self.executor
            .press_slot(action, controller)
            .map_err(|source| EngineError::Device {
                controller: port,
                group: 0,
                source,
            })
    }

    /// Mark every controller paused and return all of them to neutral
    pub fn pause_all(&self) -> Result<(), DeviceError> {
        for controller in &self.controllers {
            controller.set_paused(true);
            controller.release_all()?;
        }
        info!("input paused on {} controllers", self.controllers.len());
        Ok(())
    }

    /// Accept input again on every controller
    pub fn resume_all(&self) {
        for controller in &self.controllers {
            controller.set_paused(false);
        }
        info!("input resumed");
    }

    /// Check if a port refuses new input
    pub fn is_paused(&self, port: usize) -> bool {
        self.controller(port).map_or(false, |c| c.is_paused())
    }

    /// Sequences executing across all controllers
    pub fn running_total(&self) -> usize {
        self.controllers.iter().map(|c| c.running()).sum()
    }

    /// Reset every controller to neutral
    pub fn reset_all(&self) -> Result<(), DeviceError> {
        for controller in &self.controllers {
            controller.release_all()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ControllerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerManager")
            .field("console", &self.profile.console())
            .field("controllers", &self.controllers)
            .finish()
    }
}
