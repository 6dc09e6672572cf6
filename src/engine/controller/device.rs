// Virtual joystick device seam
//
// The engine stages every change with `set_input` and then `commit`s it
// before any hold duration starts.

use crate::engine::input::Axis;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Something a device update addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceInput {
    /// 1-based button index
    Button(u32),
    Axis(Axis),
}

/// Device failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("virtual device {0} is not connected")]
    Disconnected(usize),

    #[error("virtual device rejected the update: {0}")]
    Rejected(String),
}

/// Two-phase (stage, then commit) driver for one virtual controller
pub trait VirtualDevice: Send {
    /// Stage a button (0/1) or raw axis value
    fn set_input(&mut self, input: DeviceInput, value: i32) -> Result<(), DeviceError>;

    /// Push every staged change to the device
    fn commit(&mut self) -> Result<(), DeviceError>;
}

/// Device that only logs what it would send
#[derive(Debug)]
pub struct LoggingDevice {
    id: usize,
    staged: Vec<(DeviceInput, i32)>,
}

impl LoggingDevice {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            staged: Vec::new(),
        }
    }
}

impl VirtualDevice for LoggingDevice {
    fn set_input(&mut self, input: DeviceInput, value: i32) -> Result<(), DeviceError> {
        self.staged.push((input, value));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DeviceError> {
        debug!("controller {} commit {:?}", self.id, self.staged);
        self.staged.clear();
        Ok(())
    }
}

/// One observed device call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceEvent {
    Set {
        at: Instant,
        input: DeviceInput,
        value: i32,
    },
    Commit {
        at: Instant,
    },
}

impl DeviceEvent {
    pub fn at(&self) -> Instant {
        match self {
            Self::Set { at, .. } | Self::Commit { at } => *at,
        }
    }
}

/// Device that timestamps every call into a shared log.
///
/// Clones share the log, so a test can keep one handle and give the other
/// to the engine.
#[derive(Debug, Clone)]
pub struct RecordingDevice {
    id: usize,
    events: Arc<Mutex<Vec<DeviceEvent>>>,
    connected: Arc<AtomicBool>,
}

impl RecordingDevice {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            events: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Snapshot of every call so far
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Staged values of one input, in call order
    pub fn values(&self, input: DeviceInput) -> Vec<i32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DeviceEvent::Set {
                    input: staged,
                    value,
                    ..
                } if staged == input => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Last committed value of an input (0 if never set)
    pub fn committed_value(&self, input: DeviceInput) -> i32 {
        let mut committed = 0;
        let mut pending = None;
        for event in self.events() {
            match event {
                DeviceEvent::Set {
                    input: staged,
                    value,
                    ..
                } if staged == input => pending = Some(value),
                DeviceEvent::Commit { .. } => {
                    if let Some(value) = pending.take() {
                        committed = value;
                    }
                }
                _ => {}
            }
        }
        committed
    }

    /// Make every following call fail
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DeviceError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DeviceError::Disconnected(self.id))
        }
    }

    fn record(&self, event: DeviceEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl VirtualDevice for RecordingDevice {
    fn set_input(&mut self, input: DeviceInput, value: i32) -> Result<(), DeviceError> {
        self.check()?;
        self.record(DeviceEvent::Set {
            at: Instant::now(),
            input,
            value,
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DeviceError> {
        self.check()?;
        self.record(DeviceEvent::Commit { at: Instant::now() });
        Ok(())
    }
}
