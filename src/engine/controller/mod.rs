// Controller execution engine
//
// Drives virtual controllers from parsed command sequences.
//
// ## Architecture
//
// - `device`: Two-phase (stage, commit) virtual device seam
// - `state`: Logical button/axis state mirrored from committed updates
// - `virtual_controller`: Lock-guarded controller with the reset interlock
// - `executor`: Group-by-group sequence execution on scoped threads
// - `slots`: Save/load slot permissions and last-slot persistence
// - `manager`: Owns one controller per port and spawns sequences
//
// Every controller serializes its own mutations; independent commands on
// the same controller interleave freely between mutations.

pub mod device;
pub mod executor;
pub mod manager;
pub mod slots;
pub mod state;
pub mod virtual_controller;

// Re-export commonly used types
pub use device::{DeviceError, DeviceInput, LoggingDevice, RecordingDevice, VirtualDevice};
pub use executor::{EngineError, Executor, INTERLOCK_MESSAGE};
pub use manager::ControllerManager;
pub use slots::{FileSlotStore, MemorySlotStore, SlotPolicy, SlotRejection, SlotStore};
pub use state::{ControllerState, HoldState};
pub use virtual_controller::{PressOutcome, VirtualController};
