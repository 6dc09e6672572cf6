// A virtual controller: shared logical state plus its device
//
// Every mutation locks the controller, stages the change, commits it and
// only then updates the logical state. One lock per controller makes each
// button/axis read-modify-write atomic and keeps two commands from
// interleaving half-committed updates.

use super::device::{DeviceError, DeviceInput, VirtualDevice};
use super::state::{ControllerState, HoldState, ALL_BUTTONS};
use crate::core::math::{axis_to_raw, percent_to_unit};
use crate::engine::input::{Binding, Button, Profile, SlotAction, Token};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Result of asserting a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// The input is down and committed
    Asserted,
    /// The press would have completed the reset combo; the combo was cleared instead
    InterlockTripped,
    /// The active profile has no binding for the input
    Unbound,
}

struct Inner {
    state: ControllerState,
    device: Box<dyn VirtualDevice>,
}

impl Inner {
    /// Stage the asserted value(s) of a binding
    fn stage_on(&mut self, binding: Binding, percent: u8) -> Result<(), DeviceError> {
        match binding {
            Binding::Digital { index } => self.device.set_input(DeviceInput::Button(index), 1),
            Binding::Analog { axis, pole } => {
                let value = pole.sign() * percent_to_unit(percent);
                self.device.set_input(DeviceInput::Axis(axis), axis_to_raw(value))
            }
            Binding::Trigger { index, .. } if percent >= 100 => {
                self.device.set_input(DeviceInput::Button(index), 1)
            }
            Binding::Trigger { axis, .. } => {
                let value = percent_to_unit(percent);
                self.device.set_input(DeviceInput::Axis(axis), axis_to_raw(value))
            }
        }
    }

    /// Stage the neutral value(s) of a binding
    fn stage_off(&mut self, binding: Binding) -> Result<(), DeviceError> {
        match binding {
            Binding::Digital { index } => self.device.set_input(DeviceInput::Button(index), 0),
            Binding::Analog { axis, .. } => self.device.set_input(DeviceInput::Axis(axis), 0),
            Binding::Trigger { index, axis } => {
                self.device.set_input(DeviceInput::Button(index), 0)?;
                self.device.set_input(DeviceInput::Axis(axis), 0)
            }
        }
    }

    /// Record a committed assert in the logical state
    fn mark_on(&mut self, binding: Binding, button: Button, percent: u8, state: HoldState) {
        match binding {
            Binding::Analog { axis, pole } => {
                self.state.set_axis(axis, pole.sign() * percent_to_unit(percent))
            }
            Binding::Trigger { axis, .. } if percent < 100 => {
                self.state.set_axis(axis, percent_to_unit(percent))
            }
            _ => {}
        }
        self.state.set_button(button, state);
    }

    /// Record a committed release in the logical state
    fn mark_off(&mut self, binding: Binding, button: Button) {
        match binding {
            Binding::Analog { axis, .. } | Binding::Trigger { axis, .. } => {
                self.state.set_axis(axis, 0.0)
            }
            Binding::Digital { .. } => {}
        }
        self.state.set_button(button, HoldState::Idle);
    }
}

/// Decrements the running-sequence counter when dropped
pub struct RunningGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One virtual controller shared by every command targeting its port
pub struct VirtualController {
    id: usize,
    profile: Arc<Profile>,
    inner: Mutex<Inner>,

    /// Sequences currently executing on this controller
    running: AtomicUsize,

    /// Whether new commands are refused
    paused: AtomicBool,
}

impl VirtualController {
    pub fn new(id: usize, profile: Arc<Profile>, device: Box<dyn VirtualDevice>) -> Self {
        Self {
            id,
            profile,
            inner: Mutex::new(Inner {
                state: ControllerState::new(),
                device,
            }),
            running: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
        }
    }

    /// Port number of this controller
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    // State stays consistent per mutation, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the logical state
    pub fn state(&self) -> ControllerState {
        self.lock().state.clone()
    }

    /// Check if a button is currently asserted
    pub fn is_held(&self, button: Button) -> bool {
        self.lock().state.is_held(button)
    }

    /// Number of sequences executing right now
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Count a sequence as running until the guard drops
    pub fn begin_sequence(&self) -> RunningGuard<'_> {
        self.running.fetch_add(1, Ordering::SeqCst);
        RunningGuard {
            counter: &self.running,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Assert a token's button and commit it.
    ///
    /// Buttons in the profile's reset combo are checked first: if the press
    /// would leave the whole combo down, every combo button is released
    /// instead.
    pub fn assert(&self, token: &Token) -> Result<PressOutcome, DeviceError> {
        let Some(button) = token.button() else {
            return Ok(PressOutcome::Unbound);
        };
        let Some(binding) = self.profile.binding(button) else {
            warn!(
                "controller {}: {} has no binding on {}",
                self.id,
                button,
                self.profile.console().name()
            );
            return Ok(PressOutcome::Unbound);
        };

        let mut inner = self.lock();

        let combo = self.profile.reset_combo();
        if combo.contains(&button)
            && combo
                .iter()
                .all(|b| *b == button || inner.state.is_held(*b))
        {
            self.release_combo(&mut inner, combo)?;
            warn!("controller {}: reset combo blocked at {}", self.id, token.name);
            return Ok(PressOutcome::InterlockTripped);
        }

        inner.stage_on(binding, token.percent)?;
        inner.device.commit()?;

        let hold = if token.hold {
            HoldState::HeldIndefinite
        } else {
            HoldState::Holding
        };
        inner.mark_on(binding, button, token.percent, hold);
        debug!("controller {}: {} down ({:?})", self.id, token.name, hold);
        Ok(PressOutcome::Asserted)
    }

    fn release_combo(&self, inner: &mut Inner, combo: &[Button]) -> Result<(), DeviceError> {
        let held: Vec<(Button, Binding)> = combo
            .iter()
            .filter(|b| inner.state.is_held(**b))
            .filter_map(|b| self.profile.binding(*b).map(|binding| (*b, binding)))
            .collect();

        for (_, binding) in &held {
            inner.stage_off(*binding)?;
        }
        inner.device.commit()?;
        for (button, binding) in held {
            inner.mark_off(binding, button);
        }
        Ok(())
    }

    /// Return a token's button to neutral and commit
    pub fn clear(&self, token: &Token) -> Result<(), DeviceError> {
        let Some(button) = token.button() else {
            return Ok(());
        };
        let Some(binding) = self.profile.binding(button) else {
            return Ok(());
        };

        let mut inner = self.lock();
        inner.stage_off(binding)?;
        inner.device.commit()?;
        inner.mark_off(binding, button);
        debug!("controller {}: {} up", self.id, token.name);
        Ok(())
    }

    /// Set the button behind a save/load slot and commit.
    /// Returns false when the profile has no such slot.
    pub fn set_slot(&self, action: SlotAction, down: bool) -> Result<bool, DeviceError> {
        let Some(index) = self.profile.slot_index(action) else {
            warn!("controller {}: slot {} has no binding", self.id, action.slot);
            return Ok(false);
        };

        let mut inner = self.lock();
        inner
            .device
            .set_input(DeviceInput::Button(index), i32::from(down))?;
        inner.device.commit()?;
        Ok(true)
    }

    /// Return every input to neutral
    pub fn release_all(&self) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        for button in ALL_BUTTONS {
            if let Some(binding) = self.profile.binding(button) {
                inner.stage_off(binding)?;
            }
        }
        inner.device.commit()?;
        inner.state.reset();
        debug!("controller {}: all inputs released", self.id);
        Ok(())
    }
}

impl std::fmt::Debug for VirtualController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualController")
            .field("id", &self.id)
            .field("console", &self.profile.console())
            .field("running", &self.running())
            .field("paused", &self.is_paused())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::controller::device::{DeviceEvent, RecordingDevice};
    use crate::engine::input::{Axis, Console, Input, SlotKind};
    use approx::assert_relative_eq;

    fn controller(console: Console) -> (VirtualController, RecordingDevice) {
        let device = RecordingDevice::new(0);
        let controller = VirtualController::new(
            0,
            Arc::new(Profile::for_console(console)),
            Box::new(device.clone()),
        );
        (controller, device)
    }

    fn token(button: Button) -> Token {
        Token::new(button.name(), Input::Button(button))
    }

    #[test]
    fn test_digital_assert_and_clear() {
        let (pad, device) = controller(Console::Snes);
        assert_eq!(pad.assert(&token(Button::A)).unwrap(), PressOutcome::Asserted);
        assert!(pad.is_held(Button::A));
        assert_eq!(device.committed_value(DeviceInput::Button(5)), 1);

        pad.clear(&token(Button::A)).unwrap();
        assert!(!pad.is_held(Button::A));
        assert_eq!(device.committed_value(DeviceInput::Button(5)), 0);
    }

    #[test]
    fn test_every_set_is_committed() {
        let (pad, device) = controller(Console::Snes);
        pad.assert(&token(Button::B)).unwrap();
        let events = device.events();
        assert!(matches!(events.last(), Some(DeviceEvent::Commit { .. })));
    }

    #[test]
    fn test_analog_scaled_by_percent() {
        let (pad, device) = controller(Console::Snes);
        pad.assert(&token(Button::Left).with_percent(50)).unwrap();
        assert_relative_eq!(pad.state().axis(Axis::X), -0.5);
        assert_eq!(device.committed_value(DeviceInput::Axis(Axis::X)), -16384);

        pad.clear(&token(Button::Left)).unwrap();
        assert_relative_eq!(pad.state().axis(Axis::X), 0.0);
        assert_eq!(device.committed_value(DeviceInput::Axis(Axis::X)), 0);
    }

    #[test]
    fn test_trigger_digital_at_full_press() {
        let (pad, device) = controller(Console::GameCube);
        pad.assert(&token(Button::L)).unwrap();
        assert_eq!(device.committed_value(DeviceInput::Button(7)), 1);
        assert_relative_eq!(pad.state().axis(Axis::RZ), 0.0);
    }

    #[test]
    fn test_trigger_analog_below_full_press() {
        let (pad, device) = controller(Console::GameCube);
        pad.assert(&token(Button::L).with_percent(25)).unwrap();
        assert_eq!(device.committed_value(DeviceInput::Button(7)), 0);
        assert_relative_eq!(pad.state().axis(Axis::RZ), 0.25);

        pad.clear(&token(Button::L)).unwrap();
        assert!(pad.state().is_neutral());
    }

    #[test]
    fn test_hold_marks_indefinite() {
        let (pad, _device) = controller(Console::Snes);
        pad.assert(&token(Button::R).held()).unwrap();
        assert_eq!(pad.state().button(Button::R), HoldState::HeldIndefinite);
    }

    #[test]
    fn test_interlock_trips_on_fourth_button() {
        let (pad, device) = controller(Console::Snes);
        for button in [Button::A, Button::B, Button::Select] {
            assert_eq!(pad.assert(&token(button)).unwrap(), PressOutcome::Asserted);
        }

        assert_eq!(
            pad.assert(&token(Button::Start)).unwrap(),
            PressOutcome::InterlockTripped
        );
        for button in [Button::A, Button::B, Button::Select, Button::Start] {
            assert!(!pad.is_held(button));
        }
        assert_eq!(device.committed_value(DeviceInput::Button(10)), 0);
        assert_eq!(device.committed_value(DeviceInput::Button(5)), 0);
    }

    #[test]
    fn test_interlock_ignores_partial_combo() {
        let (pad, _device) = controller(Console::Snes);
        pad.assert(&token(Button::A)).unwrap();
        pad.assert(&token(Button::B)).unwrap();
        assert_eq!(pad.assert(&token(Button::Start)).unwrap(), PressOutcome::Asserted);
        assert!(pad.is_held(Button::Start));
    }

    #[test]
    fn test_no_interlock_without_combo() {
        let (pad, _device) = controller(Console::N64);
        for button in [Button::A, Button::B, Button::Z, Button::Start] {
            assert_eq!(pad.assert(&token(button)).unwrap(), PressOutcome::Asserted);
        }
    }

    #[test]
    fn test_unbound_button() {
        let (pad, device) = controller(Console::N64);
        assert_eq!(pad.assert(&token(Button::Select)).unwrap(), PressOutcome::Unbound);
        assert!(device.events().is_empty());
    }

    #[test]
    fn test_set_slot() {
        let (pad, device) = controller(Console::Snes);
        let action = SlotAction {
            kind: SlotKind::Save,
            slot: 2,
        };
        assert!(pad.set_slot(action, true).unwrap());
        assert_eq!(device.committed_value(DeviceInput::Button(20)), 1);
        assert!(pad.set_slot(action, false).unwrap());
        assert_eq!(device.committed_value(DeviceInput::Button(20)), 0);

        let missing = SlotAction {
            kind: SlotKind::Load,
            slot: 9,
        };
        assert!(!pad.set_slot(missing, true).unwrap());
    }

    #[test]
    fn test_release_all() {
        let (pad, _device) = controller(Console::Snes);
        pad.assert(&token(Button::Up).held()).unwrap();
        pad.assert(&token(Button::Y).held()).unwrap();
        pad.release_all().unwrap();
        assert!(pad.state().is_neutral());
    }

    #[test]
    fn test_device_failure_leaves_state_untouched() {
        let (pad, device) = controller(Console::Snes);
        device.disconnect();
        assert_eq!(
            pad.assert(&token(Button::A)),
            Err(DeviceError::Disconnected(0))
        );
        assert!(!pad.is_held(Button::A));
    }

    #[test]
    fn test_running_guard() {
        let (pad, _device) = controller(Console::Snes);
        {
            let _first = pad.begin_sequence();
            let _second = pad.begin_sequence();
            assert_eq!(pad.running(), 2);
        }
        assert_eq!(pad.running(), 0);
    }
}
