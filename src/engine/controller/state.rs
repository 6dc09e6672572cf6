// Per-controller button and axis state

use crate::core::math::approx_equal;
use crate::engine::input::{Axis, Button};

/// Lifecycle of one button on one controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HoldState {
    /// Not asserted
    #[default]
    Idle,
    /// Asserted for a timed press
    Holding,
    /// Asserted by a hold token until a release token clears it
    HeldIndefinite,
}

impl HoldState {
    /// Check if the button is asserted in either way
    pub fn is_held(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Logical state of a virtual controller
///
/// Mirrors what was last committed to the device, so the interlock can
/// reason about the buttons other commands are holding.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    buttons: [HoldState; Button::COUNT],
    axes: [f32; Axis::COUNT],
}

impl ControllerState {
    /// Create a neutral controller state
    pub fn new() -> Self {
        Self {
            buttons: [HoldState::Idle; Button::COUNT],
            axes: [0.0; Axis::COUNT],
        }
    }

    /// Current lifecycle state of a button
    pub fn button(&self, button: Button) -> HoldState {
        self.buttons[button.ordinal()]
    }

    /// Check if a button is currently asserted
    pub fn is_held(&self, button: Button) -> bool {
        self.button(button).is_held()
    }

    /// Set a button's lifecycle state
    pub(crate) fn set_button(&mut self, button: Button, state: HoldState) {
        self.buttons[button.ordinal()] = state;
    }

    /// Normalized axis value in [-1.0, 1.0]
    pub fn axis(&self, axis: Axis) -> f32 {
        self.axes[axis.ordinal()]
    }

    pub(crate) fn set_axis(&mut self, axis: Axis, value: f32) {
        self.axes[axis.ordinal()] = value;
    }

    /// Get all currently asserted buttons
    pub fn held_buttons(&self) -> Vec<Button> {
        ALL_BUTTONS
            .iter()
            .copied()
            .filter(|button| self.is_held(*button))
            .collect()
    }

    /// Check if nothing is asserted and every axis is centered
    pub fn is_neutral(&self) -> bool {
        self.buttons.iter().all(|state| !state.is_held())
            && self.axes.iter().all(|value| approx_equal(*value, 0.0, f32::EPSILON))
    }

    /// Reset all state
    pub fn reset(&mut self) {
        self.buttons = [HoldState::Idle; Button::COUNT];
        self.axes = [0.0; Axis::COUNT];
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Every button in ordinal order
pub const ALL_BUTTONS: [Button; Button::COUNT] = [
    Button::Left,
    Button::Right,
    Button::Up,
    Button::Down,
    Button::DLeft,
    Button::DRight,
    Button::DUp,
    Button::DDown,
    Button::CLeft,
    Button::CRight,
    Button::CUp,
    Button::CDown,
    Button::PLeft,
    Button::PRight,
    Button::PUp,
    Button::PDown,
    Button::TLeft,
    Button::TRight,
    Button::TUp,
    Button::TDown,
    Button::A,
    Button::B,
    Button::X,
    Button::Y,
    Button::L,
    Button::R,
    Button::Z,
    Button::C,
    Button::One,
    Button::Two,
    Button::Start,
    Button::Select,
    Button::Shake,
    Button::Point,
];
