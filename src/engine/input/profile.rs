// Console profiles: the valid input alphabet and its physical bindings

use std::fmt;
use std::str::FromStr;

/// Every canonical button any supported console exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    // Main stick / d-pad directions
    Left,
    Right,
    Up,
    Down,
    DLeft,
    DRight,
    DUp,
    DDown,
    // Second stick (C buttons)
    CLeft,
    CRight,
    CUp,
    CDown,
    // Wii pointer and tilt
    PLeft,
    PRight,
    PUp,
    PDown,
    TLeft,
    TRight,
    TUp,
    TDown,
    // Face and shoulder buttons
    A,
    B,
    X,
    Y,
    L,
    R,
    Z,
    C,
    One,
    Two,
    Start,
    Select,
    Shake,
    Point,
}

impl Button {
    /// Number of canonical buttons, the size of a profile's dense table
    pub const COUNT: usize = 34;

    /// Position of this button in a dense lookup table
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Canonical lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
            Self::DLeft => "dleft",
            Self::DRight => "dright",
            Self::DUp => "dup",
            Self::DDown => "ddown",
            Self::CLeft => "cleft",
            Self::CRight => "cright",
            Self::CUp => "cup",
            Self::CDown => "cdown",
            Self::PLeft => "pleft",
            Self::PRight => "pright",
            Self::PUp => "pup",
            Self::PDown => "pdown",
            Self::TLeft => "tleft",
            Self::TRight => "tright",
            Self::TUp => "tup",
            Self::TDown => "tdown",
            Self::A => "a",
            Self::B => "b",
            Self::X => "x",
            Self::Y => "y",
            Self::L => "l",
            Self::R => "r",
            Self::Z => "z",
            Self::C => "c",
            Self::One => "one",
            Self::Two => "two",
            Self::Start => "start",
            Self::Select => "select",
            Self::Shake => "shake",
            Self::Point => "point",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which of the two emulator state actions a slot token performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Save,
    Load,
}

impl SlotKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Load => "load",
        }
    }
}

/// A save/load state request on a numbered slot (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotAction {
    pub kind: SlotKind,
    pub slot: u8,
}

/// What a parsed token refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    /// A real controller button or direction
    Button(Button),
    /// `#`: pause for the token's own duration
    Wait,
    /// `.`: fixed-length no-op separator
    Pause,
    /// Save/load state; never produced by the parser
    Slot(SlotAction),
}

impl Input {
    /// Whether executing this input touches the device
    pub fn is_meta(&self) -> bool {
        matches!(self, Self::Wait | Self::Pause)
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Button(button) => f.write_str(button.name()),
            Self::Wait => f.write_str("#"),
            Self::Pause => f.write_str("."),
            Self::Slot(action) => write!(f, "{}state{}", action.kind.name(), action.slot),
        }
    }
}

/// Device axes, named after their HID usages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
    RX,
    RY,
    RZ,
}

impl Axis {
    pub const COUNT: usize = 6;

    pub fn ordinal(self) -> usize {
        self as usize
    }
}

/// Which end of an axis a direction pushes toward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pole {
    Negative,
    Positive,
}

impl Pole {
    pub fn sign(self) -> f32 {
        match self {
            Self::Negative => -1.0,
            Self::Positive => 1.0,
        }
    }
}

/// How a button reaches the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// On/off button bit (1-based device index)
    Digital { index: u32 },
    /// Direction on a centered axis
    Analog { axis: Axis, pole: Pole },
    /// Shoulder trigger: a button at 100%, an absolute axis below that
    Trigger { index: u32, axis: Axis },
}

/// Digital/analog classification reported by [`Profile::resolve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputClass {
    Digital,
    Analog,
    Trigger,
    Meta,
}

/// Supported console targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Console {
    Snes,
    N64,
    GameCube,
    Wii,
}

impl Console {
    pub fn name(self) -> &'static str {
        match self {
            Self::Snes => "snes",
            Self::N64 => "n64",
            Self::GameCube => "gc",
            Self::Wii => "wii",
        }
    }
}

impl FromStr for Console {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snes" => Ok(Self::Snes),
            "n64" => Ok(Self::N64),
            "gc" | "gamecube" => Ok(Self::GameCube),
            "wii" => Ok(Self::Wii),
            other => Err(format!("unknown console \"{}\"", other)),
        }
    }
}

/// Device index of save slot 1; slots 1..=6 are consecutive
const SAVESTATE_BASE: u32 = 19;
/// Device index of load slot 1
const LOADSTATE_BASE: u32 = 25;
/// Slots with a physical binding per kind
pub const PHYSICAL_SLOTS: u8 = 6;

/// Immutable input alphabet and binding table for one console
#[derive(Debug, Clone)]
pub struct Profile {
    console: Console,

    /// Alphabet in declaration order; order breaks longest-match ties
    names: Vec<(&'static str, Input)>,

    /// Dense button -> binding table
    bindings: [Option<Binding>; Button::COUNT],

    /// Buttons that must never be held all at once
    reset_combo: &'static [Button],
}

use Binding::{Analog, Digital, Trigger};
use Pole::{Negative, Positive};

const STICK: [(Button, Binding); 4] = [
    (Button::Left, Analog { axis: Axis::X, pole: Negative }),
    (Button::Right, Analog { axis: Axis::X, pole: Positive }),
    (Button::Up, Analog { axis: Axis::Y, pole: Negative }),
    (Button::Down, Analog { axis: Axis::Y, pole: Positive }),
];

const DPAD: [(Button, Binding); 4] = [
    (Button::DLeft, Digital { index: 15 }),
    (Button::DRight, Digital { index: 16 }),
    (Button::DUp, Digital { index: 17 }),
    (Button::DDown, Digital { index: 18 }),
];

const SNES_RESET: [Button; 4] = [Button::A, Button::B, Button::Select, Button::Start];

impl Profile {
    /// Build the profile for a console target
    pub fn for_console(console: Console) -> Self {
        match console {
            Console::Snes => Self::snes(),
            Console::N64 => Self::n64(),
            Console::GameCube => Self::gamecube(),
            Console::Wii => Self::wii(),
        }
    }

    fn build(
        console: Console,
        names: Vec<(&'static str, Input)>,
        entries: &[(Button, Binding)],
        reset_combo: &'static [Button],
    ) -> Self {
        let mut names = names;
        names.push(("#", Input::Wait));
        names.push((".", Input::Pause));

        let mut bindings = [None; Button::COUNT];
        for (button, binding) in entries {
            bindings[button.ordinal()] = Some(*binding);
        }

        Self {
            console,
            names,
            bindings,
            reset_combo,
        }
    }

    fn snes() -> Self {
        let names = named(&[
            Button::Left,
            Button::Right,
            Button::Up,
            Button::Down,
            Button::A,
            Button::B,
            Button::L,
            Button::R,
            Button::X,
            Button::Y,
            Button::Start,
            Button::Select,
        ]);
        let mut entries = STICK.to_vec();
        entries.extend([
            (Button::A, Digital { index: 5 }),
            (Button::B, Digital { index: 6 }),
            (Button::L, Digital { index: 7 }),
            (Button::R, Digital { index: 8 }),
            (Button::Start, Digital { index: 10 }),
            (Button::X, Digital { index: 31 }),
            (Button::Y, Digital { index: 32 }),
            (Button::Select, Digital { index: 33 }),
        ]);
        Self::build(Console::Snes, names, &entries, &SNES_RESET)
    }

    fn n64() -> Self {
        let names = named(&[
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
            Button::A,
            Button::B,
            Button::L,
            Button::R,
            Button::Z,
            Button::Start,
        ]);
        let mut entries = STICK.to_vec();
        entries.extend(DPAD);
        entries.extend([
            (Button::CLeft, Digital { index: 11 }),
            (Button::CRight, Digital { index: 12 }),
            (Button::CUp, Digital { index: 13 }),
            (Button::CDown, Digital { index: 14 }),
            (Button::A, Digital { index: 5 }),
            (Button::B, Digital { index: 6 }),
            (Button::L, Digital { index: 7 }),
            (Button::R, Digital { index: 8 }),
            (Button::Z, Digital { index: 9 }),
            (Button::Start, Digital { index: 10 }),
        ]);
        Self::build(Console::N64, names, &entries, &[])
    }

    fn gamecube() -> Self {
        let names = named(&[
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
            Button::A,
            Button::B,
            Button::L,
            Button::R,
            Button::X,
            Button::Y,
            Button::Z,
            Button::Start,
        ]);
        let mut entries = STICK.to_vec();
        entries.extend(DPAD);
        entries.extend([
            (Button::CLeft, Analog { axis: Axis::RX, pole: Negative }),
            (Button::CRight, Analog { axis: Axis::RX, pole: Positive }),
            (Button::CUp, Analog { axis: Axis::RY, pole: Negative }),
            (Button::CDown, Analog { axis: Axis::RY, pole: Positive }),
            (Button::A, Digital { index: 5 }),
            (Button::B, Digital { index: 6 }),
            (Button::L, Trigger { index: 7, axis: Axis::RZ }),
            (Button::R, Trigger { index: 8, axis: Axis::Z }),
            (Button::Z, Digital { index: 9 }),
            (Button::Start, Digital { index: 10 }),
            (Button::X, Digital { index: 31 }),
            (Button::Y, Digital { index: 32 }),
        ]);
        Self::build(Console::GameCube, names, &entries, &[])
    }

    fn wii() -> Self {
        let mut names = named(&[
            Button::Left,
            Button::Right,
            Button::Up,
            Button::Down,
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
            Button::One,
            Button::Two,
        ]);
        // The Wiimote's minus/plus sit where select/start do on other pads
        names.push(("minus", Input::Button(Button::Select)));
        names.push(("plus", Input::Button(Button::Start)));
        names.extend(named(&[Button::C, Button::Z, Button::Shake, Button::Point]));

        let mut entries = STICK.to_vec();
        entries.extend([
            (Button::PLeft, Analog { axis: Axis::RX, pole: Negative }),
            (Button::PRight, Analog { axis: Axis::RX, pole: Positive }),
            (Button::PUp, Analog { axis: Axis::RY, pole: Negative }),
            (Button::PDown, Analog { axis: Axis::RY, pole: Positive }),
            (Button::TLeft, Digital { index: 39 }),
            (Button::TRight, Digital { index: 40 }),
            (Button::TUp, Digital { index: 41 }),
            (Button::TDown, Digital { index: 42 }),
            (Button::A, Digital { index: 5 }),
            (Button::B, Digital { index: 6 }),
            (Button::One, Digital { index: 34 }),
            (Button::Two, Digital { index: 35 }),
            (Button::Select, Digital { index: 33 }),
            (Button::Start, Digital { index: 10 }),
            (Button::C, Digital { index: 36 }),
            (Button::Z, Digital { index: 9 }),
            (Button::Shake, Digital { index: 37 }),
            (Button::Point, Digital { index: 38 }),
        ]);
        Self::build(Console::Wii, names, &entries, &SNES_RESET)
    }

    /// The console this profile targets
    pub fn console(&self) -> Console {
        self.console
    }

    /// Every name the parser accepts, in declaration order
    pub fn valid_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names.iter().map(|(name, _)| *name)
    }

    /// Find the longest alphabet name `text` starts with.
    /// Ties go to the name declared first.
    pub fn match_longest(&self, text: &str) -> Option<(&'static str, Input)> {
        let mut best: Option<(&'static str, Input)> = None;
        for (name, input) in &self.names {
            if !text.starts_with(name) {
                continue;
            }
            if best.map_or(true, |(current, _)| name.len() > current.len()) {
                best = Some((*name, *input));
            }
        }
        best
    }

    /// Resolve a name to its input and classification
    pub fn resolve(&self, name: &str) -> Option<(Input, InputClass)> {
        let input = self
            .names
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, input)| *input)?;

        let class = match input {
            Input::Button(button) => match self.binding(button)? {
                Binding::Digital { .. } => InputClass::Digital,
                Binding::Analog { .. } => InputClass::Analog,
                Binding::Trigger { .. } => InputClass::Trigger,
            },
            Input::Wait | Input::Pause => InputClass::Meta,
            Input::Slot(_) => InputClass::Digital,
        };
        Some((input, class))
    }

    /// Physical binding of a button, if this console has it
    pub fn binding(&self, button: Button) -> Option<Binding> {
        self.bindings[button.ordinal()]
    }

    /// Device index pressed for a save/load slot
    pub fn slot_index(&self, action: SlotAction) -> Option<u32> {
        if action.slot == 0 || action.slot > PHYSICAL_SLOTS {
            return None;
        }
        let base = match action.kind {
            SlotKind::Save => SAVESTATE_BASE,
            SlotKind::Load => LOADSTATE_BASE,
        };
        Some(base + action.slot as u32 - 1)
    }

    /// Buttons guarded by the reset interlock (empty when the console has none)
    pub fn reset_combo(&self) -> &'static [Button] {
        self.reset_combo
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::snes()
    }
}

/// Alphabet entries for buttons known by their canonical name
fn named(buttons: &[Button]) -> Vec<(&'static str, Input)> {
    buttons
        .iter()
        .map(|button| (button.name(), Input::Button(*button)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL_CONSOLES: [Console; 4] = [Console::Snes, Console::N64, Console::GameCube, Console::Wii];

    #[test]
    fn test_console_from_str() {
        assert_eq!("SNES".parse::<Console>(), Ok(Console::Snes));
        assert_eq!("gamecube".parse::<Console>(), Ok(Console::GameCube));
        assert!("genesis".parse::<Console>().is_err());
    }

    #[test]
    fn test_every_name_has_a_binding() {
        for console in ALL_CONSOLES {
            let profile = Profile::for_console(console);
            for (name, input) in &profile.names {
                if let Input::Button(button) = input {
                    assert!(
                        profile.binding(*button).is_some(),
                        "{} has no binding on {}",
                        name,
                        console.name()
                    );
                }
            }
        }
    }

    #[test]
    fn test_no_duplicate_names() {
        for console in ALL_CONSOLES {
            let profile = Profile::for_console(console);
            let mut seen = HashSet::new();
            for name in profile.valid_names() {
                assert!(seen.insert(name), "duplicate name {}", name);
            }
        }
    }

    #[test]
    fn test_no_duplicate_digital_indices() {
        for console in ALL_CONSOLES {
            let profile = Profile::for_console(console);
            let mut seen = HashSet::new();
            for binding in profile.bindings.iter().flatten() {
                let index = match binding {
                    Binding::Digital { index } | Binding::Trigger { index, .. } => *index,
                    Binding::Analog { .. } => continue,
                };
                assert!(seen.insert(index), "index {} reused", index);
                assert!(index < SAVESTATE_BASE || index >= LOADSTATE_BASE + PHYSICAL_SLOTS as u32);
            }
        }
    }

    #[test]
    fn test_match_longest_prefers_longer_name() {
        let profile = Profile::for_console(Console::N64);
        let (name, input) = profile.match_longest("dleft200ms").unwrap();
        assert_eq!(name, "dleft");
        assert_eq!(input, Input::Button(Button::DLeft));

        let (name, _) = profile.match_longest("left").unwrap();
        assert_eq!(name, "left");
    }

    #[test]
    fn test_match_longest_none() {
        let profile = Profile::default();
        assert!(profile.match_longest("q").is_none());
        assert!(profile.match_longest("").is_none());
    }

    #[test]
    fn test_resolve_classification() {
        let profile = Profile::for_console(Console::GameCube);
        assert_eq!(
            profile.resolve("left"),
            Some((Input::Button(Button::Left), InputClass::Analog))
        );
        assert_eq!(
            profile.resolve("a"),
            Some((Input::Button(Button::A), InputClass::Digital))
        );
        assert_eq!(
            profile.resolve("l"),
            Some((Input::Button(Button::L), InputClass::Trigger))
        );
        assert_eq!(profile.resolve("#"), Some((Input::Wait, InputClass::Meta)));
        assert_eq!(profile.resolve("select"), None);
    }

    #[test]
    fn test_wii_minus_plus_are_select_start() {
        let profile = Profile::for_console(Console::Wii);
        assert_eq!(
            profile.resolve("plus").map(|(input, _)| input),
            Some(Input::Button(Button::Start))
        );
        assert_eq!(
            profile.resolve("minus").map(|(input, _)| input),
            Some(Input::Button(Button::Select))
        );
        assert_eq!(profile.reset_combo().len(), 4);
    }

    #[test]
    fn test_slot_index() {
        let profile = Profile::default();
        let save = |slot| SlotAction { kind: SlotKind::Save, slot };
        let load = |slot| SlotAction { kind: SlotKind::Load, slot };

        assert_eq!(profile.slot_index(save(1)), Some(19));
        assert_eq!(profile.slot_index(save(6)), Some(24));
        assert_eq!(profile.slot_index(load(1)), Some(25));
        assert_eq!(profile.slot_index(save(0)), None);
        assert_eq!(profile.slot_index(load(7)), None);
    }

    #[test]
    fn test_reset_combo_per_console() {
        assert_eq!(Profile::for_console(Console::Snes).reset_combo(), &SNES_RESET);
        assert!(Profile::for_console(Console::N64).reset_combo().is_empty());
    }
}
