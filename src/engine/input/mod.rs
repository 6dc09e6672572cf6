// Input macro language
//
// Turns chat text into command sequences for the controller engine.
//
// ## Architecture
//
// - `profile`: Console alphabets and their physical bindings
// - `sequence`: Tokens, simultaneous groups and command sequences
// - `macros`: Named macros with positional arguments
// - `preprocess`: Normalization, `[..]*N` repetition and synonyms
// - `parser`: Tokenizer enforcing syntax and timing limits
//
// ## Usage Example
//
// ```rust
// use crowdpad::engine::input::{InputParser, MacroTable, Preprocessor, Profile, Synonyms};
//
// let profile = Profile::default();
// let mut macros = MacroTable::new();
// macros.insert("#jump", "a200ms").unwrap();
// let synonyms = Synonyms::new();
//
// let text = Preprocessor::new(&macros, &synonyms).expand("#jump + b100ms");
// let sequence = InputParser::new(&profile).parse(&text).unwrap();
// assert_eq!(sequence.groups().len(), 1);
// ```

pub mod macros;
pub mod parser;
pub mod preprocess;
pub mod profile;
pub mod sequence;

// Re-export commonly used types
pub use macros::{MacroError, MacroTable};
pub use parser::{InputParser, ParseError, ParserLimits};
pub use preprocess::{Preprocessor, Synonyms};
pub use profile::{Axis, Binding, Button, Console, Input, InputClass, Pole, Profile, SlotAction, SlotKind};
pub use sequence::{CommandSequence, InputGroup, Token};
