// crowdpad: crowd-driven virtual game controllers
//
// Chat text is expanded (macros, repetition, synonyms), parsed into timed
// input groups and executed concurrently against virtual controllers.

pub mod chat;
pub mod core;
pub mod engine;
