// Engine modules: input language and controller execution

pub mod controller;
pub mod input;
