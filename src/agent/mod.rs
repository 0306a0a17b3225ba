//! Conversation driving: persona, turn controller and reply translation.

pub mod persona;
pub mod translate;
pub mod turn;

pub use persona::Persona;
pub use translate::Translator;
pub use turn::{GenerationSettings, TurnController, TurnError, TurnOutcome};
