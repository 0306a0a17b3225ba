pub mod turn_gate;

pub use turn_gate::{TurnGate, TurnPermit};
