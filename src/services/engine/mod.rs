pub mod state_machine;
pub mod workflow;

pub use workflow::{EngineError, OrderEngine};
