pub mod asset;
pub mod holding;
pub mod idempotency;
pub mod investor;
pub mod order;
pub mod state_log;
pub mod trade;

pub use asset::*;
pub use holding::*;
pub use idempotency::*;
pub use investor::*;
pub use order::*;
pub use state_log::*;
pub use trade::*;
