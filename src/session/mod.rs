// src/session/mod.rs — Dual-track question session

pub mod accumulator;
pub mod handle;
pub mod machine;
pub mod observer;
pub mod types;

pub use accumulator::ChunkAccumulator;
pub use handle::SessionHandle;
pub use machine::SessionMachine;
pub use observer::SubscriptionId;
pub use types::{Session, SessionStatus};
