// src/lib.rs — Library root for dualqa

pub mod api;
pub mod cli;
pub mod feedback;
pub mod infra;
pub mod session;
pub mod transport;
