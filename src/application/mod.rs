//! # Application Layer
//!
//! Ports to the outside world and the use cases that keep the vector index in
//! step with the primary store.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
