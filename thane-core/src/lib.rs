//! Shared data model and external-collaborator traits for Thane.
//!
//! This crate has no behavior of its own: it is the vocabulary every
//! other subsystem crate (`router`, `scheduler`, `metacognitive`,
//! `signal-bridge`, `mqtt-publisher`) builds on, plus the trait
//! boundaries for collaborators that live outside this repository's
//! scope (the agent runtime, the various persistent stores, the
//! dashboard).

pub mod collaborators;
pub mod model;
pub mod routing;
pub mod signal;
pub mod task;
pub mod token;

pub use collaborators::*;
pub use model::*;
pub use routing::*;
pub use signal::*;
pub use task::*;
pub use token::*;
