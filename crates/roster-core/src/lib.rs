//! Core types and trait definitions for the roster replica subsystem.
//!
//! This crate is free of HTTP, filesystem, and database dependencies. It
//! holds the central-store domain model, the [`store::CentralStore`]
//! abstraction, the authorization policy, and the pure translation functions
//! between central and replica representations.

pub mod attendance;
pub mod error;
pub mod guard;
pub mod roster;
pub mod store;
pub mod teacher;
pub mod translate;

pub use error::{Error, Result};
