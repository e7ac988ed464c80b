//! `rhythm_core`
//!
//! Client-side resource management for the rhythm game.
//!
//! Design goals:
//! - One serialized lane per manager: catalog updates and switch requests
//!   never interleave their release/construct steps.
//! - Wholesale replacement of shared state (`current`, `catalog`) so readers
//!   always observe a complete value.
//! - Traits at every external boundary (decoders, catalog stores, audio
//!   output) for dependency injection.
//! - No `unsafe`.

pub mod catalog;
pub mod chart;
pub mod config;
pub mod manager;
pub mod node;
pub mod observer;
pub mod settings;
pub mod skin;
pub mod working;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::catalog::*;
    pub use crate::config::*;
    pub use crate::manager::*;
    pub use crate::observer::*;
    pub use crate::working::*;
}
