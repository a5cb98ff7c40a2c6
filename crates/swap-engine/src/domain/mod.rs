//! # Domain Module
//!
//! Core domain types for cross-ledger swaps.

pub mod config;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod requests;
pub mod value_objects;

pub use config::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use requests::*;
pub use value_objects::*;
