//! # Sylva Catalog
//!
//! The "bible" crate - holds the fixed subsystem enumeration, the metaphor
//! archetypes, and the static pools SYLVA answers from. Everything here is
//! immutable once loaded and contains no routing or generation logic.

pub mod archetype;
pub mod catalog;
pub mod error;
pub mod subsystem;

pub use archetype::*;
pub use catalog::*;
pub use error::*;
pub use subsystem::*;
