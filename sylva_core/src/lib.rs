//! # Sylva Core
//!
//! The reasoning half of SYLVA. This crate reads the immutable
//! `sylva_catalog`, decides which symbolic subsystem answers a statement,
//! builds the response, and keeps the interaction ledger that drift
//! analysis reads from.
//!
//! ## Core Components
//!
//! - **router**: Deterministic keyword scoring with a crisis override
//! - **generator**: Archetype selection, templated text, and the safety filter
//! - **memory**: Append-only, file-locked interaction ledger with retention
//! - **drift**: Recent-vs-history subsystem distributions behind `/pulse`
//! - **session**: The turn boundary that turns every failure into a safe answer
//!
//! ## Design Philosophy
//!
//! - **Explainable**: Routing is a scoring function whose every point can be listed
//! - **Reproducible**: All randomness comes from an injected seeded source
//! - **Contained**: A turn always yields a non-empty response and a subsystem label

pub mod config;
pub mod drift;
pub mod error;
pub mod generator;
pub mod memory;
pub mod router;
pub mod session;

pub use config::*;
pub use drift::*;
pub use error::*;
pub use generator::*;
pub use memory::*;
pub use router::*;
pub use session::*;

pub use sylva_catalog::{Archetype, ArchetypeId, CatalogError, MetaphorCatalog, Subsystem};
