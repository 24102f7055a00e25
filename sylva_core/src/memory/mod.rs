//! Interaction memory - the persisted ledger that drift analysis reads.
//!
//! - **record**: One exchange, with ids and a UTC timestamp
//! - **ledger**: Ordered records plus an activity tally kept equal to them
//! - **store**: File persistence, retention, locking and corruption recovery

mod ledger;
mod record;
mod store;

pub use ledger::*;
pub use record::*;
pub use store::*;
