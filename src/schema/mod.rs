//! Table constraint schemas
//!
//! Constraints are fetched from the store's introspection function, cached
//! per table for a bounded time, and used to validate rows and column
//! references before any write.
//!
//! # Rules
//!
//! - Unknown columns are rejected
//! - NOT NULL columns never receive null
//! - CHECK enumerations are enforced; other CHECK expressions are left to the database
//! - Cached constraints are trusted until their TTL expires

mod cache;
mod check;
mod types;
mod validator;

pub use cache::{
    CacheLookup, Clock, ConstraintCache, ManualClock, SystemClock, DEFAULT_CACHE_TTL,
};
pub use check::{enumeration_members, matches_member};
pub use types::{CheckConstraint, TableConstraints};
pub use validator::ConstraintValidator;
