//! Country-aware routing decisions
//!
//! Pure functions only: nothing in here performs I/O or keeps state between
//! calls. Persisting the rotation cursor is the caller's job.

pub mod country;
pub mod rotation;

pub use country::{is_allowed, normalize_list};
pub use rotation::{next_candidate, next_candidate_by, Rotation, RotationCursor};
