//! Domain models for the group roster.
//!
//! # Core Concepts
//!
//! - [`Individual`]: a registered student still looking for a group. Deleted
//!   when the student is absorbed into a group.
//! - [`Group`]: a roster of one to [`MAX_GROUP_SIZE`] [`Member`]s with its
//!   remaining capacity.
//! - [`StudentState`]: the single lookup every flow branches on.
//!
//! A student id appears in at most one of these places at any time.

mod group;
mod individual;
mod member;
mod report;
mod student;

pub use group::*;
pub use individual::*;
pub use member::*;
pub use report::*;
pub use student::*;
