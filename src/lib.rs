//! Track students forming project groups of bounded size.
//!
//! Students register as individuals looking for a group, found groups from
//! a pasted roster, and move between groups. [`engine::MembershipEngine`]
//! enforces that every student is in at most one place at a time and that
//! no group ever exceeds [`models::MAX_GROUP_SIZE`].

pub mod api;
pub mod codec;
pub mod config;
pub mod db;
pub mod engine;
pub mod identity;
pub mod models;
pub mod query;
pub mod render;
