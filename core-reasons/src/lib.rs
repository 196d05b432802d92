//! # Reason Persistence
//!
//! Stores and queries `Reason` records (a named, soft-enable label with a
//! creation stamp) through one repository contract and three interchangeable
//! backends.
//!
//! ## Overview
//!
//! - [`repositories::ReasonRepository`] is the contract every caller codes
//!   against.
//! - [`repositories::CommandReasonRepository`] executes hand-written
//!   positional statements through the `bridge-traits` storage capability.
//! - [`repositories::MappedReasonRepository`] binds `@Name` parameters from the
//!   entity's fields and maps rows back by column name.
//! - [`repositories::TrackedReasonRepository`] runs every call in a
//!   [`context::ReasonAppContext`] unit of work and pushes filtering and paging
//!   down to SQLite.
//!
//! For the same inputs the three backends return the same records, in the same
//! order, with the same totals.
//!
//! ## Schema
//!
//! A single `Reasons` table, created by the embedded migration. Call
//! [`db::migrate`] (or build a pool with [`db::create_pool`]) before first use.

pub mod adapters;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use context::{
    EntityState, QueryTrackingBehavior, ReasonAppContext, ReasonAppContextFactory, ReasonQuery,
};
pub use error::{ReasonError, Result};
pub use models::Reason;
pub use repositories::{
    ArticleSet, CommandReasonRepository, FilterOptions, MappedReasonRepository, PageRequest,
    ReasonRepository, TrackedReasonRepository,
};
