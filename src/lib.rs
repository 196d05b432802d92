//! Workspace facade crate.
//!
//! Re-exports the reason persistence surface so host applications can depend
//! on `reason-workspace` alone instead of wiring each crate individually.

#[cfg(feature = "service")]
pub use core_reasons::{
    ArticleSet, FilterOptions, PageRequest, Reason, ReasonError, ReasonRepository,
};
#[cfg(feature = "service")]
pub use core_runtime::{ContextLifetime, ReasonsConfig, RepositoryMode};
#[cfg(feature = "service")]
pub use core_service::{add_reason_services, CoreError, ReasonServices};
