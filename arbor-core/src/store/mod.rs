//! GraphStore trait definition
//!
//! The narrow persistence interface the engine talks to. Two implementations:
//! - [`InMemoryGraphStore`]: `tokio::sync::RwLock` maps, used by tests and the
//!   `memory` storage backend
//! - [`PgGraphStore`]: PostgreSQL via sqlx
//!
//! Both enforce the unordered-pair uniqueness of branches themselves, so a caller
//! that loses a race gets [`BranchWrite::Conflict`] instead of a duplicate edge.

use async_trait::async_trait;

use crate::error::ArborError;
use crate::models::{
    Branch, BranchFilter, BranchPatch, BranchWrite, Fragment, FragmentFilters, FragmentPatch,
    NewBranch, NewFragment,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryGraphStore;
pub use postgres::PgGraphStore;

pub type StoreResult<T> = Result<T, ArborError>;

#[async_trait]
pub trait GraphStore: Send + Sync {
    // ========================================================================
    // Fragment operations
    // ========================================================================

    /// An owner's fragments matching `filters`, newest first
    async fn find_fragments(&self, owner_id: &str, filters: &FragmentFilters)
        -> StoreResult<Vec<Fragment>>;

    /// A fragment by id, only if owned by `owner_id`
    async fn find_fragment_by_id(&self, id: &str, owner_id: &str) -> StoreResult<Option<Fragment>>;

    async fn create_fragment(&self, owner_id: &str, fragment: NewFragment) -> StoreResult<Fragment>;

    /// Apply `patch`; `NotFound` if absent or not owned
    async fn update_fragment(
        &self,
        id: &str,
        owner_id: &str,
        patch: &FragmentPatch,
    ) -> StoreResult<Fragment>;

    /// Delete a fragment and every branch incident to it
    async fn delete_fragment(&self, id: &str, owner_id: &str) -> StoreResult<()>;

    // ========================================================================
    // Branch operations
    // ========================================================================

    /// Branches with an endpoint owned by `filter.involving_owner`, newest first
    async fn find_branches(&self, filter: &BranchFilter) -> StoreResult<Vec<Branch>>;

    /// A branch by id, only if one of its endpoints is owned by `owner_id`
    async fn find_branch_by_id(&self, id: &str, owner_id: &str) -> StoreResult<Option<Branch>>;

    /// Whether a branch joins `a` and `b` in either direction
    async fn branch_exists(&self, a: &str, b: &str) -> StoreResult<bool>;

    /// Insert a branch. Self-loops are `InvalidInput`; an existing pair is `Conflict`.
    async fn create_branch(&self, branch: NewBranch) -> StoreResult<BranchWrite>;

    async fn update_branch(&self, id: &str, patch: &BranchPatch) -> StoreResult<Branch>;

    async fn delete_branch(&self, id: &str) -> StoreResult<()>;

    /// Backend description when reachable, for health output
    async fn health(&self) -> StoreResult<String>;

    /// Backend name for logging and health output
    fn name(&self) -> &str;
}
