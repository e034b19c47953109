//! In-memory GraphStore.
//!
//! Backed by `tokio::sync::RwLock<HashMap<K, V>>` collections. Locks are always
//! taken fragments-then-branches. Branch rows and the pair index live under one
//! lock so the uniqueness check and the insert are atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{GraphStore, StoreResult};
use crate::error::ArborError;
use crate::models::{
    canonical_pair, Branch, BranchFilter, BranchPatch, BranchWrite, Fragment, FragmentFilters,
    FragmentPatch, NewBranch, NewFragment,
};

#[derive(Default)]
struct BranchTable {
    rows: HashMap<String, Branch>,
    /// canonical (min, max) pair -> branch id
    pairs: HashMap<(String, String), String>,
}

impl BranchTable {
    fn remove(&mut self, id: &str) -> Option<Branch> {
        let branch = self.rows.remove(id)?;
        self.pairs.remove(&branch.pair_key());
        Some(branch)
    }
}

#[derive(Default)]
pub struct InMemoryGraphStore {
    fragments: RwLock<HashMap<String, Fragment>>,
    branches: RwLock<BranchTable>,
    branch_inserts: AtomicUsize,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Seeding helpers for tests
    // ========================================================================

    /// Insert a fully-formed fragment, keeping its id and timestamps.
    pub async fn seed_fragment(&self, fragment: Fragment) {
        self.fragments
            .write()
            .await
            .insert(fragment.id.clone(), fragment);
    }

    /// Insert a fully-formed branch, bypassing validation. Replaces any branch on
    /// the same pair.
    pub async fn seed_branch(&self, branch: Branch) {
        let mut table = self.branches.write().await;
        if let Some(old) = table.pairs.insert(branch.pair_key(), branch.id.clone()) {
            table.rows.remove(&old);
        }
        table.rows.insert(branch.id.clone(), branch);
    }

    pub async fn branch_count(&self) -> usize {
        self.branches.read().await.rows.len()
    }

    /// Number of `create_branch` calls received, successful or not.
    pub fn branch_insert_attempts(&self) -> usize {
        self.branch_inserts.load(Ordering::SeqCst)
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (chrono::DateTime<Utc>, &str),
{
    items.sort_by(|a, b| {
        let (ta, ia) = key(a);
        let (tb, ib) = key(b);
        tb.cmp(&ta).then_with(|| ia.cmp(ib))
    });
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn find_fragments(
        &self,
        owner_id: &str,
        filters: &FragmentFilters,
    ) -> StoreResult<Vec<Fragment>> {
        let fragments = self.fragments.read().await;
        let mut found: Vec<Fragment> = fragments
            .values()
            .filter(|f| f.owner_id == owner_id && filters.matches(f))
            .cloned()
            .collect();
        newest_first(&mut found, |f| (f.created_at, f.id.as_str()));
        if let Some(limit) = filters.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn find_fragment_by_id(&self, id: &str, owner_id: &str) -> StoreResult<Option<Fragment>> {
        let fragments = self.fragments.read().await;
        Ok(fragments
            .get(id)
            .filter(|f| f.owner_id == owner_id)
            .cloned())
    }

    async fn create_fragment(&self, owner_id: &str, fragment: NewFragment) -> StoreResult<Fragment> {
        fragment.validate()?;
        let now = Utc::now();
        let created = Fragment {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            content: fragment.content,
            fragment_type: fragment.fragment_type,
            tags: fragment.tags,
            mood: fragment.mood,
            metadata: fragment.metadata,
            created_at: fragment.created_at.unwrap_or(now),
            updated_at: now,
        };
        self.fragments
            .write()
            .await
            .insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update_fragment(
        &self,
        id: &str,
        owner_id: &str,
        patch: &FragmentPatch,
    ) -> StoreResult<Fragment> {
        patch.validate()?;
        let mut fragments = self.fragments.write().await;
        let fragment = fragments
            .get_mut(id)
            .filter(|f| f.owner_id == owner_id)
            .ok_or_else(|| ArborError::NotFound("Fragment not found".into()))?;
        patch.apply(fragment, Utc::now());
        Ok(fragment.clone())
    }

    async fn delete_fragment(&self, id: &str, owner_id: &str) -> StoreResult<()> {
        let mut fragments = self.fragments.write().await;
        match fragments.get(id) {
            Some(f) if f.owner_id == owner_id => {}
            _ => return Err(ArborError::NotFound("Fragment not found".into())),
        }
        fragments.remove(id);

        let mut table = self.branches.write().await;
        let incident: Vec<String> = table
            .rows
            .values()
            .filter(|b| b.touches(id))
            .map(|b| b.id.clone())
            .collect();
        for branch_id in incident {
            table.remove(&branch_id);
        }
        Ok(())
    }

    async fn find_branches(&self, filter: &BranchFilter) -> StoreResult<Vec<Branch>> {
        let fragments = self.fragments.read().await;
        let table = self.branches.read().await;
        let owned = |fragment_id: &str| {
            fragments
                .get(fragment_id)
                .map(|f| f.owner_id == filter.involving_owner)
                .unwrap_or(false)
        };

        let mut found: Vec<Branch> = table
            .rows
            .values()
            .filter(|b| (owned(&b.source_id) || owned(&b.target_id)) && filter.matches(b))
            .cloned()
            .collect();
        newest_first(&mut found, |b| (b.created_at, b.id.as_str()));
        if let Some(limit) = filter.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn find_branch_by_id(&self, id: &str, owner_id: &str) -> StoreResult<Option<Branch>> {
        let fragments = self.fragments.read().await;
        let table = self.branches.read().await;
        let owned = |fragment_id: &str| {
            fragments
                .get(fragment_id)
                .map(|f| f.owner_id == owner_id)
                .unwrap_or(false)
        };
        Ok(table
            .rows
            .get(id)
            .filter(|b| owned(&b.source_id) || owned(&b.target_id))
            .cloned())
    }

    async fn branch_exists(&self, a: &str, b: &str) -> StoreResult<bool> {
        let table = self.branches.read().await;
        Ok(table.pairs.contains_key(&canonical_pair(a, b)))
    }

    async fn create_branch(&self, branch: NewBranch) -> StoreResult<BranchWrite> {
        self.branch_inserts.fetch_add(1, Ordering::SeqCst);
        branch.validate()?;

        let fragments = self.fragments.read().await;
        for endpoint in [&branch.source_id, &branch.target_id] {
            if !fragments.contains_key(endpoint) {
                return Err(ArborError::NotFound(format!(
                    "Fragment {} not found",
                    endpoint
                )));
            }
        }

        let mut table = self.branches.write().await;
        let key = canonical_pair(&branch.source_id, &branch.target_id);
        if table.pairs.contains_key(&key) {
            return Ok(BranchWrite::Conflict);
        }

        let now = Utc::now();
        let created = Branch {
            id: Uuid::new_v4().to_string(),
            source_id: branch.source_id,
            target_id: branch.target_id,
            branch_type: branch.branch_type,
            weight: branch.weight,
            metadata: branch.metadata,
            created_at: now,
            updated_at: now,
        };
        table.pairs.insert(key, created.id.clone());
        table.rows.insert(created.id.clone(), created.clone());
        Ok(BranchWrite::Created(created))
    }

    async fn update_branch(&self, id: &str, patch: &BranchPatch) -> StoreResult<Branch> {
        patch.validate()?;
        let mut table = self.branches.write().await;
        let branch = table
            .rows
            .get_mut(id)
            .ok_or_else(|| ArborError::NotFound("Connection not found".into()))?;
        patch.apply(branch, Utc::now());
        Ok(branch.clone())
    }

    async fn delete_branch(&self, id: &str) -> StoreResult<()> {
        let mut table = self.branches.write().await;
        table
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ArborError::NotFound("Connection not found".into()))
    }

    async fn health(&self) -> StoreResult<String> {
        let fragments = self.fragments.read().await.len();
        let branches = self.branches.read().await.rows.len();
        Ok(format!("in-memory ({} fragments, {} branches)", fragments, branches))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
