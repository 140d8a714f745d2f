//! Profile storage: load + optimistic-concurrency update.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use fleetiq_core::{ExpectedRevision, Scope};

use crate::profile::WeightProfile;

/// Profile store operation error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProfileStoreError {
    #[error("no profile for scope {0}")]
    NotFound(Scope),

    /// Revision mismatch: another writer got there first. Reload and retry.
    #[error("revision conflict: {0}")]
    Conflict(String),

    #[error("invalid profile: {0}")]
    Invalid(String),

    /// Store unreachable. The only fatal condition in an evaluation cycle:
    /// scoring with a stale-beyond-policy profile is worse than skipping the
    /// cycle.
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Scoped weight-profile storage.
///
/// Updates are serialized per scope via optimistic concurrency: writers pass
/// the revision they read, and a moved revision rejects the write. Different
/// scopes never contend.
pub trait ProfileStore: Send + Sync {
    /// Load the current profile for a scope.
    fn load(&self, scope: &Scope) -> Result<WeightProfile, ProfileStoreError>;

    /// Compare-and-swap update. On success returns the stored profile with
    /// its advanced revision.
    fn update(
        &self,
        profile: WeightProfile,
        expected: ExpectedRevision,
    ) -> Result<WeightProfile, ProfileStoreError>;

    /// Administrative override: validate and store unconditionally (seeding,
    /// ops corrections). Still advances the revision.
    fn put(&self, profile: WeightProfile) -> Result<WeightProfile, ProfileStoreError>;
}

impl<S> ProfileStore for Arc<S>
where
    S: ProfileStore + ?Sized,
{
    fn load(&self, scope: &Scope) -> Result<WeightProfile, ProfileStoreError> {
        (**self).load(scope)
    }

    fn update(
        &self,
        profile: WeightProfile,
        expected: ExpectedRevision,
    ) -> Result<WeightProfile, ProfileStoreError> {
        (**self).update(profile, expected)
    }

    fn put(&self, profile: WeightProfile) -> Result<WeightProfile, ProfileStoreError> {
        (**self).put(profile)
    }
}

/// In-memory profile store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<Scope, WeightProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn load(&self, scope: &Scope) -> Result<WeightProfile, ProfileStoreError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| ProfileStoreError::Unavailable("lock poisoned".to_string()))?;
        profiles
            .get(scope)
            .cloned()
            .ok_or(ProfileStoreError::NotFound(*scope))
    }

    fn update(
        &self,
        profile: WeightProfile,
        expected: ExpectedRevision,
    ) -> Result<WeightProfile, ProfileStoreError> {
        profile
            .validate()
            .map_err(ProfileStoreError::Invalid)?;

        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| ProfileStoreError::Unavailable("lock poisoned".to_string()))?;

        let current = profiles
            .get(&profile.scope)
            .ok_or(ProfileStoreError::NotFound(profile.scope))?;

        if !expected.matches(current.revision()) {
            return Err(ProfileStoreError::Conflict(format!(
                "expected {expected:?}, found {}",
                current.revision()
            )));
        }

        let stored = profile.committed_at(current.revision() + 1);
        profiles.insert(stored.scope, stored.clone());
        Ok(stored)
    }

    fn put(&self, profile: WeightProfile) -> Result<WeightProfile, ProfileStoreError> {
        profile
            .validate()
            .map_err(ProfileStoreError::Invalid)?;

        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| ProfileStoreError::Unavailable("lock poisoned".to_string()))?;

        let next = profiles
            .get(&profile.scope)
            .map(|p| p.revision() + 1)
            .unwrap_or(1);
        let stored = profile.committed_at(next);
        profiles.insert(stored.scope, stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetiq_core::TenantId;

    fn seeded_store() -> (InMemoryProfileStore, Scope) {
        let store = InMemoryProfileStore::new();
        let scope = Scope::tenant(TenantId::new());
        store.put(WeightProfile::seed(scope)).unwrap();
        (store, scope)
    }

    #[test]
    fn put_then_load_round_trips() {
        let (store, scope) = seeded_store();
        let loaded = store.load(&scope).unwrap();
        assert_eq!(loaded.revision(), 1);
    }

    #[test]
    fn update_with_current_revision_advances_it() {
        let (store, scope) = seeded_store();
        let loaded = store.load(&scope).unwrap();
        let rev = loaded.revision();

        let stored = store
            .update(loaded, ExpectedRevision::Exact(rev))
            .unwrap();
        assert_eq!(stored.revision(), rev + 1);
    }

    #[test]
    fn stale_update_is_a_conflict() {
        let (store, scope) = seeded_store();
        let first = store.load(&scope).unwrap();
        let second = store.load(&scope).unwrap();

        store
            .update(first, ExpectedRevision::Exact(1))
            .unwrap();
        let err = store
            .update(second, ExpectedRevision::Exact(1))
            .unwrap_err();
        assert!(matches!(err, ProfileStoreError::Conflict(_)));
    }

    #[test]
    fn different_scopes_never_contend() {
        let store = InMemoryProfileStore::new();
        let a = Scope::tenant(TenantId::new());
        let b = Scope::tenant(TenantId::new());
        store.put(WeightProfile::seed(a)).unwrap();
        store.put(WeightProfile::seed(b)).unwrap();

        let pa = store.load(&a).unwrap();
        let pb = store.load(&b).unwrap();
        store.update(pa, ExpectedRevision::Exact(1)).unwrap();
        // b's revision is untouched by a's update.
        store.update(pb, ExpectedRevision::Exact(1)).unwrap();
    }

    #[test]
    fn load_of_unknown_scope_is_not_found() {
        let store = InMemoryProfileStore::new();
        let err = store.load(&Scope::tenant(TenantId::new())).unwrap_err();
        assert!(matches!(err, ProfileStoreError::NotFound(_)));
    }
}
