use std::sync::Arc;

use dashmap::DashMap;

use crate::{credentials::CredentialId, error::Result, presence::Status};

/// Per-credential status overrides, scoped to the credential's live session.
#[derive(Debug, Clone, Default)]
pub struct StatusOverrideStore {
    entries: Arc<DashMap<CredentialId, Status>>,
}

impl StatusOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `raw` and store it. `offline` is stored as `invisible`.
    /// On a parse error the store is left untouched.
    pub fn set(&self, id: CredentialId, raw: &str) -> Result<Status> {
        let status = validate(raw)?;
        self.entries.insert(id, status);
        Ok(status)
    }

    pub(crate) fn insert(&self, id: CredentialId, status: Status) {
        self.entries.insert(id, status.normalized());
    }

    pub fn get(&self, id: CredentialId) -> Option<Status> {
        self.entries.get(&id).map(|s| *s)
    }

    pub fn delete(&self, id: CredentialId) -> Option<Status> {
        self.entries.remove(&id).map(|(_, s)| s)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Validate an operator-supplied status for use as an override.
pub fn validate(raw: &str) -> Result<Status> {
    Ok(raw.parse::<Status>()?.normalized())
}

#[cfg(test)]
mod tests {
    use {super::*, crate::credentials::CredentialRegistry, crate::error::Error};

    fn ids() -> Vec<CredentialId> {
        CredentialRegistry::new(["a", "b"]).ids().collect()
    }

    #[test]
    fn test_set_get_delete() {
        let store = StatusOverrideStore::new();
        let ids = ids();
        assert_eq!(store.set(ids[0], "DND").unwrap(), Status::Dnd);
        assert_eq!(store.get(ids[0]), Some(Status::Dnd));
        assert_eq!(store.get(ids[1]), None);
        assert_eq!(store.delete(ids[0]), Some(Status::Dnd));
        assert!(store.is_empty());
    }

    #[test]
    fn test_offline_normalized_to_invisible() {
        let store = StatusOverrideStore::new();
        let id = ids()[0];
        assert_eq!(store.set(id, "offline").unwrap(), Status::Invisible);
        assert_eq!(store.get(id), Some(Status::Invisible));
    }

    #[test]
    fn test_invalid_status_leaves_store_unchanged() {
        let store = StatusOverrideStore::new();
        let id = ids()[0];
        store.set(id, "idle").unwrap();
        assert!(matches!(store.set(id, "sleepy"), Err(Error::InvalidStatus(_))));
        assert_eq!(store.get(id), Some(Status::Idle));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let store = StatusOverrideStore::new();
        let other = store.clone();
        let id = ids()[1];
        store.set(id, "idle").unwrap();
        assert_eq!(other.get(id), Some(Status::Idle));
        other.clear();
        assert!(store.is_empty());
    }
}
