//! Identity Registry
//!
//! The loaded identity list. Reload installs a whole new snapshot; readers
//! keep whichever snapshot they already hold.

use crate::domain::entities::Identity;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug)]
pub struct IdentityRegistry {
    current: RwLock<Arc<[Identity]>>,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl IdentityRegistry {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self {
            current: RwLock::new(identities.into()),
        }
    }

    /// Current list. Cheap; later installs do not affect the returned slice.
    pub fn snapshot(&self) -> Arc<[Identity]> {
        self.current.read().clone()
    }

    /// Replace the list, returning the previous one
    pub fn install(&self, identities: Vec<Identity>) -> Arc<[Identity]> {
        let next: Arc<[Identity]> = identities.into();
        std::mem::replace(&mut *self.current.write(), next)
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }
}
