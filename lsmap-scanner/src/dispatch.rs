use crate::record::ResolvedAddress;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// Addresses already handed to a harvest worker during this run.
///
/// The set only grows. `try_insert` is the single way in, so each address
/// wins exactly one insertion no matter how many callers race for it.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: RwLock<HashSet<ResolvedAddress>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `addr`, returning true only for the caller that inserted it
    pub fn try_insert(&self, addr: &ResolvedAddress) -> bool {
        {
            let seen = self.seen.read().unwrap_or_else(PoisonError::into_inner);
            if seen.contains(addr) {
                return false;
            }
        }

        // Another caller may have inserted between the two locks
        let mut seen = self.seen.write().unwrap_or_else(PoisonError::into_inner);
        seen.insert(*addr)
    }

    pub fn contains(&self, addr: &ResolvedAddress) -> bool {
        self.seen
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(addr)
    }

    pub fn len(&self) -> usize {
        self.seen.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
