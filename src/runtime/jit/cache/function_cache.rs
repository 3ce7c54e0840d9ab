use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use super::{CompileEntry, EntryState, StateKind};
use crate::runtime::jit::method::{MethodId, NativeFunction};

pub type SharedEntry = Arc<Mutex<CompileEntry>>;

/// Table of compile entries keyed by method.
///
/// The table lock only guards insertion and removal; everything about a
/// single method is guarded by that entry's own mutex. Lock order is always
/// table, then entry.
pub struct FunctionCache {
    entries: RwLock<AHashMap<MethodId, SharedEntry>>,
}

impl FunctionCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
        }
    }

    pub fn get(&self, method: MethodId) -> Option<SharedEntry> {
        self.entries.read().get(&method).cloned()
    }

    /// Returns the entry for `method`, creating it with `generation` on first use.
    pub fn get_or_insert_with<F>(&self, method: MethodId, generation: F) -> SharedEntry
    where
        F: FnOnce() -> u64,
    {
        if let Some(entry) = self.get(method) {
            return entry;
        }
        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(method)
                .or_insert_with(|| Arc::new(Mutex::new(CompileEntry::new(method, generation())))),
        )
    }

    /// Currently callable code for `method`.
    ///
    /// Never waits: if the table or the entry is locked by someone else the
    /// caller simply runs the method interpreted this time.
    pub fn lookup(&self, method: MethodId) -> Option<NativeFunction> {
        let entries = self.entries.try_read()?;
        let entry = entries.get(&method)?.try_lock()?;
        entry.state.callable().cloned()
    }

    pub fn remove(&self, method: MethodId) -> Option<SharedEntry> {
        self.entries.write().remove(&method)
    }

    /// Removes every entry, handing them back for cleanup.
    pub fn drain(&self) -> Vec<(MethodId, SharedEntry)> {
        self.entries.write().drain().collect()
    }

    pub fn entries(&self) -> Vec<(MethodId, SharedEntry)> {
        self.entries
            .read()
            .iter()
            .map(|(method, entry)| (*method, Arc::clone(entry)))
            .collect()
    }

    pub fn ids_in_state(&self, kind: StateKind) -> AHashSet<MethodId> {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.lock().state.kind() == kind)
            .map(|(method, _)| *method)
            .collect()
    }

    pub fn compiled_ids(&self) -> AHashSet<MethodId> {
        self.ids_in_state(StateKind::Compiled)
    }

    pub fn contains(&self, method: MethodId) -> bool {
        self.entries.read().contains_key(&method)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        let mut stats = CacheStats {
            total_entries: entries.len(),
            ..CacheStats::default()
        };
        for entry in entries.values() {
            let entry = entry.lock();
            match entry.state {
                EntryState::NotCompiled => stats.not_compiled += 1,
                EntryState::Compiling { .. } => stats.compiling += 1,
                EntryState::Compiled(ref function) => {
                    stats.compiled += 1;
                    stats.code_bytes += function.code().size();
                }
                EntryState::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

impl Default for FunctionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub not_compiled: usize,
    pub compiling: usize,
    pub compiled: usize,
    pub failed: usize,
    pub code_bytes: usize,
}
