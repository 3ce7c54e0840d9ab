// Compile unit registry
pub mod eviction;
pub mod function_cache;
pub mod metadata;

pub use eviction::{EvictionPolicy, LruEvictionPolicy};
pub use function_cache::{CacheStats, FunctionCache};
pub use metadata::CacheMetadata;

use super::flags::OptimizationFlags;
use super::method::{MethodId, NativeFunction};

/// Compile state of one method.
#[derive(Debug, Clone)]
pub enum EntryState {
    NotCompiled,
    /// Queued or in flight. During a recompile the previous code stays
    /// callable as `fallback` until the new code lands.
    Compiling { fallback: Option<NativeFunction> },
    Compiled(NativeFunction),
    /// Not compiled again unless an invalidation turns an optimization off.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    NotCompiled,
    Compiling,
    Compiled,
    Failed,
}

impl EntryState {
    pub fn kind(&self) -> StateKind {
        match self {
            EntryState::NotCompiled => StateKind::NotCompiled,
            EntryState::Compiling { .. } => StateKind::Compiling,
            EntryState::Compiled(_) => StateKind::Compiled,
            EntryState::Failed => StateKind::Failed,
        }
    }

    /// Code the interpreter may call right now.
    pub fn callable(&self) -> Option<&NativeFunction> {
        match self {
            EntryState::Compiled(function) => Some(function),
            EntryState::Compiling { fallback } => fallback.as_ref(),
            EntryState::NotCompiled | EntryState::Failed => None,
        }
    }

    /// Moves any held code out, leaving the state untouched otherwise.
    pub(crate) fn take_code(&mut self) -> Option<NativeFunction> {
        match self {
            EntryState::Compiled(_) => {
                match std::mem::replace(self, EntryState::NotCompiled) {
                    EntryState::Compiled(function) => Some(function),
                    _ => None,
                }
            }
            EntryState::Compiling { fallback } => fallback.take(),
            EntryState::NotCompiled | EntryState::Failed => None,
        }
    }
}

/// Cache entry for one method
#[derive(Debug)]
pub struct CompileEntry {
    method: MethodId,
    pub(crate) state: EntryState,
    pub(crate) call_count: u64,
    pub(crate) flags: OptimizationFlags,
    pub(crate) generation: u64,
    pub(crate) metadata: CacheMetadata,
}

impl CompileEntry {
    pub fn new(method: MethodId, generation: u64) -> Self {
        Self {
            method,
            state: EntryState::NotCompiled,
            call_count: 0,
            flags: OptimizationFlags::default(),
            generation,
            metadata: CacheMetadata::new(),
        }
    }

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn state(&self) -> &EntryState {
        &self.state
    }

    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    pub fn flags(&self) -> OptimizationFlags {
        self.flags
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            method: self.method,
            state: self.state.kind(),
            call_count: self.call_count,
            flags: self.flags,
            generation: self.generation,
            has_code: self.state.callable().is_some(),
            compile_count: self.metadata.compile_count,
        }
    }
}

/// Point-in-time copy of an entry for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub method: MethodId,
    pub state: StateKind,
    pub call_count: u64,
    pub flags: OptimizationFlags,
    pub generation: u64,
    pub has_code: bool,
    pub compile_count: u32,
}
