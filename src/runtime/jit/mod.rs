// Method JIT manager
pub mod artifacts;
pub mod backend;
pub mod cache;
pub mod engine;
pub mod flags;
pub mod invalidation;
pub mod method;
pub mod metrics;
pub mod trigger;
pub mod worker;

pub use backend::{CodeGenerator, CompileRequest, CompiledCode};
pub use cache::{CacheStats, EntrySnapshot, EntryState, EvictionPolicy, LruEvictionPolicy, StateKind};
pub use engine::{JitEngine, ManagerState};
pub use flags::{Optimization, OptimizationFlags};
pub use invalidation::{
    BasicOperator, ConstantId, Dependency, InvalidationEvent, InvalidationReason, MethodEntryId,
};
pub use method::{MethodId, NativeCode, NativeFunction};
pub use metrics::JitStatsSnapshot;
