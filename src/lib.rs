//! Method-level JIT compilation manager.
//!
//! The host VM reports calls and runtime events to a [`JitEngine`]; the engine
//! decides when to compile, keeps compiled code keyed by method, and throws it
//! away when the assumptions it was built on change. Code generation itself is
//! delegated to a [`CodeGenerator`].

pub mod config;
pub mod error;
pub mod runtime;
pub mod utils;

pub use config::JitConfig;
pub use error::{CompileError, ConfigError, JitError};
pub use runtime::jit::{
    CodeGenerator, CompileRequest, CompiledCode, InvalidationEvent, InvalidationReason, JitEngine,
    MethodId, NativeCode, NativeFunction, Optimization, OptimizationFlags,
};
pub use utils::logger::init_logging;
