use std::path::PathBuf;

use super::flags::OptimizationFlags;
use super::invalidation::Dependency;
use super::method::{MethodId, NativeFunction};
use crate::error::CompileError;

/// Everything the generator needs to translate one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    pub method: MethodId,
    pub flags: OptimizationFlags,
    /// Generation of the entry at the time the compile was started.
    pub generation: u64,
    /// Tracing events the code must report; 0 means none.
    pub trace_events: u32,
    pub debug: bool,
    pub dump_disasm: bool,
    pub debug_flags: Option<String>,
    /// Where the generator may leave temporary files.
    pub artifact_dir: Option<PathBuf>,
}

/// Successful generator output.
#[derive(Debug, Clone)]
pub struct CompiledCode {
    pub function: NativeFunction,
    /// Assumptions the code relies on; used to route invalidations.
    pub dependencies: Vec<Dependency>,
}

impl CompiledCode {
    pub fn new(function: NativeFunction) -> Self {
        Self {
            function,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// External native code generator.
///
/// Implementations must not call back into the engine: `compile` may run on
/// the background worker while the interpreter thread holds engine locks.
pub trait CodeGenerator: Send + Sync {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledCode, CompileError>;

    /// Frees the code behind `function`. Called once it can no longer be
    /// returned by `lookup`.
    fn release(&self, _function: &NativeFunction) {}

    fn name(&self) -> &str {
        "codegen"
    }
}
