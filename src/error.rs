use thiserror::Error;

/// Outcome of a failed code generation attempt.
///
/// None of these reach the interpreter: a method whose compile fails simply
/// keeps running interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The method uses bytecode the generator cannot translate.
    #[error("unsupported bytecode: {0}")]
    UnsupportedBytecode(String),
    #[error("code generation failed: {0}")]
    GeneratorFailure(String),
    /// The result belongs to a generation that has since been superseded.
    #[error("stale compile result for generation {produced} (current {current})")]
    StaleGeneration { produced: u64, current: u64 },
    /// Code memory or a similar limit was hit; eviction makes room.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    /// Invariant violation; disables compilation for the engine's lifetime.
    #[error("fatal internal error: {0}")]
    FatalInternalError(String),
}

impl CompileError {
    /// Whether the failing method should be parked in `Failed`.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            CompileError::UnsupportedBytecode(_) | CompileError::GeneratorFailure(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("call threshold must be at least 1")]
    ZeroCallThreshold,
    #[error("verbosity level {0} is out of range (expected 0, 1 or 2)")]
    InvalidVerbosity(u8),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum JitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("JIT engine is already initialized")]
    AlreadyInitialized,
    #[error("JIT engine has been shut down")]
    ShutDown,
    #[error("custom compiler requested but none was registered")]
    MissingCustomCompiler,
    #[error("failed to create JIT artifact directory")]
    Artifacts(#[source] std::io::Error),
    #[error("failed to spawn compile worker")]
    WorkerSpawn(#[source] std::io::Error),
}
