//! Invalidation bus.
//!
//! Every runtime event that can break an assumption baked into compiled code
//! is expressed as one [`InvalidationEvent`]. The engine resolves the event to
//! a set of target methods and an [`InvalidationReason`], then applies it to
//! each entry under that entry's lock.

mod dependencies;

pub use dependencies::DependencyIndex;

use super::flags::Optimization;
use super::method::MethodId;

/// A VM basic operator (`+`, `<`, `[]`, ...) whose fast path compiled code may
/// inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BasicOperator(u16);

impl BasicOperator {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// A resolved method entry that compiled code dispatched to directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodEntryId(u64);

impl MethodEntryId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A constant name whose value compiled code embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantId(u64);

impl ConstantId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Runtime assumption a compiled method relies on, reported by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    BasicOperator(BasicOperator),
    MethodEntry(MethodEntryId),
    Constant(ConstantId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationEvent {
    /// A basic operator was redefined for the classes in `redefined_flag`.
    BasicOperatorRedefined {
        operator: BasicOperator,
        redefined_flag: u32,
    },
    MethodEntryInvalidated(MethodEntryId),
    /// An inline cache for instance variables saw a new object shape.
    InstanceVariableShapeChanged { method: MethodId, extended: bool },
    ConstantRedefined(ConstantId),
    /// A constant inline cache inside `method` was refilled.
    ConstantCacheUpdated { method: MethodId, insn_index: u32 },
    CallSiteSpecializationChanged { method: MethodId },
    InliningInvalidated { method: MethodId },
    /// The set of enabled tracing events changed; `events` is the new mask.
    TracingChanged { events: u32 },
    /// A parallel interpreter is about to start.
    BeforeParallelSpawn,
}

/// Why an entry is being invalidated; decides how its flags change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The optimization turned out to be unsafe for this method.
    OptimizationDisabled(Optimization),
    /// A dispatch target the code was specialized on went away.
    AssumptionBroken,
    TracingChanged,
    ParallelSpawn,
    Explicit,
}

impl InvalidationReason {
    pub fn disables(self) -> Option<Optimization> {
        match self {
            InvalidationReason::OptimizationDisabled(optimization) => Some(optimization),
            _ => None,
        }
    }
}

/// Methods an event applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Targets {
    All,
    Dependents(Dependency),
    Method(MethodId),
}

impl InvalidationEvent {
    pub fn targets(&self) -> Targets {
        match *self {
            InvalidationEvent::BasicOperatorRedefined { operator, .. } => {
                Targets::Dependents(Dependency::BasicOperator(operator))
            }
            InvalidationEvent::MethodEntryInvalidated(entry) => {
                Targets::Dependents(Dependency::MethodEntry(entry))
            }
            InvalidationEvent::ConstantRedefined(constant) => {
                Targets::Dependents(Dependency::Constant(constant))
            }
            InvalidationEvent::InstanceVariableShapeChanged { method, .. }
            | InvalidationEvent::ConstantCacheUpdated { method, .. }
            | InvalidationEvent::CallSiteSpecializationChanged { method }
            | InvalidationEvent::InliningInvalidated { method } => Targets::Method(method),
            InvalidationEvent::TracingChanged { .. } | InvalidationEvent::BeforeParallelSpawn => {
                Targets::All
            }
        }
    }

    pub fn reason(&self) -> InvalidationReason {
        match *self {
            InvalidationEvent::BasicOperatorRedefined { .. }
            | InvalidationEvent::CallSiteSpecializationChanged { .. } => {
                InvalidationReason::OptimizationDisabled(Optimization::SendCache)
            }
            InvalidationEvent::MethodEntryInvalidated(_) => InvalidationReason::AssumptionBroken,
            InvalidationEvent::InstanceVariableShapeChanged { extended: false, .. } => {
                InvalidationReason::OptimizationDisabled(Optimization::IvarCache)
            }
            InvalidationEvent::InstanceVariableShapeChanged { extended: true, .. } => {
                InvalidationReason::OptimizationDisabled(Optimization::ExivarCache)
            }
            InvalidationEvent::ConstantRedefined(_)
            | InvalidationEvent::ConstantCacheUpdated { .. } => {
                InvalidationReason::OptimizationDisabled(Optimization::ConstCache)
            }
            InvalidationEvent::InliningInvalidated { .. } => {
                InvalidationReason::OptimizationDisabled(Optimization::Inlining)
            }
            InvalidationEvent::TracingChanged { .. } => InvalidationReason::TracingChanged,
            InvalidationEvent::BeforeParallelSpawn => InvalidationReason::ParallelSpawn,
        }
    }
}
