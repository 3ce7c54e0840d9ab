use std::fmt;
use std::sync::Arc;

/// Stable handle to one interpreted method's bytecode unit.
///
/// The interpreter owns the unit and picks the raw value; the JIT only uses it
/// as a cache key and never reuses one for an unrelated method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u64);

impl MethodId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method#{}", self.0)
    }
}

/// Machine code produced by a code generator for one method.
#[derive(Debug)]
pub struct NativeCode {
    entry: usize,
    size: usize,
    symbol: String,
}

impl NativeCode {
    pub fn new(entry: usize, size: usize, symbol: impl Into<String>) -> Self {
        Self {
            entry,
            size,
            symbol: symbol.into(),
        }
    }

    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Callable native entry point handed to the interpreter.
///
/// Cloning only bumps a reference count, so serving it from `lookup` never
/// allocates. Two handles compare equal when they share the same code.
#[derive(Debug, Clone)]
pub struct NativeFunction(Arc<NativeCode>);

impl NativeFunction {
    pub fn new(code: NativeCode) -> Self {
        Self(Arc::new(code))
    }

    pub fn code(&self) -> &NativeCode {
        &self.0
    }

    pub fn entry_address(&self) -> usize {
        self.0.entry
    }

    pub fn symbol(&self) -> &str {
        &self.0.symbol
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for NativeFunction {}
