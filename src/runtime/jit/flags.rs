use serde::{Deserialize, Serialize};

/// Speculative optimizations the generator may rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimization {
    /// Instance-variable access through the object shape inline cache.
    IvarCache,
    /// Instance-variable access on objects with external ivar tables.
    ExivarCache,
    /// Method dispatch through call-site inline caches.
    SendCache,
    /// Inlining of callee bodies.
    Inlining,
    /// Embedding constant values read through constant inline caches.
    ConstCache,
}

impl Optimization {
    pub const ALL: [Optimization; 5] = [
        Optimization::IvarCache,
        Optimization::ExivarCache,
        Optimization::SendCache,
        Optimization::Inlining,
        Optimization::ConstCache,
    ];
}

/// Which optimizations are switched off for a method.
///
/// An entry's flags only ever become more restrictive: once an assumption has
/// been broken for a method, it is not speculated on again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptimizationFlags {
    pub disable_ivar_cache: bool,
    pub disable_exivar_cache: bool,
    pub disable_send_cache: bool,
    pub disable_inlining: bool,
    pub disable_const_cache: bool,
}

impl OptimizationFlags {
    pub const fn all_enabled() -> Self {
        Self {
            disable_ivar_cache: false,
            disable_exivar_cache: false,
            disable_send_cache: false,
            disable_inlining: false,
            disable_const_cache: false,
        }
    }

    pub fn is_enabled(&self, optimization: Optimization) -> bool {
        !*self.slot(optimization)
    }

    /// Disables `optimization`, returning whether anything changed.
    pub fn disable(&mut self, optimization: Optimization) -> bool {
        let slot = self.slot_mut(optimization);
        let changed = !*slot;
        *slot = true;
        changed
    }

    pub fn with_disabled(mut self, optimization: Optimization) -> Self {
        self.disable(optimization);
        self
    }

    /// Unions the disabled sets, returning whether `self` changed.
    pub fn merge(&mut self, other: Self) -> bool {
        Optimization::ALL
            .iter()
            .filter(|opt| !other.is_enabled(**opt))
            .fold(false, |changed, opt| self.disable(*opt) | changed)
    }

    pub fn disabled(&self) -> impl Iterator<Item = Optimization> + '_ {
        Optimization::ALL
            .into_iter()
            .filter(move |opt| !self.is_enabled(*opt))
    }

    fn slot(&self, optimization: Optimization) -> &bool {
        match optimization {
            Optimization::IvarCache => &self.disable_ivar_cache,
            Optimization::ExivarCache => &self.disable_exivar_cache,
            Optimization::SendCache => &self.disable_send_cache,
            Optimization::Inlining => &self.disable_inlining,
            Optimization::ConstCache => &self.disable_const_cache,
        }
    }

    fn slot_mut(&mut self, optimization: Optimization) -> &mut bool {
        match optimization {
            Optimization::IvarCache => &mut self.disable_ivar_cache,
            Optimization::ExivarCache => &mut self.disable_exivar_cache,
            Optimization::SendCache => &mut self.disable_send_cache,
            Optimization::Inlining => &mut self.disable_inlining,
            Optimization::ConstCache => &mut self.disable_const_cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_reports_change_once() {
        let mut flags = OptimizationFlags::all_enabled();
        assert!(flags.disable(Optimization::ConstCache));
        assert!(!flags.disable(Optimization::ConstCache));
        assert!(!flags.is_enabled(Optimization::ConstCache));
        assert!(flags.is_enabled(Optimization::SendCache));
    }

    #[test]
    fn merge_never_reenables() {
        let mut flags = OptimizationFlags::default().with_disabled(Optimization::IvarCache);
        let other = OptimizationFlags::default().with_disabled(Optimization::Inlining);

        assert!(flags.merge(other));
        assert!(!flags.merge(OptimizationFlags::all_enabled()));
        assert_eq!(
            flags.disabled().collect::<Vec<_>>(),
            vec![Optimization::IvarCache, Optimization::Inlining]
        );
    }
}
