//! The dangerous-action gate.
//!
//! Dangerous operations (`unlock`, `force_unlock`) override the execution
//! engine's own locking. The gate is the explicit opt-in for them: it is
//! plain configuration handed to the control plane at construction, so tests
//! and deployments set it deterministically instead of reading ambient
//! global state.

/// Environment variable enabling dangerous actions.
pub const ENV_ALLOW_DANGEROUS_ACTIONS: &str = "CAPSTAN_ALLOW_DANGEROUS_ACTIONS";

/// Whether dangerous-category operations are allowed in this process.
///
/// Closed by default. Read-only to the control plane; only construction or
/// external configuration decides its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DangerousActionGate {
    allowed: bool,
}

impl DangerousActionGate {
    /// A gate that allows dangerous actions.
    #[must_use]
    pub const fn open() -> Self {
        Self { allowed: true }
    }

    /// A gate that rejects dangerous actions.
    #[must_use]
    pub const fn closed() -> Self {
        Self { allowed: false }
    }

    /// Loads the gate from the process environment.
    ///
    /// The gate opens only when [`ENV_ALLOW_DANGEROUS_ACTIONS`] is literally
    /// `true` (case-insensitive); anything else, including an unset variable,
    /// leaves it closed.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads the gate with a custom environment source.
    ///
    /// This entry point is test-friendly and accepts a key lookup function.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let allowed = get_env(ENV_ALLOW_DANGEROUS_ACTIONS)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        Self { allowed }
    }

    /// Returns true if dangerous-category operations may proceed.
    #[must_use]
    pub const fn is_dangerous_action_allowed(&self) -> bool {
        self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gate_is_closed() {
        assert!(!DangerousActionGate::default().is_dangerous_action_allowed());
        assert!(!DangerousActionGate::closed().is_dangerous_action_allowed());
        assert!(DangerousActionGate::open().is_dangerous_action_allowed());
    }

    #[test]
    fn env_opens_gate_only_on_true() {
        let open = DangerousActionGate::from_env_with(|_| Some("TRUE".into()));
        assert!(open.is_dangerous_action_allowed());

        let closed = DangerousActionGate::from_env_with(|_| Some("yes".into()));
        assert!(!closed.is_dangerous_action_allowed());

        let unset = DangerousActionGate::from_env_with(|_| None);
        assert!(!unset.is_dangerous_action_allowed());
    }
}
