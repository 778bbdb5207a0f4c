//! Lock key derivation.

use std::fmt;

/// Prefix shared by every drain lock unless overridden in settings.
pub const DEFAULT_LOCK_KEY_PREFIX: &str = "drainer:command:execute:";

/// Key of the distributed lock guarding one logical source.
///
/// Derived only from the prefix and the source identity, so every process
/// draining the same source contends on the same key. Keeping distinct
/// sources apart is up to the identities they report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey(String);

impl LockKey {
    pub fn new(prefix: &str, identity: &str) -> Self {
        Self(format!("{prefix}{identity}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic_per_identity() {
        let key = |identity| LockKey::new(DEFAULT_LOCK_KEY_PREFIX, identity);
        assert_eq!(key("orders"), key("orders"));
        assert_ne!(key("orders"), key("invoices"));
        assert_eq!(
            key("orders").as_str(),
            "drainer:command:execute:orders"
        );
    }

    #[test]
    fn custom_prefix() {
        let key = LockKey::new("billing:", "refunds");
        assert_eq!(key.to_string(), "billing:refunds");
    }
}
