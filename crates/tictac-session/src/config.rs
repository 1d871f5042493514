//! Binder configuration.

use std::time::Duration;

/// Settings for a [`SessionBinder`](crate::SessionBinder).
#[derive(Debug, Clone)]
pub struct BinderConfig {
    /// How long after the client is suspended the "come back" reminder
    /// fires. Resuming before then cancels it.
    pub reminder_after: Duration,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            reminder_after: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binder_config_default() {
        assert_eq!(BinderConfig::default().reminder_after, Duration::from_secs(60));
    }
}
