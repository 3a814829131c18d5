use std::time::Duration;

/// How often the idle timeout is checked while armed.
pub const DEFAULT_IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Tunables for a [`MessageQueue`](crate::MessageQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Interval between idle-timeout checks. Default: 1 s.
    pub idle_check_interval: Duration,
    /// Abort after this many consecutive unanswered pings.
    /// `None` keeps probing forever. Default: `None`.
    pub max_unanswered_pings: Option<u32>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            idle_check_interval: DEFAULT_IDLE_CHECK_INTERVAL,
            max_unanswered_pings: None,
        }
    }
}
