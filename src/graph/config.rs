//! Graph and playback configuration.

use std::time::Duration;

/// Tuning for a [`GraphController`](super::GraphController).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tunnelgraph::graph::GraphConfig;
///
/// let config = GraphConfig::default()
///     .with_wait_timeout(Duration::from_secs(10))
///     .with_volume_step(10);
/// assert_eq!(config.volume_step, 10);
/// ```
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// How long a command step waits for its completion events.
    pub wait_timeout: Duration,

    /// Volume change per unit of a volume step, on a 0..=100 scale.
    pub volume_step: i32,

    /// Capacity of the graph event broadcast channel.
    pub event_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(5),
            volume_step: 5,
            event_capacity: 256,
        }
    }
}

impl GraphConfig {
    /// Short waits, for tests and in-process runtimes.
    pub fn fast() -> Self {
        Self {
            wait_timeout: Duration::from_secs(1),
            ..Default::default()
        }
    }

    /// Set the completion wait timeout.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set the volume step.
    pub fn with_volume_step(mut self, step: i32) -> Self {
        self.volume_step = step;
        self
    }

    /// Set the event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

/// What to play: an ordered list of URIs and whether to loop over it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// URIs in play order.
    pub uris: Vec<String>,
    /// Start over at the first entry after the last one ends.
    pub continuous: bool,
}

impl PlaybackConfig {
    /// Play `uris` once.
    pub fn new(uris: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            uris: uris.into_iter().map(Into::into).collect(),
            continuous: false,
        }
    }

    /// Loop over the playlist.
    pub fn continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }
}
