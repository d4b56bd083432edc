//! Playlist cursor.

use super::config::PlaybackConfig;

/// Ordered URIs with a cursor and a continuous-playback flag.
///
/// The cursor may sit one past the last entry: skip clamps to the length,
/// and the next execute wraps back to the first entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    uris: Vec<String>,
    continuous: bool,
    cursor: usize,
}

impl Playlist {
    /// A playlist positioned at its first entry.
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            uris: config.uris,
            continuous: config.continuous,
            cursor: 0,
        }
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.uris.len()
    }

    /// Whether the playlist has no entries.
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    /// Whether playback loops.
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// URI under the cursor, if the cursor is within bounds.
    pub fn current(&self) -> Option<&str> {
        self.uris.get(self.cursor).map(String::as_str)
    }

    /// Whether the cursor points at an entry.
    pub fn has_current(&self) -> bool {
        self.cursor < self.uris.len()
    }

    /// Move to the next entry. The cursor may end up past the end.
    pub fn advance(&mut self) {
        self.cursor = self.cursor.saturating_add(1);
    }

    /// Move by `offset`, clamped to `[0, len]`.
    pub fn skip(&mut self, offset: i64) {
        let len = self.uris.len() as i64;
        let target = (self.cursor as i64).saturating_add(offset);
        self.cursor = target.clamp(0, len) as usize;
    }

    /// Put a cursor that is past the end back on the first entry.
    ///
    /// Returns whether it wrapped.
    pub fn wrap(&mut self) -> bool {
        if self.cursor >= self.uris.len() {
            self.cursor = 0;
            true
        } else {
            false
        }
    }
}
