//! Reactions to asynchronous errors and end of stream.

use super::controller::GraphController;
use crate::component::ComponentHandle;
use crate::dispatch::ComponentEvent;
use crate::error::{Error, ErrorCode, Result};
use std::time::Duration;

impl GraphController {
    /// Handle an error reported by a component.
    ///
    /// Format detection and corrupt stream failures are retried with the
    /// next alternate while the entry has budget left; anything else ends
    /// the entry and is reported to the notification sinks.
    pub fn on_error(&mut self, handle: ComponentHandle, code: ErrorCode) -> Result<()> {
        let Some(component) = self.core.chain().by_handle(handle).map(|c| c.name.clone()) else {
            tracing::debug!(%handle, %code, "Error from a component no longer in the chain");
            return Ok(());
        };
        if !self.is_playing() {
            tracing::warn!(%component, %code, state = %self.core.state(), "Ignoring error while stopped");
            return Ok(());
        }

        tracing::warn!(%component, %code, "Component error");
        self.recover(Error::from_code(component, code))
    }

    /// Handle end of stream reported by a component.
    ///
    /// Only the renderer's end of stream finishes an entry. The cursor
    /// advances and the next entry plays, wrapping around for continuous
    /// playlists; past the last entry of a one-shot playlist the graph stops
    /// and reports end of play.
    pub fn on_end_of_stream(&mut self, handle: ComponentHandle) -> Result<()> {
        if self.core.chain().terminal() != Some(handle) {
            tracing::trace!(%handle, "Ignoring end of stream from a non-terminal component");
            return Ok(());
        }
        if !self.is_playing() {
            tracing::debug!(state = %self.core.state(), "Ignoring end of stream while stopped");
            return Ok(());
        }

        self.core.playlist.advance();
        let playlist = self.core.playlist();
        let next = playlist.is_continuous() || playlist.has_current();
        tracing::debug!(cursor = playlist.cursor(), next, "End of stream");

        self.core.teardown_to_loaded();
        self.ops.reset_chain(&mut self.core)?;
        self.core.start_entry();
        if next {
            self.run_entry()
        } else {
            tracing::info!("End of playlist");
            self.core.notify(|s| s.notify_end_of_play());
            Ok(())
        }
    }

    /// Retry the current entry with alternates until it plays, the error is
    /// not recoverable, or the alternates are used up.
    pub(super) fn recover(&mut self, mut err: Error) -> Result<()> {
        loop {
            let budget = self.ops.alternates() as u32;
            if !err.is_recoverable() || self.core.attempts() >= budget {
                return Err(self.fail(err));
            }

            tracing::warn!(%err, attempt = self.core.attempts(), budget, "Retrying entry");
            self.core.teardown_to_loaded();
            self.core.discard_stale();
            self.core.destroy_chain();
            let alternate = self.ops.select_next_alternate();
            let attempt = self.core.attempts();
            self.core.notify(|s| s.notify_retry(attempt, alternate));

            let rebuilt = self
                .ops
                .load_source(&mut self.core)
                .and_then(|()| self.ops.link(&mut self.core));
            if let Err(e) = rebuilt {
                return Err(self.fail(e));
            }
            match self.attempt() {
                Ok(()) => return Ok(()),
                Err(e) => err = e,
            }
        }
    }

    /// End the current entry with `err`: stop the chain and report once.
    fn fail(&mut self, err: Error) -> Error {
        tracing::error!(%err, cursor = self.core.playlist().cursor(), "Playback failed");
        self.core.teardown_to_loaded();
        if let Err(e) = self.ops.reset_chain(&mut self.core) {
            tracing::warn!(%e, "Failed to reset chain");
        }
        let (code, message) = (err.code(), err.to_string());
        self.core.notify(|s| s.notify_graph_error(code, &message));
        err
    }

    // ========================================================================
    // Notification pump
    // ========================================================================

    /// Handle every pending error and end-of-stream notification without
    /// blocking. Returns how many were handled.
    pub fn process_notifications(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(event) = self.core.dispatcher_mut().poll_notification() {
            self.handle_notification(event)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Wait up to `timeout` for one notification and handle it.
    ///
    /// Returns whether one arrived.
    pub fn wait_notification(&mut self, timeout: Duration) -> Result<bool> {
        match self.core.dispatcher_mut().next_notification(timeout) {
            Some(event) => {
                self.handle_notification(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Handle notifications until none arrives for `quiet`.
    ///
    /// Never returns while components keep reporting, e.g. a continuous
    /// playlist of entries that end immediately.
    pub fn drain_notifications(&mut self, quiet: Duration) -> Result<usize> {
        let mut handled = 0;
        while self.wait_notification(quiet)? {
            handled += 1;
        }
        Ok(handled)
    }

    fn handle_notification(&mut self, event: ComponentEvent) -> Result<()> {
        match event {
            ComponentEvent::Error { handle, code } => self.on_error(handle, code),
            ComponentEvent::EndOfStream { handle, .. } => self.on_end_of_stream(handle),
            other => {
                tracing::trace!(event = %other, "Not a notification");
                Ok(())
            }
        }
    }
}
