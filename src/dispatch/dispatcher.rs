//! Blocking waits on sets of expected completion events.

use super::callback::{CallbackSender, ComponentEvent, callback_channel};
use super::expected::ExpectedSet;
use crate::component::ComponentHandle;
use crate::error::ErrorCode;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Why a wait ended without every expectation being satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The deadline passed. Carries the still-pending expectations.
    Timeout(String),
    /// An awaited component reported an error.
    Component {
        /// The failing component.
        handle: ComponentHandle,
        /// Its error code.
        code: ErrorCode,
    },
}

/// Receives component callbacks and matches them against expectations.
///
/// The dispatcher is the single consumer of the callback channel. While a
/// wait is in progress, events that complete an expectation are consumed,
/// errors from an awaited component abort the wait, and everything the
/// graph still cares about (errors, end of stream, settings changes) is
/// deferred for later. Late completions nobody waits for are dropped.
pub struct EventDispatcher {
    receiver: kanal::Receiver<ComponentEvent>,
    sender: CallbackSender,
    deferred: VecDeque<ComponentEvent>,
}

impl EventDispatcher {
    /// Create a dispatcher with a fresh callback channel.
    pub fn new() -> Self {
        let (sender, receiver) = callback_channel();
        Self {
            receiver,
            sender,
            deferred: VecDeque::new(),
        }
    }

    /// A sender that components report to.
    pub fn callbacks(&self) -> CallbackSender {
        self.sender.clone()
    }

    /// Block until every expectation in `expected` is satisfied.
    ///
    /// Settings-changed events that arrived before the wait started are
    /// matched first, so a wait registered after a component already
    /// reported still completes.
    pub fn wait_for(
        &mut self,
        expected: &mut ExpectedSet,
        timeout: Duration,
    ) -> Result<(), WaitError> {
        self.wait(expected, timeout, true)
    }

    /// Like [`wait_for`](Self::wait_for), but errors from awaited components
    /// are deferred instead of ending the wait.
    ///
    /// For steps that must complete regardless, such as stopping a chain
    /// whose components may still report failures of the entry being torn
    /// down.
    pub fn wait_for_all(
        &mut self,
        expected: &mut ExpectedSet,
        timeout: Duration,
    ) -> Result<(), WaitError> {
        self.wait(expected, timeout, false)
    }

    fn wait(
        &mut self,
        expected: &mut ExpectedSet,
        timeout: Duration,
        abort_on_error: bool,
    ) -> Result<(), WaitError> {
        self.deferred.retain(|event| {
            !(matches!(event, ComponentEvent::PortSettingsChanged { .. })
                && expected.try_satisfy(event))
        });

        tracing::debug!(pending = expected.pending().count(), "Waiting for {}", expected);
        let deadline = Instant::now() + timeout;

        while !expected.is_satisfied() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(WaitError::Timeout(expected.to_string()));
            }

            let event = match self.receiver.recv_timeout(remaining) {
                Ok(event) => event,
                Err(kanal::ReceiveErrorTimeout::Timeout) => {
                    return Err(WaitError::Timeout(expected.to_string()));
                }
                // The dispatcher owns a sender, so the channel only closes
                // if someone closed it explicitly.
                Err(_) => return Err(WaitError::Timeout(expected.to_string())),
            };

            if expected.try_satisfy(&event) {
                tracing::trace!(%event, "Expected event");
                continue;
            }

            match event {
                ComponentEvent::Error { handle, code }
                    if abort_on_error && expected.contains_handle(handle) =>
                {
                    tracing::debug!(%handle, %code, "Awaited component failed");
                    return Err(WaitError::Component { handle, code });
                }
                ComponentEvent::Error { .. }
                | ComponentEvent::EndOfStream { .. }
                | ComponentEvent::PortSettingsChanged { .. } => {
                    tracing::trace!(%event, "Deferring event");
                    self.deferred.push_back(event);
                }
                other => tracing::trace!(event = %other, "Dropping unexpected completion"),
            }
        }

        Ok(())
    }

    /// Take the next error or end-of-stream notification without blocking.
    pub fn poll_notification(&mut self) -> Option<ComponentEvent> {
        if let Some(event) = self.take_deferred_notification() {
            return Some(event);
        }

        loop {
            match self.receiver.try_recv() {
                Ok(Some(event)) => {
                    if let Some(event) = self.route(event) {
                        return Some(event);
                    }
                }
                Ok(None) | Err(_) => return None,
            }
        }
    }

    /// Wait up to `timeout` for the next error or end-of-stream notification.
    pub fn next_notification(&mut self, timeout: Duration) -> Option<ComponentEvent> {
        if let Some(event) = self.take_deferred_notification() {
            return Some(event);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(event) => {
                    if let Some(event) = self.route(event) {
                        return Some(event);
                    }
                }
                Err(_) => return None,
            }
        }
    }

    /// Drop everything queued for `handle`, typically after destroying it.
    pub fn forget(&mut self, handle: ComponentHandle) {
        self.deferred.retain(|event| event.handle() != handle);
    }

    /// Drop everything `handles` reported so far, deferred or still queued
    /// in the channel. Returns how many events were dropped.
    ///
    /// Notifications and settings changes from other components are kept.
    pub fn discard_stale(&mut self, handles: &[ComponentHandle]) -> usize {
        let before = self.deferred.len();
        self.deferred.retain(|event| !handles.contains(&event.handle()));
        let mut dropped = before - self.deferred.len();

        while let Ok(Some(event)) = self.receiver.try_recv() {
            if handles.contains(&event.handle()) {
                tracing::trace!(%event, "Dropping stale event");
                dropped += 1;
            } else if let Some(event) = self.route(event) {
                self.deferred.push_back(event);
            }
        }
        dropped
    }

    /// Drop deferred settings changes. Returns how many were dropped.
    pub fn discard_port_settings(&mut self) -> usize {
        let before = self.deferred.len();
        self.deferred
            .retain(|event| !matches!(event, ComponentEvent::PortSettingsChanged { .. }));
        before - self.deferred.len()
    }

    /// Drop every deferred event.
    pub fn clear(&mut self) {
        self.deferred.clear();
    }

    /// Number of deferred events.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    fn take_deferred_notification(&mut self) -> Option<ComponentEvent> {
        let pos = self.deferred.iter().position(ComponentEvent::is_notification)?;
        self.deferred.remove(pos)
    }

    fn route(&mut self, event: ComponentEvent) -> Option<ComponentEvent> {
        match event {
            event if event.is_notification() => Some(event),
            event @ ComponentEvent::PortSettingsChanged { .. } => {
                self.deferred.push_back(event);
                None
            }
            other => {
                tracing::trace!(event = %other, "Dropping unexpected completion");
                None
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("queued", &self.receiver.len())
            .field("deferred", &self.deferred.len())
            .finish()
    }
}
