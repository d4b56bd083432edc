//! Upward notifications from the graph.
//!
//! The graph reports terminal errors, end of play and progress through a
//! [`NotificationSink`]. [`EventSender`] is the stock sink: it broadcasts
//! [`GraphEvent`]s that any number of [`EventReceiver`]s can await.

use crate::component::{AudioCoding, GraphState};
use crate::error::ErrorCode;
use std::fmt;
use tokio::sync::broadcast;

/// Stream properties announced when an entry starts playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// URI of the entry.
    pub uri: String,
    /// Coding of the stream.
    pub coding: AudioCoding,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u32,
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {} Hz, {} ch]",
            self.uri, self.coding, self.sample_rate, self.channels
        )
    }
}

/// Receives what the graph reports upward.
///
/// Only errors and end of play are required; the rest default to no-ops.
pub trait NotificationSink: Send + Sync {
    /// Playback of the current entry ended with an error.
    fn notify_graph_error(&self, code: ErrorCode, message: &str);

    /// The playlist finished.
    fn notify_end_of_play(&self);

    /// The nominal graph state changed.
    fn notify_state_changed(&self, state: GraphState) {
        let _ = state;
    }

    /// Playback of a playlist entry is starting.
    fn notify_entry_started(&self, index: usize, uri: &str) {
        let _ = (index, uri);
    }

    /// The current entry is being retried with another alternate.
    fn notify_retry(&self, attempt: u32, alternate: usize) {
        let _ = (attempt, alternate);
    }

    /// Stream properties of the entry now playing.
    fn notify_stream_info(&self, info: &StreamInfo) {
        let _ = info;
    }

    /// A metadata item read from the stream.
    fn notify_metadata(&self, key: &str, value: &str) {
        let _ = (key, value);
    }
}

/// Events broadcast by [`EventSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// Nominal state changed.
    StateChanged(GraphState),
    /// An entry is starting.
    EntryStarted {
        /// Playlist index.
        index: usize,
        /// URI of the entry.
        uri: String,
    },
    /// The entry is retried with another alternate.
    Retry {
        /// Attempt number, starting at 1 for the first retry.
        attempt: u32,
        /// Alternate now selected.
        alternate: usize,
    },
    /// Stream properties.
    StreamInfo(StreamInfo),
    /// Stream metadata item.
    Metadata {
        /// Key.
        key: String,
        /// Value.
        value: String,
    },
    /// Terminal error for the current entry.
    Error {
        /// Error code.
        code: ErrorCode,
        /// Description.
        message: String,
    },
    /// End of the playlist.
    EndOfPlay,
}

impl fmt::Display for GraphEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphEvent::StateChanged(state) => write!(f, "State: {state}"),
            GraphEvent::EntryStarted { index, uri } => write!(f, "Entry {index}: {uri}"),
            GraphEvent::Retry { attempt, alternate } => {
                write!(f, "Retry {attempt} with alternate {alternate}")
            }
            GraphEvent::StreamInfo(info) => write!(f, "Stream {info}"),
            GraphEvent::Metadata { key, value } => write!(f, "{key}: {value}"),
            GraphEvent::Error { code, message } => write!(f, "Error ({code}): {message}"),
            GraphEvent::EndOfPlay => write!(f, "End of play"),
        }
    }
}

/// Sender for graph events.
#[derive(Clone)]
pub struct EventSender {
    sender: broadcast::Sender<GraphEvent>,
}

impl EventSender {
    /// Create a new event sender with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event.
    ///
    /// Returns the number of receivers that got it, 0 if there are none.
    pub fn send(&self, event: GraphEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Create a receiver for events.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Create a stream of events.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }
}

impl Default for EventSender {
    fn default() -> Self {
        Self::new(256)
    }
}

impl fmt::Debug for EventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

impl NotificationSink for EventSender {
    fn notify_graph_error(&self, code: ErrorCode, message: &str) {
        self.send(GraphEvent::Error {
            code,
            message: message.to_string(),
        });
    }

    fn notify_end_of_play(&self) {
        self.send(GraphEvent::EndOfPlay);
    }

    fn notify_state_changed(&self, state: GraphState) {
        self.send(GraphEvent::StateChanged(state));
    }

    fn notify_entry_started(&self, index: usize, uri: &str) {
        self.send(GraphEvent::EntryStarted {
            index,
            uri: uri.to_string(),
        });
    }

    fn notify_retry(&self, attempt: u32, alternate: usize) {
        self.send(GraphEvent::Retry { attempt, alternate });
    }

    fn notify_stream_info(&self, info: &StreamInfo) {
        self.send(GraphEvent::StreamInfo(info.clone()));
    }

    fn notify_metadata(&self, key: &str, value: &str) {
        self.send(GraphEvent::Metadata {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
}

/// Receiver for graph events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<GraphEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<GraphEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Graph event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&mut self) -> Option<GraphEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Drain every event available right now.
    pub fn drain(&mut self) -> Vec<GraphEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Wait for end of play or a terminal error.
    ///
    /// Returns `Ok(())` on end of play, `Err(message)` on error.
    pub async fn wait_end_of_play(&mut self) -> Result<(), String> {
        while let Some(event) = self.recv().await {
            match event {
                GraphEvent::EndOfPlay => return Ok(()),
                GraphEvent::Error { code, message } => return Err(format!("{code}: {message}")),
                _ => continue,
            }
        }
        Err("Event channel closed unexpectedly".to_string())
    }
}

/// A stream adapter for receiving events.
pub struct EventStream {
    receiver: EventReceiver,
}

impl EventStream {
    /// Create a new event stream from a receiver.
    pub fn new(receiver: EventReceiver) -> Self {
        Self { receiver }
    }
}

impl futures::Stream for EventStream {
    type Item = GraphEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let fut = self.receiver.recv();
        tokio::pin!(fut);
        fut.poll(cx)
    }
}
