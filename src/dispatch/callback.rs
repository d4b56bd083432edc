//! Notifications components send back to the graph.

use crate::component::{ComponentHandle, LifecycleState, ParamIndex, PortIndex};
use crate::error::ErrorCode;
use std::fmt;

/// Asynchronous notification emitted by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentEvent {
    /// A state change command completed.
    StateChanged {
        /// Component that changed state.
        handle: ComponentHandle,
        /// New state.
        state: LifecycleState,
    },

    /// A port disable command completed.
    PortDisabled {
        /// Component owning the port.
        handle: ComponentHandle,
        /// Port number.
        port: PortIndex,
    },

    /// A port enable command completed.
    PortEnabled {
        /// Component owning the port.
        handle: ComponentHandle,
        /// Port number.
        port: PortIndex,
    },

    /// A port's settings changed (e.g. after format detection or an
    /// upstream parameter change).
    PortSettingsChanged {
        /// Component owning the port.
        handle: ComponentHandle,
        /// Port number.
        port: PortIndex,
        /// The parameter that changed.
        index: ParamIndex,
    },

    /// The component failed.
    Error {
        /// Failing component.
        handle: ComponentHandle,
        /// Failure code.
        code: ErrorCode,
    },

    /// The component reached the end of its stream.
    EndOfStream {
        /// Component at end of stream.
        handle: ComponentHandle,
        /// Port the end of stream was seen on.
        port: PortIndex,
    },
}

impl ComponentEvent {
    /// The component that emitted the event.
    pub fn handle(&self) -> ComponentHandle {
        match self {
            Self::StateChanged { handle, .. }
            | Self::PortDisabled { handle, .. }
            | Self::PortEnabled { handle, .. }
            | Self::PortSettingsChanged { handle, .. }
            | Self::Error { handle, .. }
            | Self::EndOfStream { handle, .. } => *handle,
        }
    }

    /// Whether this is an error or end-of-stream notification, the events
    /// routed to recovery when nobody is waiting for them.
    pub fn is_notification(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::EndOfStream { .. })
    }
}

impl fmt::Display for ComponentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateChanged { handle, state } => write!(f, "{handle} -> {state}"),
            Self::PortDisabled { handle, port } => write!(f, "{handle} port {port} disabled"),
            Self::PortEnabled { handle, port } => write!(f, "{handle} port {port} enabled"),
            Self::PortSettingsChanged {
                handle,
                port,
                index,
            } => write!(f, "{handle} port {port} settings changed ({index:?})"),
            Self::Error { handle, code } => write!(f, "{handle} error: {code}"),
            Self::EndOfStream { handle, port } => write!(f, "{handle} EOS on port {port}"),
        }
    }
}

/// Sending half of the callback channel.
///
/// Handed to the runtime at instantiation; cheap to clone and usable from
/// any thread.
#[derive(Clone)]
pub struct CallbackSender {
    sender: kanal::Sender<ComponentEvent>,
}

impl CallbackSender {
    pub(crate) fn new(sender: kanal::Sender<ComponentEvent>) -> Self {
        Self { sender }
    }

    /// Send an event.
    ///
    /// Returns `false` if the graph side has gone away, which is fine
    /// during teardown.
    pub fn send(&self, event: ComponentEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Report a completed state change.
    pub fn state_changed(&self, handle: ComponentHandle, state: LifecycleState) -> bool {
        self.send(ComponentEvent::StateChanged { handle, state })
    }

    /// Report a completed port command.
    pub fn port_command_complete(
        &self,
        handle: ComponentHandle,
        port: PortIndex,
        enabled: bool,
    ) -> bool {
        if enabled {
            self.send(ComponentEvent::PortEnabled { handle, port })
        } else {
            self.send(ComponentEvent::PortDisabled { handle, port })
        }
    }

    /// Report changed port settings.
    pub fn port_settings_changed(
        &self,
        handle: ComponentHandle,
        port: PortIndex,
        index: ParamIndex,
    ) -> bool {
        self.send(ComponentEvent::PortSettingsChanged {
            handle,
            port,
            index,
        })
    }

    /// Report an error.
    pub fn error(&self, handle: ComponentHandle, code: ErrorCode) -> bool {
        self.send(ComponentEvent::Error { handle, code })
    }

    /// Report end of stream.
    pub fn end_of_stream(&self, handle: ComponentHandle, port: PortIndex) -> bool {
        self.send(ComponentEvent::EndOfStream { handle, port })
    }
}

impl fmt::Debug for CallbackSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSender")
            .field("queued", &self.sender.len())
            .finish()
    }
}

/// Create a callback channel.
pub fn callback_channel() -> (CallbackSender, kanal::Receiver<ComponentEvent>) {
    let (tx, rx) = kanal::unbounded();
    (CallbackSender::new(tx), rx)
}
