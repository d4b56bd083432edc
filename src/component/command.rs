//! Component handles and the commands a graph sends to components.

use super::param::PortIndex;
use super::state::LifecycleState;
use std::fmt;

/// Opaque handle to a live component instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentHandle(pub u64);

impl fmt::Display for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.0)
    }
}

/// Asynchronous command sent to a component.
///
/// Every command completes with a notification on the callback channel the
/// component was instantiated with, either a completion or an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Move to a new lifecycle state.
    SetState(LifecycleState),
    /// Disable a port.
    DisablePort(PortIndex),
    /// Enable a port.
    EnablePort(PortIndex),
}

impl Command {
    /// Port enable/disable command for `port`.
    pub fn port(port: PortIndex, enable: bool) -> Self {
        if enable {
            Self::EnablePort(port)
        } else {
            Self::DisablePort(port)
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetState(state) => write!(f, "SetState({state})"),
            Self::DisablePort(port) => write!(f, "DisablePort({port})"),
            Self::EnablePort(port) => write!(f, "EnablePort({port})"),
        }
    }
}
