//! Error types for tunnelgraph.

use crate::component::LifecycleState;
use crate::component::param::AudioCoding;
use thiserror::Error;

/// Result type alias using tunnelgraph's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Error codes reported by a component runtime.
///
/// These travel inside asynchronous error notifications and in the
/// synchronous return values of runtime calls.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The component could not detect the format of its input.
    #[error("format not detected")]
    FormatNotDetected,
    /// The input stream is corrupt.
    #[error("stream corrupt")]
    StreamCorrupt,
    /// The component ran out of resources.
    #[error("insufficient resources")]
    InsufficientResources,
    /// No component with the requested name is registered.
    #[error("component not found")]
    ComponentNotFound,
    /// Unknown or stale component handle.
    #[error("bad handle")]
    BadHandle,
    /// A parameter was rejected.
    #[error("bad parameter")]
    BadParameter,
    /// The component does not support the requested parameter index.
    #[error("unsupported index")]
    UnsupportedIndex,
    /// The requested state transition is not allowed from the current state.
    #[error("incorrect state transition")]
    IncorrectStateTransition,
    /// The content URI could not be opened or does not match the chain.
    #[error("content URI error")]
    ContentUriError,
    /// The ports of a tunnel are not compatible.
    #[error("ports not compatible")]
    PortsNotCompatible,
    /// The component has no more items to report (e.g. metadata by index).
    #[error("no more items")]
    NoMore,
    /// A wait for completion events timed out.
    #[error("timeout")]
    Timeout,
    /// The encoding revealed by a source is not supported by the graph.
    #[error("unsupported encoding")]
    UnsupportedEncoding,
    /// Any other failure.
    #[error("undefined error")]
    Undefined,
}

impl ErrorCode {
    /// Whether errors with this code may be recovered by retrying with an
    /// alternate chain.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::FormatNotDetected | Self::StreamCorrupt)
    }

    /// Whether the code names a failure kind of its own in [`Error`] rather
    /// than being wrapped in the context of the failing request.
    pub fn lifts_directly(self) -> bool {
        matches!(
            self,
            Self::FormatNotDetected | Self::StreamCorrupt | Self::InsufficientResources
        )
    }
}

/// Main error type for graph operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A required component is not registered with the runtime.
    #[error("component not found: {name}")]
    ComponentNotFound {
        /// Component name.
        name: String,
    },

    /// A component does not expose the role the chain requires.
    #[error("component '{name}' does not provide role '{role}'")]
    RoleMismatch {
        /// Component name.
        name: String,
        /// Required role.
        role: String,
    },

    /// The runtime could not allocate what a request needed.
    #[error("resources exhausted: {0}")]
    ResourceExhausted(String),

    /// A component rejected or failed to confirm a lifecycle change.
    #[error("component '{component}' failed to transition to {to:?}: {code}")]
    TransitionFailed {
        /// Component name.
        component: String,
        /// Target state.
        to: LifecycleState,
        /// Runtime code.
        code: ErrorCode,
    },

    /// A port command or parameter exchange failed.
    #[error("port negotiation failed on '{component}' port {port}: {reason}")]
    PortNegotiationFailed {
        /// Component name.
        component: String,
        /// Port index.
        port: u32,
        /// Failure description.
        reason: String,
    },

    /// A component could not detect the format of its input.
    #[error("format not detected by '{component}'")]
    FormatNotDetected {
        /// Component name.
        component: String,
    },

    /// A component reported a corrupt stream.
    #[error("stream corrupt in '{component}'")]
    StreamCorrupt {
        /// Component name.
        component: String,
    },

    /// A component reported any other error.
    #[error("component '{component}' error: {code}")]
    Component {
        /// Component name.
        component: String,
        /// Runtime code.
        code: ErrorCode,
    },

    /// The current URI cannot be played by this graph.
    #[error("content URI error for '{uri}': {reason}")]
    ContentUri {
        /// The URI.
        uri: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A network source revealed an encoding the graph cannot decode.
    #[error("unsupported encoding: {0:?}")]
    UnsupportedEncoding(AudioCoding),

    /// Expected completion events did not arrive in time.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// The command is not valid in the current graph state.
    #[error("{command} not allowed in state {state}")]
    InvalidState {
        /// The rejected command.
        command: &'static str,
        /// The current graph state.
        state: String,
    },

    /// The playback configuration has no entries.
    #[error("playlist is empty")]
    EmptyPlaylist,

    /// The chain has no component in the requested role.
    #[error("no component in role {0}")]
    MissingComponent(&'static str),
}

impl Error {
    /// Lift a runtime code into an error attributed to `component`.
    pub fn from_code(component: impl Into<String>, code: ErrorCode) -> Self {
        let component = component.into();
        match code {
            ErrorCode::FormatNotDetected => Self::FormatNotDetected { component },
            ErrorCode::StreamCorrupt => Self::StreamCorrupt { component },
            ErrorCode::InsufficientResources => Self::ResourceExhausted(component),
            ErrorCode::ComponentNotFound => Self::ComponentNotFound { name: component },
            code => Self::Component { component, code },
        }
    }

    /// The runtime code reported upward for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ComponentNotFound { .. } => ErrorCode::ComponentNotFound,
            Self::RoleMismatch { .. } => ErrorCode::ComponentNotFound,
            Self::ResourceExhausted(_) => ErrorCode::InsufficientResources,
            Self::TransitionFailed { code, .. } => *code,
            Self::PortNegotiationFailed { .. } => ErrorCode::PortsNotCompatible,
            Self::FormatNotDetected { .. } => ErrorCode::FormatNotDetected,
            Self::StreamCorrupt { .. } => ErrorCode::StreamCorrupt,
            Self::Component { code, .. } => *code,
            Self::ContentUri { .. } => ErrorCode::ContentUriError,
            Self::UnsupportedEncoding(_) => ErrorCode::UnsupportedEncoding,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::InvalidState { .. } => ErrorCode::IncorrectStateTransition,
            Self::EmptyPlaylist => ErrorCode::ContentUriError,
            Self::MissingComponent(_) => ErrorCode::BadHandle,
        }
    }

    /// Whether the recovery controller may retry with an alternate chain.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::TransitionFailed { code, .. } | Self::Component { code, .. } => {
                code.is_recoverable()
            }
            Self::FormatNotDetected { .. } | Self::StreamCorrupt { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_maps_recoverable_kinds() {
        let err = Error::from_code("demux", ErrorCode::StreamCorrupt);
        assert!(matches!(err, Error::StreamCorrupt { .. }));
        assert!(err.is_recoverable());

        let err = Error::from_code("demux", ErrorCode::FormatNotDetected);
        assert!(matches!(err, Error::FormatNotDetected { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_from_code_resources() {
        let err = Error::from_code("renderer", ErrorCode::InsufficientResources);
        assert!(matches!(err, Error::ResourceExhausted(_)));
        assert_eq!(err.code(), ErrorCode::InsufficientResources);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_transition_failure_keeps_code() {
        let err = Error::TransitionFailed {
            component: "decoder".into(),
            to: LifecycleState::Executing,
            code: ErrorCode::StreamCorrupt,
        };
        assert!(err.is_recoverable());
        assert_eq!(err.code(), ErrorCode::StreamCorrupt);
    }

    #[test]
    fn test_display() {
        let err = Error::RoleMismatch {
            name: "decoder.flac".into(),
            role: "audio_decoder.mp3".into(),
        };
        assert_eq!(
            err.to_string(),
            "component 'decoder.flac' does not provide role 'audio_decoder.mp3'"
        );
    }
}
