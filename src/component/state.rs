//! Lifecycle states shared by components and the graph.

use std::fmt;

/// Lifecycle state of a single component.
///
/// ```text
/// Loaded <──> Idle <──> Executing <──> Paused
///               ▲                        │
///               └────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Instantiated, no resources allocated.
    #[default]
    Loaded,
    /// Resources allocated, not processing.
    Idle,
    /// Processing data.
    Executing,
    /// Processing suspended, resources kept.
    Paused,
}

impl LifecycleState {
    /// Whether a component may move from `self` to `to` in one step.
    pub fn can_transition_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Loaded, Idle)
                | (Idle, Loaded)
                | (Idle, Executing)
                | (Executing, Idle)
                | (Executing, Paused)
                | (Paused, Executing)
                | (Paused, Idle)
        )
    }

    /// Position along the bring-up path. Paused ranks with Executing.
    pub fn rank(self) -> u8 {
        match self {
            Self::Loaded => 0,
            Self::Idle => 1,
            Self::Executing | Self::Paused => 2,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loaded => "Loaded",
            Self::Idle => "Idle",
            Self::Executing => "Executing",
            Self::Paused => "Paused",
        };
        f.write_str(name)
    }
}

/// Nominal state of a whole graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphState {
    /// No chain instantiated.
    #[default]
    Uninstantiated,
    /// Every component is in the given lifecycle state.
    Component(LifecycleState),
}

impl GraphState {
    /// The lifecycle state, if a chain exists.
    pub fn lifecycle(self) -> Option<LifecycleState> {
        match self {
            Self::Uninstantiated => None,
            Self::Component(state) => Some(state),
        }
    }

    /// Whether the graph is executing or paused.
    pub fn is_playing(self) -> bool {
        matches!(
            self,
            Self::Component(LifecycleState::Executing | LifecycleState::Paused)
        )
    }
}

impl From<LifecycleState> for GraphState {
    fn from(state: LifecycleState) -> Self {
        Self::Component(state)
    }
}

impl fmt::Display for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninstantiated => f.write_str("Uninstantiated"),
            Self::Component(state) => state.fmt(f),
        }
    }
}
