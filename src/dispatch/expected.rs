//! Sets of completion events a command step waits for.

use super::callback::ComponentEvent;
use crate::component::{ComponentHandle, LifecycleState, ParamIndex, PortIndex};
use smallvec::SmallVec;
use std::fmt;

/// Kind of completion expected from a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedEvent {
    /// The component reached this state.
    State(LifecycleState),
    /// The port was disabled.
    PortDisabled(PortIndex),
    /// The port was enabled.
    PortEnabled(PortIndex),
    /// The port's settings for this parameter changed.
    PortSettingsChanged {
        /// Port number.
        port: PortIndex,
        /// Parameter that changes.
        index: ParamIndex,
    },
}

impl ExpectedEvent {
    /// Port enable/disable completion for `port`.
    pub fn port(port: PortIndex, enable: bool) -> Self {
        if enable {
            Self::PortEnabled(port)
        } else {
            Self::PortDisabled(port)
        }
    }

    fn matches(&self, event: &ComponentEvent) -> bool {
        match (self, event) {
            (Self::State(want), ComponentEvent::StateChanged { state, .. }) => want == state,
            (Self::PortDisabled(want), ComponentEvent::PortDisabled { port, .. }) => want == port,
            (Self::PortEnabled(want), ComponentEvent::PortEnabled { port, .. }) => want == port,
            (
                Self::PortSettingsChanged { port, index },
                ComponentEvent::PortSettingsChanged {
                    port: got_port,
                    index: got_index,
                    ..
                },
            ) => port == got_port && index == got_index,
            _ => false,
        }
    }
}

/// One expected completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation {
    /// Component expected to report.
    pub handle: ComponentHandle,
    /// What it is expected to report.
    pub event: ExpectedEvent,
    /// Whether it has been observed.
    pub satisfied: bool,
}

/// The completions one command step waits for.
///
/// Built before a batch of requests is issued and consumed by
/// [`EventDispatcher::wait_for`](super::EventDispatcher::wait_for).
#[derive(Debug, Clone, Default)]
pub struct ExpectedSet {
    entries: SmallVec<[Expectation; 4]>,
}

impl ExpectedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `event` from `handle`.
    pub fn add(&mut self, handle: ComponentHandle, event: ExpectedEvent) {
        self.entries.push(Expectation {
            handle,
            event,
            satisfied: false,
        });
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, handle: ComponentHandle, event: ExpectedEvent) -> Self {
        self.add(handle, event);
        self
    }

    /// Mark the first unsatisfied expectation matching `event`.
    ///
    /// Returns whether one was found.
    pub fn try_satisfy(&mut self, event: &ComponentEvent) -> bool {
        let handle = event.handle();
        match self
            .entries
            .iter_mut()
            .find(|e| !e.satisfied && e.handle == handle && e.event.matches(event))
        {
            Some(entry) => {
                entry.satisfied = true;
                true
            }
            None => false,
        }
    }

    /// Whether every expectation has been observed.
    pub fn is_satisfied(&self) -> bool {
        self.entries.iter().all(|e| e.satisfied)
    }

    /// Whether any expectation concerns `handle`.
    pub fn contains_handle(&self, handle: ComponentHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    /// Drop the pending expectations of `handle`.
    pub fn discard(&mut self, handle: ComponentHandle) {
        self.entries.retain(|e| e.satisfied || e.handle != handle);
    }

    /// Expectations not yet observed.
    pub fn pending(&self) -> impl Iterator<Item = &Expectation> {
        self.entries.iter().filter(|e| !e.satisfied)
    }

    /// All expectations.
    pub fn iter(&self) -> impl Iterator<Item = &Expectation> {
        self.entries.iter()
    }

    /// Number of expectations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ExpectedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for e in self.pending() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{} {:?}", e.handle, e.event)?;
            first = false;
        }
        Ok(())
    }
}
