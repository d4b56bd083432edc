//! Event dispatch between asynchronous components and the graph.
//!
//! Components report completions and failures on a callback channel from
//! their own threads. The graph registers an [`ExpectedSet`] before issuing
//! a batch of commands and blocks in [`EventDispatcher::wait_for`] until
//! every expectation is met, an awaited component fails, or the wait times
//! out.
//!
//! ```rust
//! use std::time::Duration;
//! use tunnelgraph::component::{ComponentHandle, LifecycleState};
//! use tunnelgraph::dispatch::{EventDispatcher, ExpectedEvent, ExpectedSet};
//!
//! let mut dispatcher = EventDispatcher::new();
//! let callbacks = dispatcher.callbacks();
//! let handle = ComponentHandle(7);
//!
//! callbacks.state_changed(handle, LifecycleState::Idle);
//!
//! let mut expected = ExpectedSet::new().with(handle, ExpectedEvent::State(LifecycleState::Idle));
//! dispatcher.wait_for(&mut expected, Duration::from_secs(1)).unwrap();
//! ```

mod callback;
mod dispatcher;
mod expected;

pub use callback::{CallbackSender, ComponentEvent, callback_channel};
pub use dispatcher::{EventDispatcher, WaitError};
pub use expected::{ExpectedEvent, ExpectedSet, Expectation};
