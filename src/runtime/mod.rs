//! In-process component runtime.
//!
//! - [`LocalRuntime`]: registers component factories and runs every
//!   instance on its own worker thread
//! - [`Component`]: the trait hosted components implement
//! - [`StubComponent`]: scriptable component used by tests and benches

mod component;
mod local;
mod stub;

pub use component::{Component, ComponentContext};
pub use local::{CommandRecord, ComponentFactory, LocalRuntime, TunnelRecord};
pub use stub::{StubAction, StubComponent};
