//! Component model: handles, lifecycle states, commands, ports and
//! parameters, and the runtime trait the graph talks to.
//!
//! - [`ComponentRuntime`]: registration, instantiation and commands
//! - [`ComponentHandle`]: opaque instance handle
//! - [`LifecycleState`]: Loaded / Idle / Executing / Paused
//! - [`Parameter`]: typed values addressed by [`ParamIndex`] and port

mod command;
pub mod param;
mod runtime;
mod state;

pub use command::{Command, ComponentHandle};
pub use param::{
    AacParams, AudioCoding, Endian, FlacParams, MetadataItem, Mp3Params, MuteConfig, ParamIndex,
    Parameter, PcmParams, PortDefinition, PortDirection, PortDomain, PortIndex, Supplier,
    SupplierConfig, VolumeConfig,
};
pub use runtime::{ComponentRuntime, RuntimeResult};
pub use state::{GraphState, LifecycleState};
