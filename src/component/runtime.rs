//! The component runtime the graph drives.

use super::command::{Command, ComponentHandle};
use super::param::{ParamIndex, Parameter, PortIndex};
use crate::dispatch::CallbackSender;
use crate::error::ErrorCode;

/// Result of a runtime call.
pub type RuntimeResult<T> = std::result::Result<T, ErrorCode>;

/// Facility that registers, instantiates and commands components.
///
/// Calls return as soon as the request is accepted. Completion of commands
/// is reported asynchronously through the [`CallbackSender`] handed to
/// [`instantiate`](ComponentRuntime::instantiate), from whatever thread the
/// component runs on. Parameter access is synchronous.
pub trait ComponentRuntime: Send + Sync {
    /// Whether a component with this name is registered.
    fn exists(&self, name: &str) -> bool;

    /// Whether the named component provides `role`.
    fn has_role(&self, name: &str, role: &str) -> bool;

    /// Create a component instance that reports to `callbacks`.
    fn instantiate(&self, name: &str, callbacks: CallbackSender) -> RuntimeResult<ComponentHandle>;

    /// Queue a command for the component.
    fn send_command(&self, handle: ComponentHandle, command: Command) -> RuntimeResult<()>;

    /// Read a parameter.
    fn get_parameter(
        &self,
        handle: ComponentHandle,
        index: ParamIndex,
        port: PortIndex,
    ) -> RuntimeResult<Parameter>;

    /// Write a parameter.
    fn set_parameter(&self, handle: ComponentHandle, param: Parameter) -> RuntimeResult<()>;

    /// Connect an output port to an input port of another component.
    fn setup_tunnel(
        &self,
        output: ComponentHandle,
        out_port: PortIndex,
        input: ComponentHandle,
        in_port: PortIndex,
    ) -> RuntimeResult<()>;

    /// Remove a tunnel created by [`setup_tunnel`](ComponentRuntime::setup_tunnel).
    fn teardown_tunnel(
        &self,
        output: ComponentHandle,
        out_port: PortIndex,
        input: ComponentHandle,
        in_port: PortIndex,
    ) -> RuntimeResult<()>;

    /// Destroy a component instance.
    fn destroy(&self, handle: ComponentHandle) -> RuntimeResult<()>;
}
