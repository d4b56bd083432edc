//! The trait in-process components implement.

use crate::component::{
    ComponentHandle, LifecycleState, ParamIndex, Parameter, PortIndex, RuntimeResult,
};
use crate::dispatch::CallbackSender;
use crate::error::ErrorCode;

/// What a component can do while handling a request.
pub struct ComponentContext<'a> {
    handle: ComponentHandle,
    callbacks: &'a CallbackSender,
}

impl<'a> ComponentContext<'a> {
    pub(crate) fn new(handle: ComponentHandle, callbacks: &'a CallbackSender) -> Self {
        Self { handle, callbacks }
    }

    /// Handle of the component being driven.
    pub fn handle(&self) -> ComponentHandle {
        self.handle
    }

    /// Report an asynchronous error.
    pub fn post_error(&self, code: ErrorCode) {
        self.callbacks.error(self.handle, code);
    }

    /// Report end of stream on `port`.
    pub fn post_end_of_stream(&self, port: PortIndex) {
        self.callbacks.end_of_stream(self.handle, port);
    }

    /// Report that the settings of `port` changed.
    pub fn post_port_settings_changed(&self, port: PortIndex, index: ParamIndex) {
        self.callbacks.port_settings_changed(self.handle, port, index);
    }
}

/// A processing component hosted by [`LocalRuntime`](super::LocalRuntime).
///
/// The runtime validates state transitions and reports completions; an
/// implementation only reacts. Transition and port hooks run on the
/// component's worker thread, parameter access on the caller's thread,
/// always under the instance lock.
pub trait Component: Send {
    /// Called before the state moves from `from` to `to`.
    ///
    /// Returning an error fails the command and reports the code instead of
    /// the completion.
    fn on_transition(
        &mut self,
        from: LifecycleState,
        to: LifecycleState,
        ctx: &ComponentContext<'_>,
    ) -> RuntimeResult<()> {
        let _ = (from, to, ctx);
        Ok(())
    }

    /// Called after the completion for `state` has been reported.
    fn on_entered(&mut self, state: LifecycleState, ctx: &ComponentContext<'_>) {
        let _ = (state, ctx);
    }

    /// Called for a port enable or disable command.
    fn on_port_command(
        &mut self,
        port: PortIndex,
        enable: bool,
        ctx: &ComponentContext<'_>,
    ) -> RuntimeResult<()> {
        let _ = (port, enable, ctx);
        Ok(())
    }

    /// Read a parameter.
    fn get_parameter(&self, index: ParamIndex, port: PortIndex) -> RuntimeResult<Parameter>;

    /// Write a parameter.
    fn set_parameter(&mut self, param: Parameter, ctx: &ComponentContext<'_>)
    -> RuntimeResult<()>;
}
