//! Transition, port and tunnel machinery shared by the controller and the
//! format strategies.

use super::chain::{ChainRole, ComponentChain, ComponentSpec, TunnelId};
use super::config::GraphConfig;
use super::playlist::Playlist;
use crate::component::{
    Command, ComponentHandle, ComponentRuntime, GraphState, LifecycleState, ParamIndex, Parameter,
    PortIndex, Supplier, SupplierConfig,
};
use crate::dispatch::{CallbackSender, EventDispatcher, ExpectedEvent, ExpectedSet, WaitError};
use crate::error::{Error, ErrorCode, Result};
use crate::notify::{EventSender, NotificationSink, StreamInfo};
use crate::probe::{Probe, ProbeResult};
use std::sync::Arc;

/// Everything a command step needs: the runtime, the chain, the dispatcher
/// and the per-entry bookkeeping.
///
/// The [`GraphController`](super::GraphController) owns one and lends it to
/// its [`GraphOps`](crate::ops::GraphOps) for every step.
pub struct GraphCore {
    runtime: Arc<dyn ComponentRuntime>,
    probe: Arc<dyn Probe>,
    events: EventSender,
    sinks: Vec<Arc<dyn NotificationSink>>,
    chain: ComponentChain,
    dispatcher: EventDispatcher,
    callbacks: CallbackSender,
    pub(crate) playlist: Playlist,
    config: GraphConfig,
    state: GraphState,
    attempts: u32,
    probed: Option<ProbeResult>,
}

impl GraphCore {
    pub(crate) fn new(
        runtime: Arc<dyn ComponentRuntime>,
        probe: Arc<dyn Probe>,
        config: GraphConfig,
    ) -> Self {
        let dispatcher = EventDispatcher::new();
        let callbacks = dispatcher.callbacks();
        Self {
            runtime,
            probe,
            events: EventSender::new(config.event_capacity.max(1)),
            sinks: Vec::new(),
            chain: ComponentChain::new(),
            dispatcher,
            callbacks,
            playlist: Playlist::default(),
            config,
            state: GraphState::Uninstantiated,
            attempts: 0,
            probed: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The component runtime.
    pub fn runtime(&self) -> &dyn ComponentRuntime {
        self.runtime.as_ref()
    }

    /// The chain.
    pub fn chain(&self) -> &ComponentChain {
        &self.chain
    }

    /// The playlist.
    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Nominal graph state.
    pub fn state(&self) -> GraphState {
        self.state
    }

    /// Attempts made for the current entry, including the one in progress.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the media header should be probed in this attempt.
    ///
    /// Only the first attempt of an entry probes; retries reuse the result.
    pub fn should_probe(&self) -> bool {
        self.attempts <= 1 || self.probed.is_none()
    }

    /// Whether stream banners should be announced in this attempt.
    pub fn should_announce(&self) -> bool {
        self.attempts <= 1
    }

    /// Last probe result for the current entry.
    pub fn probed(&self) -> Option<&ProbeResult> {
        self.probed.as_ref()
    }

    /// The stock event broadcaster.
    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// Component events held back for later handling.
    pub fn deferred_events(&self) -> usize {
        self.dispatcher.deferred_len()
    }

    pub(crate) fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    // ========================================================================
    // Entry bookkeeping
    // ========================================================================

    /// Reset the per-entry counters and forget whatever the chain reported
    /// for the previous entry.
    pub(crate) fn start_entry(&mut self) {
        self.attempts = 0;
        self.probed = None;
        self.discard_stale();
    }

    /// Drop every queued error, end of stream and settings change from the
    /// chain's components.
    pub(crate) fn discard_stale(&mut self) {
        let dropped = self.dispatcher.discard_stale(&self.chain.handles());
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded stale component events");
        }
    }

    /// Drop settings changes nobody waited for once negotiation is over.
    pub(crate) fn settle_negotiation(&mut self) {
        let dropped = self.dispatcher.discard_port_settings();
        if dropped > 0 {
            tracing::trace!(dropped, "Discarded unawaited settings changes");
        }
    }

    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Probe `uri`, or reuse the result of an earlier attempt when `fresh`
    /// is false.
    pub fn probe_uri(&mut self, uri: &str, fresh: bool) -> Result<ProbeResult> {
        match &self.probed {
            Some(found) if !fresh && found.uri == uri => Ok(found.clone()),
            _ => {
                let found = self.probe.probe(uri)?;
                tracing::debug!(%uri, coding = %found.coding, domain = ?found.domain, "Probed");
                self.probed = Some(found.clone());
                Ok(found)
            }
        }
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    pub(crate) fn add_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Deliver a notification to the broadcaster and every extra sink.
    pub fn notify(&self, f: impl Fn(&dyn NotificationSink)) {
        f(&self.events);
        for sink in &self.sinks {
            f(sink.as_ref());
        }
    }

    /// Log and announce the properties of the stream now playing.
    pub fn announce(&self, info: &StreamInfo) {
        tracing::info!(
            uri = %info.uri,
            coding = %info.coding,
            sample_rate = info.sample_rate,
            channels = info.channels,
            "Playing"
        );
        self.notify(|s| s.notify_stream_info(info));
    }

    fn refresh_state(&mut self) {
        let state = match self.chain.common_state() {
            Some(state) => GraphState::Component(state),
            None if self.chain.is_empty() => GraphState::Uninstantiated,
            None => return,
        };
        if state != self.state {
            tracing::debug!(from = %self.state, to = %state, "Graph state changed");
            self.state = state;
            self.notify(|s| s.notify_state_changed(state));
        }
    }

    // ========================================================================
    // Instantiation
    // ========================================================================

    /// Check every spec against the runtime registry.
    pub fn verify(&self, specs: &[ComponentSpec]) -> Result<()> {
        for spec in specs {
            if !self.runtime.exists(&spec.name) {
                return Err(Error::ComponentNotFound {
                    name: spec.name.clone(),
                });
            }
            if !self.runtime.has_role(&spec.name, &spec.role) {
                return Err(Error::RoleMismatch {
                    name: spec.name.clone(),
                    role: spec.role.clone(),
                });
            }
        }
        Ok(())
    }

    /// Verify, then instantiate `specs` in order at the downstream end of
    /// the chain.
    ///
    /// Nothing is instantiated unless every spec verifies. If an
    /// instantiation fails, the components created by this call are
    /// destroyed again.
    pub fn instantiate(&mut self, specs: &[ComponentSpec]) -> Result<()> {
        self.verify(specs)?;

        let mut created = Vec::with_capacity(specs.len());
        for spec in specs {
            match self.runtime.instantiate(&spec.name, self.callbacks.clone()) {
                Ok(handle) => {
                    tracing::debug!(name = %spec.name, slot = %spec.slot, %handle, "Loaded component");
                    self.chain.push(spec, handle);
                    created.push(spec.slot);
                }
                Err(code) => {
                    for slot in created.into_iter().rev() {
                        self.destroy_slot(slot);
                    }
                    return Err(Error::from_code(spec.name.clone(), code));
                }
            }
        }
        self.refresh_state();
        Ok(())
    }

    /// Destroy the component in `slot`, tearing down its tunnels first.
    ///
    /// Best effort: failures are logged.
    pub fn destroy_slot(&mut self, slot: ChainRole) {
        let touching: Vec<TunnelId> = self
            .chain
            .tunnels()
            .iter()
            .enumerate()
            .filter(|(_, t)| t.established && (t.upstream.slot == slot || t.downstream.slot == slot))
            .map(|(id, _)| id)
            .collect();
        for id in touching {
            self.teardown_tunnel(id);
        }

        if let Some(component) = self.chain.remove(slot) {
            if let Err(code) = self.runtime.destroy(component.handle) {
                tracing::warn!(name = %component.name, %code, "Failed to destroy component");
            }
            self.dispatcher.forget(component.handle);
        }
        self.refresh_state();
    }

    /// Tear down every tunnel and destroy every component, downstream first.
    pub fn destroy_chain(&mut self) {
        self.teardown_tunnels();
        let slots: Vec<ChainRole> = self.chain.iter().rev().map(|c| c.slot).collect();
        for slot in slots {
            self.destroy_slot(slot);
        }
        self.chain.clear();
        self.refresh_state();
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    /// Move `handles` to `to` and wait for every one of them.
    ///
    /// Components that confirmed the transition are recorded in their new
    /// state even when the step as a whole fails.
    pub fn transition(&mut self, handles: &[ComponentHandle], to: LifecycleState) -> Result<()> {
        self.run_transition(handles, to, true)
    }

    fn run_transition(
        &mut self,
        handles: &[ComponentHandle],
        to: LifecycleState,
        abort_on_error: bool,
    ) -> Result<()> {
        if handles.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = handles.len(), %to, "Transitioning components");

        let mut expected = ExpectedSet::new();
        for &handle in handles {
            if let Err(code) = self.runtime.send_command(handle, Command::SetState(to)) {
                return Err(Error::TransitionFailed {
                    component: self.chain.name_of(handle),
                    to,
                    code,
                });
            }
            expected.add(handle, ExpectedEvent::State(to));
        }

        let result = if abort_on_error {
            self.dispatcher
                .wait_for(&mut expected, self.config.wait_timeout)
        } else {
            self.dispatcher
                .wait_for_all(&mut expected, self.config.wait_timeout)
        };
        if let Err(WaitError::Component { handle, .. }) = &result {
            // Let the rest of the batch settle so recorded states stay true.
            expected.discard(*handle);
            if let Err(err) = self
                .dispatcher
                .wait_for(&mut expected, self.config.wait_timeout)
            {
                tracing::debug!(?err, "Batch did not settle after failure");
            }
        }

        for e in expected.iter().filter(|e| e.satisfied) {
            self.chain.set_state(e.handle, to);
        }
        self.refresh_state();

        result.map_err(|err| match err {
            WaitError::Component { handle, code } if code.lifts_directly() => {
                Error::from_code(self.chain.name_of(handle), code)
            }
            WaitError::Component { handle, code } => Error::TransitionFailed {
                component: self.chain.name_of(handle),
                to,
                code,
            },
            WaitError::Timeout(pending) => Error::Timeout(format!("{to}: {pending}")),
        })
    }

    /// Bring every component below `to` up to it, one step at a time.
    pub fn bring_up(&mut self, to: LifecycleState) -> Result<()> {
        for step in [LifecycleState::Idle, LifecycleState::Executing] {
            if step.rank() > to.rank() {
                break;
            }
            let handles: Vec<ComponentHandle> = self
                .chain
                .iter()
                .filter(|c| c.state.rank() < step.rank())
                .map(|c| c.handle)
                .collect();
            self.transition(&handles, step)?;
        }
        Ok(())
    }

    /// Bring every component above `to` down to it, one step at a time.
    ///
    /// Reaching Loaded tears the tunnels down. Errors the components report
    /// on the way down are deferred rather than stopping the step.
    pub fn bring_down(&mut self, to: LifecycleState) -> Result<()> {
        for step in [LifecycleState::Idle, LifecycleState::Loaded] {
            if step.rank() < to.rank() {
                break;
            }
            let handles: Vec<ComponentHandle> = self
                .chain
                .iter()
                .filter(|c| c.state.rank() > step.rank())
                .map(|c| c.handle)
                .collect();
            self.run_transition(&handles, step, false)?;
        }
        if to == LifecycleState::Loaded {
            self.teardown_tunnels();
        }
        Ok(())
    }

    /// Move every component not already in `to` there in one step.
    pub fn transition_all(&mut self, to: LifecycleState) -> Result<()> {
        let handles: Vec<ComponentHandle> = self
            .chain
            .iter()
            .filter(|c| c.state != to)
            .map(|c| c.handle)
            .collect();
        self.transition(&handles, to)
    }

    /// [`bring_down`](Self::bring_down) to Loaded, logging instead of
    /// failing.
    pub fn teardown_to_loaded(&mut self) {
        if let Err(err) = self.bring_down(LifecycleState::Loaded) {
            tracing::warn!(%err, "Teardown to Loaded incomplete");
            self.teardown_tunnels();
        }
    }

    // ========================================================================
    // Ports and parameters
    // ========================================================================

    /// Enable or disable a set of ports and wait for every completion.
    pub fn set_ports(
        &mut self,
        ports: &[(ComponentHandle, PortIndex)],
        enable: bool,
    ) -> Result<()> {
        if ports.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = ports.len(), enable, "Port command");

        let mut expected = ExpectedSet::new();
        for &(handle, port) in ports {
            if let Err(code) = self.runtime.send_command(handle, Command::port(port, enable)) {
                return Err(self.port_error(handle, port, code));
            }
            expected.add(handle, ExpectedEvent::port(port, enable));
        }

        self.dispatcher
            .wait_for(&mut expected, self.config.wait_timeout)
            .map_err(|err| match err {
                WaitError::Component { handle, code } if code.lifts_directly() => {
                    Error::from_code(self.chain.name_of(handle), code)
                }
                WaitError::Component { handle, code } => {
                    let port = ports
                        .iter()
                        .find(|(h, _)| *h == handle)
                        .map_or(0, |(_, p)| *p);
                    self.port_error(handle, port, code)
                }
                WaitError::Timeout(pending) => Error::Timeout(pending),
            })
    }

    /// Enable or disable one port of the component in `slot`.
    pub fn port_command(&mut self, slot: ChainRole, port: PortIndex, enable: bool) -> Result<()> {
        let handle = self.chain.handle(slot)?;
        self.set_ports(&[(handle, port)], enable)
    }

    /// Read a parameter from the component in `slot`.
    pub fn get_parameter(
        &self,
        slot: ChainRole,
        index: ParamIndex,
        port: PortIndex,
    ) -> Result<Parameter> {
        let handle = self.chain.handle(slot)?;
        self.runtime
            .get_parameter(handle, index, port)
            .map_err(|code| self.port_error(handle, port, code))
    }

    /// Write a parameter to the component in `slot`.
    pub fn set_parameter(&self, slot: ChainRole, param: Parameter) -> Result<()> {
        let handle = self.chain.handle(slot)?;
        let port = param.port();
        self.runtime
            .set_parameter(handle, param)
            .map_err(|code| self.port_error(handle, port, code))
    }

    /// Wait until the component in `slot` reports new settings on `port`.
    ///
    /// A settings change reported before this call also satisfies it.
    pub fn await_port_settings(
        &mut self,
        slot: ChainRole,
        port: PortIndex,
        index: ParamIndex,
    ) -> Result<()> {
        let handle = self.chain.handle(slot)?;
        tracing::debug!(%slot, port, ?index, "Waiting for port settings");
        let mut expected =
            ExpectedSet::new().with(handle, ExpectedEvent::PortSettingsChanged { port, index });
        self.dispatcher
            .wait_for(&mut expected, self.config.wait_timeout)
            .map_err(|err| match err {
                WaitError::Component { handle, code } => {
                    Error::from_code(self.chain.name_of(handle), code)
                }
                WaitError::Timeout(pending) => Error::Timeout(pending),
            })
    }

    fn port_error(&self, handle: ComponentHandle, port: PortIndex, code: ErrorCode) -> Error {
        if code.lifts_directly() {
            return Error::from_code(self.chain.name_of(handle), code);
        }
        Error::PortNegotiationFailed {
            component: self.chain.name_of(handle),
            port,
            reason: code.to_string(),
        }
    }

    // ========================================================================
    // Tunnels
    // ========================================================================

    /// Declare a tunnel between two loaded slots.
    pub fn declare_tunnel(
        &mut self,
        upstream: ChainRole,
        out_port: PortIndex,
        downstream: ChainRole,
        in_port: PortIndex,
    ) -> Result<TunnelId> {
        self.chain
            .declare_tunnel(upstream, out_port, downstream, in_port)
    }

    /// Set up every declared tunnel the runtime does not know yet.
    ///
    /// The downstream input port of each tunnel is made the buffer supplier
    /// before the tunnel is created.
    pub fn connect(&mut self) -> Result<()> {
        for id in 0..self.chain.tunnels().len() {
            let tunnel = *self.chain.tunnel(id)?;
            if tunnel.established {
                continue;
            }
            let (up, down) = (tunnel.upstream, tunnel.downstream);

            self.runtime
                .set_parameter(
                    down.handle,
                    Parameter::BufferSupplier(SupplierConfig {
                        port: down.port,
                        supplier: Supplier::Input,
                    }),
                )
                .map_err(|code| self.port_error(down.handle, down.port, code))?;

            self.runtime
                .setup_tunnel(up.handle, up.port, down.handle, down.port)
                .map_err(|code| self.port_error(up.handle, up.port, code))?;

            tracing::debug!(
                from = %up.slot,
                out_port = up.port,
                to = %down.slot,
                in_port = down.port,
                "Tunnel established"
            );
            self.chain.tunnel_mut(id)?.established = true;
        }
        Ok(())
    }

    /// Enable or disable both endpoints of a tunnel together.
    pub fn toggle_tunnel(&mut self, id: TunnelId, enable: bool) -> Result<()> {
        let tunnel = *self.chain.tunnel(id)?;
        let ports = tunnel.endpoints().map(|e| (e.handle, e.port));
        self.set_ports(&ports, enable)?;
        self.chain.tunnel_mut(id)?.enabled = enable;
        Ok(())
    }

    fn teardown_tunnel(&mut self, id: TunnelId) {
        let Ok(tunnel) = self.chain.tunnel(id).copied() else {
            return;
        };
        let (up, down) = (tunnel.upstream, tunnel.downstream);
        if let Err(code) = self
            .runtime
            .teardown_tunnel(up.handle, up.port, down.handle, down.port)
        {
            tracing::warn!(from = %up.slot, to = %down.slot, %code, "Tunnel teardown failed");
        }
        if let Ok(tunnel) = self.chain.tunnel_mut(id) {
            tunnel.established = false;
        }
    }

    /// Tear down every established tunnel. Declarations are kept so that
    /// [`connect`](Self::connect) can set them up again.
    pub fn teardown_tunnels(&mut self) {
        for id in 0..self.chain.tunnels().len() {
            if self.chain.tunnels()[id].established {
                self.teardown_tunnel(id);
            }
        }
    }
}

impl std::fmt::Debug for GraphCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCore")
            .field("state", &self.state)
            .field("components", &self.chain.len())
            .field("tunnels", &self.chain.tunnels().len())
            .field("cursor", &self.playlist.cursor())
            .field("attempts", &self.attempts)
            .finish()
    }
}
