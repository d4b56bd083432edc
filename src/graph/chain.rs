//! The instantiated component chain and its tunnels.

use crate::component::{ComponentHandle, LifecycleState, PortIndex};
use crate::error::{Error, Result};
use std::fmt;

/// Role a component plays in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChainRole {
    /// Reads, receives or demultiplexes the input.
    Source,
    /// Decodes the elementary stream.
    Decoder,
    /// Plays PCM out. The terminal component.
    Renderer,
}

impl ChainRole {
    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Decoder => "decoder",
            Self::Renderer => "renderer",
        }
    }
}

impl fmt::Display for ChainRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component the graph needs: registered name, required role and slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Registered component name.
    pub name: String,
    /// Role the component must expose.
    pub role: String,
    /// Slot it fills in the chain.
    pub slot: ChainRole,
}

impl ComponentSpec {
    /// Create a spec.
    pub fn new(name: impl Into<String>, role: impl Into<String>, slot: ChainRole) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            slot,
        }
    }
}

/// A live component in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Registered component name.
    pub name: String,
    /// Role it was verified against.
    pub role: String,
    /// Slot it fills.
    pub slot: ChainRole,
    /// Position in the chain, upstream first.
    pub position: usize,
    /// Live instance.
    pub handle: ComponentHandle,
    /// Last state confirmed by the component.
    pub state: LifecycleState,
}

/// Identifier of a declared tunnel.
pub type TunnelId = usize;

/// One end of a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Slot of the component.
    pub slot: ChainRole,
    /// Its handle.
    pub handle: ComponentHandle,
    /// Port number.
    pub port: PortIndex,
}

/// A declared link from an output port to the next component's input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunnel {
    /// Output side.
    pub upstream: Endpoint,
    /// Input side.
    pub downstream: Endpoint,
    /// Whether the runtime has set it up.
    pub established: bool,
    /// Whether both endpoint ports are enabled.
    pub enabled: bool,
}

impl Tunnel {
    /// Both endpoints, upstream first.
    pub fn endpoints(&self) -> [Endpoint; 2] {
        [self.upstream, self.downstream]
    }
}

/// Components of a graph, keyed by slot, plus the declared tunnels.
///
/// Exclusively owned by the graph; format strategies reach it through
/// [`GraphCore`](super::GraphCore).
#[derive(Debug, Clone, Default)]
pub struct ComponentChain {
    components: Vec<ComponentDescriptor>,
    tunnels: Vec<Tunnel>,
}

impl ComponentChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component at the downstream end.
    pub(crate) fn push(&mut self, spec: &ComponentSpec, handle: ComponentHandle) {
        let position = self.components.len();
        self.components.push(ComponentDescriptor {
            name: spec.name.clone(),
            role: spec.role.clone(),
            slot: spec.slot,
            position,
            handle,
            state: LifecycleState::Loaded,
        });
    }

    /// Remove the component in `slot` and every tunnel touching it.
    pub(crate) fn remove(&mut self, slot: ChainRole) -> Option<ComponentDescriptor> {
        let index = self.components.iter().position(|c| c.slot == slot)?;
        let removed = self.components.remove(index);
        for (position, component) in self.components.iter_mut().enumerate() {
            component.position = position;
        }
        self.tunnels
            .retain(|t| t.upstream.slot != slot && t.downstream.slot != slot);
        Some(removed)
    }

    /// Drop every component and tunnel.
    pub(crate) fn clear(&mut self) {
        self.components.clear();
        self.tunnels.clear();
    }

    /// The component in `slot`.
    pub fn get(&self, slot: ChainRole) -> Result<&ComponentDescriptor> {
        self.components
            .iter()
            .find(|c| c.slot == slot)
            .ok_or(Error::MissingComponent(slot.as_str()))
    }

    /// Handle of the component in `slot`.
    pub fn handle(&self, slot: ChainRole) -> Result<ComponentHandle> {
        self.get(slot).map(|c| c.handle)
    }

    /// Whether `slot` is filled.
    pub fn contains(&self, slot: ChainRole) -> bool {
        self.components.iter().any(|c| c.slot == slot)
    }

    /// The component owning `handle`.
    pub fn by_handle(&self, handle: ComponentHandle) -> Option<&ComponentDescriptor> {
        self.components.iter().find(|c| c.handle == handle)
    }

    /// Name of the component owning `handle`, for messages.
    pub fn name_of(&self, handle: ComponentHandle) -> String {
        match self.by_handle(handle) {
            Some(c) => c.name.clone(),
            None => handle.to_string(),
        }
    }

    /// Handle of the terminal component, if loaded.
    pub fn terminal(&self) -> Option<ComponentHandle> {
        self.get(ChainRole::Renderer).ok().map(|c| c.handle)
    }

    /// Components, upstream first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ComponentDescriptor> {
        self.components.iter()
    }

    /// Handles, upstream first.
    pub fn handles(&self) -> Vec<ComponentHandle> {
        self.components.iter().map(|c| c.handle).collect()
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Record a confirmed state.
    pub(crate) fn set_state(&mut self, handle: ComponentHandle, state: LifecycleState) {
        if let Some(c) = self.components.iter_mut().find(|c| c.handle == handle) {
            c.state = state;
        }
    }

    /// The state every component is in, if they agree.
    pub fn common_state(&self) -> Option<LifecycleState> {
        let first = self.components.first()?.state;
        self.components
            .iter()
            .all(|c| c.state == first)
            .then_some(first)
    }

    /// Declare a tunnel between the components in two slots.
    ///
    /// Returns the existing id if the same tunnel was declared before.
    pub(crate) fn declare_tunnel(
        &mut self,
        upstream: ChainRole,
        out_port: PortIndex,
        downstream: ChainRole,
        in_port: PortIndex,
    ) -> Result<TunnelId> {
        let upstream = Endpoint {
            slot: upstream,
            handle: self.handle(upstream)?,
            port: out_port,
        };
        let downstream = Endpoint {
            slot: downstream,
            handle: self.handle(downstream)?,
            port: in_port,
        };
        if let Some(id) = self
            .tunnels
            .iter()
            .position(|t| t.upstream == upstream && t.downstream == downstream)
        {
            return Ok(id);
        }
        self.tunnels.push(Tunnel {
            upstream,
            downstream,
            established: false,
            enabled: true,
        });
        Ok(self.tunnels.len() - 1)
    }

    /// A declared tunnel.
    pub fn tunnel(&self, id: TunnelId) -> Result<&Tunnel> {
        self.tunnels.get(id).ok_or(Error::MissingComponent("tunnel"))
    }

    pub(crate) fn tunnel_mut(&mut self, id: TunnelId) -> Result<&mut Tunnel> {
        self.tunnels
            .get_mut(id)
            .ok_or(Error::MissingComponent("tunnel"))
    }

    /// Declared tunnels, upstream first.
    pub fn tunnels(&self) -> &[Tunnel] {
        &self.tunnels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ComponentChain {
        let mut chain = ComponentChain::new();
        chain.push(
            &ComponentSpec::new("demux.ogg", "container_demuxer.ogg", ChainRole::Source),
            ComponentHandle(1),
        );
        chain.push(
            &ComponentSpec::new("decoder.flac", "audio_decoder.flac", ChainRole::Decoder),
            ComponentHandle(2),
        );
        chain.push(
            &ComponentSpec::new("renderer.pcm", "audio_renderer.pcm", ChainRole::Renderer),
            ComponentHandle(3),
        );
        chain
    }

    #[test]
    fn test_lookup_by_slot() {
        let chain = chain();
        assert_eq!(chain.handle(ChainRole::Decoder).unwrap(), ComponentHandle(2));
        assert_eq!(chain.get(ChainRole::Renderer).unwrap().position, 2);
        assert_eq!(chain.terminal(), Some(ComponentHandle(3)));
        assert_eq!(chain.name_of(ComponentHandle(1)), "demux.ogg");
        assert_eq!(chain.name_of(ComponentHandle(9)), "Component(9)");
    }

    #[test]
    fn test_missing_slot() {
        let mut chain = chain();
        chain.remove(ChainRole::Decoder);
        assert!(matches!(
            chain.get(ChainRole::Decoder),
            Err(Error::MissingComponent("decoder"))
        ));
        assert_eq!(chain.get(ChainRole::Renderer).unwrap().position, 1);
    }

    #[test]
    fn test_common_state() {
        let mut chain = chain();
        assert_eq!(chain.common_state(), Some(LifecycleState::Loaded));
        chain.set_state(ComponentHandle(1), LifecycleState::Idle);
        assert_eq!(chain.common_state(), None);
        chain.set_state(ComponentHandle(2), LifecycleState::Idle);
        chain.set_state(ComponentHandle(3), LifecycleState::Idle);
        assert_eq!(chain.common_state(), Some(LifecycleState::Idle));
        assert_eq!(ComponentChain::new().common_state(), None);
    }

    #[test]
    fn test_tunnels_follow_components() {
        let mut chain = chain();
        let first = chain
            .declare_tunnel(ChainRole::Source, 0, ChainRole::Decoder, 0)
            .unwrap();
        let second = chain
            .declare_tunnel(ChainRole::Decoder, 1, ChainRole::Renderer, 0)
            .unwrap();
        assert_eq!((first, second), (0, 1));
        assert_eq!(
            chain
                .declare_tunnel(ChainRole::Source, 0, ChainRole::Decoder, 0)
                .unwrap(),
            0
        );

        let tunnel = chain.tunnel(second).unwrap();
        assert_eq!(tunnel.upstream.handle, ComponentHandle(2));
        assert_eq!(tunnel.downstream.port, 0);

        chain.remove(ChainRole::Renderer);
        assert_eq!(chain.tunnels().len(), 1);
        assert!(chain.tunnel(1).is_err());
    }
}
