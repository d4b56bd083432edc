//! Scriptable component for tests, benches and examples.

use super::component::{Component, ComponentContext};
use crate::component::{
    LifecycleState, MetadataItem, ParamIndex, Parameter, PortIndex, RuntimeResult,
};
use crate::error::ErrorCode;
use std::collections::HashMap;

/// Something a [`StubComponent`] does when it enters a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubAction {
    /// Store a parameter as if the component had negotiated it.
    SetParameter(Parameter),
    /// Report that a port's settings changed.
    PortSettingsChanged {
        /// Port number.
        port: PortIndex,
        /// Parameter that changed.
        index: ParamIndex,
    },
    /// Report an asynchronous error.
    Error(ErrorCode),
    /// Report end of stream on a port.
    EndOfStream(PortIndex),
}

#[derive(Debug, Clone, Copy)]
struct ChangeTrigger {
    index: ParamIndex,
    port: PortIndex,
    emit_port: PortIndex,
    emit_index: ParamIndex,
}

/// A component that stores parameters and follows a script.
///
/// Parameters are stored per (index, port) and returned verbatim. Reads of
/// anything never stored fail with [`ErrorCode::UnsupportedIndex`], except
/// metadata items, which fail with [`ErrorCode::NoMore`] past the last one.
///
/// # Example
///
/// ```rust
/// use tunnelgraph::component::{LifecycleState, ParamIndex};
/// use tunnelgraph::error::ErrorCode;
/// use tunnelgraph::runtime::{StubAction, StubComponent};
///
/// // A demuxer that fails as soon as data starts flowing.
/// let demuxer = StubComponent::new()
///     .on_enter(LifecycleState::Executing, StubAction::Error(ErrorCode::StreamCorrupt));
///
/// // A decoder whose output changes when its input settings change.
/// let decoder = StubComponent::new().on_change(ParamIndex::Flac, 0, 1, ParamIndex::Pcm);
/// # let _ = (demuxer, decoder);
/// ```
#[derive(Debug, Clone)]
pub struct StubComponent {
    params: HashMap<(ParamIndex, PortIndex), Parameter>,
    metadata: Vec<MetadataItem>,
    ports: PortIndex,
    triggers: Vec<ChangeTrigger>,
    scripts: HashMap<LifecycleState, Vec<StubAction>>,
    failures: HashMap<LifecycleState, ErrorCode>,
}

impl StubComponent {
    /// A component with two ports and no script.
    pub fn new() -> Self {
        Self {
            params: HashMap::new(),
            metadata: Vec::new(),
            ports: 2,
            triggers: Vec::new(),
            scripts: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    /// Set the number of ports. Commands on higher ports fail.
    pub fn with_ports(mut self, ports: PortIndex) -> Self {
        self.ports = ports;
        self
    }

    /// Preset a parameter.
    pub fn with_parameter(mut self, param: Parameter) -> Self {
        self.store(param);
        self
    }

    /// Append a metadata item.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let index = self.metadata.len() as u32;
        self.metadata.push(MetadataItem {
            index,
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// When `index` on `port` is written with a new value, report a settings
    /// change of `emit_index` on `emit_port`.
    pub fn on_change(
        mut self,
        index: ParamIndex,
        port: PortIndex,
        emit_port: PortIndex,
        emit_index: ParamIndex,
    ) -> Self {
        self.triggers.push(ChangeTrigger {
            index,
            port,
            emit_port,
            emit_index,
        });
        self
    }

    /// Run `action` right after entering `state`. Actions run in the order
    /// they were added.
    pub fn on_enter(mut self, state: LifecycleState, action: StubAction) -> Self {
        self.scripts.entry(state).or_default().push(action);
        self
    }

    /// Refuse every transition into `state` with `code`.
    pub fn fail_transition(mut self, state: LifecycleState, code: ErrorCode) -> Self {
        self.failures.insert(state, code);
        self
    }

    fn store(&mut self, param: Parameter) -> Option<Parameter> {
        match param {
            Parameter::MetadataItem(item) => {
                let index = item.index as usize;
                if index < self.metadata.len() {
                    Some(Parameter::MetadataItem(std::mem::replace(
                        &mut self.metadata[index],
                        item,
                    )))
                } else {
                    self.metadata.push(item);
                    None
                }
            }
            param => self.params.insert((param.index(), param.port()), param),
        }
    }
}

impl Default for StubComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for StubComponent {
    fn on_transition(
        &mut self,
        _from: LifecycleState,
        to: LifecycleState,
        _ctx: &ComponentContext<'_>,
    ) -> RuntimeResult<()> {
        match self.failures.get(&to) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }

    fn on_entered(&mut self, state: LifecycleState, ctx: &ComponentContext<'_>) {
        let Some(actions) = self.scripts.get(&state).cloned() else {
            return;
        };
        for action in actions {
            match action {
                StubAction::SetParameter(param) => {
                    self.store(param);
                }
                StubAction::PortSettingsChanged { port, index } => {
                    ctx.post_port_settings_changed(port, index);
                }
                StubAction::Error(code) => ctx.post_error(code),
                StubAction::EndOfStream(port) => ctx.post_end_of_stream(port),
            }
        }
    }

    fn on_port_command(
        &mut self,
        port: PortIndex,
        _enable: bool,
        _ctx: &ComponentContext<'_>,
    ) -> RuntimeResult<()> {
        if port >= self.ports {
            return Err(ErrorCode::BadParameter);
        }
        Ok(())
    }

    fn get_parameter(&self, index: ParamIndex, port: PortIndex) -> RuntimeResult<Parameter> {
        if let ParamIndex::MetadataItem(i) = index {
            return self
                .metadata
                .get(i as usize)
                .cloned()
                .map(Parameter::MetadataItem)
                .ok_or(ErrorCode::NoMore);
        }
        self.params
            .get(&(index, port))
            .cloned()
            .ok_or(ErrorCode::UnsupportedIndex)
    }

    fn set_parameter(&mut self, param: Parameter, ctx: &ComponentContext<'_>) -> RuntimeResult<()> {
        let (index, port) = (param.index(), param.port());
        let changed = self.store(param.clone()).as_ref() != Some(&param);
        if changed {
            for trigger in self
                .triggers
                .iter()
                .filter(|t| t.index == index && t.port == port)
            {
                ctx.post_port_settings_changed(trigger.emit_port, trigger.emit_index);
            }
        }
        Ok(())
    }
}
