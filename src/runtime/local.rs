//! In-process component runtime.

use super::component::{Component, ComponentContext};
use crate::component::{
    Command, ComponentHandle, ComponentRuntime, LifecycleState, ParamIndex, Parameter, PortIndex,
    RuntimeResult,
};
use crate::dispatch::{CallbackSender, ComponentEvent};
use crate::error::ErrorCode;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;

/// Constructor registered for a component name.
pub type ComponentFactory = Arc<dyn Fn() -> Box<dyn Component> + Send + Sync>;

/// A command as it was issued, for inspection in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    /// Target component.
    pub handle: ComponentHandle,
    /// Registered name of the target.
    pub name: String,
    /// The command.
    pub command: Command,
}

/// A tunnel between two live components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TunnelRecord {
    /// Upstream component.
    pub output: ComponentHandle,
    /// Upstream output port.
    pub out_port: PortIndex,
    /// Downstream component.
    pub input: ComponentHandle,
    /// Downstream input port.
    pub in_port: PortIndex,
}

struct Registration {
    roles: Vec<String>,
    factory: ComponentFactory,
}

struct InstanceState {
    component: Box<dyn Component>,
    state: LifecycleState,
    disabled_ports: HashSet<PortIndex>,
}

struct Shared {
    handle: ComponentHandle,
    callbacks: CallbackSender,
    inner: Mutex<InstanceState>,
}

struct Instance {
    name: String,
    commands: kanal::Sender<Command>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runtime hosting [`Component`]s in-process, one worker thread each.
///
/// Commands are queued to the worker and completed asynchronously through
/// the instance's callback sender, the same way an external component
/// runtime reports back. Parameters are read and written synchronously.
///
/// # Example
///
/// ```rust
/// use tunnelgraph::component::ComponentRuntime;
/// use tunnelgraph::runtime::{LocalRuntime, StubComponent};
///
/// let runtime = LocalRuntime::new();
/// runtime.register("renderer.pcm", ["audio_renderer.pcm"], StubComponent::new);
///
/// assert!(runtime.exists("renderer.pcm"));
/// assert!(runtime.has_role("renderer.pcm", "audio_renderer.pcm"));
/// assert!(!runtime.has_role("renderer.pcm", "audio_decoder.mp3"));
/// ```
pub struct LocalRuntime {
    registry: RwLock<HashMap<String, Registration>>,
    instances: Mutex<HashMap<ComponentHandle, Instance>>,
    tunnels: Mutex<Vec<TunnelRecord>>,
    log: Mutex<Vec<CommandRecord>>,
    next_handle: AtomicU64,
}

impl LocalRuntime {
    /// Create an empty runtime.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
            tunnels: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Register a component constructor under `name`.
    ///
    /// Registering the same name again replaces the earlier registration.
    pub fn register<F, C>(
        &self,
        name: impl Into<String>,
        roles: impl IntoIterator<Item = impl Into<String>>,
        factory: F,
    ) where
        F: Fn() -> C + Send + Sync + 'static,
        C: Component + 'static,
    {
        let factory: ComponentFactory = Arc::new(move || Box::new(factory()));
        self.register_boxed(name, roles, factory);
    }

    /// Register an already boxed constructor.
    pub fn register_boxed(
        &self,
        name: impl Into<String>,
        roles: impl IntoIterator<Item = impl Into<String>>,
        factory: ComponentFactory,
    ) {
        let name = name.into();
        let roles = roles.into_iter().map(Into::into).collect();
        tracing::trace!(%name, "Registering component");
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Registration { roles, factory });
    }

    /// Names of every registered component.
    pub fn registered(&self) -> Vec<String> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = registry.keys().cloned().collect();
        names.sort();
        names
    }

    /// Current state of a live instance.
    pub fn state(&self, handle: ComponentHandle) -> Option<LifecycleState> {
        let instances = lock(&self.instances);
        let instance = instances.get(&handle)?;
        Some(lock(&instance.shared.inner).state)
    }

    /// Whether a port of a live instance is enabled.
    pub fn port_enabled(&self, handle: ComponentHandle, port: PortIndex) -> Option<bool> {
        let instances = lock(&self.instances);
        let instance = instances.get(&handle)?;
        Some(!lock(&instance.shared.inner).disabled_ports.contains(&port))
    }

    /// First live instance created from `name`.
    pub fn handle_of(&self, name: &str) -> Option<ComponentHandle> {
        let instances = lock(&self.instances);
        instances
            .iter()
            .filter(|(_, instance)| instance.name == name)
            .map(|(handle, _)| *handle)
            .min()
    }

    /// Names of the live instances, in creation order.
    pub fn instance_names(&self) -> Vec<String> {
        let instances = lock(&self.instances);
        let mut live: Vec<(&ComponentHandle, &Instance)> = instances.iter().collect();
        live.sort_by_key(|(handle, _)| **handle);
        live.into_iter().map(|(_, i)| i.name.clone()).collect()
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        lock(&self.instances).len()
    }

    /// Every command issued so far, in issue order.
    pub fn command_log(&self) -> Vec<CommandRecord> {
        lock(&self.log).clone()
    }

    /// Forget the commands issued so far.
    pub fn clear_command_log(&self) {
        lock(&self.log).clear();
    }

    /// Tunnels currently set up.
    pub fn tunnels(&self) -> Vec<TunnelRecord> {
        lock(&self.tunnels).clone()
    }

    /// Inject an event as if the instance had reported it.
    ///
    /// Returns `false` if the handle is unknown or nobody listens.
    pub fn post(&self, handle: ComponentHandle, event: ComponentEvent) -> bool {
        let instances = lock(&self.instances);
        match instances.get(&handle) {
            Some(instance) => instance.shared.callbacks.send(event),
            None => false,
        }
    }

    fn shared(&self, handle: ComponentHandle) -> RuntimeResult<Arc<Shared>> {
        lock(&self.instances)
            .get(&handle)
            .map(|instance| Arc::clone(&instance.shared))
            .ok_or(ErrorCode::BadHandle)
    }
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRuntime")
            .field("registered", &self.registered().len())
            .field("instances", &self.instance_count())
            .finish()
    }
}

impl Drop for LocalRuntime {
    fn drop(&mut self) {
        let instances: Vec<Instance> = lock(&self.instances).drain().map(|(_, i)| i).collect();
        for instance in instances {
            stop_worker(instance);
        }
    }
}

impl ComponentRuntime for LocalRuntime {
    fn exists(&self, name: &str) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    fn has_role(&self, name: &str, role: &str) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .is_some_and(|r| r.roles.iter().any(|r| r == role))
    }

    fn instantiate(&self, name: &str, callbacks: CallbackSender) -> RuntimeResult<ComponentHandle> {
        let factory = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            let registration = registry.get(name).ok_or(ErrorCode::ComponentNotFound)?;
            Arc::clone(&registration.factory)
        };

        let handle = ComponentHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(Shared {
            handle,
            callbacks,
            inner: Mutex::new(InstanceState {
                component: factory(),
                state: LifecycleState::Loaded,
                disabled_ports: HashSet::new(),
            }),
        });

        let (commands, queue) = kanal::unbounded::<Command>();
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(format!("{name}-{}", handle.0))
            .spawn(move || {
                while let Ok(command) = queue.recv() {
                    worker_shared.execute(command);
                }
            })
            .map_err(|_| ErrorCode::InsufficientResources)?;

        tracing::debug!(%name, %handle, "Instantiated component");
        lock(&self.instances).insert(
            handle,
            Instance {
                name: name.to_string(),
                commands,
                shared,
                worker: Some(worker),
            },
        );
        Ok(handle)
    }

    fn send_command(&self, handle: ComponentHandle, command: Command) -> RuntimeResult<()> {
        let instances = lock(&self.instances);
        let instance = instances.get(&handle).ok_or(ErrorCode::BadHandle)?;
        lock(&self.log).push(CommandRecord {
            handle,
            name: instance.name.clone(),
            command,
        });
        instance
            .commands
            .send(command)
            .map_err(|_| ErrorCode::InsufficientResources)
    }

    fn get_parameter(
        &self,
        handle: ComponentHandle,
        index: ParamIndex,
        port: PortIndex,
    ) -> RuntimeResult<Parameter> {
        let shared = self.shared(handle)?;
        let inner = lock(&shared.inner);
        inner.component.get_parameter(index, port)
    }

    fn set_parameter(&self, handle: ComponentHandle, param: Parameter) -> RuntimeResult<()> {
        let shared = self.shared(handle)?;
        let ctx = ComponentContext::new(handle, &shared.callbacks);
        let mut inner = lock(&shared.inner);
        inner.component.set_parameter(param, &ctx)
    }

    fn setup_tunnel(
        &self,
        output: ComponentHandle,
        out_port: PortIndex,
        input: ComponentHandle,
        in_port: PortIndex,
    ) -> RuntimeResult<()> {
        {
            let instances = lock(&self.instances);
            if !instances.contains_key(&output) || !instances.contains_key(&input) {
                return Err(ErrorCode::BadHandle);
            }
        }
        let record = TunnelRecord {
            output,
            out_port,
            input,
            in_port,
        };
        let mut tunnels = lock(&self.tunnels);
        let busy = tunnels.iter().any(|t| {
            (t.output, t.out_port) == (output, out_port) || (t.input, t.in_port) == (input, in_port)
        });
        if busy {
            return Err(ErrorCode::PortsNotCompatible);
        }
        tunnels.push(record);
        Ok(())
    }

    fn teardown_tunnel(
        &self,
        output: ComponentHandle,
        out_port: PortIndex,
        input: ComponentHandle,
        in_port: PortIndex,
    ) -> RuntimeResult<()> {
        let record = TunnelRecord {
            output,
            out_port,
            input,
            in_port,
        };
        let mut tunnels = lock(&self.tunnels);
        let before = tunnels.len();
        tunnels.retain(|t| *t != record);
        if tunnels.len() == before {
            return Err(ErrorCode::BadParameter);
        }
        Ok(())
    }

    fn destroy(&self, handle: ComponentHandle) -> RuntimeResult<()> {
        let instance = lock(&self.instances)
            .remove(&handle)
            .ok_or(ErrorCode::BadHandle)?;
        lock(&self.tunnels).retain(|t| t.output != handle && t.input != handle);
        tracing::debug!(name = %instance.name, %handle, "Destroyed component");
        stop_worker(instance);
        Ok(())
    }
}

fn stop_worker(mut instance: Instance) {
    let worker = instance.worker.take();
    drop(instance);
    if let Some(worker) = worker {
        if worker.join().is_err() {
            tracing::warn!("Component worker panicked");
        }
    }
}

impl Shared {
    fn execute(&self, command: Command) {
        let ctx = ComponentContext::new(self.handle, &self.callbacks);
        let mut inner = lock(&self.inner);

        match command {
            Command::SetState(to) => {
                let from = inner.state;
                if from == to {
                    self.callbacks.state_changed(self.handle, to);
                    return;
                }
                if !from.can_transition_to(to) {
                    tracing::warn!(handle = %self.handle, %from, %to, "Rejected transition");
                    self.callbacks
                        .error(self.handle, ErrorCode::IncorrectStateTransition);
                    return;
                }
                match inner.component.on_transition(from, to, &ctx) {
                    Ok(()) => {
                        inner.state = to;
                        tracing::trace!(handle = %self.handle, %from, %to, "Transition complete");
                        self.callbacks.state_changed(self.handle, to);
                        inner.component.on_entered(to, &ctx);
                    }
                    Err(code) => {
                        self.callbacks.error(self.handle, code);
                    }
                }
            }
            Command::DisablePort(port) | Command::EnablePort(port) => {
                let enable = matches!(command, Command::EnablePort(_));
                match inner.component.on_port_command(port, enable, &ctx) {
                    Ok(()) => {
                        if enable {
                            inner.disabled_ports.remove(&port);
                        } else {
                            inner.disabled_ports.insert(port);
                        }
                        self.callbacks
                            .port_command_complete(self.handle, port, enable);
                    }
                    Err(code) => {
                        self.callbacks.error(self.handle, code);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{EventDispatcher, ExpectedEvent, ExpectedSet};
    use crate::runtime::StubComponent;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn runtime() -> LocalRuntime {
        let runtime = LocalRuntime::new();
        runtime.register("renderer.pcm", ["audio_renderer.pcm"], StubComponent::new);
        runtime
    }

    #[test]
    fn test_registry_lookup() {
        let runtime = runtime();
        assert!(runtime.exists("renderer.pcm"));
        assert!(!runtime.exists("decoder.flac"));
        assert!(!runtime.has_role("decoder.flac", "audio_decoder.flac"));
        assert_eq!(runtime.registered(), vec!["renderer.pcm".to_string()]);
    }

    #[test]
    fn test_instantiate_unknown() {
        let runtime = runtime();
        let dispatcher = EventDispatcher::new();
        assert_eq!(
            runtime.instantiate("nope", dispatcher.callbacks()),
            Err(ErrorCode::ComponentNotFound)
        );
    }

    #[test]
    fn test_state_command_completes() {
        let runtime = runtime();
        let mut dispatcher = EventDispatcher::new();
        let handle = runtime
            .instantiate("renderer.pcm", dispatcher.callbacks())
            .unwrap();

        runtime
            .send_command(handle, Command::SetState(LifecycleState::Idle))
            .unwrap();
        let mut expected = ExpectedSet::new().with(handle, ExpectedEvent::State(LifecycleState::Idle));
        dispatcher.wait_for(&mut expected, WAIT).unwrap();
        assert_eq!(runtime.state(handle), Some(LifecycleState::Idle));
    }

    #[test]
    fn test_illegal_transition_reports_error() {
        let runtime = runtime();
        let mut dispatcher = EventDispatcher::new();
        let handle = runtime
            .instantiate("renderer.pcm", dispatcher.callbacks())
            .unwrap();

        runtime
            .send_command(handle, Command::SetState(LifecycleState::Executing))
            .unwrap();
        let mut expected =
            ExpectedSet::new().with(handle, ExpectedEvent::State(LifecycleState::Executing));
        let err = dispatcher.wait_for(&mut expected, WAIT).unwrap_err();
        assert!(matches!(
            err,
            crate::dispatch::WaitError::Component {
                code: ErrorCode::IncorrectStateTransition,
                ..
            }
        ));
        assert_eq!(runtime.state(handle), Some(LifecycleState::Loaded));
    }

    #[test]
    fn test_port_commands_are_idempotent() {
        let runtime = runtime();
        let mut dispatcher = EventDispatcher::new();
        let handle = runtime
            .instantiate("renderer.pcm", dispatcher.callbacks())
            .unwrap();

        for _ in 0..2 {
            runtime.send_command(handle, Command::DisablePort(0)).unwrap();
            let mut expected = ExpectedSet::new().with(handle, ExpectedEvent::PortDisabled(0));
            dispatcher.wait_for(&mut expected, WAIT).unwrap();
        }
        assert_eq!(runtime.port_enabled(handle, 0), Some(false));

        runtime.send_command(handle, Command::EnablePort(0)).unwrap();
        let mut expected = ExpectedSet::new().with(handle, ExpectedEvent::PortEnabled(0));
        dispatcher.wait_for(&mut expected, WAIT).unwrap();
        assert_eq!(runtime.port_enabled(handle, 0), Some(true));
        assert_eq!(runtime.command_log().len(), 3);
    }

    #[test]
    fn test_tunnels_and_destroy() {
        let runtime = runtime();
        let dispatcher = EventDispatcher::new();
        let a = runtime
            .instantiate("renderer.pcm", dispatcher.callbacks())
            .unwrap();
        let b = runtime
            .instantiate("renderer.pcm", dispatcher.callbacks())
            .unwrap();

        runtime.setup_tunnel(a, 1, b, 0).unwrap();
        assert_eq!(
            runtime.setup_tunnel(a, 1, b, 0),
            Err(ErrorCode::PortsNotCompatible)
        );
        assert_eq!(runtime.tunnels().len(), 1);
        assert_eq!(runtime.handle_of("renderer.pcm"), Some(a));

        runtime.destroy(a).unwrap();
        assert!(runtime.tunnels().is_empty());
        assert_eq!(runtime.instance_count(), 1);
        assert_eq!(runtime.destroy(a), Err(ErrorCode::BadHandle));
        assert_eq!(runtime.teardown_tunnel(a, 1, b, 0), Err(ErrorCode::BadParameter));
    }
}
