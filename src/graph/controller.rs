//! The public graph state machine.

use super::config::{GraphConfig, PlaybackConfig};
use super::core::GraphCore;
use super::playlist::Playlist;
use crate::component::{ComponentRuntime, GraphState, LifecycleState};
use crate::error::{Error, Result};
use crate::notify::{EventReceiver, NotificationSink};
use crate::ops::GraphOps;
use crate::probe::Probe;
use std::sync::Arc;

/// Drives a component chain through load, configure, execute, pause, skip
/// and unload for one format strategy.
///
/// Commands block until every component has confirmed the step, or fail on
/// the first error or timeout. Asynchronous errors and end of stream are
/// handled by [`process_notifications`](Self::process_notifications) and
/// friends, which run recovery and playlist advance.
///
/// ```text
/// Uninstantiated ─load─▶ Loaded ─execute─▶ Idle ─▶ Executing ⇄ Paused
///        ▲                  │                          │
///        └──────unload──────┴──────────unload──────────┘
/// ```
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tunnelgraph::graph::{GraphController, PlaybackConfig};
/// use tunnelgraph::ops::FlacOps;
/// use tunnelgraph::probe::StaticProbe;
/// use tunnelgraph::runtime::LocalRuntime;
///
/// # fn main() -> tunnelgraph::Result<()> {
/// let runtime = Arc::new(LocalRuntime::new());
/// let probe = Arc::new(StaticProbe::new());
/// let mut graph = GraphController::new(runtime, probe, Box::new(FlacOps::new()));
///
/// graph.load()?;
/// graph.configure(PlaybackConfig::new(["/music/a.flac", "/music/b.flac"]))?;
/// graph.execute()?;
/// # Ok(())
/// # }
/// ```
pub struct GraphController {
    pub(super) core: GraphCore,
    pub(super) ops: Box<dyn GraphOps>,
}

impl GraphController {
    /// Create a controller with the default configuration.
    pub fn new(
        runtime: Arc<dyn ComponentRuntime>,
        probe: Arc<dyn Probe>,
        ops: Box<dyn GraphOps>,
    ) -> Self {
        Self::with_config(runtime, probe, ops, GraphConfig::default())
    }

    /// Create a controller with a custom configuration.
    pub fn with_config(
        runtime: Arc<dyn ComponentRuntime>,
        probe: Arc<dyn Probe>,
        ops: Box<dyn GraphOps>,
        config: GraphConfig,
    ) -> Self {
        Self {
            core: GraphCore::new(runtime, probe, config),
            ops,
        }
    }

    /// Deliver notifications to `sink` as well.
    pub fn add_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        self.core.add_sink(sink);
    }

    /// Subscribe to graph events.
    pub fn subscribe(&self) -> EventReceiver {
        self.core.events().subscribe()
    }

    /// Nominal graph state.
    pub fn state(&self) -> GraphState {
        self.core.state()
    }

    /// The shared machinery, for inspection.
    pub fn core(&self) -> &GraphCore {
        &self.core
    }

    /// Name of the format strategy.
    pub fn ops_name(&self) -> &'static str {
        self.ops.name()
    }

    /// Playlist cursor.
    pub fn cursor(&self) -> usize {
        self.core.playlist().cursor()
    }

    /// Attempts made for the current entry.
    pub fn attempts(&self) -> u32 {
        self.core.attempts()
    }

    fn require(&self, command: &'static str, allowed: &[GraphState]) -> Result<()> {
        let state = self.core.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                command,
                state: state.to_string(),
            })
        }
    }

    pub(super) fn is_playing(&self) -> bool {
        self.core.state().is_playing()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Verify and instantiate the chain.
    pub fn load(&mut self) -> Result<()> {
        self.require("load", &[GraphState::Uninstantiated])?;
        tracing::debug!(ops = self.ops.name(), "Loading graph");
        self.ops.load_source(&mut self.core)
    }

    /// Store the playlist and link the loaded components.
    pub fn configure(&mut self, playback: PlaybackConfig) -> Result<()> {
        self.require("configure", &[GraphState::Component(LifecycleState::Loaded)])?;
        if playback.uris.is_empty() {
            return Err(Error::EmptyPlaylist);
        }
        tracing::debug!(
            entries = playback.uris.len(),
            continuous = playback.continuous,
            "Configuring graph"
        );
        self.core.playlist = Playlist::new(playback);
        self.ops.link(&mut self.core)
    }

    /// Play the entry under the cursor.
    ///
    /// Recoverable failures are retried with the strategy's alternates. An
    /// error that survives recovery is reported to the notification sinks
    /// and returned.
    pub fn execute(&mut self) -> Result<()> {
        self.require("execute", &[GraphState::Component(LifecycleState::Loaded)])?;
        if self.core.playlist().is_empty() {
            return Err(Error::EmptyPlaylist);
        }
        self.core.start_entry();
        self.run_entry()
    }

    /// Toggle between Executing and Paused.
    pub fn pause(&mut self) -> Result<()> {
        let to = match self.core.state() {
            GraphState::Component(LifecycleState::Executing) => LifecycleState::Paused,
            GraphState::Component(LifecycleState::Paused) => LifecycleState::Executing,
            state => {
                return Err(Error::InvalidState {
                    command: "pause",
                    state: state.to_string(),
                });
            }
        };
        tracing::debug!(%to, "Pause toggle");
        self.ops.pause_transition(&mut self.core, to)
    }

    /// Seek within the current entry.
    pub fn seek(&mut self) -> Result<()> {
        if !self.is_playing() {
            return Ok(());
        }
        self.ops.seek(&mut self.core)
    }

    /// Move `offset` entries and play from there.
    ///
    /// Does nothing for a zero offset or when not playing.
    pub fn skip(&mut self, offset: i64) -> Result<()> {
        if offset == 0 || !self.is_playing() {
            tracing::debug!(offset, state = %self.core.state(), "Skip ignored");
            return Ok(());
        }

        self.core.teardown_to_loaded();
        self.ops.reset_chain(&mut self.core)?;
        self.core.playlist.skip(offset);
        tracing::debug!(offset, cursor = self.core.playlist().cursor(), "Skipping");
        self.core.start_entry();
        self.run_entry()
    }

    /// Change the volume by `step` steps.
    pub fn volume(&mut self, step: i32) -> Result<()> {
        if self.core.state() == GraphState::Uninstantiated {
            return Err(Error::InvalidState {
                command: "volume",
                state: self.core.state().to_string(),
            });
        }
        self.ops.adjust_volume(&mut self.core, step)
    }

    /// Toggle mute.
    pub fn mute(&mut self) -> Result<()> {
        if self.core.state() == GraphState::Uninstantiated {
            return Err(Error::InvalidState {
                command: "mute",
                state: self.core.state().to_string(),
            });
        }
        self.ops.adjust_mute(&mut self.core)
    }

    /// Stop, tear down and destroy the chain.
    ///
    /// Best effort: failures along the way are logged and the chain is
    /// destroyed regardless.
    pub fn unload(&mut self) -> Result<()> {
        if self.core.state() == GraphState::Uninstantiated && self.core.chain().is_empty() {
            return Ok(());
        }
        tracing::debug!(ops = self.ops.name(), "Unloading graph");
        self.core.teardown_to_loaded();
        self.core.destroy_chain();
        self.core.dispatcher_mut().clear();
        self.core.start_entry();
        self.ops.reset();
        Ok(())
    }

    // ========================================================================
    // Entry execution
    // ========================================================================

    /// Run one attempt, falling back to recovery on failure.
    pub(super) fn run_entry(&mut self) -> Result<()> {
        match self.attempt() {
            Ok(()) => Ok(()),
            Err(err) => self.recover(err),
        }
    }

    pub(super) fn attempt(&mut self) -> Result<()> {
        let playlist = &mut self.core.playlist;
        if playlist.wrap() {
            tracing::debug!("Playlist wrapped to the first entry");
        }
        let cursor = playlist.cursor();
        let uri = playlist
            .current()
            .map(str::to_string)
            .ok_or(Error::EmptyPlaylist)?;

        let attempt = self.core.begin_attempt();
        tracing::info!(%uri, cursor, attempt, ops = self.ops.name(), "Executing entry");
        if attempt == 1 {
            self.core.notify(|s| s.notify_entry_started(cursor, &uri));
        }

        let ops = &mut self.ops;
        let core = &mut self.core;
        ops.configure_source(core, &uri)?;
        ops.enable_format_auto_detection(core)?;
        ops.disable_negotiation_ports(core)?;
        ops.preroll(core)?;
        ops.load_remaining_chain(core)?;
        core.connect()?;
        ops.configure_chain(core)?;
        ops.disable_tunnels(core)?;
        core.bring_up(LifecycleState::Idle)?;
        core.bring_up(LifecycleState::Executing)?;
        ops.enable_tunnels(core)?;
        core.settle_negotiation();
        Ok(())
    }
}

impl std::fmt::Debug for GraphController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphController")
            .field("ops", &self.ops.name())
            .field("core", &self.core)
            .finish()
    }
}
