//! Component fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tunnelgraph::component::{
    AudioCoding, ComponentHandle, FlacParams, LifecycleState, Mp3Params, MuteConfig, ParamIndex,
    Parameter, PortDefinition, VolumeConfig,
};
use tunnelgraph::graph::{ChainRole, GraphConfig, GraphController};
use tunnelgraph::notify::GraphEvent;
use tunnelgraph::ops::GraphOps;
use tunnelgraph::probe::{ProbeResult, StaticProbe};
use tunnelgraph::runtime::{LocalRuntime, StubAction, StubComponent};

/// How long tests wait for asynchronous notifications.
pub const WAIT: Duration = Duration::from_millis(300);

pub const TRACKS: [&str; 3] = ["/music/a.flac", "/music/b.flac", "/music/c.flac"];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn flac_decoder() -> StubComponent {
    StubComponent::new()
        .with_parameter(Parameter::Flac(FlacParams::default()))
        .on_change(ParamIndex::Flac, 0, 1, ParamIndex::Pcm)
}

pub fn mp3_decoder() -> StubComponent {
    StubComponent::new()
        .with_parameter(Parameter::Mp3(Mp3Params::default()))
        .on_change(ParamIndex::Mp3, 0, 1, ParamIndex::Pcm)
}

pub fn renderer() -> StubComponent {
    StubComponent::new()
        .with_ports(1)
        .with_parameter(Parameter::Volume(VolumeConfig { port: 0, level: 50 }))
        .with_parameter(Parameter::Mute(MuteConfig {
            port: 0,
            muted: false,
        }))
}

/// A runtime with every component the file strategies use.
pub fn file_runtime() -> LocalRuntime {
    let runtime = LocalRuntime::new();
    runtime.register("demux.ogg", ["container_demuxer.ogg"], StubComponent::new);
    runtime.register("reader.binary", ["audio_reader.binary"], StubComponent::new);
    runtime.register("decoder.flac", ["audio_decoder.flac"], flac_decoder);
    runtime.register("decoder.mp3", ["audio_decoder.mp3"], mp3_decoder);
    runtime.register("renderer.pcm", ["audio_renderer.pcm"], renderer);
    runtime
}

/// An HTTP source that reports `coding` once it runs.
pub fn http_source(coding: AudioCoding) -> StubComponent {
    StubComponent::new()
        .with_ports(1)
        .with_parameter(Parameter::PortDefinition(PortDefinition::audio_output(
            0,
            AudioCoding::Unused,
        )))
        .with_metadata("title", "Night Radio")
        .with_metadata("genre", "ambient")
        .on_enter(
            LifecycleState::Executing,
            StubAction::SetParameter(Parameter::PortDefinition(PortDefinition::audio_output(
                0, coding,
            ))),
        )
        .on_enter(
            LifecycleState::Executing,
            StubAction::SetParameter(Parameter::Mp3(Mp3Params {
                port: 0,
                channels: 2,
                sample_rate: 44_100,
                bit_rate: 128_000,
            })),
        )
        .on_enter(
            LifecycleState::Executing,
            StubAction::PortSettingsChanged {
                port: 0,
                index: ParamIndex::PortDefinition,
            },
        )
}

pub fn http_runtime(coding: AudioCoding) -> LocalRuntime {
    let runtime = LocalRuntime::new();
    runtime.register("source.http", ["audio_source.http"], move || {
        http_source(coding)
    });
    runtime.register("decoder.mp3", ["audio_decoder.mp3"], StubComponent::new);
    runtime.register("decoder.aac", ["audio_decoder.aac"], StubComponent::new);
    runtime.register("renderer.pcm", ["audio_renderer.pcm"], renderer);
    runtime
}

/// A probe that knows [`TRACKS`] as 44.1 kHz stereo FLAC.
pub fn flac_probe() -> StaticProbe {
    TRACKS.iter().fold(StaticProbe::new(), |probe, uri| {
        probe.with(ProbeResult::flac(*uri, 44_100, 2, 16))
    })
}

pub fn controller(
    runtime: &Arc<LocalRuntime>,
    probe: StaticProbe,
    ops: Box<dyn GraphOps>,
) -> GraphController {
    GraphController::with_config(
        runtime.clone(),
        Arc::new(probe),
        ops,
        GraphConfig::fast(),
    )
}

pub fn handle(graph: &GraphController, slot: ChainRole) -> ComponentHandle {
    graph.core().chain().handle(slot).unwrap()
}

/// Whether any live component is still running.
pub fn any_executing(runtime: &LocalRuntime, graph: &GraphController) -> bool {
    graph
        .core()
        .chain()
        .iter()
        .any(|c| runtime.state(c.handle) == Some(LifecycleState::Executing))
}

pub fn count_errors(events: &[GraphEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, GraphEvent::Error { .. }))
        .count()
}
