//! Integration tests for the graph controller on local files.

mod common;

use common::*;
use std::sync::Arc;
use tunnelgraph::component::{
    ComponentRuntime, GraphState, LifecycleState, ParamIndex, Parameter, PortDomain,
};
use tunnelgraph::dispatch::ComponentEvent;
use tunnelgraph::error::{Error, ErrorCode};
use tunnelgraph::graph::{ChainRole, GraphConfig, GraphController, PlaybackConfig};
use tunnelgraph::notify::GraphEvent;
use tunnelgraph::ops::{FlacOps, Mp3Ops};
use tunnelgraph::probe::{ProbeResult, StaticProbe};
use tunnelgraph::runtime::{LocalRuntime, StubComponent};

const EXECUTING: GraphState = GraphState::Component(LifecycleState::Executing);
const LOADED: GraphState = GraphState::Component(LifecycleState::Loaded);

fn playing_flac(tracks: &[&str]) -> (Arc<LocalRuntime>, GraphController) {
    let runtime = Arc::new(file_runtime());
    let mut graph = controller(&runtime, flac_probe(), Box::new(FlacOps::new()));
    graph.load().unwrap();
    graph
        .configure(PlaybackConfig::new(tracks.iter().copied()))
        .unwrap();
    graph.execute().unwrap();
    (runtime, graph)
}

fn post_eos(runtime: &LocalRuntime, graph: &GraphController, slot: ChainRole) {
    let handle = handle(graph, slot);
    assert!(runtime.post(handle, ComponentEvent::EndOfStream { handle, port: 0 }));
}

/// Load, configure and execute bring every component to Executing.
#[test]
fn test_flac_nominal_playback() {
    init_tracing();
    let runtime = Arc::new(file_runtime());
    let mut graph = controller(&runtime, flac_probe(), Box::new(FlacOps::new()));
    let mut events = graph.subscribe();
    assert_eq!(graph.state(), GraphState::Uninstantiated);

    graph.load().unwrap();
    assert_eq!(graph.state(), LOADED);
    assert_eq!(
        runtime.instance_names(),
        vec!["demux.ogg", "decoder.flac", "renderer.pcm"]
    );

    graph.configure(PlaybackConfig::new(TRACKS)).unwrap();
    assert_eq!(runtime.tunnels().len(), 2);

    graph.execute().unwrap();
    assert_eq!(graph.state(), EXECUTING);
    for component in graph.core().chain().iter() {
        assert_eq!(runtime.state(component.handle), Some(LifecycleState::Executing));
    }

    // The demuxer's video port stays disabled.
    let demux = handle(&graph, ChainRole::Source);
    assert_eq!(runtime.port_enabled(demux, 1), Some(false));

    // The renderer was configured from the probed stream.
    let renderer = handle(&graph, ChainRole::Renderer);
    match runtime.get_parameter(renderer, ParamIndex::Pcm, 0).unwrap() {
        Parameter::Pcm(pcm) => {
            assert_eq!(pcm.sample_rate, 44_100);
            assert_eq!(pcm.channels, 2);
        }
        other => panic!("unexpected parameter {other:?}"),
    }

    let events = events.drain();
    assert!(events.contains(&GraphEvent::EntryStarted {
        index: 0,
        uri: TRACKS[0].to_string(),
    }));
    assert!(events.iter().any(|e| matches!(e, GraphEvent::StreamInfo(info) if info.sample_rate == 44_100)));
    assert!(events.contains(&GraphEvent::StateChanged(EXECUTING)));
    assert_eq!(count_errors(&events), 0);
}

#[test]
fn test_mp3_nominal_playback() {
    let runtime = Arc::new(file_runtime());
    let probe = StaticProbe::new().with(ProbeResult::mp3("/music/song.mp3", 48_000, 2, 192_000));
    let mut graph = controller(&runtime, probe, Box::new(Mp3Ops::new()));

    graph.load().unwrap();
    graph
        .configure(PlaybackConfig::new(["/music/song.mp3"]))
        .unwrap();
    graph.execute().unwrap();

    assert_eq!(graph.state(), EXECUTING);
    assert_eq!(
        runtime.instance_names(),
        vec!["reader.binary", "decoder.mp3", "renderer.pcm"]
    );
    let renderer = handle(&graph, ChainRole::Renderer);
    match runtime.get_parameter(renderer, ParamIndex::Pcm, 0).unwrap() {
        Parameter::Pcm(pcm) => assert_eq!(pcm.sample_rate, 48_000),
        other => panic!("unexpected parameter {other:?}"),
    }
}

#[test]
fn test_commands_rejected_in_wrong_state() {
    let runtime = Arc::new(file_runtime());
    let mut graph = controller(&runtime, flac_probe(), Box::new(FlacOps::new()));

    assert!(matches!(graph.execute(), Err(Error::InvalidState { .. })));
    assert!(matches!(graph.pause(), Err(Error::InvalidState { .. })));
    assert!(matches!(graph.volume(1), Err(Error::InvalidState { .. })));
    assert!(matches!(graph.mute(), Err(Error::InvalidState { .. })));

    graph.load().unwrap();
    assert!(matches!(graph.load(), Err(Error::InvalidState { .. })));
    assert!(matches!(
        graph.configure(PlaybackConfig::new(Vec::<String>::new())),
        Err(Error::EmptyPlaylist)
    ));
    // Seek and skip do nothing while stopped.
    graph.seek().unwrap();
    graph.skip(1).unwrap();
    assert_eq!(graph.cursor(), 0);
}

#[test]
fn test_pause_toggles() {
    let (runtime, mut graph) = playing_flac(&TRACKS);

    graph.pause().unwrap();
    assert_eq!(graph.state(), GraphState::Component(LifecycleState::Paused));
    for component in graph.core().chain().iter() {
        assert_eq!(runtime.state(component.handle), Some(LifecycleState::Paused));
    }

    graph.pause().unwrap();
    assert_eq!(graph.state(), EXECUTING);
}

#[test]
fn test_skip_moves_and_clamps() {
    let (_runtime, mut graph) = playing_flac(&TRACKS);
    let mut events = graph.subscribe();

    graph.skip(0).unwrap();
    assert_eq!(graph.cursor(), 0);

    graph.skip(1).unwrap();
    assert_eq!(graph.cursor(), 1);
    assert_eq!(graph.state(), EXECUTING);
    assert!(events.drain().contains(&GraphEvent::EntryStarted {
        index: 1,
        uri: TRACKS[1].to_string(),
    }));

    graph.skip(-5).unwrap();
    assert_eq!(graph.cursor(), 0);

    // Past the end clamps to the length, and the next entry wraps to 0.
    graph.skip(10).unwrap();
    assert_eq!(graph.cursor(), 0);
    assert_eq!(graph.state(), EXECUTING);
    assert_eq!(graph.attempts(), 1);
}

#[test]
fn test_skip_while_paused() {
    let (runtime, mut graph) = playing_flac(&TRACKS);
    graph.pause().unwrap();

    graph.skip(1).unwrap();
    assert_eq!(graph.cursor(), 1);
    assert_eq!(graph.state(), EXECUTING);
    for component in graph.core().chain().iter() {
        assert_eq!(runtime.state(component.handle), Some(LifecycleState::Executing));
    }
}

/// An end of stream still queued when a skip starts the next entry belongs
/// to the entry that was skipped.
#[test]
fn test_end_of_stream_before_skip_dropped() {
    let (runtime, mut graph) = playing_flac(&TRACKS);

    post_eos(&runtime, &graph, ChainRole::Renderer);
    graph.skip(1).unwrap();
    assert_eq!(graph.cursor(), 1);

    assert_eq!(graph.process_notifications().unwrap(), 0);
    assert_eq!(graph.cursor(), 1);
    assert_eq!(graph.state(), EXECUTING);
}

#[test]
fn test_error_before_end_of_stream_dropped() {
    let (runtime, mut graph) = playing_flac(&TRACKS);
    let mut events = graph.subscribe();
    let demuxer = handle(&graph, ChainRole::Source);

    // Both reach the channel before either is handled; the end of stream
    // finishes the entry, so the error must not retry the next one.
    post_eos(&runtime, &graph, ChainRole::Renderer);
    assert!(runtime.post(
        demuxer,
        ComponentEvent::Error {
            handle: demuxer,
            code: ErrorCode::StreamCorrupt,
        }
    ));
    graph.drain_notifications(WAIT).unwrap();

    assert_eq!(graph.cursor(), 1);
    assert_eq!(graph.attempts(), 1);
    let events = events.drain();
    assert_eq!(count_errors(&events), 0);
    assert!(!events.iter().any(|e| matches!(e, GraphEvent::Retry { .. })));
}

/// Settings changes the decoder reports without anyone waiting for them
/// do not pile up across entries.
#[test]
fn test_unawaited_settings_not_kept_across_entries() {
    let runtime = Arc::new(file_runtime());
    let probe = StaticProbe::new()
        .with(ProbeResult::flac(TRACKS[0], 44_100, 2, 16))
        .with(ProbeResult::flac(TRACKS[1], 44_100, 2, 24));
    let mut graph = controller(&runtime, probe, Box::new(FlacOps::new()));
    graph.load().unwrap();
    graph
        .configure(PlaybackConfig::new(TRACKS[..2].iter().copied()).continuous(true))
        .unwrap();
    graph.execute().unwrap();
    assert_eq!(graph.core().deferred_events(), 0);

    for played in 1..=6 {
        post_eos(&runtime, &graph, ChainRole::Renderer);
        assert!(graph.wait_notification(WAIT).unwrap());
        assert_eq!(graph.cursor(), played % 2);
        assert_eq!(graph.core().deferred_events(), 0);
    }
    assert_eq!(graph.state(), EXECUTING);
}

#[test]
fn test_zero_event_capacity_clamped() {
    let runtime = Arc::new(file_runtime());
    let config = GraphConfig {
        event_capacity: 0,
        ..GraphConfig::fast()
    };
    let mut graph = GraphController::with_config(
        runtime.clone(),
        Arc::new(flac_probe()),
        Box::new(FlacOps::new()),
        config,
    );
    let mut events = graph.subscribe();

    graph.load().unwrap();
    assert!(!events.drain().is_empty());
}

#[test]
fn test_volume_and_mute() {
    let (runtime, mut graph) = playing_flac(&TRACKS);
    let renderer = handle(&graph, ChainRole::Renderer);
    let level = || match runtime.get_parameter(renderer, ParamIndex::Volume, 0) {
        Ok(Parameter::Volume(volume)) => volume.level,
        other => panic!("unexpected {other:?}"),
    };

    graph.volume(2).unwrap();
    assert_eq!(level(), 60);
    graph.volume(100).unwrap();
    assert_eq!(level(), 100);
    graph.volume(-100).unwrap();
    assert_eq!(level(), 0);

    graph.mute().unwrap();
    assert_eq!(
        runtime.get_parameter(renderer, ParamIndex::Mute, 0),
        Ok(Parameter::Mute(tunnelgraph::component::MuteConfig {
            port: 0,
            muted: true
        }))
    );
    graph.mute().unwrap();
    assert!(matches!(
        runtime.get_parameter(renderer, ParamIndex::Mute, 0),
        Ok(Parameter::Mute(m)) if !m.muted
    ));
}

#[test]
fn test_probe_mismatch_reports_content_uri() {
    let runtime = Arc::new(file_runtime());
    let probe = StaticProbe::new().with(ProbeResult::other(TRACKS[0], PortDomain::Video));
    let mut graph = controller(&runtime, probe, Box::new(FlacOps::new()));
    let mut events = graph.subscribe();

    graph.load().unwrap();
    graph.configure(PlaybackConfig::new([TRACKS[0]])).unwrap();
    let err = graph.execute().unwrap_err();

    assert!(matches!(err, Error::ContentUri { .. }));
    assert!(!any_executing(&runtime, &graph));
    assert_eq!(graph.state(), LOADED);

    let events = events.drain();
    assert_eq!(count_errors(&events), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        GraphEvent::Error { code: ErrorCode::ContentUriError, .. }
    )));
}

#[test]
fn test_missing_component_fails_load() {
    let runtime = LocalRuntime::new();
    runtime.register("demux.ogg", ["container_demuxer.ogg"], StubComponent::new);
    runtime.register("renderer.pcm", ["audio_renderer.pcm"], renderer);
    let runtime = Arc::new(runtime);
    let mut graph = controller(&runtime, flac_probe(), Box::new(FlacOps::new()));

    match graph.load() {
        Err(Error::ComponentNotFound { name }) => assert_eq!(name, "decoder.flac"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(runtime.instance_count(), 0);
    assert_eq!(graph.state(), GraphState::Uninstantiated);
}

#[test]
fn test_role_mismatch_fails_load() {
    let runtime = file_runtime();
    runtime.register("decoder.flac", ["audio_decoder.mp3"], flac_decoder);
    let runtime = Arc::new(runtime);
    let mut graph = controller(&runtime, flac_probe(), Box::new(FlacOps::new()));

    assert!(matches!(graph.load(), Err(Error::RoleMismatch { .. })));
    assert_eq!(runtime.instance_count(), 0);
}

#[test]
fn test_end_of_stream_from_decoder_ignored() {
    let (runtime, mut graph) = playing_flac(&TRACKS);

    post_eos(&runtime, &graph, ChainRole::Decoder);
    assert!(graph.wait_notification(WAIT).unwrap());

    assert_eq!(graph.cursor(), 0);
    assert_eq!(graph.attempts(), 1);
    assert_eq!(graph.state(), EXECUTING);
}

#[test]
fn test_end_of_stream_advances() {
    let (runtime, mut graph) = playing_flac(&TRACKS);
    let mut events = graph.subscribe();

    post_eos(&runtime, &graph, ChainRole::Renderer);
    assert!(graph.wait_notification(WAIT).unwrap());

    assert_eq!(graph.cursor(), 1);
    assert_eq!(graph.state(), EXECUTING);
    assert!(events.drain().contains(&GraphEvent::EntryStarted {
        index: 1,
        uri: TRACKS[1].to_string(),
    }));
}

#[test]
fn test_end_of_play_reported_once() {
    let (runtime, mut graph) = playing_flac(&TRACKS[..1]);
    let mut events = graph.subscribe();

    post_eos(&runtime, &graph, ChainRole::Renderer);
    assert!(graph.wait_notification(WAIT).unwrap());
    assert_eq!(graph.state(), LOADED);
    assert!(!any_executing(&runtime, &graph));

    // A late end of stream after the playlist ended changes nothing.
    post_eos(&runtime, &graph, ChainRole::Renderer);
    graph.drain_notifications(WAIT).unwrap();

    let end_of_play = events
        .drain()
        .into_iter()
        .filter(|e| *e == GraphEvent::EndOfPlay)
        .count();
    assert_eq!(end_of_play, 1);

    // Executing again starts over from the first entry.
    graph.execute().unwrap();
    assert_eq!(graph.cursor(), 0);
    assert_eq!(graph.state(), EXECUTING);
}

#[test]
fn test_continuous_playlist_wraps() {
    let runtime = Arc::new(file_runtime());
    let mut graph = controller(&runtime, flac_probe(), Box::new(FlacOps::new()));
    graph.load().unwrap();
    graph
        .configure(PlaybackConfig::new(TRACKS[..2].iter().copied()).continuous(true))
        .unwrap();
    graph.execute().unwrap();
    let mut events = graph.subscribe();

    post_eos(&runtime, &graph, ChainRole::Renderer);
    assert!(graph.wait_notification(WAIT).unwrap());
    assert_eq!(graph.cursor(), 1);

    post_eos(&runtime, &graph, ChainRole::Renderer);
    assert!(graph.wait_notification(WAIT).unwrap());
    assert_eq!(graph.cursor(), 0);
    assert_eq!(graph.state(), EXECUTING);

    assert!(!events.drain().contains(&GraphEvent::EndOfPlay));
}

#[test]
fn test_unload_destroys_everything() {
    let (runtime, mut graph) = playing_flac(&TRACKS);

    graph.unload().unwrap();
    assert_eq!(graph.state(), GraphState::Uninstantiated);
    assert_eq!(runtime.instance_count(), 0);
    assert!(runtime.tunnels().is_empty());
    assert!(graph.core().chain().is_empty());

    // Unloading twice is harmless, and the graph can be loaded again.
    graph.unload().unwrap();
    graph.load().unwrap();
    assert_eq!(graph.state(), LOADED);
}

#[tokio::test]
async fn test_wait_end_of_play() {
    let (runtime, mut graph) = playing_flac(&TRACKS[..1]);
    let mut events = graph.subscribe();

    post_eos(&runtime, &graph, ChainRole::Renderer);
    assert!(graph.wait_notification(WAIT).unwrap());

    assert_eq!(events.wait_end_of_play().await, Ok(()));
}
