//! Integration tests for network streams, where the decoder is chosen
//! after the source starts.

mod common;

use common::*;
use std::sync::Arc;
use tunnelgraph::component::{
    AudioCoding, Command, ComponentRuntime, Endian, GraphState, LifecycleState, ParamIndex,
    Parameter,
};
use tunnelgraph::error::{Error, ErrorCode};
use tunnelgraph::graph::{ChainRole, GraphController, PlaybackConfig};
use tunnelgraph::notify::GraphEvent;
use tunnelgraph::ops::HttpClientOps;
use tunnelgraph::probe::StaticProbe;
use tunnelgraph::runtime::LocalRuntime;

const STREAM: &str = "http://radio.example/live";

fn start(runtime: &Arc<LocalRuntime>) -> GraphController {
    let mut graph = controller(runtime, StaticProbe::new(), Box::new(HttpClientOps::new()));
    graph.load().unwrap();
    assert_eq!(runtime.instance_names(), vec!["source.http"]);
    graph.configure(PlaybackConfig::new([STREAM])).unwrap();
    graph
}

#[test]
fn test_mp3_stream_plays() {
    init_tracing();
    let runtime = Arc::new(http_runtime(AudioCoding::Mp3));
    let mut graph = start(&runtime);
    let mut events = graph.subscribe();

    graph.execute().unwrap();

    assert_eq!(graph.state(), GraphState::Component(LifecycleState::Executing));
    assert_eq!(
        runtime.instance_names(),
        vec!["source.http", "decoder.mp3", "renderer.pcm"]
    );

    let renderer = handle(&graph, ChainRole::Renderer);
    match runtime.get_parameter(renderer, ParamIndex::Pcm, 0).unwrap() {
        Parameter::Pcm(pcm) => {
            assert_eq!(pcm.endian, Endian::Big);
            assert_eq!(pcm.sample_rate, 44_100);
        }
        other => panic!("unexpected parameter {other:?}"),
    }
    let decoder = handle(&graph, ChainRole::Decoder);
    assert!(matches!(
        runtime.get_parameter(decoder, ParamIndex::Mp3, 0),
        Ok(Parameter::Mp3(mp3)) if mp3.bit_rate == 128_000
    ));

    let events = events.drain();
    assert!(events.contains(&GraphEvent::Metadata {
        key: "title".into(),
        value: "Night Radio".into(),
    }));
    assert!(events.contains(&GraphEvent::Metadata {
        key: "genre".into(),
        value: "ambient".into(),
    }));
    assert!(events.iter().any(|e| matches!(
        e,
        GraphEvent::StreamInfo(info) if info.coding == AudioCoding::Mp3 && info.uri == STREAM
    )));
    assert_eq!(count_errors(&events), 0);
}

/// Both ends of the source tunnel are disabled and enabled together.
#[test]
fn test_tunnel_ports_toggle_together() {
    let runtime = Arc::new(http_runtime(AudioCoding::Mp3));
    let mut graph = start(&runtime);
    graph.execute().unwrap();

    let source = handle(&graph, ChainRole::Source);
    let decoder = handle(&graph, ChainRole::Decoder);
    let port_commands = |command: fn(u32) -> Command| {
        let log = runtime.command_log();
        let count = |h| {
            log.iter()
                .filter(|r| r.handle == h && r.command == command(0))
                .count()
        };
        (count(source), count(decoder))
    };

    let (_, decoder_disables) = port_commands(Command::DisablePort);
    let (source_enables, decoder_enables) = port_commands(Command::EnablePort);
    assert_eq!(decoder_disables, 1);
    assert_eq!(source_enables, 1);
    assert_eq!(decoder_enables, 1);
    assert_eq!(runtime.port_enabled(source, 0), Some(true));
    assert_eq!(runtime.port_enabled(decoder, 0), Some(true));
}

/// Live streams ignore pause and volume.
#[test]
fn test_stream_controls_are_noops() {
    let runtime = Arc::new(http_runtime(AudioCoding::Mp3));
    let mut graph = start(&runtime);
    graph.execute().unwrap();

    graph.pause().unwrap();
    graph.volume(3).unwrap();
    graph.mute().unwrap();
    assert_eq!(graph.state(), GraphState::Component(LifecycleState::Executing));
}

#[test]
fn test_unknown_encoding_fails() {
    let runtime = Arc::new(http_runtime(AudioCoding::Vorbis));
    let mut graph = start(&runtime);
    let mut events = graph.subscribe();

    let err = graph.execute().unwrap_err();

    assert!(matches!(err, Error::UnsupportedEncoding(AudioCoding::Vorbis)));
    assert_eq!(runtime.instance_names(), vec!["source.http"]);
    assert!(!any_executing(&runtime, &graph));

    let events = events.drain();
    assert_eq!(count_errors(&events), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        GraphEvent::Error { code: ErrorCode::UnsupportedEncoding, .. }
    )));
}

/// The decoder is rebuilt for every entry and destroyed on unload.
#[test]
fn test_skip_and_unload_rebuild_chain() {
    let runtime = Arc::new(http_runtime(AudioCoding::Mp3));
    let mut graph = controller(&runtime, StaticProbe::new(), Box::new(HttpClientOps::new()));
    graph.load().unwrap();
    graph
        .configure(PlaybackConfig::new([STREAM, "http://radio.example/other"]))
        .unwrap();
    graph.execute().unwrap();

    graph.skip(1).unwrap();
    assert_eq!(graph.cursor(), 1);
    assert_eq!(graph.state(), GraphState::Component(LifecycleState::Executing));
    assert_eq!(runtime.instance_count(), 3);

    graph.unload().unwrap();
    assert_eq!(runtime.instance_count(), 0);
    assert_eq!(graph.state(), GraphState::Uninstantiated);
}
