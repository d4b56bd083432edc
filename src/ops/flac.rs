//! FLAC graph: demuxer or binary reader, FLAC decoder, PCM renderer.

use super::{GraphOps, configure_decoder_input, configure_renderer, probe_audio, renderer_spec};
use crate::component::{AudioCoding, FlacParams, Parameter};
use crate::error::{Error, Result};
use crate::graph::{ChainRole, ComponentSpec, GraphCore};
use crate::notify::StreamInfo;

struct Demuxer {
    name: &'static str,
    role: &'static str,
    /// Port carrying video, disabled before negotiation.
    video_port: Option<u32>,
}

const DEMUXERS: [Demuxer; 2] = [
    Demuxer {
        name: "demux.ogg",
        role: "container_demuxer.ogg",
        video_port: Some(1),
    },
    Demuxer {
        name: "reader.binary",
        role: "audio_reader.binary",
        video_port: None,
    },
];

const DECODER: (&str, &str) = ("decoder.flac", "audio_decoder.flac");

/// Strategy for FLAC content.
///
/// The whole chain is known up front. Which component reads the input is
/// an alternate: the Ogg demuxer first, the binary reader on retry.
#[derive(Debug, Default)]
pub struct FlacOps {
    demuxer: usize,
}

impl FlacOps {
    /// Start with the Ogg demuxer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the demuxer in use.
    pub fn demuxer(&self) -> usize {
        self.demuxer
    }

    fn specs(&self) -> [ComponentSpec; 3] {
        let demuxer = &DEMUXERS[self.demuxer];
        [
            ComponentSpec::new(demuxer.name, demuxer.role, ChainRole::Source),
            ComponentSpec::new(DECODER.0, DECODER.1, ChainRole::Decoder),
            renderer_spec(),
        ]
    }
}

impl GraphOps for FlacOps {
    fn name(&self) -> &'static str {
        "flac"
    }

    fn alternates(&self) -> usize {
        DEMUXERS.len()
    }

    fn select_next_alternate(&mut self) -> usize {
        self.demuxer = (self.demuxer + 1) % DEMUXERS.len();
        tracing::debug!(demuxer = DEMUXERS[self.demuxer].name, "Selected alternate demuxer");
        self.demuxer
    }

    fn load_source(&mut self, core: &mut GraphCore) -> Result<()> {
        core.instantiate(&self.specs())
    }

    fn link(&mut self, core: &mut GraphCore) -> Result<()> {
        core.declare_tunnel(ChainRole::Source, 0, ChainRole::Decoder, 0)?;
        core.declare_tunnel(ChainRole::Decoder, 1, ChainRole::Renderer, 0)?;
        core.connect()
    }

    fn configure_source(&mut self, core: &mut GraphCore, uri: &str) -> Result<()> {
        probe_audio(&*self, core, uri, AudioCoding::Flac)?;
        core.set_parameter(ChainRole::Source, Parameter::ContentUri(uri.to_string()))
    }

    fn disable_negotiation_ports(&mut self, core: &mut GraphCore) -> Result<()> {
        match DEMUXERS[self.demuxer].video_port {
            Some(port) => core.port_command(ChainRole::Source, port, false),
            None => Ok(()),
        }
    }

    fn configure_chain(&mut self, core: &mut GraphCore) -> Result<()> {
        let Some(found) = core.probed().cloned() else {
            return Err(Error::MissingComponent("probe result"));
        };
        let flac = found.flac.unwrap_or(FlacParams {
            port: 0,
            channels: found.pcm.channels,
            sample_rate: found.pcm.sample_rate,
            bits_per_sample: found.pcm.bits_per_sample,
        });

        configure_decoder_input(core, Parameter::Flac(FlacParams { port: 0, ..flac }))?;

        let mut pcm = found.pcm;
        pcm.channels = flac.channels;
        pcm.sample_rate = flac.sample_rate;
        pcm.bits_per_sample = flac.bits_per_sample;
        configure_renderer(core, pcm)?;

        if core.should_announce() {
            core.announce(&StreamInfo {
                uri: found.uri,
                coding: AudioCoding::Flac,
                sample_rate: flac.sample_rate,
                channels: flac.channels,
            });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.demuxer = 0;
    }
}
