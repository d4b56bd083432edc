//! MP3 file graph: binary reader, MP3 decoder, PCM renderer.

use super::{GraphOps, configure_decoder_input, configure_renderer, probe_audio, renderer_spec};
use crate::component::{AudioCoding, Mp3Params, Parameter};
use crate::error::{Error, Result};
use crate::graph::{ChainRole, ComponentSpec, GraphCore};
use crate::notify::StreamInfo;

const READER: (&str, &str) = ("reader.binary", "audio_reader.binary");
const DECODER: (&str, &str) = ("decoder.mp3", "audio_decoder.mp3");

/// Strategy for local MP3 files. One fixed chain, no alternates.
#[derive(Debug, Default)]
pub struct Mp3Ops;

impl Mp3Ops {
    /// Create the strategy.
    pub fn new() -> Self {
        Self
    }
}

impl GraphOps for Mp3Ops {
    fn name(&self) -> &'static str {
        "mp3"
    }

    fn load_source(&mut self, core: &mut GraphCore) -> Result<()> {
        core.instantiate(&[
            ComponentSpec::new(READER.0, READER.1, ChainRole::Source),
            ComponentSpec::new(DECODER.0, DECODER.1, ChainRole::Decoder),
            renderer_spec(),
        ])
    }

    fn link(&mut self, core: &mut GraphCore) -> Result<()> {
        core.declare_tunnel(ChainRole::Source, 0, ChainRole::Decoder, 0)?;
        core.declare_tunnel(ChainRole::Decoder, 1, ChainRole::Renderer, 0)?;
        core.connect()
    }

    fn configure_source(&mut self, core: &mut GraphCore, uri: &str) -> Result<()> {
        probe_audio(&*self, core, uri, AudioCoding::Mp3)?;
        core.set_parameter(ChainRole::Source, Parameter::ContentUri(uri.to_string()))
    }

    fn configure_chain(&mut self, core: &mut GraphCore) -> Result<()> {
        let Some(found) = core.probed().cloned() else {
            return Err(Error::MissingComponent("probe result"));
        };
        let mp3 = found.mp3.unwrap_or(Mp3Params {
            port: 0,
            channels: found.pcm.channels,
            sample_rate: found.pcm.sample_rate,
            bit_rate: 0,
        });

        configure_decoder_input(core, Parameter::Mp3(Mp3Params { port: 0, ..mp3 }))?;

        let mut pcm = found.pcm;
        pcm.channels = mp3.channels;
        pcm.sample_rate = mp3.sample_rate;
        configure_renderer(core, pcm)?;

        if core.should_announce() {
            core.announce(&StreamInfo {
                uri: found.uri,
                coding: AudioCoding::Mp3,
                sample_rate: mp3.sample_rate,
                channels: mp3.channels,
            });
        }
        Ok(())
    }
}
