//! Network stream graph: HTTP source first, decoder chosen from what the
//! source negotiates.

use super::{GraphOps, configure_renderer, renderer_spec, unexpected};
use crate::component::{
    AudioCoding, Endian, LifecycleState, ParamIndex, Parameter, PcmParams, PortDefinition,
};
use crate::error::{Error, Result};
use crate::graph::{ChainRole, ComponentSpec, GraphCore, TunnelId};
use crate::notify::StreamInfo;

const SOURCE: (&str, &str) = ("source.http", "audio_source.http");

/// Strategy for HTTP audio streams.
///
/// Only the source exists until it runs and reports the stream encoding on
/// its output port. The decoder is picked from that encoding, and the
/// renderer's PCM settings are copied from the source. Pause, seek, volume
/// and mute are not supported on live streams and do nothing.
#[derive(Debug, Default)]
pub struct HttpClientOps {
    coding: Option<AudioCoding>,
    source_tunnel: Option<TunnelId>,
}

impl HttpClientOps {
    /// Create the strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoding of the current stream, once known.
    pub fn coding(&self) -> Option<AudioCoding> {
        self.coding
    }

    fn decoder_for(coding: AudioCoding) -> Result<ComponentSpec> {
        let (name, role) = match coding {
            AudioCoding::Mp3 => ("decoder.mp3", "audio_decoder.mp3"),
            AudioCoding::Aac => ("decoder.aac", "audio_decoder.aac"),
            other => return Err(Error::UnsupportedEncoding(other)),
        };
        Ok(ComponentSpec::new(name, role, ChainRole::Decoder))
    }

    fn source_port(core: &GraphCore) -> Result<PortDefinition> {
        match core.get_parameter(ChainRole::Source, ParamIndex::PortDefinition, 0)? {
            Parameter::PortDefinition(def) => Ok(def),
            other => Err(unexpected(core, ChainRole::Source, &other)),
        }
    }

    fn dump_metadata(core: &GraphCore) {
        let mut index = 0;
        while let Ok(param) =
            core.get_parameter(ChainRole::Source, ParamIndex::MetadataItem(index), 0)
        {
            if let Parameter::MetadataItem(item) = param {
                tracing::info!(key = %item.key, value = %item.value, "Stream metadata");
                core.notify(|s| s.notify_metadata(&item.key, &item.value));
            }
            index += 1;
        }
    }

    fn tunnel(&self) -> Result<TunnelId> {
        self.source_tunnel.ok_or(Error::MissingComponent("tunnel"))
    }
}

impl GraphOps for HttpClientOps {
    fn name(&self) -> &'static str {
        "http"
    }

    fn load_source(&mut self, core: &mut GraphCore) -> Result<()> {
        core.instantiate(&[ComponentSpec::new(SOURCE.0, SOURCE.1, ChainRole::Source)])
    }

    fn configure_source(&mut self, core: &mut GraphCore, uri: &str) -> Result<()> {
        tracing::info!(%uri, "Connecting");
        core.set_parameter(ChainRole::Source, Parameter::ContentUri(uri.to_string()))
    }

    fn enable_format_auto_detection(&mut self, core: &mut GraphCore) -> Result<()> {
        let mut def = Self::source_port(core)?;
        def.encoding = AudioCoding::AutoDetect;
        core.set_parameter(ChainRole::Source, Parameter::PortDefinition(def))
    }

    fn disable_negotiation_ports(&mut self, core: &mut GraphCore) -> Result<()> {
        core.port_command(ChainRole::Source, 0, false)
    }

    fn preroll(&mut self, core: &mut GraphCore) -> Result<()> {
        core.bring_up(LifecycleState::Executing)
    }

    fn load_remaining_chain(&mut self, core: &mut GraphCore) -> Result<()> {
        core.await_port_settings(ChainRole::Source, 0, ParamIndex::PortDefinition)?;

        let coding = Self::source_port(core)?.encoding;
        let decoder = Self::decoder_for(coding).inspect_err(|_| {
            tracing::error!(%coding, "No decoder for stream encoding");
        })?;
        tracing::info!(%coding, "Connection established");
        Self::dump_metadata(core);

        core.instantiate(&[decoder, renderer_spec()])?;
        self.source_tunnel = Some(core.declare_tunnel(ChainRole::Source, 0, ChainRole::Decoder, 0)?);
        core.declare_tunnel(ChainRole::Decoder, 1, ChainRole::Renderer, 0)?;
        core.connect()?;
        self.coding = Some(coding);
        Ok(())
    }

    fn configure_chain(&mut self, core: &mut GraphCore) -> Result<()> {
        let (channels, sample_rate, endian, param) =
            match core.get_parameter(ChainRole::Source, coded_index(self.coding)?, 0)? {
                Parameter::Mp3(mp3) => (
                    mp3.channels,
                    mp3.sample_rate,
                    Endian::Big,
                    Parameter::Mp3(mp3),
                ),
                Parameter::Aac(aac) => (
                    aac.channels,
                    aac.sample_rate,
                    Endian::Little,
                    Parameter::Aac(aac),
                ),
                other => return Err(unexpected(core, ChainRole::Source, &other)),
            };

        core.set_parameter(ChainRole::Decoder, param)?;
        configure_renderer(
            core,
            PcmParams {
                channels,
                sample_rate,
                endian,
                ..Default::default()
            },
        )?;

        let uri = core.playlist().current().unwrap_or_default().to_string();
        core.announce(&StreamInfo {
            uri,
            coding: self.coding.unwrap_or_default(),
            sample_rate,
            channels,
        });
        Ok(())
    }

    fn disable_tunnels(&mut self, core: &mut GraphCore) -> Result<()> {
        core.toggle_tunnel(self.tunnel()?, false)
    }

    fn enable_tunnels(&mut self, core: &mut GraphCore) -> Result<()> {
        core.toggle_tunnel(self.tunnel()?, true)
    }

    fn pause_transition(&mut self, _core: &mut GraphCore, to: LifecycleState) -> Result<()> {
        tracing::debug!(%to, "Pause not supported on network streams");
        Ok(())
    }

    fn adjust_volume(&mut self, _core: &mut GraphCore, _step: i32) -> Result<()> {
        Ok(())
    }

    fn adjust_mute(&mut self, _core: &mut GraphCore) -> Result<()> {
        Ok(())
    }

    fn probe_hook(&self, _core: &GraphCore) -> bool {
        false
    }

    fn reset_chain(&mut self, core: &mut GraphCore) -> Result<()> {
        core.destroy_slot(ChainRole::Renderer);
        core.destroy_slot(ChainRole::Decoder);
        self.coding = None;
        self.source_tunnel = None;
        Ok(())
    }

    fn reset(&mut self) {
        self.coding = None;
        self.source_tunnel = None;
    }
}

fn coded_index(coding: Option<AudioCoding>) -> Result<ParamIndex> {
    match coding {
        Some(AudioCoding::Mp3) => Ok(ParamIndex::Mp3),
        Some(AudioCoding::Aac) => Ok(ParamIndex::Aac),
        Some(other) => Err(Error::UnsupportedEncoding(other)),
        None => Err(Error::MissingComponent("decoder")),
    }
}
