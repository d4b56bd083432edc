//! Format strategies.
//!
//! A [`GraphOps`] implements the format-specific steps of building,
//! configuring and adjusting a chain. The controller picks one at
//! construction and calls it in a fixed order; it never looks at which
//! format it is driving.
//!
//! - [`FlacOps`]: FLAC in Ogg or raw, with two alternate demuxers
//! - [`Mp3Ops`]: MP3 files, single fixed chain
//! - [`HttpClientOps`]: network streams whose decoder is chosen once the
//!   source reports the encoding
//!
//! [`for_uri`] selects a strategy from a URI.

mod flac;
mod http;
mod mp3;

pub use flac::FlacOps;
pub use http::HttpClientOps;
pub use mp3::Mp3Ops;

use crate::component::{
    AudioCoding, LifecycleState, MuteConfig, ParamIndex, Parameter, PcmParams, PortDomain,
    VolumeConfig,
};
use crate::error::{Error, Result};
use crate::graph::{ChainRole, ComponentSpec, GraphCore};
use crate::probe::ProbeResult;
use std::path::Path;

/// Registered name and role of the PCM renderer every chain ends in.
pub const RENDERER: (&str, &str) = ("renderer.pcm", "audio_renderer.pcm");

/// Per-format steps of a graph.
///
/// An execute runs, in order: [`configure_source`](Self::configure_source),
/// [`enable_format_auto_detection`](Self::enable_format_auto_detection),
/// [`disable_negotiation_ports`](Self::disable_negotiation_ports),
/// [`preroll`](Self::preroll),
/// [`load_remaining_chain`](Self::load_remaining_chain), tunnel setup,
/// [`configure_chain`](Self::configure_chain),
/// [`disable_tunnels`](Self::disable_tunnels), bring-up to Executing and
/// [`enable_tunnels`](Self::enable_tunnels).
pub trait GraphOps: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Number of alternate chain configurations an entry may be tried with.
    fn alternates(&self) -> usize {
        1
    }

    /// Switch to the next alternate, wrapping around. Returns its index.
    fn select_next_alternate(&mut self) -> usize {
        0
    }

    /// Instantiate the components known before any data is read.
    fn load_source(&mut self, core: &mut GraphCore) -> Result<()>;

    /// Declare and set up the tunnels between the components loaded so far.
    fn link(&mut self, core: &mut GraphCore) -> Result<()> {
        let _ = core;
        Ok(())
    }

    /// Point the source at `uri`.
    fn configure_source(&mut self, core: &mut GraphCore, uri: &str) -> Result<()>;

    /// Ask the source to detect the encoding itself, if the format needs it.
    fn enable_format_auto_detection(&mut self, core: &mut GraphCore) -> Result<()> {
        let _ = core;
        Ok(())
    }

    /// Disable ports that must stay quiet while formats are negotiated.
    fn disable_negotiation_ports(&mut self, core: &mut GraphCore) -> Result<()> {
        let _ = core;
        Ok(())
    }

    /// Start components that have to run before the rest of the chain can
    /// be chosen.
    fn preroll(&mut self, core: &mut GraphCore) -> Result<()> {
        let _ = core;
        Ok(())
    }

    /// Instantiate whatever depends on what the source found.
    fn load_remaining_chain(&mut self, core: &mut GraphCore) -> Result<()> {
        let _ = core;
        Ok(())
    }

    /// Propagate format parameters down the chain.
    fn configure_chain(&mut self, core: &mut GraphCore) -> Result<()>;

    /// Disable tunnels before bring-up.
    fn disable_tunnels(&mut self, core: &mut GraphCore) -> Result<()> {
        let _ = core;
        Ok(())
    }

    /// Enable tunnels after bring-up.
    fn enable_tunnels(&mut self, core: &mut GraphCore) -> Result<()> {
        let _ = core;
        Ok(())
    }

    /// Move the chain between Executing and Paused.
    fn pause_transition(&mut self, core: &mut GraphCore, to: LifecycleState) -> Result<()> {
        core.transition_all(to)
    }

    /// Change the volume by `step` steps.
    fn adjust_volume(&mut self, core: &mut GraphCore, step: i32) -> Result<()> {
        adjust_renderer_volume(core, step)
    }

    /// Toggle mute.
    fn adjust_mute(&mut self, core: &mut GraphCore) -> Result<()> {
        toggle_renderer_mute(core)
    }

    /// Seek within the current entry.
    fn seek(&mut self, core: &mut GraphCore) -> Result<()> {
        let _ = core;
        Ok(())
    }

    /// Whether this attempt should probe the media header.
    fn probe_hook(&self, core: &GraphCore) -> bool {
        core.should_probe()
    }

    /// Drop whatever [`load_remaining_chain`](Self::load_remaining_chain)
    /// created, once the chain is back in Loaded between entries.
    fn reset_chain(&mut self, core: &mut GraphCore) -> Result<()> {
        let _ = core;
        Ok(())
    }

    /// Forget per-graph state on unload.
    fn reset(&mut self) {}
}

/// Pick a strategy for `uri`.
///
/// `http` and `https` URIs are network streams; anything else is matched
/// by file extension.
///
/// ```rust
/// let ops = tunnelgraph::ops::for_uri("file:///music/track.flac").unwrap();
/// assert_eq!(ops.name(), "flac");
/// assert_eq!(tunnelgraph::ops::for_uri("http://radio.example/live").unwrap().name(), "http");
/// assert!(tunnelgraph::ops::for_uri("/music/cover.png").is_err());
/// ```
pub fn for_uri(uri: &str) -> Result<Box<dyn GraphOps>> {
    let (scheme, path) = match url::Url::parse(uri) {
        Ok(url) => (url.scheme().to_ascii_lowercase(), url.path().to_string()),
        Err(_) => (String::new(), uri.to_string()),
    };
    if scheme == "http" || scheme == "https" {
        return Ok(Box::new(HttpClientOps::new()));
    }

    let extension = Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("flac" | "ogg" | "oga") => Ok(Box::new(FlacOps::new())),
        Some("mp3") => Ok(Box::new(Mp3Ops::new())),
        _ => Err(Error::ContentUri {
            uri: uri.to_string(),
            reason: "no graph for this media type".to_string(),
        }),
    }
}

// ============================================================================
// Shared steps
// ============================================================================

pub(crate) fn renderer_spec() -> ComponentSpec {
    ComponentSpec::new(RENDERER.0, RENDERER.1, ChainRole::Renderer)
}

/// Probe `uri` (or reuse this entry's result) and require audio in `coding`.
pub(crate) fn probe_audio(
    ops: &dyn GraphOps,
    core: &mut GraphCore,
    uri: &str,
    coding: AudioCoding,
) -> Result<ProbeResult> {
    let fresh = ops.probe_hook(core);
    let found = core.probe_uri(uri, fresh)?;
    if found.domain != PortDomain::Audio || found.coding != coding {
        tracing::error!(%uri, domain = ?found.domain, coding = %found.coding, "Unexpected content");
        return Err(Error::ContentUri {
            uri: uri.to_string(),
            reason: format!("expected {coding} audio, found {:?} {}", found.domain, found.coding),
        });
    }
    Ok(found)
}

/// Write `param` to the decoder input and, if it differs from what the
/// decoder had, wait for the decoder to reconfigure its output port.
pub(crate) fn configure_decoder_input(core: &mut GraphCore, param: Parameter) -> Result<()> {
    let index = param.index();
    let current = core.get_parameter(ChainRole::Decoder, index, param.port())?;
    let reconfigures = match (&current, &param) {
        (Parameter::Flac(a), Parameter::Flac(b)) => {
            a.sample_rate != b.sample_rate || a.channels != b.channels
        }
        (Parameter::Mp3(a), Parameter::Mp3(b)) => {
            a.sample_rate != b.sample_rate || a.channels != b.channels
        }
        (a, b) => a != b,
    };

    core.set_parameter(ChainRole::Decoder, param)?;
    if reconfigures {
        core.await_port_settings(ChainRole::Decoder, 1, ParamIndex::Pcm)?;
    }
    Ok(())
}

/// Configure the renderer input for `pcm`.
pub(crate) fn configure_renderer(core: &mut GraphCore, pcm: PcmParams) -> Result<()> {
    core.set_parameter(ChainRole::Renderer, Parameter::Pcm(PcmParams { port: 0, ..pcm }))
}

fn adjust_renderer_volume(core: &mut GraphCore, step: i32) -> Result<()> {
    let current = match core.get_parameter(ChainRole::Renderer, ParamIndex::Volume, 0)? {
        Parameter::Volume(volume) => volume.level,
        other => return Err(unexpected(core, ChainRole::Renderer, &other)),
    };
    let level = current
        .saturating_add(step.saturating_mul(core.config().volume_step))
        .clamp(0, 100);
    tracing::debug!(from = current, to = level, "Volume");
    core.set_parameter(
        ChainRole::Renderer,
        Parameter::Volume(VolumeConfig { port: 0, level }),
    )
}

fn toggle_renderer_mute(core: &mut GraphCore) -> Result<()> {
    let muted = match core.get_parameter(ChainRole::Renderer, ParamIndex::Mute, 0)? {
        Parameter::Mute(mute) => mute.muted,
        other => return Err(unexpected(core, ChainRole::Renderer, &other)),
    };
    tracing::debug!(muted = !muted, "Mute");
    core.set_parameter(
        ChainRole::Renderer,
        Parameter::Mute(MuteConfig {
            port: 0,
            muted: !muted,
        }),
    )
}

pub(crate) fn unexpected(core: &GraphCore, slot: ChainRole, got: &Parameter) -> Error {
    let component = core
        .chain()
        .get(slot)
        .map_or_else(|_| slot.to_string(), |c| c.name.clone());
    Error::PortNegotiationFailed {
        component,
        port: got.port(),
        reason: format!("unexpected parameter {:?}", got.index()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_uri_selection() {
        assert_eq!(for_uri("https://radio.example/stream").unwrap().name(), "http");
        assert_eq!(for_uri("/music/a.FLAC").unwrap().name(), "flac");
        assert_eq!(for_uri("file:///music/a.oga").unwrap().name(), "flac");
        assert_eq!(for_uri("b.ogg").unwrap().name(), "flac");
        assert_eq!(for_uri("c.mp3").unwrap().name(), "mp3");
        assert!(matches!(
            for_uri("notes.txt"),
            Err(Error::ContentUri { .. })
        ));
        assert!(for_uri("no_extension").is_err());
    }
}
