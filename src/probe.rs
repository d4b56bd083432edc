//! Media probing.
//!
//! The graph asks a [`Probe`] what a URI contains before configuring a
//! chain for it. Real probing lives outside this crate; [`StaticProbe`]
//! answers from a table.

use crate::component::{AudioCoding, FlacParams, Mp3Params, PcmParams, PortDomain};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// What a probe found in a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// The probed URI.
    pub uri: String,
    /// Media domain of the main stream.
    pub domain: PortDomain,
    /// Coding of the main stream.
    pub coding: AudioCoding,
    /// Decoded PCM layout.
    pub pcm: PcmParams,
    /// FLAC stream info, for FLAC content.
    pub flac: Option<FlacParams>,
    /// MP3 stream info, for MP3 content.
    pub mp3: Option<Mp3Params>,
}

impl ProbeResult {
    /// A FLAC audio stream.
    pub fn flac(uri: impl Into<String>, sample_rate: u32, channels: u32, bits: u32) -> Self {
        Self {
            uri: uri.into(),
            domain: PortDomain::Audio,
            coding: AudioCoding::Flac,
            pcm: PcmParams {
                channels,
                sample_rate,
                bits_per_sample: bits,
                ..Default::default()
            },
            flac: Some(FlacParams {
                port: 0,
                channels,
                sample_rate,
                bits_per_sample: bits,
            }),
            mp3: None,
        }
    }

    /// An MP3 audio stream.
    pub fn mp3(uri: impl Into<String>, sample_rate: u32, channels: u32, bit_rate: u32) -> Self {
        Self {
            uri: uri.into(),
            domain: PortDomain::Audio,
            coding: AudioCoding::Mp3,
            pcm: PcmParams {
                channels,
                sample_rate,
                ..Default::default()
            },
            flac: None,
            mp3: Some(Mp3Params {
                port: 0,
                channels,
                sample_rate,
                bit_rate,
            }),
        }
    }

    /// Content in some other domain, e.g. a video file.
    pub fn other(uri: impl Into<String>, domain: PortDomain) -> Self {
        Self {
            uri: uri.into(),
            domain,
            coding: AudioCoding::Unused,
            pcm: PcmParams::default(),
            flac: None,
            mp3: None,
        }
    }
}

/// Inspects a URI and reports its format.
pub trait Probe: Send + Sync {
    /// Probe `uri`.
    fn probe(&self, uri: &str) -> Result<ProbeResult>;
}

/// A probe answering from a fixed table.
#[derive(Debug, Default)]
pub struct StaticProbe {
    entries: RwLock<HashMap<String, ProbeResult>>,
}

impl StaticProbe {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(self, result: ProbeResult) -> Self {
        self.insert(result);
        self
    }

    /// Add or replace the answer for `result.uri`.
    pub fn insert(&self, result: ProbeResult) {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(result.uri.clone(), result);
    }
}

impl Probe for StaticProbe {
    fn probe(&self, uri: &str) -> Result<ProbeResult> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(uri)
            .cloned()
            .ok_or_else(|| Error::ContentUri {
                uri: uri.to_string(),
                reason: "unknown media".to_string(),
            })
    }
}
