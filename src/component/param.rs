//! Ports and the parameter structures exchanged with components.
//!
//! Parameters are typed values addressed by a [`ParamIndex`] and, for
//! port-scoped parameters, a port number. The runtime moves them verbatim
//! between the graph and the components.

use std::fmt;

/// Index of a port on a component.
pub type PortIndex = u32;

// ============================================================================
// Ports
// ============================================================================

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Receives data from upstream.
    Input,
    /// Sends data downstream.
    Output,
}

/// Media domain carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PortDomain {
    /// Audio data.
    #[default]
    Audio,
    /// Video data.
    Video,
    /// Still images.
    Image,
    /// Anything else (container bytes, subtitles, ...).
    Other,
}

/// Audio encodings a port may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioCoding {
    /// Not set.
    #[default]
    Unused,
    /// The component should detect the encoding from the stream.
    AutoDetect,
    /// Raw PCM.
    Pcm,
    /// MPEG-1 layer III.
    Mp3,
    /// Advanced Audio Coding.
    Aac,
    /// Free Lossless Audio Codec.
    Flac,
    /// Ogg Vorbis.
    Vorbis,
    /// Opus.
    Opus,
}

impl fmt::Display for AudioCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unused => "unused",
            Self::AutoDetect => "autodetect",
            Self::Pcm => "pcm",
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Vorbis => "vorbis",
            Self::Opus => "opus",
        };
        f.write_str(name)
    }
}

/// Definition of a single port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDefinition {
    /// Port number.
    pub port: PortIndex,
    /// Direction.
    pub direction: PortDirection,
    /// Media domain.
    pub domain: PortDomain,
    /// Whether the port is enabled.
    pub enabled: bool,
    /// Audio encoding (audio ports only).
    pub encoding: AudioCoding,
}

impl PortDefinition {
    /// An enabled audio input port.
    pub fn audio_input(port: PortIndex, encoding: AudioCoding) -> Self {
        Self {
            port,
            direction: PortDirection::Input,
            domain: PortDomain::Audio,
            enabled: true,
            encoding,
        }
    }

    /// An enabled audio output port.
    pub fn audio_output(port: PortIndex, encoding: AudioCoding) -> Self {
        Self {
            port,
            direction: PortDirection::Output,
            domain: PortDomain::Audio,
            enabled: true,
            encoding,
        }
    }
}

// ============================================================================
// Codec parameters
// ============================================================================

/// Byte order of PCM samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    /// Little endian.
    #[default]
    Little,
    /// Big endian.
    Big,
}

/// PCM settings of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmParams {
    /// Port number.
    pub port: PortIndex,
    /// Number of channels.
    pub channels: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample.
    pub bits_per_sample: u32,
    /// Whether samples are signed.
    pub signed: bool,
    /// Byte order.
    pub endian: Endian,
    /// Whether channels are interleaved.
    pub interleaved: bool,
}

impl Default for PcmParams {
    fn default() -> Self {
        Self {
            port: 0,
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            signed: true,
            endian: Endian::Little,
            interleaved: true,
        }
    }
}

/// FLAC stream settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlacParams {
    /// Port number.
    pub port: PortIndex,
    /// Number of channels.
    pub channels: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample.
    pub bits_per_sample: u32,
}

/// MP3 stream settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mp3Params {
    /// Port number.
    pub port: PortIndex,
    /// Number of channels.
    pub channels: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit rate in bits per second (0 if unknown).
    pub bit_rate: u32,
}

/// AAC stream settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AacParams {
    /// Port number.
    pub port: PortIndex,
    /// Number of channels.
    pub channels: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit rate in bits per second (0 if unknown).
    pub bit_rate: u32,
}

// ============================================================================
// Configs
// ============================================================================

/// Volume of a port, 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeConfig {
    /// Port number.
    pub port: PortIndex,
    /// Linear volume level.
    pub level: i32,
}

/// Mute flag of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteConfig {
    /// Port number.
    pub port: PortIndex,
    /// Whether the port is muted.
    pub muted: bool,
}

/// Which side of a tunnel supplies buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Supplier {
    /// No preference.
    #[default]
    Unspecified,
    /// The input port supplies.
    Input,
    /// The output port supplies.
    Output,
}

/// Buffer supplier preference of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplierConfig {
    /// Port number.
    pub port: PortIndex,
    /// Supplier side.
    pub supplier: Supplier,
}

/// One item of stream metadata, fetched by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataItem {
    /// Item index.
    pub index: u32,
    /// Key.
    pub key: String,
    /// Value.
    pub value: String,
}

// ============================================================================
// Parameter
// ============================================================================

/// Address of a parameter on a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamIndex {
    /// [`PortDefinition`].
    PortDefinition,
    /// Content URI of a source.
    ContentUri,
    /// [`PcmParams`].
    Pcm,
    /// [`FlacParams`].
    Flac,
    /// [`Mp3Params`].
    Mp3,
    /// [`AacParams`].
    Aac,
    /// [`VolumeConfig`].
    Volume,
    /// [`MuteConfig`].
    Mute,
    /// [`SupplierConfig`].
    BufferSupplier,
    /// The metadata item with the given index.
    MetadataItem(u32),
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    /// Port definition.
    PortDefinition(PortDefinition),
    /// Content URI.
    ContentUri(String),
    /// PCM settings.
    Pcm(PcmParams),
    /// FLAC settings.
    Flac(FlacParams),
    /// MP3 settings.
    Mp3(Mp3Params),
    /// AAC settings.
    Aac(AacParams),
    /// Volume.
    Volume(VolumeConfig),
    /// Mute.
    Mute(MuteConfig),
    /// Buffer supplier preference.
    BufferSupplier(SupplierConfig),
    /// Stream metadata item.
    MetadataItem(MetadataItem),
}

impl Parameter {
    /// The index this value is stored under.
    pub fn index(&self) -> ParamIndex {
        match self {
            Self::PortDefinition(_) => ParamIndex::PortDefinition,
            Self::ContentUri(_) => ParamIndex::ContentUri,
            Self::Pcm(_) => ParamIndex::Pcm,
            Self::Flac(_) => ParamIndex::Flac,
            Self::Mp3(_) => ParamIndex::Mp3,
            Self::Aac(_) => ParamIndex::Aac,
            Self::Volume(_) => ParamIndex::Volume,
            Self::Mute(_) => ParamIndex::Mute,
            Self::BufferSupplier(_) => ParamIndex::BufferSupplier,
            Self::MetadataItem(item) => ParamIndex::MetadataItem(item.index),
        }
    }

    /// The port this value applies to. Component-wide parameters report 0.
    pub fn port(&self) -> PortIndex {
        match self {
            Self::PortDefinition(p) => p.port,
            Self::Pcm(p) => p.port,
            Self::Flac(p) => p.port,
            Self::Mp3(p) => p.port,
            Self::Aac(p) => p.port,
            Self::Volume(p) => p.port,
            Self::Mute(p) => p.port,
            Self::BufferSupplier(p) => p.port,
            Self::ContentUri(_) | Self::MetadataItem(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_addressing() {
        let p = Parameter::Pcm(PcmParams {
            port: 3,
            ..Default::default()
        });
        assert_eq!(p.index(), ParamIndex::Pcm);
        assert_eq!(p.port(), 3);

        let item = Parameter::MetadataItem(MetadataItem {
            index: 7,
            key: "icy-name".into(),
            value: "radio".into(),
        });
        assert_eq!(item.index(), ParamIndex::MetadataItem(7));
        assert_eq!(item.port(), 0);
    }

    #[test]
    fn test_pcm_defaults() {
        let pcm = PcmParams::default();
        assert_eq!(pcm.sample_rate, 44100);
        assert_eq!(pcm.channels, 2);
        assert_eq!(pcm.endian, Endian::Little);
    }
}
