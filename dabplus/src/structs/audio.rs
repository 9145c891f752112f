//! Audio codec parameters derived from the superframe header.

use crate::structs::superframe::SuperframeHeader;
use crate::utils::errors::ParamsError;

/// MPEG-4 audio object type signalled downstream.
///
/// SBR streams keep the plain AAC object type; decoders discover spectral
/// band replication from the payload itself.
pub const AUDIO_OBJECT_TYPE: u8 = 1;

/// Audio configuration of a stream, fixed between parameter changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    /// MPEG-4 audio object type.
    pub object_type: u8,

    /// Core sample rate in Hz.
    pub sample_rate: u32,

    /// Output channel count.
    pub channels: u8,
}

impl AudioParams {
    /// Resolves the audio configuration of a decoded superframe header.
    pub fn resolve(header: &SuperframeHeader) -> Result<Self, ParamsError> {
        let sample_rate = match (header.dac_rate, header.sbr_flag) {
            (true, true) => 24000,
            (true, false) => 48000,
            (false, true) => 16000,
            (false, false) => 32000,
        };

        let channels = match header.mpeg_surround_config {
            0 => header.aac_channel_mode as u8 + 1,
            1 => 6,
            2 => 8,
            config => return Err(ParamsError::UnsupportedSurroundConfig(config)),
        };

        Ok(Self {
            object_type: AUDIO_OBJECT_TYPE,
            sample_rate,
            channels,
        })
    }
}

#[cfg(test)]
fn header_with(
    dac_rate: bool,
    sbr_flag: bool,
    aac_channel_mode: bool,
    surround: u8,
) -> SuperframeHeader {
    SuperframeHeader {
        dac_rate,
        sbr_flag,
        aac_channel_mode,
        mpeg_surround_config: surround,
        ..Default::default()
    }
}

#[test]
fn sample_rate_follows_dac_rate_and_sbr() {
    let cases = [
        (true, false, 48000),
        (true, true, 24000),
        (false, false, 32000),
        (false, true, 16000),
    ];

    for (dac_rate, sbr_flag, expected) in cases {
        let params = AudioParams::resolve(&header_with(dac_rate, sbr_flag, false, 0)).unwrap();
        assert_eq!(params.sample_rate, expected);
        assert_eq!(params.object_type, AUDIO_OBJECT_TYPE);
    }
}

#[test]
fn channel_mode_maps_to_mono_or_stereo() {
    assert_eq!(
        AudioParams::resolve(&header_with(true, false, false, 0)).unwrap().channels,
        1
    );
    assert_eq!(
        AudioParams::resolve(&header_with(true, false, true, 0)).unwrap().channels,
        2
    );
}

#[test]
fn surround_config_overrides_channel_mode() {
    assert_eq!(
        AudioParams::resolve(&header_with(true, false, false, 1)).unwrap().channels,
        6
    );
    assert_eq!(
        AudioParams::resolve(&header_with(true, false, true, 2)).unwrap().channels,
        8
    );
}

#[test]
fn reserved_surround_config_is_rejected() {
    let err = AudioParams::resolve(&header_with(true, false, false, 5)).unwrap_err();
    assert!(matches!(err, ParamsError::UnsupportedSurroundConfig(5)));
}
