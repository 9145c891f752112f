//! ADTS header synthesis for legacy stream output.
//!
//! Raw access units can be wrapped in seven byte ADTS headers so stock
//! MPEG-4 AAC decoders accept them. No CRC protection bits are added; the
//! protection_absent bit is always set.

use crate::structs::audio::AudioParams;
use crate::utils::errors::EmitError;

/// Byte length of the fixed and variable ADTS header prepended to each
/// access unit.
pub const ADTS_HEADER_LENGTH: usize = 7;

/// Upper bound on header plus payload accepted by the length field.
pub const ADTS_MAX_FRAME_SIZE: usize = 0x4000;

/// Field values of an ADTS header, fixed between parameter changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// 2-bit profile field: MPEG-4 audio object type minus one.
    pub profile: u8,

    /// Sampling Frequency Index per table 1.18 of ISO/IEC 14496-3.
    pub sampling_frequency_index: u8,

    /// Channel Configuration per table 1.19 of ISO/IEC 14496-3.
    pub channel_configuration: u8,
}

impl AdtsHeader {
    /// Derives the header fields for an audio configuration.
    pub fn for_params(params: &AudioParams) -> Result<Self, EmitError> {
        let profile = match params.object_type {
            1..=4 => params.object_type - 1,
            other => return Err(EmitError::UnsupportedAudioProfile(other)),
        };

        let sampling_frequency_index = sampling_frequency_index(params.sample_rate)
            .ok_or(EmitError::UnsupportedSampleRate(params.sample_rate))?;

        let channel_configuration = channel_configuration(params.channels)
            .ok_or(EmitError::UnsupportedChannelCount(params.channels))?;

        Ok(Self {
            profile,
            sampling_frequency_index,
            channel_configuration,
        })
    }

    /// Renders the header for a `payload_len` byte access unit.
    pub fn write(&self, payload_len: usize) -> Result<[u8; ADTS_HEADER_LENGTH], EmitError> {
        let frame_size = payload_len + ADTS_HEADER_LENGTH;

        if frame_size >= ADTS_MAX_FRAME_SIZE {
            return Err(EmitError::FrameTooLarge {
                size: frame_size,
                max: ADTS_MAX_FRAME_SIZE - 1,
            });
        }

        // MPEG-4 id, layer 0, protection absent
        let id = 0x0u8;

        Ok([
            0xFF,
            0xF0 | (id << 3) | 0x1,
            (self.profile << 6)
                | (self.sampling_frequency_index << 2)
                | 0x2
                | (self.channel_configuration & 0x4),
            ((self.channel_configuration & 0x3) << 6) | 0x30 | (frame_size >> 11) as u8,
            (frame_size >> 3) as u8,
            (((frame_size & 0x7) << 5) + 0x1F) as u8,
            0xFC,
        ])
    }
}

/// Sampling Frequency Index per table 1.18 of ISO/IEC 14496-3.
pub fn sampling_frequency_index(sample_rate: u32) -> Option<u8> {
    match sample_rate {
        96000 => Some(0x0),
        88200 => Some(0x1),
        64000 => Some(0x2),
        48000 => Some(0x3),
        44100 => Some(0x4),
        32000 => Some(0x5),
        24000 => Some(0x6),
        22050 => Some(0x7),
        16000 => Some(0x8),
        12000 => Some(0x9),
        11025 => Some(0xA),
        8000 => Some(0xB),
        7350 => Some(0xC),
        _ => None,
    }
}

/// Channel Configuration per table 1.19 of ISO/IEC 14496-3.
///
/// Counts 1 through 6 map onto themselves, 7.1 output uses configuration 7.
pub fn channel_configuration(channels: u8) -> Option<u8> {
    match channels {
        1..=6 => Some(channels),
        8 => Some(7),
        _ => None,
    }
}

#[test]
fn adts_header_layout() {
    let hdr = AdtsHeader {
        profile: 1,
        sampling_frequency_index: 3,
        channel_configuration: 2,
    };

    assert_eq!(
        hdr.write(100).unwrap(),
        [0xFF, 0xF1, 0x4E, 0xB0, 0x0D, 0x7F, 0xFC]
    );
}

#[test]
fn adts_header_fields_decode_back() -> anyhow::Result<()> {
    use crate::utils::bitstream_io::BsIoSliceReader;

    let hdr = AdtsHeader {
        profile: 1,
        sampling_frequency_index: 3,
        channel_configuration: 2,
    };
    let bytes = hdr.write(100)?;

    let mut reader = BsIoSliceReader::from_slice(&bytes);
    assert_eq!(reader.get_n::<u16>(12)?, 0xFFF, "syncword");
    assert!(!reader.get()?, "id must signal MPEG-4");
    assert_eq!(reader.get_n::<u8>(2)?, 0, "layer");
    assert!(reader.get()?, "protection_absent");
    assert_eq!(reader.get_n::<u8>(2)?, 1, "profile");
    assert_eq!(reader.get_n::<u8>(4)?, 3, "sampling_frequency_index");
    reader.skip_n(1)?;
    assert_eq!(reader.get_n::<u8>(3)?, 2, "channel_configuration");
    reader.skip_n(4)?;
    assert_eq!(reader.get_n::<u16>(13)?, 107, "aac_frame_length");
    assert_eq!(reader.get_n::<u16>(11)?, 0x7FF, "adts_buffer_fullness");
    assert_eq!(reader.get_n::<u8>(2)?, 0, "number_of_raw_data_blocks");
    assert_eq!(reader.available()?, 0);

    Ok(())
}

#[test]
fn adts_header_for_default_stream_params() {
    let params = AudioParams {
        object_type: 1,
        sample_rate: 48000,
        channels: 2,
    };

    let hdr = AdtsHeader::for_params(&params).unwrap();
    assert_eq!(hdr.profile, 0);
    assert_eq!(hdr.sampling_frequency_index, 3);
    assert_eq!(hdr.channel_configuration, 2);
}

#[test]
fn seven_dot_one_uses_channel_configuration_seven() {
    let params = AudioParams {
        object_type: 1,
        sample_rate: 24000,
        channels: 8,
    };

    let hdr = AdtsHeader::for_params(&params).unwrap();
    assert_eq!(hdr.channel_configuration, 7);

    let bytes = hdr.write(10).unwrap();
    assert_eq!(bytes[2] & 0x4, 0x4);
    assert_eq!(bytes[3] >> 6, 0x3);
}

#[test]
fn rejects_unmappable_params() {
    let unknown_rate = AudioParams {
        object_type: 1,
        sample_rate: 50000,
        channels: 2,
    };
    assert!(matches!(
        AdtsHeader::for_params(&unknown_rate),
        Err(EmitError::UnsupportedSampleRate(50000))
    ));

    let seven_channels = AudioParams {
        object_type: 1,
        sample_rate: 48000,
        channels: 7,
    };
    assert!(matches!(
        AdtsHeader::for_params(&seven_channels),
        Err(EmitError::UnsupportedChannelCount(7))
    ));

    let unknown_object = AudioParams {
        object_type: 5,
        sample_rate: 48000,
        channels: 2,
    };
    assert!(matches!(
        AdtsHeader::for_params(&unknown_object),
        Err(EmitError::UnsupportedAudioProfile(5))
    ));
}

#[test]
fn rejects_frame_length_overflow() {
    let hdr = AdtsHeader {
        profile: 0,
        sampling_frequency_index: 3,
        channel_configuration: 2,
    };

    assert!(hdr.write(ADTS_MAX_FRAME_SIZE - ADTS_HEADER_LENGTH - 1).is_ok());
    assert!(matches!(
        hdr.write(ADTS_MAX_FRAME_SIZE - ADTS_HEADER_LENGTH),
        Err(EmitError::FrameTooLarge { .. })
    ));
}
