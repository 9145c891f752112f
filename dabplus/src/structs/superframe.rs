//! Superframe structure and header decoding.
//!
//! ## Superframe Layout
//!
//! An audio superframe carries 120 ms of HE-AAC audio. Its size is a
//! multiple of the 120 byte sub-channel block, up to 216 blocks. Each block
//! contributes 10 trailing Reed-Solomon parity bytes, so the audio payload
//! ends `size / 120 * 10` bytes before the superframe does.
//!
//! The first two bytes hold the firecode checksum over bytes 2..11. The
//! third byte carries the audio configuration flags, followed by 12-bit
//! start offsets for every access unit after the first. First start offset
//! and access unit count are implied by the SBR and sampling rate flags.

use anyhow::{Result, bail};

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::HeaderError;

/// Smallest legal superframe: a single sub-channel block.
pub const SUPERFRAME_MIN_SIZE: usize = 120;

/// Largest number of sub-channel blocks in a superframe.
pub const N_MAX: usize = 216;

/// Largest legal superframe size in bytes.
pub const SUPERFRAME_MAX_SIZE: usize = N_MAX * SUPERFRAME_MIN_SIZE;

/// Reed-Solomon parity bytes carried per sub-channel block.
pub const RS_CODE_SIZE: usize = 10;

/// Largest access unit count a superframe can carry.
pub const MAX_AUS: usize = 6;

/// Offset of the first byte past the audio payload, before the
/// Reed-Solomon parity region.
#[inline(always)]
pub const fn audio_payload_end(frame_size: usize) -> usize {
    frame_size - frame_size / SUPERFRAME_MIN_SIZE * RS_CODE_SIZE
}

/// Position of one access unit inside a superframe.
///
/// `size` excludes the two CRC bytes trailing every access unit payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuDescriptor {
    pub start: u16,
    pub size: u16,
}

/// Decoded superframe header.
///
/// Covers the firecode checksum, the audio configuration flags and the
/// access unit table with derived payload sizes.
#[derive(Debug, Clone, Default)]
pub struct SuperframeHeader {
    /// Stored firecode checksum over bytes 2..11.
    pub header_firecode: u16,

    /// Reserved bit, ignored by parameter comparisons.
    pub rfa: bool,

    /// Sampling rate selector: 48 kHz core when set, 32 kHz otherwise.
    pub dac_rate: bool,

    /// Spectral band replication in use.
    pub sbr_flag: bool,

    /// Stereo core when set, mono otherwise.
    pub aac_channel_mode: bool,

    /// Parametric stereo in use.
    pub ps_flag: bool,

    /// MPEG surround configuration, 3 bits.
    pub mpeg_surround_config: u8,

    /// Number of access units in this superframe, implied by
    /// `sbr_flag` and `dac_rate`.
    pub num_aus: usize,

    /// Access unit table. Only the first `num_aus` entries are meaningful.
    pub au: [AuDescriptor; MAX_AUS],
}

impl SuperframeHeader {
    /// Decodes the header of a `frame_size` byte superframe.
    ///
    /// The access unit table is validated while sizes are derived: start
    /// offsets must leave two CRC bytes between consecutive payloads and the
    /// last payload must end inside the audio region.
    pub fn read(reader: &mut BsIoSliceReader, frame_size: usize) -> Result<Self> {
        let mut hdr = Self {
            header_firecode: reader.get_n(16)?,
            rfa: reader.get()?,
            dac_rate: reader.get()?,
            sbr_flag: reader.get()?,
            aac_channel_mode: reader.get()?,
            ps_flag: reader.get()?,
            mpeg_surround_config: reader.get_n(3)?,
            ..Default::default()
        };

        let (num_aus, first_start) = match (hdr.sbr_flag, hdr.dac_rate) {
            (true, false) => (2, 5),
            (true, true) => (3, 6),
            (false, false) => (4, 8),
            (false, true) => (6, 11),
        };

        hdr.num_aus = num_aus;
        hdr.au[0].start = first_start;

        for i in 1..num_aus {
            hdr.au[i].start = reader.get_n(12)?;
        }

        let end = audio_payload_end(frame_size);

        for i in 0..num_aus - 1 {
            let start = hdr.au[i].start;
            let next = hdr.au[i + 1].start;

            let Some(size) = next.checked_sub(start + 2) else {
                bail!(HeaderError::StartsOutOfOrder {
                    index: i,
                    start,
                    next
                });
            };
            hdr.au[i].size = size;
        }

        let last = num_aus - 1;
        let start = hdr.au[last].start;

        let Some(size) = end.checked_sub(start as usize + 2) else {
            bail!(HeaderError::TableBeyondPayload {
                index: last,
                start,
                end
            });
        };
        hdr.au[last].size = size as u16;

        Ok(hdr)
    }

    /// The populated part of the access unit table.
    pub fn aus(&self) -> &[AuDescriptor] {
        &self.au[..self.num_aus]
    }

    /// Whether the audio configuration matches `other`.
    ///
    /// Compares the five flag fields only; the firecode and the reserved
    /// bit differ between frames without a configuration change.
    pub fn same_audio_params(&self, other: &Self) -> bool {
        self.dac_rate == other.dac_rate
            && self.sbr_flag == other.sbr_flag
            && self.aac_channel_mode == other.aac_channel_mode
            && self.ps_flag == other.ps_flag
            && self.mpeg_surround_config == other.mpeg_surround_config
    }
}

/// Builds a sealed superframe with the given flags byte and trailing
/// access unit start offsets.
#[cfg(test)]
pub(crate) fn build_superframe(frame_size: usize, flags: u8, starts: &[u16]) -> Vec<u8> {
    let mut frame = vec![0u8; frame_size];
    frame[2] = flags;

    let mut bit = 24;
    for &start in starts {
        for k in (0..12).rev() {
            if start >> k & 1 == 1 {
                frame[bit / 8] |= 0x80 >> (bit % 8);
            }
            bit += 1;
        }
    }

    for (i, byte) in frame.iter_mut().enumerate().skip(11) {
        *byte = (i * 31 % 251) as u8;
    }

    crate::utils::crc::seal_firecode(&mut frame);
    frame
}

#[cfg(test)]
fn read_header(frame: &[u8]) -> Result<SuperframeHeader> {
    let mut reader = BsIoSliceReader::from_slice(frame);
    SuperframeHeader::read(&mut reader, frame.len())
}

#[test]
fn au_count_follows_sbr_and_dac_rate() -> Result<()> {
    let cases: [(u8, usize, u16, &[u16]); 4] = [
        (0x20, 2, 5, &[60]),
        (0x60, 3, 6, &[40, 70]),
        (0x00, 4, 8, &[30, 60, 90]),
        (0x40, 6, 11, &[20, 40, 60, 80, 100]),
    ];

    for (flags, num_aus, first_start, starts) in cases {
        let frame = build_superframe(SUPERFRAME_MIN_SIZE, flags, starts);
        let hdr = read_header(&frame)?;

        assert_eq!(hdr.num_aus, num_aus);
        assert_eq!(hdr.au[0].start, first_start);
        assert_eq!(hdr.aus().len(), num_aus);
    }

    Ok(())
}

#[test]
fn au_start_field_packing() -> Result<()> {
    let frame = build_superframe(600, 0x40, &[100, 190, 280, 370, 460]);

    assert_eq!(
        &frame[3..11],
        &[0x06, 0x40, 0xBE, 0x11, 0x81, 0x72, 0x1C, 0xC0]
    );

    let hdr = read_header(&frame)?;
    let starts: Vec<u16> = hdr.aus().iter().map(|au| au.start).collect();
    assert_eq!(starts, [11, 100, 190, 280, 370, 460]);

    Ok(())
}

#[test]
fn au_sizes_partition_audio_payload() -> Result<()> {
    let frame = build_superframe(600, 0x40, &[100, 190, 280, 370, 460]);
    let hdr = read_header(&frame)?;

    let sizes: Vec<u16> = hdr.aus().iter().map(|au| au.size).collect();
    assert_eq!(sizes, [87, 88, 88, 88, 88, 88]);

    let total: usize = sizes.iter().map(|&s| s as usize).sum();
    assert_eq!(
        hdr.au[0].start as usize + total + 2 * hdr.num_aus,
        audio_payload_end(600)
    );

    Ok(())
}

#[test]
fn rejects_out_of_order_au_starts() {
    let frame = build_superframe(600, 0x00, &[100, 50, 200]);
    assert!(read_header(&frame).is_err());
}

#[test]
fn rejects_au_table_past_audio_payload() {
    let frame = build_superframe(SUPERFRAME_MIN_SIZE, 0x20, &[3000]);
    assert!(read_header(&frame).is_err());
}

#[test]
fn audio_params_comparison_ignores_firecode_and_rfa() {
    let a = SuperframeHeader {
        header_firecode: 0x1234,
        rfa: false,
        ps_flag: true,
        ..Default::default()
    };
    let b = SuperframeHeader {
        header_firecode: 0xBEEF,
        rfa: true,
        ps_flag: true,
        ..Default::default()
    };

    assert!(a.same_audio_params(&b));

    let c = SuperframeHeader {
        ps_flag: false,
        ..b.clone()
    };
    assert!(!a.same_audio_params(&c));
}
