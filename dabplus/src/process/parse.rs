use anyhow::{Result, anyhow, bail};
use log::Level::Warn;
use log::{debug, info};

use crate::log_or_err;
use crate::process::emit::emit_access_units;
use crate::process::sync::{SYNC_WINDOW_LEN, SyncScan, find_sync};
use crate::structs::access_unit::AccessUnit;
use crate::structs::audio::AudioParams;
use crate::structs::superframe::{SUPERFRAME_MIN_SIZE, SuperframeHeader};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::crc::check_firecode;
use crate::utils::errors::ParseError;

/// Framing applied to emitted access units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Each access unit carries a 7 byte ADTS header.
    Adts,

    /// Bare AAC frames without any framing.
    Raw,
}

/// Consumer side of output negotiation.
///
/// Whenever the audio parameters change, the parser offers output modes
/// in order of preference. The first accepted mode frames every
/// following access unit until the parameters change again.
///
/// Closures taking `(OutputMode, &AudioParams)` implement this trait, so
/// a caller that handles anything can pass `|_, _| true`.
pub trait Downstream {
    /// Returns whether access units in `mode` with `params` are usable.
    fn accepts(&mut self, mode: OutputMode, params: &AudioParams) -> bool;
}

impl<F> Downstream for F
where
    F: FnMut(OutputMode, &AudioParams) -> bool,
{
    fn accepts(&mut self, mode: OutputMode, params: &AudioParams) -> bool {
        self(mode, params)
    }
}

/// Caller instruction returned by [`Parser::process_chunk`].
#[derive(Debug)]
pub enum ChunkStatus {
    /// The head of the window cannot be processed yet. Discard `skip`
    /// bytes, then refill the window toward `min_len` bytes before
    /// calling again. A zero skip on a window that cannot grow means the
    /// rest of the stream is unparseable.
    NeedMoreData { skip: usize, min_len: usize },

    /// The expected superframe boundary failed validation and the parser
    /// dropped back to scanning. Discard `skip` bytes before continuing.
    SyncLost { skip: usize },

    /// A complete superframe was parsed. Discard `consumed` bytes.
    Superframe(ParsedSuperframe),
}

/// One successfully parsed superframe.
#[derive(Debug)]
pub struct ParsedSuperframe {
    /// Decoded superframe header
    pub header: SuperframeHeader,

    /// Audio parameters in effect for this superframe
    pub params: AudioParams,

    /// Whether this superframe renegotiated the output
    pub params_changed: bool,

    /// Packaged access units in presentation order
    pub access_units: Vec<AccessUnit>,

    /// Bytes of input covered by this superframe
    pub consumed: usize,
}

/// Parses superframes out of a raw byte stream.
///
/// The parser holds no buffer of its own. The caller maintains a window
/// over the unconsumed tail of the stream and repeatedly hands it to
/// [`process_chunk`](Parser::process_chunk), discarding and refilling as
/// the returned [`ChunkStatus`] instructs.
///
/// # Example
///
/// ```rust,no_run
/// use dabplus::process::parse::{ChunkStatus, OutputMode, Parser};
/// use dabplus::structs::audio::AudioParams;
///
/// let mut parser = Parser::default();
/// let mut accept_all = |_: OutputMode, _: &AudioParams| true;
///
/// let data = std::fs::read("stream.dabp")?;
/// let mut pos = 0usize;
///
/// while pos < data.len() {
///     match parser.process_chunk(&data[pos..], &mut accept_all)? {
///         ChunkStatus::NeedMoreData { skip, .. } => {
///             if skip == 0 {
///                 break; // the rest of the stream cannot be parsed
///             }
///             pos += skip;
///         }
///         ChunkStatus::SyncLost { skip } => pos += skip,
///         ChunkStatus::Superframe(superframe) => {
///             pos += superframe.consumed;
///             for unit in &superframe.access_units {
///                 // unit.as_ref() holds one packaged access unit
///                 let _ = unit.as_ref();
///             }
///         }
///     }
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Default)]
pub struct Parser {
    state: ParserState,
}

#[derive(Debug)]
pub struct ParserState {
    pub fail_level: log::Level,

    pub synchronized: bool,
    pub superframe_size: usize,

    pub output_mode: Option<OutputMode>,
    pub superframe_header: Option<SuperframeHeader>,
    pub audio_params: Option<AudioParams>,

    pub bytes_consumed: u64,
    pub superframes_parsed: usize,
    pub access_units_emitted: usize,
    pub sync_losses: usize,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            fail_level: log::Level::Error,

            synchronized: false,
            superframe_size: 0,

            output_mode: None,
            superframe_header: None,
            audio_params: None,

            bytes_consumed: 0,
            superframes_parsed: 0,
            access_units_emitted: 0,
            sync_losses: 0,
        }
    }
}

impl Parser {
    /// Drops synchronization and negotiation state, returning the parser
    /// to boundary scanning. The failure level and the running counters
    /// survive.
    pub fn reset(&mut self) {
        info!("resetting");

        self.state = ParserState {
            fail_level: self.state.fail_level,
            bytes_consumed: self.state.bytes_consumed,
            superframes_parsed: self.state.superframes_parsed,
            access_units_emitted: self.state.access_units_emitted,
            sync_losses: self.state.sync_losses,
            ..Default::default()
        };
    }

    /// Window length the next [`process_chunk`](Parser::process_chunk)
    /// call wants. Smaller windows still make progress when the stream
    /// ends early.
    pub fn min_window_len(&self) -> usize {
        if self.state.synchronized {
            self.state.superframe_size
        } else {
            SYNC_WINDOW_LEN
        }
    }

    /// Superframe size of the locked stream in bytes.
    pub fn superframe_size(&self) -> Option<usize> {
        self.state.synchronized.then_some(self.state.superframe_size)
    }

    /// Audio parameters of the stream, once negotiated.
    pub fn audio_params(&self) -> Option<AudioParams> {
        self.state.audio_params
    }

    /// Output mode in effect, once negotiated.
    pub fn output_mode(&self) -> Option<OutputMode> {
        self.state.output_mode
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.state.bytes_consumed
    }

    pub fn superframes_parsed(&self) -> usize {
        self.state.superframes_parsed
    }

    pub fn access_units_emitted(&self) -> usize {
        self.state.access_units_emitted
    }

    pub fn sync_losses(&self) -> usize {
        self.state.sync_losses
    }

    /// Sets the failure level for validation errors.
    ///
    /// - `log::Level::Error`: Only fail on Error level messages (default)
    /// - `log::Level::Warn`: Fail on Warning level and above (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.state.fail_level = level;
    }

    /// Advances the parser over the head of `window`.
    ///
    /// The returned [`ChunkStatus`] tells the caller how many bytes the
    /// parser is done with and how large the window should grow before
    /// the next call. `downstream` is consulted only when the audio
    /// parameters change.
    ///
    /// # Errors
    ///
    /// Fails when the stream carries parameters with no valid output
    /// representation, when the downstream declines every offered mode,
    /// or on any condition at or above the configured failure level.
    pub fn process_chunk(
        &mut self,
        window: &[u8],
        downstream: &mut dyn Downstream,
    ) -> Result<ChunkStatus> {
        if !self.state.synchronized {
            match find_sync(window) {
                SyncScan::NotFound { skip } => {
                    self.state.bytes_consumed += skip as u64;
                    return Ok(ChunkStatus::NeedMoreData {
                        skip,
                        min_len: SYNC_WINDOW_LEN,
                    });
                }
                SyncScan::Locked { size } => {
                    info!(
                        "superframe size: {size} ({} x {})",
                        size / SUPERFRAME_MIN_SIZE,
                        SUPERFRAME_MIN_SIZE
                    );

                    self.state.synchronized = true;
                    self.state.superframe_size = size;
                }
            }
        }

        let size = self.state.superframe_size;

        if window.len() < size {
            debug!(
                "buffer doesn't contain enough data ({} of {size} bytes)",
                window.len()
            );
            return Ok(ChunkStatus::NeedMoreData {
                skip: 0,
                min_len: size,
            });
        }

        let frame = &window[..size];

        if !check_firecode(frame) {
            info!("buffer doesn't contain valid superframe");
            return self.lose_sync(0);
        }

        let mut reader = BsIoSliceReader::from_slice(frame);
        let header = match SuperframeHeader::read(&mut reader, size) {
            Ok(header) => header,
            Err(error) => {
                info!("cannot parse superframe header: {error}");
                return self.lose_sync(1);
            }
        };

        let params_changed = self
            .state
            .superframe_header
            .replace(header.clone())
            .is_none_or(|previous| !previous.same_audio_params(&header));

        if params_changed {
            info!(
                "superframe: dac rate: '{}', sbr: '{}', aac channel mode: '{}', ps: '{}', surround cfg: {}",
                if header.dac_rate { "48 kHz" } else { "32 kHz" },
                if header.sbr_flag { "on" } else { "off" },
                if header.aac_channel_mode { "stereo" } else { "mono" },
                if header.ps_flag { "on" } else { "off" },
                header.mpeg_surround_config,
            );

            let params = AudioParams::resolve(&header)?;
            let mode = negotiate(&params, downstream)?;

            self.state.audio_params = Some(params);
            self.state.output_mode = Some(mode);
        }

        let (Some(mode), Some(params)) = (self.state.output_mode, self.state.audio_params) else {
            bail!(ParseError::NotNegotiated);
        };

        let access_units = emit_access_units(frame, &header, mode, &params)?;

        self.state.superframes_parsed += 1;
        self.state.access_units_emitted += access_units.len();
        self.state.bytes_consumed += size as u64;

        Ok(ChunkStatus::Superframe(ParsedSuperframe {
            header,
            params,
            params_changed,
            access_units,
            consumed: size,
        }))
    }

    fn lose_sync(&mut self, skip: usize) -> Result<ChunkStatus> {
        let offset = self.state.bytes_consumed;
        self.state.bytes_consumed += skip as u64;

        self.reset();
        self.state.sync_losses += 1;

        log_or_err!(self.state, Warn, anyhow!(ParseError::SyncLost { offset }));

        Ok(ChunkStatus::SyncLost { skip })
    }
}

fn negotiate(params: &AudioParams, downstream: &mut dyn Downstream) -> Result<OutputMode> {
    info!("trying adts format first");
    if downstream.accepts(OutputMode::Adts, params) {
        return Ok(OutputMode::Adts);
    }

    info!("adts format refused, trying raw format");
    if downstream.accepts(OutputMode::Raw, params) {
        return Ok(OutputMode::Raw);
    }

    bail!(ParseError::NotNegotiated)
}

#[cfg(test)]
fn drive(parser: &mut Parser, stream: &[u8]) -> Result<Vec<ParsedSuperframe>> {
    let mut accept_all = |_: OutputMode, _: &AudioParams| true;
    drive_with(parser, stream, &mut accept_all)
}

#[cfg(test)]
fn drive_with(
    parser: &mut Parser,
    stream: &[u8],
    downstream: &mut dyn Downstream,
) -> Result<Vec<ParsedSuperframe>> {
    let mut superframes = Vec::new();
    let mut pos = 0usize;

    while pos < stream.len() {
        match parser.process_chunk(&stream[pos..], downstream)? {
            ChunkStatus::NeedMoreData { skip, .. } => {
                if skip == 0 {
                    break;
                }
                pos += skip;
            }
            ChunkStatus::SyncLost { skip } => pos += skip,
            ChunkStatus::Superframe(superframe) => {
                pos += superframe.consumed;
                superframes.push(superframe);
            }
        }
    }

    Ok(superframes)
}

#[test]
fn parses_contiguous_superframes() -> Result<()> {
    use crate::structs::superframe::build_superframe;

    let frame = build_superframe(600, 0x60, &[188, 370]);
    let mut stream = Vec::new();
    for _ in 0..3 {
        stream.extend_from_slice(&frame);
    }

    let mut parser = Parser::default();
    assert_eq!(parser.min_window_len(), SYNC_WINDOW_LEN);

    let superframes = drive(&mut parser, &stream)?;

    assert_eq!(superframes.len(), 3);
    assert!(superframes[0].params_changed);
    assert!(!superframes[1].params_changed);
    assert!(!superframes[2].params_changed);

    // 24 kHz mono over adts
    assert_eq!(superframes[0].params.sample_rate, 24000);
    assert_eq!(superframes[0].params.channels, 1);
    assert_eq!(parser.output_mode(), Some(OutputMode::Adts));
    assert_eq!(
        &superframes[0].access_units[0].as_ref()[..7],
        &[0xFF, 0xF1, 0x1A, 0x70, 0x17, 0x7F, 0xFC]
    );

    assert_eq!(parser.superframe_size(), Some(600));
    assert_eq!(parser.min_window_len(), 600);
    assert_eq!(parser.superframes_parsed(), 3);
    assert_eq!(parser.access_units_emitted(), 9);
    assert_eq!(parser.sync_losses(), 0);
    assert_eq!(parser.bytes_consumed(), 1800);

    Ok(())
}

#[test]
fn repeated_runs_produce_identical_output() -> Result<()> {
    use crate::structs::superframe::build_superframe;

    let frame = build_superframe(600, 0x60, &[188, 370]);
    let mut stream = Vec::new();
    for _ in 0..3 {
        stream.extend_from_slice(&frame);
    }

    let output_of = |stream: &[u8]| -> Result<(Vec<u8>, usize)> {
        let mut negotiations = 0usize;
        let mut counting = |_: OutputMode, _: &AudioParams| {
            negotiations += 1;
            true
        };

        let mut parser = Parser::default();
        let superframes = drive_with(&mut parser, stream, &mut counting)?;

        let mut bytes = Vec::new();
        for superframe in &superframes {
            for unit in &superframe.access_units {
                bytes.extend_from_slice(unit.as_ref());
            }
        }

        Ok((bytes, negotiations))
    };

    let (first, negotiations) = output_of(&stream)?;
    let (second, _) = output_of(&stream)?;

    // 9 units, each a 7 byte ADTS header plus its payload
    assert_eq!(negotiations, 1);
    assert_eq!(first.len(), 1677);
    assert_eq!(first, second);

    Ok(())
}

#[test]
fn falls_back_to_raw_output() -> Result<()> {
    use crate::structs::superframe::build_superframe;

    let frame = build_superframe(600, 0x60, &[188, 370]);
    let mut stream = Vec::new();
    for _ in 0..2 {
        stream.extend_from_slice(&frame);
    }

    let mut offers = Vec::new();
    let mut raw_only = |mode: OutputMode, _: &AudioParams| {
        offers.push(mode);
        mode == OutputMode::Raw
    };

    let mut parser = Parser::default();
    let superframes = drive_with(&mut parser, &stream, &mut raw_only)?;

    assert_eq!(offers, vec![OutputMode::Adts, OutputMode::Raw]);
    assert_eq!(parser.output_mode(), Some(OutputMode::Raw));

    assert_eq!(superframes.len(), 2);
    let unit = &superframes[0].access_units[0];
    assert_eq!(unit.as_ref().len(), unit.size);
    assert_eq!(unit.as_ref(), &frame[6..186]);

    Ok(())
}

#[test]
fn refusing_every_output_mode_is_fatal() {
    use crate::structs::superframe::build_superframe;

    let frame = build_superframe(600, 0x60, &[188, 370]);
    let mut stream = Vec::new();
    for _ in 0..2 {
        stream.extend_from_slice(&frame);
    }

    let mut refuse_all = |_: OutputMode, _: &AudioParams| false;

    let mut parser = Parser::default();
    let error = drive_with(&mut parser, &stream, &mut refuse_all).unwrap_err();

    assert!(matches!(
        error.downcast_ref::<ParseError>(),
        Some(ParseError::NotNegotiated)
    ));
}

#[test]
fn recovers_sync_after_corrupted_superframe() -> Result<()> {
    use crate::structs::superframe::build_superframe;

    let frame = build_superframe(600, 0x60, &[188, 370]);
    let mut stream = Vec::new();
    for _ in 0..7 {
        stream.extend_from_slice(&frame);
    }

    // Damage a byte under the fourth superframe's firecode
    stream[1805] ^= 0xFF;

    let mut parser = Parser::default();
    let superframes = drive(&mut parser, &stream)?;

    assert_eq!(superframes.len(), 6);
    assert_eq!(parser.sync_losses(), 1);
    assert_eq!(parser.bytes_consumed(), 4200);

    // Relocking renegotiates
    let changes: Vec<bool> = superframes.iter().map(|sf| sf.params_changed).collect();
    assert_eq!(changes, vec![true, false, false, true, false, false]);

    Ok(())
}

#[test]
fn invalid_header_table_drops_sync() -> Result<()> {
    use crate::structs::superframe::build_superframe;

    let good = build_superframe(600, 0x60, &[188, 370]);
    // Sealed firecode over an out of order start table
    let bad = build_superframe(600, 0x60, &[370, 188]);

    let mut stream = Vec::new();
    stream.extend_from_slice(&good);
    stream.extend_from_slice(&good);
    stream.extend_from_slice(&bad);
    stream.extend_from_slice(&good);
    stream.extend_from_slice(&good);

    let mut parser = Parser::default();
    let superframes = drive(&mut parser, &stream)?;

    assert_eq!(superframes.len(), 4);
    assert_eq!(parser.sync_losses(), 1);
    assert_eq!(parser.superframes_parsed(), 4);

    Ok(())
}

#[test]
fn strict_mode_fails_on_sync_loss() {
    use crate::structs::superframe::build_superframe;

    let frame = build_superframe(600, 0x60, &[188, 370]);
    let mut stream = Vec::new();
    for _ in 0..7 {
        stream.extend_from_slice(&frame);
    }
    stream[1805] ^= 0xFF;

    let mut parser = Parser::default();
    parser.set_fail_level(log::Level::Warn);

    let error = drive(&mut parser, &stream).unwrap_err();

    assert!(matches!(
        error.downcast_ref::<ParseError>(),
        Some(ParseError::SyncLost { offset: 1800 })
    ));
    assert_eq!(parser.superframes_parsed(), 3);
}

#[test]
fn renegotiates_when_audio_params_change() -> Result<()> {
    use crate::structs::superframe::build_superframe;

    let mono = build_superframe(600, 0x60, &[188, 370]);
    let stereo = build_superframe(600, 0x70, &[188, 370]);

    let mut stream = Vec::new();
    stream.extend_from_slice(&mono);
    stream.extend_from_slice(&mono);
    stream.extend_from_slice(&stereo);
    stream.extend_from_slice(&stereo);

    let mut negotiations = 0usize;
    let mut counting = |_: OutputMode, _: &AudioParams| {
        negotiations += 1;
        true
    };

    let mut parser = Parser::default();
    let superframes = drive_with(&mut parser, &stream, &mut counting)?;

    assert_eq!(superframes.len(), 4);
    assert_eq!(negotiations, 2);
    assert_eq!(parser.sync_losses(), 0);

    assert!(superframes[0].params_changed);
    assert!(!superframes[1].params_changed);
    assert!(superframes[2].params_changed);
    assert!(!superframes[3].params_changed);

    assert_eq!(superframes[1].params.channels, 1);
    assert_eq!(superframes[2].params.channels, 2);
    assert_eq!(superframes[2].params.sample_rate, 24000);

    Ok(())
}

#[test]
fn reserved_bit_change_does_not_renegotiate() -> Result<()> {
    use crate::structs::superframe::build_superframe;

    // Identical audio configuration, only the reserved flag bit differs
    let plain = build_superframe(600, 0x60, &[188, 370]);
    let reserved = build_superframe(600, 0xE0, &[188, 370]);

    let mut stream = Vec::new();
    stream.extend_from_slice(&plain);
    stream.extend_from_slice(&plain);
    stream.extend_from_slice(&reserved);
    stream.extend_from_slice(&reserved);

    let mut negotiations = 0usize;
    let mut counting = |_: OutputMode, _: &AudioParams| {
        negotiations += 1;
        true
    };

    let mut parser = Parser::default();
    let superframes = drive_with(&mut parser, &stream, &mut counting)?;

    assert_eq!(superframes.len(), 4);
    assert_eq!(negotiations, 1);
    assert_eq!(parser.sync_losses(), 0);

    assert!(!superframes[1].header.rfa);
    assert!(superframes[2].header.rfa);
    assert!(!superframes[2].params_changed);
    assert!(!superframes[3].params_changed);

    Ok(())
}

#[test]
fn truncated_final_superframe_is_left_unconsumed() -> Result<()> {
    use crate::structs::superframe::build_superframe;

    let frame = build_superframe(600, 0x60, &[188, 370]);
    let mut stream = Vec::new();
    stream.extend_from_slice(&frame);
    stream.extend_from_slice(&frame);
    stream.extend_from_slice(&frame[..300]);

    let mut parser = Parser::default();
    let superframes = drive(&mut parser, &stream)?;

    assert_eq!(superframes.len(), 2);
    assert_eq!(parser.bytes_consumed(), 1200);
    assert_eq!(parser.sync_losses(), 0);

    Ok(())
}
