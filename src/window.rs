use std::collections::VecDeque;
use std::io::Read;

use anyhow::Result;
use dabplus::process::parse::{ChunkStatus, Downstream, ParsedSuperframe, Parser};

/// Bytes pulled from the input per read call.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Caller-side byte window over the unconsumed tail of the stream.
///
/// [`Parser::process_chunk`] borrows the whole window on every call and
/// reports how many bytes it is done with, which the caller drops from
/// the front here.
#[derive(Default)]
pub struct Window {
    buf: VecDeque<u8>,
}

impl Window {
    /// Appends a chunk of input to the back of the window.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes);
    }

    /// Contiguous view of the buffered bytes.
    pub fn bytes(&mut self) -> &[u8] {
        self.buf.make_contiguous()
    }

    /// Drops `len` bytes from the front of the window.
    pub fn consume(&mut self, len: usize) {
        self.buf.drain(..len);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Totals of one [`run_stream`] pass.
#[derive(Debug, Clone, Copy)]
pub struct StreamStats {
    /// Bytes pulled from the reader
    pub bytes_read: u64,

    /// Unparseable bytes left in the window at the end of input
    pub leftover: usize,
}

/// Pumps `reader` through `parser` until the input runs out, handing
/// every parsed superframe to `on_superframe`.
///
/// The window grows toward whatever the parser asks for and shrinks as
/// it consumes or skips bytes. After the reader is exhausted the
/// remaining window is still offered until the parser stops making
/// progress; whatever is left then lands in [`StreamStats::leftover`].
pub fn run_stream<R, S>(
    reader: &mut R,
    parser: &mut Parser,
    downstream: &mut dyn Downstream,
    mut on_superframe: S,
) -> Result<StreamStats>
where
    R: Read,
    S: FnMut(&ParsedSuperframe) -> Result<()>,
{
    let mut window = Window::default();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut want = parser.min_window_len();
    let mut bytes_read = 0u64;
    let mut eof = false;

    loop {
        while !eof && window.len() < want {
            let len = reader.read(&mut chunk)?;
            if len == 0 {
                eof = true;
            } else {
                bytes_read += len as u64;
                window.push_bytes(&chunk[..len]);
            }
        }

        if window.is_empty() {
            break;
        }

        match parser.process_chunk(window.bytes(), downstream)? {
            ChunkStatus::NeedMoreData { skip, min_len } => {
                window.consume(skip);
                if eof && skip == 0 {
                    break;
                }
                want = min_len;
            }
            ChunkStatus::SyncLost { skip } => window.consume(skip),
            ChunkStatus::Superframe(superframe) => {
                on_superframe(&superframe)?;
                window.consume(superframe.consumed);
                want = parser.min_window_len();
            }
        }
    }

    Ok(StreamStats {
        bytes_read,
        leftover: window.len(),
    })
}

/// Builds a sealed 600 byte superframe with SBR flags and access units
/// at offsets 6, 188 and 370.
#[cfg(test)]
fn sealed_superframe() -> Vec<u8> {
    use dabplus::utils::crc::{FIRECODE, FIRECODE_LENGTH};

    let mut frame = vec![0u8; 600];
    frame[2] = 0x60;
    frame[3] = 0x0B;
    frame[4] = 0xC1;
    frame[5] = 0x72;

    for (i, byte) in frame.iter_mut().enumerate().skip(11) {
        *byte = (i * 31 % 251) as u8;
    }

    let checksum = FIRECODE.checksum(&frame[2..FIRECODE_LENGTH]);
    frame[..2].copy_from_slice(&checksum.to_be_bytes());
    frame
}

#[test]
fn window_accumulates_and_consumes_in_order() {
    let mut window = Window::default();

    window.push_bytes(&[1, 2, 3]);
    window.push_bytes(&[4, 5]);
    assert_eq!(window.len(), 5);
    assert_eq!(window.bytes(), &[1, 2, 3, 4, 5]);

    window.consume(2);
    assert_eq!(window.bytes(), &[3, 4, 5]);

    window.consume(3);
    assert!(window.is_empty());
}

#[test]
fn window_stays_contiguous_after_wraparound() {
    let mut window = Window::default();

    window.push_bytes(&[0xAA; 1000]);
    window.consume(900);
    window.push_bytes(&[0xBB; 1000]);

    assert_eq!(window.len(), 1100);
    let bytes = window.bytes();
    assert!(bytes[..100].iter().all(|&b| b == 0xAA));
    assert!(bytes[100..].iter().all(|&b| b == 0xBB));
}

#[test]
fn streams_superframes_from_a_reader() -> Result<()> {
    use dabplus::process::parse::OutputMode;
    use dabplus::structs::audio::AudioParams;
    use std::io::Cursor;

    let stream = sealed_superframe().repeat(3);

    let mut parser = Parser::default();
    let mut accept_all = |_: OutputMode, _: &AudioParams| true;
    let mut units = 0usize;

    let stats = run_stream(
        &mut Cursor::new(&stream),
        &mut parser,
        &mut accept_all,
        |superframe| {
            units += superframe.access_units.len();
            Ok(())
        },
    )?;

    assert_eq!(parser.superframes_parsed(), 3);
    assert_eq!(parser.output_mode(), Some(OutputMode::Adts));
    assert_eq!(units, 9);
    assert_eq!(stats.bytes_read, 1800);
    assert_eq!(stats.leftover, 0);

    Ok(())
}

#[test]
fn skips_garbage_before_the_first_superframe() -> Result<()> {
    use dabplus::process::parse::OutputMode;
    use dabplus::structs::audio::AudioParams;
    use std::io::Cursor;

    let mut stream = vec![0u8; 257];
    stream.extend_from_slice(&sealed_superframe().repeat(3));

    let mut parser = Parser::default();
    let mut accept_all = |_: OutputMode, _: &AudioParams| true;

    let stats = run_stream(
        &mut Cursor::new(&stream),
        &mut parser,
        &mut accept_all,
        |_| Ok(()),
    )?;

    assert_eq!(parser.superframes_parsed(), 3);
    assert_eq!(stats.bytes_read, 2057);
    assert_eq!(stats.leftover, 0);

    Ok(())
}

#[test]
fn reports_unparsed_trailing_bytes() -> Result<()> {
    use dabplus::process::parse::OutputMode;
    use dabplus::structs::audio::AudioParams;
    use std::io::Cursor;

    let frame = sealed_superframe();
    let mut stream = frame.repeat(2);
    stream.extend_from_slice(&frame[..250]);

    let mut parser = Parser::default();
    let mut accept_all = |_: OutputMode, _: &AudioParams| true;

    let stats = run_stream(
        &mut Cursor::new(&stream),
        &mut parser,
        &mut accept_all,
        |_| Ok(()),
    )?;

    assert_eq!(parser.superframes_parsed(), 2);
    assert_eq!(stats.bytes_read, 1450);
    assert_eq!(stats.leftover, 250);

    Ok(())
}
