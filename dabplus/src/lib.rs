#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Parser for DAB+ audio superframes carrying MPEG-4 HE-AAC v2 according to the
//! digital radio transport adaptation.
//!
//! ### Stream Organization
//!
//! **External Structure**: Fixed size superframes spanning a whole number of
//! 120 byte transport frames, each delimited by a firecode guarded boundary.
//! **Internal Structure**: A header carrying the audio configuration and an
//! access unit table, followed by the AAC payload and a Reed-Solomon parity
//! region.
//!
//! ### Audio Configurations
//!
//! - 16, 24, 32 or 48 kHz AAC core sample rate
//! - Mono and stereo channel modes with parametric stereo signalling
//! - MPEG Surround 5.1 and 7.1 configurations
//!
//! ### Error Resilience
//!
//! Synchronization requires two consecutive valid boundaries before any data
//! is trusted. A corrupted superframe drops the lock, and scanning re-anchors
//! on the next boundary pair.
//!
//! ## Quick Start
//!
//! Steps for processing superframe streams:
//!
//! 1. Drive windows of stream data through [`process::parse::Parser`]
//! 2. Forward the packaged access units of every parsed superframe downstream
//!
//! ```rust,no_run
//! use dabplus::process::parse::{ChunkStatus, OutputMode, Parser};
//! use dabplus::structs::audio::AudioParams;
//!
//! let mut parser = Parser::default();
//! let mut accept_all = |_: OutputMode, _: &AudioParams| true;
//!
//! let data = std::fs::read("stream.dabp")?;
//! let mut pos = 0usize;
//!
//! while pos < data.len() {
//!     match parser.process_chunk(&data[pos..], &mut accept_all)? {
//!         ChunkStatus::NeedMoreData { skip, .. } => {
//!             if skip == 0 {
//!                 break; // the rest of the stream cannot be parsed
//!             }
//!             pos += skip;
//!         }
//!         ChunkStatus::SyncLost { skip } => pos += skip,
//!         ChunkStatus::Superframe(superframe) => {
//!             pos += superframe.consumed;
//!             for unit in &superframe.access_units {
//!                 // unit.as_ref() holds one ADTS packet here
//!                 let _ = unit.as_ref();
//!             }
//!         }
//!     }
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Processing functionality for superframe streams.
///
/// 1. **Synchronization** ([`process::sync`]): Locates superframe boundaries
///    by validating firecode guarded boundary pairs.
///
/// 2. **Parsing** ([`process::parse`]): Drives synchronization, header
///    decoding and output negotiation over caller supplied windows.
///
/// 3. **Emission** ([`process::emit`]): Packages access units for the
///    negotiated output mode.
pub mod process;

/// Data structures representing superframe components.
///
/// - **Superframe Headers** ([`structs::superframe`]): Audio configuration and
///   the access unit table
/// - **Audio Parameters** ([`structs::audio`]): Decoded sample rate and channel
///   configuration
/// - **Access Units** ([`structs::access_unit`]): Packaged AAC frames
/// - **ADTS Packaging** ([`structs::adts`]): Header synthesis for standalone
///   decoders
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **CRC Validation** ([`utils::crc`]): Firecode boundary guards
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
