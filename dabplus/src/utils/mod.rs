//! Utility functions and supporting infrastructure.
//!
//! Provides bitstream I/O, firecode CRC validation and error handling
//! for superframe processing.

pub mod bitstream_io;
pub mod crc;
pub mod errors;
