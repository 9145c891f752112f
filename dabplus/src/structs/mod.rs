//! Data structures representing format components.
//!
//! Contains structured representations of bitstream elements including
//! superframe headers, access unit descriptors, decoded audio parameters
//! and ADTS packaging used throughout the parsing pipeline.

pub mod access_unit;
pub mod adts;
pub mod audio;
pub mod superframe;
