/// Superframe boundary detection in raw byte streams.
///
/// Provides [`find_sync`](sync::find_sync) for locating two consecutive
/// firecode guarded boundaries and deriving the superframe size from
/// their spacing.
pub mod sync;

/// Superframe parsing state machine.
///
/// Provides the [`Parser`](parse::Parser) for turning windows of stream
/// data into [`ParsedSuperframe`](parse::ParsedSuperframe) objects while
/// tracking synchronization and output negotiation.
pub mod parse;

/// Access unit packaging for the negotiated output.
///
/// Provides [`emit_access_units`](emit::emit_access_units) for slicing
/// [`AccessUnit`](crate::structs::access_unit::AccessUnit) payloads out
/// of a parsed superframe.
pub mod emit;
