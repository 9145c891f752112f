use log::debug;

use crate::structs::superframe::{SUPERFRAME_MAX_SIZE, SUPERFRAME_MIN_SIZE};
use crate::utils::crc::{FIRECODE_LENGTH, check_firecode};

/// Window length at which a synchronization scan is always conclusive.
///
/// Locking needs two consecutive superframe boundaries. The second guard
/// of a maximum size superframe starts [`SUPERFRAME_MAX_SIZE`] bytes after
/// the first, and checking it needs one more complete firecode window.
pub const SYNC_WINDOW_LEN: usize = SUPERFRAME_MAX_SIZE + FIRECODE_LENGTH;

/// Outcome of a synchronization scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScan {
    /// Two aligned boundaries start at the head of the window. The stream
    /// is locked to superframes of `size` bytes.
    Locked { size: usize },

    /// No aligned boundary pair starts at the head of the window. The
    /// first `skip` bytes cannot begin a superframe and should be
    /// discarded before scanning again.
    NotFound { skip: usize },
}

/// Searches `window` for two consecutive superframe boundaries.
///
/// A boundary candidate is an 11 byte span whose leading firecode checks
/// out over the nine bytes that follow it. A lone candidate is not enough
/// to lock. The distance to the next one must be a positive multiple of
/// [`SUPERFRAME_MIN_SIZE`] no larger than [`SUPERFRAME_MAX_SIZE`], and
/// that distance becomes the superframe size of the locked stream.
///
/// Every returned skip is final. A candidate at the head of a window
/// shorter than [`SYNC_WINDOW_LEN`] reports `NotFound` with a zero skip
/// when its partner may simply not have arrived yet, so callers can grow
/// the window and rescan without throwing a genuine boundary away. A
/// candidate pair with bad spacing skips straight to the second
/// candidate, which re-anchors the next scan there.
pub fn find_sync(window: &[u8]) -> SyncScan {
    let positions = (window.len() + 1).saturating_sub(FIRECODE_LENGTH);

    let Some(first) = (0..positions).find(|&i| check_firecode(&window[i..])) else {
        debug!("no superframe boundary in {} bytes", window.len());
        return SyncScan::NotFound { skip: positions };
    };

    if first > 0 {
        debug!("first superframe boundary at offset {first}");
        return SyncScan::NotFound { skip: first };
    }

    let Some(distance) = (SUPERFRAME_MIN_SIZE..positions).find(|&k| check_firecode(&window[k..]))
    else {
        if window.len() < SYNC_WINDOW_LEN {
            debug!("not enough data to check ({} bytes)", window.len());
            return SyncScan::NotFound { skip: 0 };
        }

        debug!("no second boundary within {} bytes", window.len());
        return SyncScan::NotFound { skip: positions };
    };

    if !distance.is_multiple_of(SUPERFRAME_MIN_SIZE) || distance > SUPERFRAME_MAX_SIZE {
        debug!("boundary spacing {distance} is not a valid superframe size");
        return SyncScan::NotFound { skip: distance };
    }

    SyncScan::Locked { size: distance }
}

#[test]
fn locks_on_consecutive_boundaries() {
    use crate::structs::superframe::build_superframe;

    let frame = build_superframe(600, 0x60, &[188, 370]);

    let mut window = Vec::new();
    for _ in 0..3 {
        window.extend_from_slice(&frame);
    }

    assert_eq!(find_sync(&window), SyncScan::Locked { size: 600 });
}

#[test]
fn skips_leading_garbage() {
    use crate::structs::superframe::build_superframe;

    let frame = build_superframe(600, 0x60, &[188, 370]);

    let mut window = vec![0u8; 100];
    for _ in 0..3 {
        window.extend_from_slice(&frame);
    }

    assert_eq!(find_sync(&window), SyncScan::NotFound { skip: 100 });
    assert_eq!(find_sync(&window[100..]), SyncScan::Locked { size: 600 });
}

#[test]
fn rejects_misaligned_second_boundary() {
    use crate::utils::crc::seal_firecode;

    let mut window = vec![0u8; 800];

    for (i, byte) in window.iter_mut().enumerate() {
        *byte = (i * 89 % 256) as u8;
    }

    seal_firecode(&mut window[..]);
    seal_firecode(&mut window[700..]);

    assert_eq!(find_sync(&window), SyncScan::NotFound { skip: 700 });
}

#[test]
fn locks_on_maximum_size_superframe() {
    use crate::structs::superframe::build_superframe;
    use crate::utils::crc::seal_firecode;

    let mut window = build_superframe(SUPERFRAME_MAX_SIZE, 0x60, &[2000, 4000]);

    let mut tail = [0x5Au8; FIRECODE_LENGTH];
    seal_firecode(&mut tail);
    window.extend_from_slice(&tail);

    assert_eq!(window.len(), SYNC_WINDOW_LEN);
    assert_eq!(
        find_sync(&window),
        SyncScan::Locked {
            size: SUPERFRAME_MAX_SIZE
        }
    );
}

#[test]
fn rejects_boundary_spacing_past_maximum_size() {
    use crate::structs::superframe::build_superframe;
    use crate::utils::crc::seal_firecode;

    // 217 blocks is aligned, only the size cap rejects it
    let spacing = SUPERFRAME_MAX_SIZE + SUPERFRAME_MIN_SIZE;
    let mut window = build_superframe(spacing, 0x60, &[2000, 4000]);

    let mut tail = [0x5Au8; FIRECODE_LENGTH];
    seal_firecode(&mut tail);
    window.extend_from_slice(&tail);

    assert_eq!(find_sync(&window), SyncScan::NotFound { skip: spacing });
}

#[test]
fn reports_scanned_range_without_any_boundary() {
    let mut window = vec![0u8; 500];

    for (i, byte) in window.iter_mut().enumerate() {
        *byte = (i * 89 % 256) as u8;
    }

    assert_eq!(
        find_sync(&window),
        SyncScan::NotFound {
            skip: window.len() + 1 - FIRECODE_LENGTH
        }
    );
}

#[test]
fn lone_boundary_waits_for_its_partner() {
    use crate::utils::crc::seal_firecode;

    let mut window = vec![0u8; 1000];
    window[2..FIRECODE_LENGTH].fill(0x5A);
    seal_firecode(&mut window);

    assert_eq!(find_sync(&window), SyncScan::NotFound { skip: 0 });

    window.resize(SYNC_WINDOW_LEN, 0);

    assert_eq!(
        find_sync(&window),
        SyncScan::NotFound {
            skip: SYNC_WINDOW_LEN + 1 - FIRECODE_LENGTH
        }
    );
}
