//! CRC validation for the superframe firecode.
//!
//! The firecode is a CRC-16 over the nine bytes following the stored
//! checksum, transmitted big-endian in the first two bytes of a superframe.
//! Generator polynomial:
//! x^16 + x^14 + x^13 + x^12 + x^11 + x^5 + x^3 + x^2 + x + 1.

/// CRC algorithm specification with polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-16 algorithm guarding superframe headers.
pub const CRC_FIRECODE_ALG: Algorithm<u16> = Algorithm {
    poly: 0x782f,
    init: 0x0000,
};

/// Byte length of the guarded region: two checksum bytes plus the nine
/// covered bytes.
pub const FIRECODE_LENGTH: usize = 11;

/// Computes CRC-16 checksum using specified polynomial.
#[inline(always)]
pub const fn crc16(poly: u16, mut value: u16, len: usize) -> u16 {
    value <<= 8;

    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 15) & 1) * poly);
        i += 1;
    }

    value
}

#[inline(always)]
const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16(poly, i as u16, 8);
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc16_table(algorithm.poly),
        }
    }

    const fn table_entry(&self, index: u16) -> u16 {
        self.table[(index & 0xFF) as usize]
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            crc = (crc << 8) ^ self.table_entry((crc >> 8) ^ bytes[i] as u16);
            i += 1;
        }

        crc
    }

    #[inline(always)]
    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }
}

/// Firecode checker shared by the synchronizer and the parser.
pub const FIRECODE: Crc16 = Crc16::new(&CRC_FIRECODE_ALG);

/// Validates the firecode guard at the start of `data`.
///
/// Needs at least [`FIRECODE_LENGTH`] bytes: the stored checksum in bytes
/// 0..2 and the covered region in bytes 2..11. An all-zero region carries an
/// all-zero checksum, so a zero firecode never validates.
pub fn check_firecode(data: &[u8]) -> bool {
    let Some(window) = data.get(..FIRECODE_LENGTH) else {
        return false;
    };

    let stored = u16::from_be_bytes([window[0], window[1]]);
    let computed = FIRECODE.checksum(&window[2..]);

    computed != 0 && computed == stored
}

#[cfg(test)]
pub(crate) fn seal_firecode(frame: &mut [u8]) {
    let crc = FIRECODE.checksum(&frame[2..FIRECODE_LENGTH]);
    frame[..2].copy_from_slice(&crc.to_be_bytes());
}

#[test]
fn firecode_table_constants() {
    assert_eq!(FIRECODE.update(0, &[0x00]), 0x0000);
    assert_eq!(FIRECODE.update(0, &[0x01]), 0x782f);
    assert_eq!(FIRECODE.update(0, &[0x02]), 0xf05e);
    assert_eq!(FIRECODE.update(0, &[0x03]), 0x8871);
    assert_eq!(FIRECODE.update(0, &[0x04]), 0x9893);
}

#[test]
fn firecode_accepts_sealed_window() {
    let mut window = [0u8; FIRECODE_LENGTH];
    window[2..].copy_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x10]);
    seal_firecode(&mut window);

    assert_ne!(u16::from_be_bytes([window[0], window[1]]), 0);
    assert!(check_firecode(&window));
}

#[test]
fn firecode_detects_single_bit_errors() {
    let mut window = [0u8; FIRECODE_LENGTH];
    window[2..].copy_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x10]);
    seal_firecode(&mut window);

    for byte in 0..FIRECODE_LENGTH {
        for bit in 0..8 {
            let mut corrupted = window;
            corrupted[byte] ^= 1 << bit;
            assert!(
                !check_firecode(&corrupted),
                "flipped bit {bit} of byte {byte} went undetected"
            );
        }
    }
}

#[test]
fn firecode_rejects_all_zero_window() {
    assert!(!check_firecode(&[0u8; FIRECODE_LENGTH]));
}

#[test]
fn firecode_rejects_short_input() {
    assert!(!check_firecode(&[0xff; FIRECODE_LENGTH - 1]));
}
