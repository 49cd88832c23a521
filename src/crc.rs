//! CRC-24 implementation and syndrome-based error correction for Mode S messages.
//!
//! The checksum itself ports the original per-bit-position XOR table from the
//! C decoder this crate is based on. Error correction is table-driven: a
//! syndrome (the XOR difference between the computed and received CRC) maps
//! 1:1 onto the bit(s) that must have flipped, for up to two-bit errors, so
//! correction is a single hash lookup rather than a brute-force bit search.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Precomputed CRC table for Mode S messages.
/// Each entry corresponds to a bit position in the message.
/// For 112-bit messages, all entries are used.
/// For 56-bit messages, only the last 56 entries are used.
///
/// The last 24 entries are zero because the CRC field itself
/// is read directly by `extract_crc` rather than folded into the sum.
pub const MODES_CHECKSUM_TABLE: [u32; 112] = [
    0x3935ea, 0x1c9af5, 0xf1b77e, 0x78dbbf, 0xc397db, 0x9e31e9, 0xb0e2f0, 0x587178,
    0x2c38bc, 0x161c5e, 0x0b0e2f, 0xfa7d13, 0x82c48d, 0xbe9842, 0x5f4c21, 0xd05c14,
    0x682e0a, 0x341705, 0xe5f186, 0x72f8c3, 0xc68665, 0x9cb936, 0x4e5c9b, 0xd8d449,
    0x939020, 0x49c810, 0x24e408, 0x127204, 0x093902, 0x049c81, 0xfdb444, 0x7eda22,
    0x3f6d11, 0xe04c8c, 0x702646, 0x381323, 0xe3f395, 0x8e03ce, 0x4701e7, 0xdc7af7,
    0x91c77f, 0xb719bb, 0xa476d9, 0xadc168, 0x56e0b4, 0x2b705a, 0x15b82d, 0xf52612,
    0x7a9309, 0xc2b380, 0x6159c0, 0x30ace0, 0x185670, 0x0c2b38, 0x06159c, 0x030ace,
    0x018567, 0xff38b7, 0x80665f, 0xbfc92b, 0xa01e91, 0xaff54c, 0x57faa6, 0x2bfd53,
    0xea04ad, 0x8af852, 0x457c29, 0xdd4410, 0x6ea208, 0x375104, 0x1ba882, 0x0dd441,
    0xf91024, 0x7c8812, 0x3e4409, 0xe0d800, 0x706c00, 0x383600, 0x1c1b00, 0x0e0d80,
    0x0706c0, 0x038360, 0x01c1b0, 0x00e0d8, 0x00706c, 0x003836, 0x001c1b, 0xfff409,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
];

/// Calculate the Mode S checksum for a message.
///
/// # Arguments
/// * `msg` - The message bytes (must be at least `bits/8` bytes long)
/// * `bits` - Number of bits in the message (56 or 112)
pub fn modes_checksum(msg: &[u8], bits: usize) -> u32 {
    debug_assert!(bits == 56 || bits == 112);
    debug_assert!(msg.len() >= bits / 8);

    let mut crc: u32 = 0;
    let offset = if bits == 112 { 0 } else { 112 - 56 };

    for j in 0..bits {
        let byte_idx = j / 8;
        let bit_idx = j % 8;
        let bitmask = 1u8 << (7 - bit_idx);

        if msg[byte_idx] & bitmask != 0 {
            crc ^= MODES_CHECKSUM_TABLE[j + offset];
        }
    }

    crc
}

/// Extract the CRC from a message (last 3 bytes).
pub fn extract_crc(msg: &[u8], bits: usize) -> u32 {
    let len = bits / 8;
    debug_assert!(msg.len() >= len);

    ((msg[len - 3] as u32) << 16) | ((msg[len - 2] as u32) << 8) | (msg[len - 1] as u32)
}

pub fn recover_icao_from_crc(msg: &[u8], bits: usize) -> u32 {
    let crc = modes_checksum(msg, bits);
    let received = extract_crc(msg, bits);
    crc ^ received
}

/// Verify CRC of a message.
pub fn verify_crc(msg: &[u8], bits: usize) -> bool {
    residual(msg, bits) == 0
}

/// XOR difference between the computed and received CRC. Zero for a valid
/// message; otherwise determined entirely by which bits are in error.
fn residual(msg: &[u8], bits: usize) -> u32 {
    modes_checksum(msg, bits) ^ extract_crc(msg, bits)
}

// ---------------------------------------------------------------------------
// Syndrome tables for error correction
// ---------------------------------------------------------------------------

/// Residual produced by flipping a single bit in an otherwise all-zero
/// message of `n_bits` bits. Because both `modes_checksum` and `extract_crc`
/// are linear (XOR) in the message bits, this residual is exactly the
/// contribution that bit makes to the syndrome of any message, regardless of
/// the rest of the message content.
fn single_bit_residual(bit: usize, n_bits: usize) -> u32 {
    let mut msg = [0u8; 14];
    msg[bit / 8] |= 1 << (7 - (bit % 8));
    residual(&msg[..n_bits / 8], n_bits)
}

fn build_syndrome_table(n_bits: usize) -> HashMap<u32, Vec<usize>> {
    let mut table = HashMap::new();

    for bit in 0..n_bits {
        let syndrome = single_bit_residual(bit, n_bits);
        table.entry(syndrome).or_insert_with(|| vec![bit]);
    }

    for bit1 in 0..n_bits {
        for bit2 in (bit1 + 1)..n_bits {
            let syndrome = single_bit_residual(bit1, n_bits) ^ single_bit_residual(bit2, n_bits);
            table.entry(syndrome).or_insert_with(|| vec![bit1, bit2]);
        }
    }

    table
}

static SYNDROME_TABLE_112: LazyLock<HashMap<u32, Vec<usize>>> =
    LazyLock::new(|| build_syndrome_table(112));
static SYNDROME_TABLE_56: LazyLock<HashMap<u32, Vec<usize>>> =
    LazyLock::new(|| build_syndrome_table(56));

/// Highest bit index considered part of the Downlink Format field. Flipping
/// one of these bits changes what kind of message this is, so it is never
/// corrected implicitly unless the caller opts in.
const DF_FIELD_LAST_BIT: usize = 4;

/// Attempt to correct 1-2 bit errors in a Mode S message using the
/// precomputed syndrome tables.
///
/// Returns the corrected bit positions on success. The message buffer is
/// only mutated if a fix is found. Never corrects a DF field bit unless
/// `allow_df_fix` is set.
pub fn try_fix_errors(
    msg: &mut [u8],
    bits: usize,
    allow_two_bit: bool,
    allow_df_fix: bool,
) -> Option<Vec<usize>> {
    let syndrome = residual(msg, bits);
    if syndrome == 0 {
        return None;
    }

    let table = if bits == 112 {
        &*SYNDROME_TABLE_112
    } else {
        &*SYNDROME_TABLE_56
    };

    let positions = table.get(&syndrome)?;
    if positions.len() == 2 && !allow_two_bit {
        return None;
    }
    if !allow_df_fix && positions.iter().any(|&b| b <= DF_FIELD_LAST_BIT) {
        return None;
    }

    for &bit in positions {
        msg[bit / 8] ^= 1 << (7 - (bit % 8));
    }

    debug_assert_eq!(residual(msg, bits), 0);
    Some(positions.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_DF17: [u8; 14] = [
        0x8D, 0x48, 0x40, 0xD6, 0x20, 0x2C, 0xC3, 0x71, 0xC3, 0x2C, 0xE0, 0x57, 0x60, 0x98,
    ];

    #[test]
    fn test_checksum_known_good() {
        let crc = modes_checksum(&VALID_DF17, 112);
        let expected = extract_crc(&VALID_DF17, 112);
        assert_eq!(crc, expected);
        assert!(verify_crc(&VALID_DF17, 112));
    }

    #[test]
    fn test_single_bit_error_correction() {
        let mut msg = VALID_DF17;
        msg[5] ^= 0x04; // well past the DF field
        assert!(!verify_crc(&msg, 112));

        let fixed = try_fix_errors(&mut msg, 112, false, false);
        assert!(fixed.is_some());
        assert_eq!(fixed.unwrap(), vec![5 * 8 + 5]);
        assert_eq!(msg, VALID_DF17);
    }

    #[test]
    fn test_two_bit_error_requires_aggressive() {
        let mut msg = VALID_DF17;
        msg[5] ^= 0x04;
        msg[9] ^= 0x01;

        assert!(try_fix_errors(&mut msg, 112, false, false).is_none());

        let fixed = try_fix_errors(&mut msg, 112, true, false);
        assert!(fixed.is_some());
        assert_eq!(msg, VALID_DF17);
    }

    #[test]
    fn test_df_field_protected_by_default() {
        let mut msg = VALID_DF17;
        msg[0] ^= 0x80; // bit 0, inside the DF field
        assert!(try_fix_errors(&mut msg, 112, true, false).is_none());
    }

    #[test]
    fn test_syndrome_tables_nonempty() {
        assert!(SYNDROME_TABLE_112.len() > 100);
        assert!(SYNDROME_TABLE_56.len() > 50);
    }
}
