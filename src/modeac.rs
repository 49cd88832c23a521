//! Mode A/C (legacy ATCRBS) demodulation.
//!
//! Mode A/C replies use a 13-position pulse train bracketed by F1/F2 framing
//! pulses, 1.45 us apart, instead of Mode S's PPM-encoded bitstream. Twelve
//! of the positions carry data (`C1 A1 C2 A2 C4 A4 B1 D1 B2 D2 B4 D4`); the
//! 13th (between A4 and B1) is a spacer always left blank. Depending on which
//! kind of interrogation triggered the reply, those bits are either an
//! identity (squawk) code or a Gillham-coded altitude.
//!
//! A successfully decoded reply is handed back as a synthetic DF32
//! [`crate::decoder::ModesMessage`] so it can flow through the same roster
//! and display path as real Mode S traffic.

use crate::decoder::{self, ModesMessage};

/// Spacing between adjacent pulse slots, in magnitude samples, at a 2
/// Msamples/sec capture rate (1.45 us per slot).
const PULSE_SPACING: usize = 3;
/// Number of slots from F1 to F2 inclusive (13 data/spacer slots plus the
/// two framing pulses).
const PULSE_SLOTS: usize = 15;
/// Total span, in samples, of one Mode A/C reply envelope.
pub const MODEAC_MSG_SAMPLES: usize = PULSE_SPACING * (PULSE_SLOTS - 1);

/// A decoded Mode A/C reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeAcReply {
    pub squawk: u16,
    pub altitude_feet: Option<i32>,
    pub ident: bool,
    pub mode_a_only: bool,
    pub signal_level: u16,
}

impl ModeAcReply {
    pub fn to_modes_message(self) -> ModesMessage {
        decoder::synthetic_mode_ac_message(
            self.squawk,
            self.altitude_feet,
            self.ident,
            self.mode_a_only,
            self.signal_level,
        )
    }
}

fn digit(b1: bool, b2: bool, b4: bool) -> u16 {
    (b1 as u16) + (b2 as u16) * 2 + (b4 as u16) * 4
}

/// Attempt to decode a Mode A/C reply starting at sample index `start`.
/// Returns `None` if the F1/F2 bracket doesn't hold or the envelope doesn't
/// fit in `magnitude`.
fn try_decode_at(magnitude: &[u16], start: usize) -> Option<ModeAcReply> {
    if start + MODEAC_MSG_SAMPLES >= magnitude.len() {
        return None;
    }

    let pos = |slot: usize| magnitude[start + slot * PULSE_SPACING];

    let f1 = pos(0);
    let f2 = pos(PULSE_SLOTS - 1);

    // Framing pulses should be the two strongest samples in the envelope,
    // roughly equal in amplitude.
    let high = ((f1 as u32 + f2 as u32) / 2) as u16;
    if high < 50 {
        return None;
    }
    let low_bound = high / 3;
    if f1 < low_bound || f2 < low_bound {
        return None;
    }

    let spacer = pos(7);
    if spacer as u32 * 2 > high as u32 {
        // The spacer slot should be empty; if it's lit this probably isn't
        // a Mode A/C envelope at all.
        return None;
    }

    let threshold = high / 2;
    let present = |slot: usize| pos(slot) >= threshold;

    let c1 = present(1);
    let a1 = present(2);
    let c2 = present(3);
    let a2 = present(4);
    let c4 = present(5);
    let a4 = present(6);
    // slot 7 is the spacer
    let b1 = present(8);
    let d1 = present(9);
    let b2 = present(10);
    let d2 = present(11);
    let b4 = present(12);
    let d4 = present(13);

    let squawk =
        digit(a1, a2, a4) * 1000 + digit(b1, b2, b4) * 100 + digit(c1, c2, c4) * 10 + digit(d1, d2, d4);

    let gillham_code = ((d4 as u16) << 10)
        | ((d2 as u16) << 9)
        | ((b4 as u16) << 8)
        | ((b2 as u16) << 7)
        | ((b1 as u16) << 6)
        | ((a4 as u16) << 5)
        | ((a2 as u16) << 4)
        | ((a1 as u16) << 3)
        | ((c4 as u16) << 2)
        | ((c2 as u16) << 1)
        | (c1 as u16);

    let altitude_feet = decoder::decode_gillham_altitude(gillham_code);

    // The SPI ("ident") pulse sits roughly one slot past F2 when present.
    let ident_slot = start + (PULSE_SLOTS) * PULSE_SPACING;
    let ident = ident_slot < magnitude.len() && magnitude[ident_slot] >= threshold;

    Some(ModeAcReply {
        squawk,
        altitude_feet,
        ident,
        mode_a_only: altitude_feet.is_none(),
        signal_level: high,
    })
}

/// Scan a magnitude vector for Mode A/C replies, returning each one found
/// together with the sample offset it starts at (for de-duplication against
/// Mode S preamble hits covering the same span).
pub fn scan(magnitude: &[u16]) -> Vec<(usize, ModeAcReply)> {
    let mut found = Vec::new();
    let mut j = 0;
    while j + MODEAC_MSG_SAMPLES < magnitude.len() {
        if let Some(reply) = try_decode_at(magnitude, j) {
            found.push((j, reply));
            j += MODEAC_MSG_SAMPLES;
        } else {
            j += 1;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_envelope(squawk_digits: (u16, u16, u16, u16), with_ident: bool) -> Vec<u16> {
        let (a, b, c, d) = squawk_digits;
        let mut mag = vec![0u16; MODEAC_MSG_SAMPLES + PULSE_SPACING * 2];
        let high = 4000u16;
        let set = |mag: &mut Vec<u16>, slot: usize| mag[slot * PULSE_SPACING] = high;

        set(&mut mag, 0); // F1
        set(&mut mag, PULSE_SLOTS - 1); // F2

        let bits = |d: u16| ((d & 1) != 0, (d & 2) != 0, (d & 4) != 0);
        let (a1, a2, a4) = bits(a);
        let (b1, b2, b4) = bits(b);
        let (c1, c2, c4) = bits(c);
        let (d1, d2, d4) = bits(d);

        if c1 {
            set(&mut mag, 1);
        }
        if a1 {
            set(&mut mag, 2);
        }
        if c2 {
            set(&mut mag, 3);
        }
        if a2 {
            set(&mut mag, 4);
        }
        if c4 {
            set(&mut mag, 5);
        }
        if a4 {
            set(&mut mag, 6);
        }
        if b1 {
            set(&mut mag, 8);
        }
        if d1 {
            set(&mut mag, 9);
        }
        if b2 {
            set(&mut mag, 10);
        }
        if d2 {
            set(&mut mag, 11);
        }
        if b4 {
            set(&mut mag, 12);
        }
        if d4 {
            set(&mut mag, 13);
        }

        if with_ident {
            mag[PULSE_SLOTS * PULSE_SPACING] = high;
        }

        mag
    }

    #[test]
    fn test_decode_squawk_7700() {
        let mag = synth_envelope((7, 7, 0, 0), false);
        let reply = try_decode_at(&mag, 0).expect("should decode");
        assert_eq!(reply.squawk, 7700);
        assert!(!reply.ident);
    }

    #[test]
    fn test_decode_with_ident() {
        let mag = synth_envelope((1, 2, 0, 0), true);
        let reply = try_decode_at(&mag, 0).expect("should decode");
        assert_eq!(reply.squawk, 1200);
        assert!(reply.ident);
    }

    #[test]
    fn test_rejects_flat_signal() {
        let mag = vec![0u16; MODEAC_MSG_SAMPLES + 10];
        assert!(try_decode_at(&mag, 0).is_none());
    }

    #[test]
    fn test_scan_finds_single_reply() {
        let mag = synth_envelope((7, 7, 0, 0), false);
        let found = scan(&mag);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.squawk, 7700);
    }
}
