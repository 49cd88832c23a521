//! Mode S and Mode A/C signal demodulation
//!
//! Detects Mode S preambles and demodulates bit streams from magnitude data,
//! tracks signal quality to decide when phase enhancement is worth the CPU,
//! and (when enabled) scans the same buffer for legacy Mode A/C replies.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};

use crossbeam_channel::Sender;
use tracing::debug;

use crate::config::Config;
use crate::decoder::{self, MODES_LONG_MSG_BITS, ModesMessage};
use crate::magnitude::{MagnitudeLut, compute_magnitude_vector};
use crate::modeac;
use crate::signal::SignalProcessor;

/// Preamble duration in microseconds
const MODES_PREAMBLE_US: usize = 8;
/// Full message length for buffer sizing
const MODES_FULL_LEN: usize = MODES_PREAMBLE_US + MODES_LONG_MSG_BITS;
/// Default data buffer length
const MODES_DATA_LEN: usize = 16 * 16384; // 256K

/// Counters describing what a demodulation pass found, surfaced via
/// `--stats`.
#[derive(Debug, Clone, Default)]
pub struct DemodStats {
    pub valid_preambles: u64,
    pub good_messages: u64,
    pub bad_crc: u64,
    pub fixed_single_bit: u64,
    pub fixed_two_bit: u64,
    pub phase_corrected: u64,
    pub mode_ac_messages: u64,
    pub low_confidence_discards: u64,
}

/// Mode S demodulator
pub struct Demodulator {
    config: Config,
    pub mag_lut: MagnitudeLut,
    /// Set of known ICAO addresses (from DF11/DF17 messages)
    known_icaos: HashSet<u32>,
    signal: SignalProcessor,
    pub stats: DemodStats,
    /// Running 12 MHz tick counter for the start of the current magnitude
    /// vector. Advances by `samples * 6` (2 MHz -> 12 MHz) after each block,
    /// plus any extra advance handed in via `advance_tick` for ring drops.
    tick_base: u64,
}

impl Demodulator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            mag_lut: MagnitudeLut::new(),
            known_icaos: HashSet::new(),
            signal: SignalProcessor::new(),
            stats: DemodStats::default(),
            tick_base: 0,
        }
    }

    /// Jump the tick counter forward by `ticks` (already in 12 MHz units,
    /// e.g. from [`crate::ring::tick_compensation`]) to account for blocks
    /// the sample ring silently dropped (§4.3).
    pub fn advance_tick(&mut self, ticks: u64) {
        self.tick_base += ticks;
    }

    /// Process data from a file
    pub fn process_file(&mut self, filename: &str, tx: &Sender<ModesMessage>) -> std::io::Result<()> {
        let file: Box<dyn Read> = if filename == "-" {
            Box::new(std::io::stdin())
        } else {
            Box::new(File::open(filename)?)
        };

        let mut reader = BufReader::with_capacity(MODES_DATA_LEN, file);

        let buffer_len = MODES_DATA_LEN + (MODES_FULL_LEN - 1) * 4;
        let mut data = vec![127u8; buffer_len];

        let mut known_icaos: HashSet<u32> = HashSet::new();

        loop {
            let overlap = (MODES_FULL_LEN - 1) * 4;
            data.copy_within(MODES_DATA_LEN..MODES_DATA_LEN + overlap, 0);

            let bytes_read = reader.read(&mut data[overlap..overlap + MODES_DATA_LEN])?;

            if bytes_read == 0 {
                if self.config.loop_file && filename != "-" {
                    drop(reader);
                    if let Ok(file) = File::open(filename) {
                        reader = BufReader::with_capacity(
                            MODES_DATA_LEN,
                            Box::new(file) as Box<dyn Read>,
                        );
                        debug!("Looping file");
                        continue;
                    }
                }
                break;
            }

            if bytes_read < MODES_DATA_LEN {
                data[overlap + bytes_read..].fill(127);
            }

            let magnitude = compute_magnitude_vector(&data[..overlap + bytes_read], &self.mag_lut);
            self.detect_modes_with_icao_tracking(&magnitude, tx, &mut known_icaos);
        }

        Ok(())
    }

    /// Public method for external magnitude data processing
    pub fn detect_modes_external(&mut self, magnitude: &[u16], tx: &Sender<ModesMessage>) {
        let mut known_icaos: HashSet<u32> = HashSet::new();
        self.detect_modes_with_icao_tracking(magnitude, tx, &mut known_icaos);
    }

    /// Decode the 112-bit window starting `preamble_samples` after `j`,
    /// returning the packed message bytes. A second pass is tried with the
    /// sampling window shifted by one raw sample ("phase enhancement") if
    /// the caller asks for it; this recovers messages whose bit transitions
    /// land close to a sample boundary.
    fn demod_bits(m: &[u16], j: usize, shift: usize) -> Option<[u8; 14]> {
        let preamble_samples = MODES_PREAMBLE_US * 2;
        let mut bits = [0u8; MODES_LONG_MSG_BITS];

        for i in 0..MODES_LONG_MSG_BITS {
            let idx = j + preamble_samples + i * 2 + shift;
            if idx + 1 >= m.len() {
                return None;
            }

            let first = m[idx];
            let second = m[idx + 1];

            if first > second {
                bits[i] = 1;
            } else if first < second {
                bits[i] = 0;
            } else {
                bits[i] = if i > 0 { bits[i - 1] } else { 0 };
            }
        }

        let mut msg = [0u8; 14];
        for i in 0..14 {
            msg[i] = (bits[i * 8] << 7)
                | (bits[i * 8 + 1] << 6)
                | (bits[i * 8 + 2] << 5)
                | (bits[i * 8 + 3] << 4)
                | (bits[i * 8 + 4] << 3)
                | (bits[i * 8 + 5] << 2)
                | (bits[i * 8 + 6] << 1)
                | bits[i * 8 + 7];
        }

        Some(msg)
    }

    /// Detect Mode S messages in magnitude data with ICAO tracking
    fn detect_modes_with_icao_tracking(
        &mut self,
        m: &[u16],
        tx: &Sender<ModesMessage>,
        known_icaos: &mut HashSet<u32>,
    ) {
        let mlen = m.len();
        if mlen < MODES_FULL_LEN * 2 {
            return;
        }

        self.signal.update_noise_floor(m);

        let mut j = 0;

        while j < mlen.saturating_sub(MODES_FULL_LEN * 2) {
            if !(m[j] > m[j + 1]
                && m[j + 1] < m[j + 2]
                && m[j + 2] > m[j + 3]
                && m[j + 3] < m[j]
                && m[j + 4] < m[j]
                && m[j + 5] < m[j]
                && m[j + 6] < m[j]
                && m[j + 7] > m[j + 8]
                && m[j + 8] < m[j + 9]
                && m[j + 9] > m[j + 6])
            {
                j += 1;
                continue;
            }

            let high =
                ((m[j] as u32 + m[j + 2] as u32 + m[j + 7] as u32 + m[j + 9] as u32) / 6) as u16;

            if m[j + 4] >= high || m[j + 5] >= high {
                j += 1;
                continue;
            }

            if m[j + 11] >= high || m[j + 12] >= high || m[j + 13] >= high || m[j + 14] >= high {
                j += 1;
                continue;
            }

            self.stats.valid_preambles += 1;
            let signal_level = high;

            let Some(msg) = Self::demod_bits(m, j, 0) else {
                break;
            };

            let msg_type = msg[0] >> 3;
            let msg_bits = decoder::message_len_by_type(msg_type);
            let msg_len = msg_bits / 8;

            let mut mm = decoder::decode_modes_message(
                &msg[..msg_len],
                self.config.fix_errors,
                self.config.aggressive,
            );
            mm.signal_level = signal_level;
            self.tally_crc_outcome(&mm);

            // Reject low-confidence demodulations outright rather than
            // spending a CRC cycle on noise: if too many bit decisions in
            // this frame were close calls, the bits are unreliable even when
            // a CRC happens to pass by chance.
            let preamble_samples = MODES_PREAMBLE_US * 2;
            if !mm.crc_ok
                && crate::signal::check_phase_ambiguity(m, j + preamble_samples, mm.msg_bits)
            {
                self.stats.low_confidence_discards += 1;
                j += 1;
                continue;
            }

            // If the message is still bad and the signal sits in the
            // marginal SNR band, retry with the sampling window nudged by
            // one raw sample before giving up.
            if !mm.crc_ok && self.config.phase_enhance && self.signal.should_try_phase_correction(signal_level) {
                if let Some(shifted) = Self::demod_bits(m, j, 1) {
                    let msg_type2 = shifted[0] >> 3;
                    let msg_bits2 = decoder::message_len_by_type(msg_type2);
                    let msg_len2 = msg_bits2 / 8;
                    let mut mm2 = decoder::decode_modes_message(
                        &shifted[..msg_len2],
                        self.config.fix_errors,
                        self.config.aggressive,
                    );
                    if mm2.crc_ok {
                        mm2.signal_level = signal_level;
                        mm2.phase_corrected = true;
                        self.stats.phase_corrected += 1;
                        mm = mm2;
                    }
                }
            }

            mm.tick_timestamp = self.tick_base + (j as u64) * 6;

            let msg_len = mm.msg_bits / 8;
            let icao_in_message = matches!(mm.msg_type, 11 | 17 | 18);

            if mm.crc_ok && icao_in_message {
                known_icaos.insert(mm.icao_address());
                j += (MODES_PREAMBLE_US + msg_len * 8) * 2;
                self.stats.good_messages += 1;
                let _ = tx.send(mm);
            } else if !icao_in_message {
                let recovered_icao = mm.icao_address();
                if known_icaos.contains(&recovered_icao) {
                    mm.crc_ok = true;
                    j += (MODES_PREAMBLE_US + msg_len * 8) * 2;
                    self.stats.good_messages += 1;
                    let _ = tx.send(mm);
                } else {
                    j += 1;
                }
            } else {
                self.stats.bad_crc += 1;
                j += 1;
            }
        }

        if self.config.mode_ac {
            self.scan_mode_ac(m, tx);
        }

        self.tick_base += mlen as u64 * 6;
    }

    fn tally_crc_outcome(&mut self, mm: &ModesMessage) {
        match (mm.error_bit, mm.error_bit2) {
            (Some(_), Some(_)) => self.stats.fixed_two_bit += 1,
            (Some(_), None) => self.stats.fixed_single_bit += 1,
            _ => {}
        }
    }

    fn scan_mode_ac(&mut self, m: &[u16], tx: &Sender<ModesMessage>) {
        for (_, reply) in modeac::scan(m) {
            self.stats.mode_ac_messages += 1;
            let _ = tx.send(reply.to_modes_message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demod_bits_decodes_known_pattern() {
        // Alternating high/low samples encode bit=1 then bit=0, repeated.
        let mut m = vec![0u16; (8 + 112 * 2) + 4];
        for i in 0..112 {
            let idx = 16 + i * 2;
            if i % 2 == 0 {
                m[idx] = 1000;
                m[idx + 1] = 10;
            } else {
                m[idx] = 10;
                m[idx + 1] = 1000;
            }
        }
        let msg = Demodulator::demod_bits(&m, 0, 0).expect("should decode");
        assert_eq!(msg[0], 0b1010_1010);
    }

    #[test]
    fn test_stats_default_is_zero() {
        let stats = DemodStats::default();
        assert_eq!(stats.good_messages, 0);
        assert_eq!(stats.mode_ac_messages, 0);
    }
}
