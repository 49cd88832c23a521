//! Cross-correlation between Mode S identity/altitude and Mode A/C replies.
//!
//! A transponder that answers Mode S interrogations also answers the legacy
//! Mode A/C ones, so the same aircraft shows up in the roster twice: once
//! under its real ICAO address, once under the synthetic Mode A/C address.
//! This module looks for Mode A/C contacts whose squawk or altitude matches
//! a currently-tracked Mode S aircraft closely enough in time to be the same
//! airframe, and flags the match so a consumer can merge or suppress the
//! duplicate.

use std::time::{Duration, Instant};

use crate::aircraft::{Aircraft, AircraftStore, ModeAcFlags};

/// How close in time a Mode A/C hit has to be to count as a correlation.
const CORRELATION_WINDOW: Duration = Duration::from_secs(5);
/// Altitude tolerance, in feet, for a Mode C correlation (accounts for
/// rounding between the two encodings).
const ALTITUDE_TOLERANCE_FT: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationKind {
    ModeAHit,
    ModeCHit,
    ModesHit,
}

#[derive(Debug, Clone, Copy)]
pub struct Correlation {
    pub modes_addr: u32,
    pub synthetic_addr: u32,
    pub kind: CorrelationKind,
}

/// Scan the roster for Mode A/C contacts that line up with a Mode S
/// contact's squawk or altitude within [`CORRELATION_WINDOW`], per §4.9:
/// bump `mode_a_count`/`mode_c_count` on the matched Mode S record, flag
/// both sides of the match, and once a Mode S record has accumulated both
/// kinds of hit, mark its synthetic counterpart `MODES_HIT` so it is
/// suppressed from the roster snapshot (it's a duplicate sighting, not a
/// separate aircraft).
pub fn correlate(store: &mut AircraftStore) -> Vec<Correlation> {
    let now = Instant::now();

    // Phase 1: snapshot candidate matches read-only; a `HashMap` can't hand
    // out two simultaneous `&mut` borrows for the pair being correlated.
    let modes_aircraft: Vec<(u32, u16, i32, Instant)> = store
        .all_unfiltered()
        .filter(|a| !a.is_synthetic() && a.mode_ac_flags.contains(ModeAcFlags::MODES))
        .map(|a| (a.addr, a.mode_a, a.mode_c, a.seen))
        .collect();
    let ac_contacts: Vec<(u32, u16, i32, bool, Instant)> = store
        .all_unfiltered()
        .filter(|a| a.is_synthetic())
        .map(|a| {
            (
                a.addr,
                a.mode_a,
                a.mode_c,
                a.mode_ac_flags.contains(ModeAcFlags::MODE_C),
                a.seen,
            )
        })
        .collect();

    let mut out = Vec::new();
    // Per-ac_addr record of every modes_addr it matched, and whether each
    // match was by squawk or altitude — needed after the full sweep to
    // decide MODES_HIT independent of HashMap iteration order.
    let mut matches_by_ac: std::collections::HashMap<u32, Vec<(u32, bool, bool)>> =
        std::collections::HashMap::new();

    for &(ac_addr, ac_squawk, ac_altitude, ac_has_modec, ac_seen) in &ac_contacts {
        if now.duration_since(ac_seen) > CORRELATION_WINDOW {
            continue;
        }

        for &(modes_addr, modes_squawk, modes_altitude, modes_seen) in &modes_aircraft {
            if now.duration_since(modes_seen) > CORRELATION_WINDOW {
                continue;
            }

            let squawk_match = ac_squawk != 0 && ac_squawk == modes_squawk;
            let altitude_match = ac_has_modec
                && modes_altitude != 0
                && (ac_altitude - modes_altitude).abs() <= ALTITUDE_TOLERANCE_FT;

            if !squawk_match && !altitude_match {
                continue;
            }

            let kind = if squawk_match && altitude_match {
                CorrelationKind::ModesHit
            } else if squawk_match {
                CorrelationKind::ModeAHit
            } else {
                CorrelationKind::ModeCHit
            };

            if let Some(modes) = store.get_mut(modes_addr) {
                if squawk_match {
                    modes.mode_a_count += 1;
                    modes.mode_ac_flags.insert(ModeAcFlags::MODE_A_HIT);
                }
                if altitude_match {
                    modes.mode_c_count += 1;
                    modes.mode_ac_flags.insert(ModeAcFlags::MODE_C_HIT);
                }
            }
            if let Some(ac) = store.get_mut(ac_addr) {
                if squawk_match {
                    ac.mode_ac_flags.insert(ModeAcFlags::MODE_A_HIT);
                }
                if altitude_match {
                    ac.mode_ac_flags.insert(ModeAcFlags::MODE_C_HIT);
                }
            }

            matches_by_ac
                .entry(ac_addr)
                .or_default()
                .push((modes_addr, squawk_match, altitude_match));

            out.push(Correlation {
                modes_addr,
                synthetic_addr: ac_addr,
                kind,
            });
        }
    }

    // Final pass: decide MODES_HIT once every match for this round has been
    // applied, so the verdict doesn't depend on which ac_contact was
    // processed first.
    for &(ac_addr, _, _, ac_has_modec, _) in &ac_contacts {
        let Some(pairs) = matches_by_ac.get(&ac_addr) else {
            continue;
        };

        let confirmed_by_both_counters = pairs.iter().any(|&(modes_addr, _, _)| {
            store
                .get(modes_addr)
                .map(|m| m.mode_a_count > 0 && m.mode_c_count > 0)
                .unwrap_or(false)
        });
        // A Mode-A-only contact (no Mode-C ever seen) whose squawk matched
        // exactly one Mode S aircraft this round is as good as confirmed.
        let squawk_matches = pairs.iter().filter(|&&(_, sq, _)| sq).count();
        let unique_mode_a_only_match = !ac_has_modec && squawk_matches == 1;

        if confirmed_by_both_counters || unique_mode_a_only_match {
            if let Some(ac) = store.get_mut(ac_addr) {
                ac.mode_ac_flags.insert(ModeAcFlags::MODES_HIT);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{self, ModesMessage};

    fn modes_with_squawk(addr: u32, squawk: u16) -> ModesMessage {
        let mut mm = ModesMessage::default();
        mm.msg_type = 21;
        mm.identity = squawk;
        mm.aa = [
            ((addr >> 16) & 0xFF) as u8,
            ((addr >> 8) & 0xFF) as u8,
            (addr & 0xFF) as u8,
        ];
        mm
    }

    fn modes_with_altitude(addr: u32, altitude: i32) -> ModesMessage {
        let mut mm = ModesMessage::default();
        mm.msg_type = 0;
        mm.altitude = altitude;
        mm.aa = [
            ((addr >> 16) & 0xFF) as u8,
            ((addr >> 8) & 0xFF) as u8,
            (addr & 0xFF) as u8,
        ];
        mm
    }

    #[test]
    fn test_correlate_matches_on_squawk() {
        let mut store = AircraftStore::with_min_messages(60, 1);
        store.update_from_message(&modes_with_squawk(0x4840D6, 7700));
        store.update_from_message(&decoder::synthetic_mode_ac_message(7700, None, false, true, 1000));

        let hits = correlate(&mut store);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, CorrelationKind::ModeAHit);
        assert_eq!(hits[0].modes_addr, 0x4840D6);
        assert_eq!(store.get(0x4840D6).unwrap().mode_a_count, 1);
        // Mode-A-only contact with a unique squawk match counts as confirmed.
        let synthetic_addr = 0x0080_0000 | 7700u32;
        assert!(
            store
                .get(synthetic_addr)
                .unwrap()
                .mode_ac_flags
                .contains(ModeAcFlags::MODES_HIT)
        );
    }

    #[test]
    fn test_correlate_no_match_for_different_squawk() {
        let mut store = AircraftStore::with_min_messages(60, 1);
        store.update_from_message(&modes_with_squawk(0x4840D6, 1200));
        store.update_from_message(&decoder::synthetic_mode_ac_message(7700, None, false, true, 1000));

        assert!(correlate(&mut store).is_empty());
    }

    #[test]
    fn test_correlate_matches_on_altitude() {
        let mut store = AircraftStore::with_min_messages(60, 1);
        store.update_from_message(&modes_with_altitude(0x4840D6, 35000));
        store.update_from_message(&decoder::synthetic_mode_ac_message(0, Some(35050), false, false, 1000));

        let hits = correlate(&mut store);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, CorrelationKind::ModeCHit);
        assert_eq!(store.get(0x4840D6).unwrap().mode_c_count, 1);
    }

    #[test]
    fn test_correlate_both_hits_suppresses_synthetic_record() {
        // E5: a squawk hit and an altitude hit on the same Mode S aircraft
        // together confirm the synthetic Mode-C contact as a duplicate.
        let mut store = AircraftStore::with_min_messages(60, 1);
        store.update_from_message(&modes_with_squawk(0x4840D6, 7700));
        store.update_from_message(&modes_with_altitude(0x4840D6, 35000));
        store.update_from_message(&decoder::synthetic_mode_ac_message(7700, None, false, true, 1000));
        store.update_from_message(&decoder::synthetic_mode_ac_message(0, Some(34950), false, false, 1000));

        correlate(&mut store);

        let modes = store.get(0x4840D6).unwrap();
        assert!(modes.mode_a_count >= 1);
        assert!(modes.mode_c_count >= 1);

        let mode_c_synthetic_addr = 0x0080_0000;
        assert!(
            store
                .get(mode_c_synthetic_addr)
                .unwrap()
                .mode_ac_flags
                .contains(ModeAcFlags::MODES_HIT)
        );
        assert!(
            !store
                .visible()
                .any(|a| a.addr == mode_c_synthetic_addr)
        );
    }
}
