//! Aircraft tracking and position decoding
//!
//! Maintains a database of recently seen aircraft, decodes CPR positions,
//! and folds in squawk/altitude observations that arrived as Mode A/C
//! replies rather than full Mode S messages.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bitflags::bitflags;

use crate::cpr::{self, CprFrame};
use crate::decoder::{BdsData, ModesMessage};

bitflags! {
    /// What kind of traffic has been seen for this ICAO/synthetic address.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeAcFlags: u8 {
        /// At least one Mode S (DF anything except the synthetic DF32) message seen.
        const MODES  = 0b0001;
        /// At least one Mode A (identity) reply seen.
        const MODE_A = 0b0010;
        /// At least one Mode C (altitude) reply seen.
        const MODE_C = 0b0100;
        /// The IDENT/SPI pulse was set on the most recent Mode A/C reply.
        const IDENT  = 0b1000;
        /// A Mode S record's squawk matched a synthetic Mode A/C contact's.
        const MODE_A_HIT = 0b0001_0000;
        /// A Mode S record's altitude matched a synthetic Mode A/C contact's.
        const MODE_C_HIT = 0b0010_0000;
        /// This synthetic Mode A/C contact is a confirmed duplicate of a
        /// tracked Mode S aircraft and should be hidden from display.
        const MODES_HIT  = 0b0100_0000;
    }
}

const SIGNAL_RING_SLOTS: usize = 8;

/// Tracked aircraft data
#[derive(Debug, Clone)]
pub struct Aircraft {
    /// ICAO 24-bit address, or a synthetic `0x00800000 | squawk` address for
    /// Mode A/C-only contacts that never produced a real Mode S message.
    #[allow(dead_code)]
    pub addr: u32,
    /// Hex address string
    pub hex_addr: String,
    /// Flight callsign
    pub flight: String,
    /// Altitude in feet
    pub altitude: i32,
    /// Ground speed in knots
    pub speed: u16,
    /// Track/heading in degrees
    pub track: u16,
    /// Vertical rate in ft/min, signed (climb positive), from a DF17 ME
    /// type 19 velocity message
    pub vert_rate: i32,
    /// Last seen timestamp
    pub seen: Instant,
    /// Message count
    pub messages: u64,
    /// Odd CPR frame most recently received
    odd_cpr: Option<CprFrame>,
    odd_cpr_time: Instant,
    /// Even CPR frame most recently received
    even_cpr: Option<CprFrame>,
    even_cpr_time: Instant,
    /// Whether the current position fix came from the surface encoding
    pub on_ground: bool,
    pub on_ground_valid: bool,
    /// Decoded latitude
    pub lat: f64,
    /// Decoded longitude
    pub lon: f64,
    /// Roll angle (from BDS 5,0)
    pub roll_angle: Option<f32>,
    /// True airspeed (from BDS 5,0 or 6,0)
    pub true_airspeed: Option<u16>,
    /// Indicated airspeed (from BDS 6,0)
    pub indicated_airspeed: Option<u16>,
    /// Mach number (from BDS 6,0)
    pub mach: Option<f32>,
    /// Magnetic heading (from BDS 6,0)
    pub magnetic_heading: Option<f32>,
    /// Barometric altitude rate (from BDS 6,0)
    pub baro_altitude_rate: Option<i16>,
    /// MCP/FCU selected altitude (from BDS 4,0)
    pub selected_altitude: Option<u16>,
    /// Barometric pressure setting (from BDS 4,0)
    pub baro_setting: Option<f32>,
    /// Squawk code (identity) from DF5/DF21 or a Mode A reply
    pub squawk: u16,
    /// Squawk as tracked for Mode S/Mode A-C correlation (§4.9) — kept
    /// distinct from `squawk` since a synthetic record's correlation
    /// identity shouldn't be confused with a real aircraft's display squawk.
    pub mode_a: u16,
    /// Altitude as tracked for Mode S/Mode A-C correlation (§4.9) — kept
    /// distinct from `altitude` for the same reason.
    pub mode_c: i32,
    /// Average signal level (magnitude), averaged over a short ring
    pub signal_level: u16,
    signal_ring: [u16; SIGNAL_RING_SLOTS],
    signal_ring_len: usize,
    signal_ring_pos: usize,
    /// Count of phase-corrected messages
    pub phase_corrections: u32,
    /// What kind of traffic (Mode S / Mode A / Mode C) has been observed
    pub mode_ac_flags: ModeAcFlags,
    pub mode_a_count: u32,
    pub mode_c_count: u32,
}

impl Aircraft {
    pub fn new(addr: u32) -> Self {
        let now = Instant::now();
        Self {
            addr,
            hex_addr: format!("{:06X}", addr),
            flight: String::new(),
            altitude: 0,
            speed: 0,
            track: 0,
            vert_rate: 0,
            seen: now,
            messages: 0,
            odd_cpr: None,
            odd_cpr_time: now,
            even_cpr: None,
            even_cpr_time: now,
            on_ground: false,
            on_ground_valid: false,
            lat: 0.0,
            lon: 0.0,
            roll_angle: None,
            true_airspeed: None,
            indicated_airspeed: None,
            mach: None,
            magnetic_heading: None,
            baro_altitude_rate: None,
            selected_altitude: None,
            baro_setting: None,
            squawk: 0,
            mode_a: 0,
            mode_c: 0,
            signal_level: 0,
            signal_ring: [0; SIGNAL_RING_SLOTS],
            signal_ring_len: 0,
            signal_ring_pos: 0,
            phase_corrections: 0,
            mode_ac_flags: ModeAcFlags::empty(),
            mode_a_count: 0,
            mode_c_count: 0,
        }
    }

    fn record_signal(&mut self, level: u16) {
        if level == 0 {
            return;
        }
        self.signal_ring[self.signal_ring_pos] = level;
        self.signal_ring_pos = (self.signal_ring_pos + 1) % SIGNAL_RING_SLOTS;
        if self.signal_ring_len < SIGNAL_RING_SLOTS {
            self.signal_ring_len += 1;
        }
        let sum: u32 = self.signal_ring[..self.signal_ring_len]
            .iter()
            .map(|&v| v as u32)
            .sum();
        self.signal_level = (sum / self.signal_ring_len as u32) as u16;
    }

    /// Is a synthetic Mode A/C address, as opposed to a real 24-bit ICAO.
    pub fn is_synthetic(&self) -> bool {
        self.addr & 0x00FF_0000 == 0x0080_0000 && self.addr <= 0x00FF_FFFF
    }
}

/// Store for tracking multiple aircraft
pub struct AircraftStore {
    aircraft: HashMap<u32, Aircraft>,
    ttl: Duration,
    /// Minimum messages required before aircraft is considered confirmed
    min_messages: u64,
    /// Receiver position, used as the CPR reference for local decoding and
    /// as the quadrant disambiguator for surface decoding.
    receiver_lat: Option<f64>,
    receiver_lon: Option<f64>,
}

impl AircraftStore {
    #[allow(dead_code)]
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_min_messages(ttl_secs, 2)
    }

    /// Create a new store with custom minimum message threshold
    pub fn with_min_messages(ttl_secs: u64, min_messages: u64) -> Self {
        Self {
            aircraft: HashMap::new(),
            ttl: Duration::from_secs(ttl_secs),
            min_messages,
            receiver_lat: None,
            receiver_lon: None,
        }
    }

    pub fn set_receiver_position(&mut self, lat: f64, lon: f64) {
        self.receiver_lat = Some(lat);
        self.receiver_lon = Some(lon);
    }

    /// Update aircraft from a decoded message (including synthetic Mode A/C
    /// messages produced by `modeac::ModeAcReply::to_modes_message`).
    pub fn update_from_message(&mut self, mm: &ModesMessage) -> Option<&Aircraft> {
        let addr = mm.icao_address();

        let aircraft = self
            .aircraft
            .entry(addr)
            .or_insert_with(|| Aircraft::new(addr));
        aircraft.seen = Instant::now();
        aircraft.messages += 1;
        aircraft.record_signal(mm.signal_level);
        if mm.phase_corrected {
            aircraft.phase_corrections += 1;
        }

        match mm.msg_type {
            32 => {
                // Synthetic Mode A/C reply.
                if mm.aircraft_type == 1 {
                    aircraft.mode_ac_flags.insert(ModeAcFlags::MODE_A);
                    aircraft.mode_a_count += 1;
                    if mm.identity != 0 {
                        aircraft.squawk = mm.identity;
                        aircraft.mode_a = mm.identity;
                    }
                } else {
                    aircraft.mode_ac_flags.insert(ModeAcFlags::MODE_C);
                    aircraft.mode_c_count += 1;
                    aircraft.altitude = mm.altitude;
                    aircraft.mode_c = mm.altitude;
                }
                aircraft
                    .mode_ac_flags
                    .set(ModeAcFlags::IDENT, mm.fs == 4 || mm.fs == 5);
            }
            0 | 4 | 16 | 20 => {
                aircraft.mode_ac_flags.insert(ModeAcFlags::MODES);
                aircraft.altitude = mm.altitude;
                aircraft.mode_c = mm.altitude;

                if mm.msg_type == 20 {
                    if let Some(ref bds) = mm.bds_data {
                        self.update_from_bds(addr, bds);
                    }
                }
            }
            5 | 21 => {
                aircraft.mode_ac_flags.insert(ModeAcFlags::MODES);
                if mm.identity != 0 {
                    aircraft.squawk = mm.identity;
                    aircraft.mode_a = mm.identity;
                }

                if mm.msg_type == 21 {
                    if let Some(ref bds) = mm.bds_data {
                        self.update_from_bds(addr, bds);
                    }
                }
            }
            17 => {
                aircraft.mode_ac_flags.insert(ModeAcFlags::MODES);
                if (1..=4).contains(&mm.me_type) {
                    aircraft.flight = mm.flight.clone();
                } else if (5..=8).contains(&mm.me_type) {
                    aircraft.on_ground = true;
                    aircraft.on_ground_valid = true;
                    self.note_cpr(addr, mm, true);
                } else if (9..=18).contains(&mm.me_type) || (20..=22).contains(&mm.me_type) {
                    aircraft.altitude = mm.altitude;
                    aircraft.mode_c = mm.altitude;
                    aircraft.on_ground = false;
                    aircraft.on_ground_valid = true;
                    self.note_cpr(addr, mm, false);
                } else if mm.me_type == 19 {
                    if mm.me_sub == 1 || mm.me_sub == 2 {
                        aircraft.speed = mm.velocity;
                        aircraft.track = mm.heading as u16;
                        if let Some(vr) = mm.vertical_rate_fpm() {
                            aircraft.vert_rate = vr;
                        }
                    }
                }
            }
            _ => {}
        }

        self.aircraft.get(&addr)
    }

    fn note_cpr(&mut self, addr: u32, mm: &ModesMessage, surface: bool) {
        let now = Instant::now();
        let frame = CprFrame {
            raw_lat: mm.raw_latitude,
            raw_lon: mm.raw_longitude,
            odd: mm.fflag,
        };

        {
            let aircraft = match self.aircraft.get_mut(&addr) {
                Some(a) => a,
                None => return,
            };
            if mm.fflag {
                aircraft.odd_cpr = Some(frame);
                aircraft.odd_cpr_time = now;
            } else {
                aircraft.even_cpr = Some(frame);
                aircraft.even_cpr_time = now;
            }
        }

        self.try_global_decode(addr, surface);
        if self.aircraft.get(&addr).map(|a| a.lat == 0.0 && a.lon == 0.0).unwrap_or(true) {
            self.try_local_decode(addr, &frame, surface);
        }
    }

    fn try_global_decode(&mut self, addr: u32, surface: bool) {
        let surface_ref_lon = self.receiver_lon;
        let aircraft = match self.aircraft.get_mut(&addr) {
            Some(a) => a,
            None => return,
        };

        let (even, odd) = match (aircraft.even_cpr, aircraft.odd_cpr) {
            (Some(e), Some(o)) => (e, o),
            _ => return,
        };

        let time_diff = if aircraft.even_cpr_time > aircraft.odd_cpr_time {
            aircraft.even_cpr_time.duration_since(aircraft.odd_cpr_time)
        } else {
            aircraft.odd_cpr_time.duration_since(aircraft.even_cpr_time)
        };
        if time_diff > Duration::from_secs(10) {
            return;
        }

        let even_is_newer = aircraft.even_cpr_time > aircraft.odd_cpr_time;
        if let Some((lat, lon)) =
            cpr::global_decode(&even, &odd, even_is_newer, surface, surface_ref_lon)
        {
            aircraft.lat = lat;
            aircraft.lon = lon;
        }
    }

    fn try_local_decode(&mut self, addr: u32, frame: &CprFrame, surface: bool) {
        let reference = match (self.receiver_lat, self.receiver_lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return,
        };

        let aircraft = match self.aircraft.get_mut(&addr) {
            Some(a) => a,
            None => return,
        };

        let (ref_lat, ref_lon) = if aircraft.lat != 0.0 || aircraft.lon != 0.0 {
            (aircraft.lat, aircraft.lon)
        } else {
            reference
        };

        let (lat, lon) = cpr::local_decode(ref_lat, ref_lon, frame, surface);
        if cpr::distance_nm(ref_lat, ref_lon, lat, lon) <= cpr::max_local_range_nm(surface) {
            aircraft.lat = lat;
            aircraft.lon = lon;
        }
    }

    /// Update aircraft with BDS data
    fn update_from_bds(&mut self, addr: u32, bds: &BdsData) {
        let aircraft = match self.aircraft.get_mut(&addr) {
            Some(a) => a,
            None => return,
        };

        match bds {
            BdsData::AircraftIdentification { callsign } => {
                if aircraft.flight.is_empty() {
                    aircraft.flight = callsign.clone();
                }
            }
            BdsData::SelectedVerticalIntention {
                mcp_altitude,
                baro_setting,
                ..
            } => {
                if let Some(alt) = mcp_altitude {
                    aircraft.selected_altitude = Some(*alt);
                }
                if let Some(baro) = baro_setting {
                    aircraft.baro_setting = Some(*baro);
                }
            }
            BdsData::TrackAndTurnReport {
                roll_angle,
                ground_speed,
                true_airspeed,
                true_track,
                ..
            } => {
                if let Some(roll) = roll_angle {
                    aircraft.roll_angle = Some(*roll);
                }
                if let Some(gs) = ground_speed {
                    aircraft.speed = *gs;
                }
                if let Some(tas) = true_airspeed {
                    aircraft.true_airspeed = Some(*tas);
                }
                if let Some(track) = true_track {
                    aircraft.track = *track as u16;
                }
            }
            BdsData::HeadingAndSpeedReport {
                magnetic_heading,
                indicated_airspeed,
                mach,
                baro_altitude_rate,
                ..
            } => {
                if let Some(hdg) = magnetic_heading {
                    aircraft.magnetic_heading = Some(*hdg);
                }
                if let Some(ias) = indicated_airspeed {
                    aircraft.indicated_airspeed = Some(*ias);
                }
                if let Some(m) = mach {
                    aircraft.mach = Some(*m);
                }
                if let Some(rate) = baro_altitude_rate {
                    aircraft.baro_altitude_rate = Some(*rate);
                }
            }
            _ => {}
        }
    }

    /// Get aircraft by ICAO address
    #[allow(dead_code)]
    pub fn get(&self, addr: u32) -> Option<&Aircraft> {
        self.aircraft.get(&addr)
    }

    /// Get a mutable aircraft record by address, for correlator updates.
    pub fn get_mut(&mut self, addr: u32) -> Option<&mut Aircraft> {
        self.aircraft.get_mut(&addr)
    }

    /// Get all aircraft that meet the minimum message threshold
    pub fn all(&self) -> impl Iterator<Item = &Aircraft> {
        let min_msg = self.min_messages;
        self.aircraft.values().filter(move |a| a.messages >= min_msg)
    }

    /// Aircraft suitable for a roster snapshot/display: above the minimum
    /// message threshold, and not a synthetic Mode A/C contact already
    /// confirmed as a duplicate of a tracked Mode S aircraft (§4.9).
    pub fn visible(&self) -> impl Iterator<Item = &Aircraft> {
        self.all()
            .filter(|a| !a.mode_ac_flags.contains(ModeAcFlags::MODES_HIT))
    }

    /// Get all aircraft including those below message threshold (for internal use)
    #[allow(dead_code)]
    pub fn all_unfiltered(&self) -> impl Iterator<Item = &Aircraft> {
        self.aircraft.values()
    }

    /// Remove stale aircraft
    pub fn remove_stale(&mut self) {
        let now = Instant::now();
        self.aircraft
            .retain(|_, a| now.duration_since(a.seen) <= self.ttl);
    }

    /// Number of tracked aircraft (meeting minimum message threshold)
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.all().count()
    }

    /// Number of all tracked aircraft including below threshold
    #[allow(dead_code)]
    pub fn len_total(&self) -> usize {
        self.aircraft.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generate JSON representation of all aircraft
    #[allow(dead_code)]
    pub fn to_json(&self) -> String {
        let mut json = String::from("[\n");
        let mut first = true;

        for aircraft in self.aircraft.values() {
            if aircraft.lat == 0.0 && aircraft.lon == 0.0 {
                continue;
            }

            if !first {
                json.push_str(",\n");
            }
            first = false;

            let mut extra = String::new();

            if let Some(ias) = aircraft.indicated_airspeed {
                extra.push_str(&format!(r#","ias":{}"#, ias));
            }
            if let Some(tas) = aircraft.true_airspeed {
                extra.push_str(&format!(r#","tas":{}"#, tas));
            }
            if let Some(mach) = aircraft.mach {
                extra.push_str(&format!(r#","mach":{:.3}"#, mach));
            }
            if let Some(roll) = aircraft.roll_angle {
                extra.push_str(&format!(r#","roll":{:.1}"#, roll));
            }
            if let Some(hdg) = aircraft.magnetic_heading {
                extra.push_str(&format!(r#","mag_hdg":{:.1}"#, hdg));
            }
            if let Some(rate) = aircraft.baro_altitude_rate {
                extra.push_str(&format!(r#","vert_rate":{}"#, rate));
            }
            if let Some(sel_alt) = aircraft.selected_altitude {
                extra.push_str(&format!(r#","sel_alt":{}"#, sel_alt));
            }
            if let Some(baro) = aircraft.baro_setting {
                extra.push_str(&format!(r#","baro":{:.1}"#, baro));
            }
            if aircraft.on_ground_valid {
                extra.push_str(&format!(r#","ground":{}"#, aircraft.on_ground));
            }

            json.push_str(&format!(
                r#"{{"hex":"{}","flight":"{}","lat": {},"lon":{},"altitude": {},"track":{},"speed":{}{}}}"#,
                aircraft.hex_addr,
                aircraft.flight,
                aircraft.lat,
                aircraft.lon,
                aircraft.altitude,
                aircraft.track,
                aircraft.speed,
                extra
            ));
        }

        json.push_str("\n]");
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aircraft_new() {
        let ac = Aircraft::new(0x4840D6);
        assert_eq!(ac.addr, 0x4840D6);
        assert_eq!(ac.hex_addr, "4840D6");
        assert_eq!(ac.messages, 0);
        assert!(ac.roll_angle.is_none());
        assert!(ac.mach.is_none());
        assert!(!ac.is_synthetic());
    }

    #[test]
    fn test_synthetic_address_recognized() {
        let ac = Aircraft::new(0x0080_1200);
        assert!(ac.is_synthetic());
    }

    #[test]
    fn test_aircraft_store() {
        let store = AircraftStore::new(60);
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_signal_ring_averages() {
        let mut ac = Aircraft::new(1);
        for level in [100, 200, 300] {
            ac.record_signal(level);
        }
        assert_eq!(ac.signal_level, 200);
    }

    #[test]
    fn test_mode_ac_message_updates_flags_and_squawk() {
        let mut store = AircraftStore::with_min_messages(60, 1);
        let mm = crate::decoder::synthetic_mode_ac_message(7700, Some(35000), false, false, 1000);
        let ac = store.update_from_message(&mm).unwrap();
        assert!(ac.mode_ac_flags.contains(ModeAcFlags::MODE_C));
        assert_eq!(ac.altitude, 35000);
    }

    #[test]
    fn test_stale_eviction_at_ttl_boundary() {
        // E6: delete_ttl=60, a record seen at t=0 is present at t=59 and
        // gone at t=61.
        let mut store = AircraftStore::with_min_messages(60, 1);
        let mut mm = ModesMessage::default();
        mm.msg_type = 11;
        mm.aa = [0xAB, 0xCD, 0xEF];
        store.update_from_message(&mm);

        let seen_at = store.get(0xABCDEF).unwrap().seen;

        store.get_mut(0xABCDEF).unwrap().seen = seen_at - Duration::from_secs(59);
        store.remove_stale();
        assert!(store.get(0xABCDEF).is_some());

        store.get_mut(0xABCDEF).unwrap().seen = seen_at - Duration::from_secs(61);
        store.remove_stale();
        assert!(store.get(0xABCDEF).is_none());
    }
}
