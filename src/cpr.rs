//! Compact Position Reporting (CPR) decoding.
//!
//! ADS-B encodes latitude/longitude as 17-bit fractions of a 360-degree
//! (airborne) or 90-degree (surface) span, alternating between "even" and
//! "odd" frames with slightly different zone counts. Two frames of opposite
//! parity pin down an unambiguous global position; a single frame can still
//! be resolved locally against a known nearby reference position (the
//! aircraft's last fix, or the receiver's own location).
//!
//! This is the same math `aircraft.rs` used to do inline for the airborne
//! global case only; it's pulled out here and extended with surface decoding
//! and local/relative decoding.

/// One CPR-encoded frame as read off the wire.
#[derive(Debug, Clone, Copy)]
pub struct CprFrame {
    pub raw_lat: u32,
    pub raw_lon: u32,
    pub odd: bool,
}

/// CPR modulo function (always non-negative, unlike `%`).
fn cpr_mod(a: f64, b: f64) -> f64 {
    let res = a - b * (a / b).floor();
    if res < 0.0 { res + b } else { res }
}

/// Number of longitude zones at a given latitude (NL function). The zone
/// count depends only on latitude, not on whether the frame is airborne or
/// surface.
pub(crate) fn cpr_nl(lat: f64) -> i32 {
    let lat = lat.abs();

    if lat < 10.47047130 {
        59
    } else if lat < 14.82817437 {
        58
    } else if lat < 18.18626357 {
        57
    } else if lat < 21.02939493 {
        56
    } else if lat < 23.54504487 {
        55
    } else if lat < 25.82924707 {
        54
    } else if lat < 27.93898710 {
        53
    } else if lat < 29.91135686 {
        52
    } else if lat < 31.77209708 {
        51
    } else if lat < 33.53993436 {
        50
    } else if lat < 35.22899598 {
        49
    } else if lat < 36.85025108 {
        48
    } else if lat < 38.41241892 {
        47
    } else if lat < 39.92256684 {
        46
    } else if lat < 41.38651832 {
        45
    } else if lat < 42.80914012 {
        44
    } else if lat < 44.19454951 {
        43
    } else if lat < 45.54626723 {
        42
    } else if lat < 46.86733252 {
        41
    } else if lat < 48.16039128 {
        40
    } else if lat < 49.42776439 {
        39
    } else if lat < 50.67150166 {
        38
    } else if lat < 51.89342469 {
        37
    } else if lat < 53.09516153 {
        36
    } else if lat < 54.27817472 {
        35
    } else if lat < 55.44378444 {
        34
    } else if lat < 56.59318756 {
        33
    } else if lat < 57.72747354 {
        32
    } else if lat < 58.84763776 {
        31
    } else if lat < 59.95459277 {
        30
    } else if lat < 61.04917774 {
        29
    } else if lat < 62.13216659 {
        28
    } else if lat < 63.20427479 {
        27
    } else if lat < 64.26616523 {
        26
    } else if lat < 65.31845310 {
        25
    } else if lat < 66.36171008 {
        24
    } else if lat < 67.39646774 {
        23
    } else if lat < 68.42322022 {
        22
    } else if lat < 69.44242631 {
        21
    } else if lat < 70.45451075 {
        20
    } else if lat < 71.45986473 {
        19
    } else if lat < 72.45884545 {
        18
    } else if lat < 73.45177442 {
        17
    } else if lat < 74.43893416 {
        16
    } else if lat < 75.42056257 {
        15
    } else if lat < 76.39684391 {
        14
    } else if lat < 77.36789461 {
        13
    } else if lat < 78.33374083 {
        12
    } else if lat < 79.29428225 {
        11
    } else if lat < 80.24923213 {
        10
    } else if lat < 81.19801349 {
        9
    } else if lat < 82.13956981 {
        8
    } else if lat < 83.07199445 {
        7
    } else if lat < 83.99173563 {
        6
    } else if lat < 84.89166191 {
        5
    } else if lat < 85.75541621 {
        4
    } else if lat < 86.53536998 {
        3
    } else if lat < 87.00000000 {
        2
    } else {
        1
    }
}

fn cpr_n(lat: f64, odd: bool) -> i32 {
    let nl = cpr_nl(lat) - if odd { 1 } else { 0 };
    nl.max(1)
}

/// Global CPR decode combining one even and one odd frame. `surface`
/// selects the 90-degree-span surface encoding instead of the 360-degree
/// airborne one; surface positions are ambiguous modulo 90 degrees of
/// longitude and must be resolved against `surface_ref_lon`. `even_is_newer`
/// tells which of the two frames was received more recently — the decode
/// uses that frame's zone count, matching the requirement that the position
/// be resolved relative to the latest report.
pub fn global_decode(
    even: &CprFrame,
    odd: &CprFrame,
    even_is_newer: bool,
    surface: bool,
    surface_ref_lon: Option<f64>,
) -> Option<(f64, f64)> {
    debug_assert!(!even.odd && odd.odd);

    let (d_lat0, d_lat1, span) = if surface {
        (90.0 / 60.0, 90.0 / 59.0, 90.0)
    } else {
        (360.0 / 60.0, 360.0 / 59.0, 360.0)
    };

    let lat0 = even.raw_lat as f64;
    let lat1 = odd.raw_lat as f64;
    let lon0 = even.raw_lon as f64;
    let lon1 = odd.raw_lon as f64;

    let j = ((59.0 * lat0 - 60.0 * lat1) / 131072.0 + 0.5).floor();

    let mut rlat0 = d_lat0 * (cpr_mod(j, 60.0) + lat0 / 131072.0);
    let mut rlat1 = d_lat1 * (cpr_mod(j, 59.0) + lat1 / 131072.0);

    if !surface {
        if rlat0 >= 270.0 {
            rlat0 -= 360.0;
        }
        if rlat1 >= 270.0 {
            rlat1 -= 360.0;
        }
    }

    if cpr_nl(rlat0) != cpr_nl(rlat1) {
        return None;
    }

    let (rlat, ni_odd) = if even_is_newer { (rlat0, false) } else { (rlat1, true) };

    let nl = cpr_nl(rlat);
    let ni = (nl - if ni_odd { 1 } else { 0 }).max(1);
    let m = ((lon0 * (nl - 1) as f64 - lon1 * nl as f64) / 131072.0 + 0.5).floor();
    let dlon = span / ni as f64;

    let lon_raw = if ni_odd { lon1 } else { lon0 };
    let mut rlon = dlon * (cpr_mod(m, ni as f64) + lon_raw / 131072.0);

    if !surface {
        if rlon > 180.0 {
            rlon -= 360.0;
        }
        return Some((rlat, rlon));
    }

    // Surface positions repeat every 90 degrees of longitude; pick the
    // quadrant closest to the reference longitude (normally the receiver's
    // own position).
    let reference = surface_ref_lon.unwrap_or(0.0);
    let mut best = rlon;
    let mut best_dist = f64::MAX;
    for k in -2..=2 {
        let candidate = rlon + 90.0 * k as f64;
        let dist = (candidate - reference).abs();
        if dist < best_dist {
            best_dist = dist;
            best = candidate;
        }
    }

    Some((rlat, best))
}

/// Local/relative CPR decode: resolve a single frame against a known nearby
/// reference position (last fix, or receiver location). Returns `None` if
/// `reference` isn't actually close enough for the math to be unambiguous;
/// callers should additionally validate the result against the maximum
/// expected range (180 NM airborne, 45 NM surface).
pub fn local_decode(reference_lat: f64, reference_lon: f64, frame: &CprFrame, surface: bool) -> (f64, f64) {
    let (d_lat_even, d_lat_odd, span) = if surface {
        (90.0 / 60.0, 90.0 / 59.0, 90.0)
    } else {
        (360.0 / 60.0, 360.0 / 59.0, 360.0)
    };
    let dlat = if frame.odd { d_lat_odd } else { d_lat_even };

    let cprlat = frame.raw_lat as f64 / 131072.0;
    let cprlon = frame.raw_lon as f64 / 131072.0;

    let j = (reference_lat / dlat).floor()
        + (cpr_mod(reference_lat, dlat) / dlat - cprlat + 0.5).floor();
    let rlat = dlat * (j + cprlat);

    let nl = cpr_nl(rlat);
    let ni = cpr_n(rlat, frame.odd).max(1);
    let _ = nl;
    let dlon = span / ni as f64;

    let m = (reference_lon / dlon).floor() + (cpr_mod(reference_lon, dlon) / dlon - cprlon + 0.5).floor();
    let rlon = dlon * (m + cprlon);

    (rlat, rlon)
}

/// Great-circle distance in nautical miles, used to sanity-check a local
/// decode against its reference point.
pub fn distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_NM: f64 = 3440.065;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_NM * c
}

/// Maximum plausible distance, in nautical miles, between a local CPR decode
/// and its reference point before the result should be rejected as spurious.
pub fn max_local_range_nm(surface: bool) -> f64 {
    if surface { 45.0 } else { 180.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpr_nl_bounds() {
        assert_eq!(cpr_nl(0.0), 59);
        assert_eq!(cpr_nl(45.0), 42);
        assert_eq!(cpr_nl(89.0), 1);
    }

    #[test]
    fn test_global_decode_airborne_known_pair() {
        // Classic dump1090 test vectors (even/odd pair for a fixed position).
        let even = CprFrame {
            raw_lat: 93000,
            raw_lon: 51372,
            odd: false,
        };
        let odd = CprFrame {
            raw_lat: 74158,
            raw_lon: 50194,
            odd: true,
        };

        let (lat, lon) = global_decode(&even, &odd, true, false, None).expect("should decode");
        assert!((lat - 52.25720).abs() < 0.01);
        assert!((lon - 3.91937).abs() < 0.01);
    }

    #[test]
    fn test_local_decode_close_to_reference() {
        let even = CprFrame {
            raw_lat: 93000,
            raw_lon: 51372,
            odd: false,
        };
        let odd = CprFrame {
            raw_lat: 74158,
            raw_lon: 50194,
            odd: true,
        };
        let (glat, glon) = global_decode(&even, &odd, true, false, None).unwrap();

        let (llat, llon) = local_decode(glat, glon, &even, false);
        assert!((llat - glat).abs() < 0.1);
        assert!((llon - glon).abs() < 0.1);
    }

    #[test]
    fn test_distance_nm_zero_for_same_point() {
        assert!(distance_nm(51.5, -0.1, 51.5, -0.1) < 1e-6);
    }

    #[test]
    fn test_max_local_range() {
        assert_eq!(max_local_range_nm(false), 180.0);
        assert_eq!(max_local_range_nm(true), 45.0);
    }
}
