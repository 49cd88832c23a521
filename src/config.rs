//! Configuration and command-line argument parsing

use clap::{Parser, ValueEnum};

/// Which SDR frontend to shell out to when no `--ifile` is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceType {
    #[value(name = "rtl-sdr")]
    RtlSdr,
    #[value(name = "hackrf")]
    HackRf,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::RtlSdr
    }
}

#[derive(Debug, Clone, Default)]
pub struct DebugFlags {
    pub demod: bool,
    pub demod_err: bool,
    pub bad_crc: bool,
    pub good_crc: bool,
    pub no_preamble: bool,
    pub net: bool,
    pub js: bool,
}

impl DebugFlags {
    fn parse(flags: &str) -> Self {
        let mut out = Self::default();
        for c in flags.chars() {
            match c {
                'D' => out.demod = true,
                'd' => out.demod_err = true,
                'C' => out.good_crc = true,
                'c' => out.bad_crc = true,
                'p' => out.no_preamble = true,
                'n' => out.net = true,
                'j' => out.js = true,
                _ => {}
            }
        }
        out
    }
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "modes-radar",
    version,
    about = "Mode S / Mode A-C decoder for 1090 MHz SSR traffic"
)]
pub struct Config {
    /// Select RTL device by index
    #[arg(long, default_value_t = 0)]
    pub dev_index: u32,

    /// Which SDR frontend to use when reading live (ignored with --ifile)
    #[arg(long, value_enum, default_value_t = DeviceType::RtlSdr)]
    pub device_type: DeviceType,

    /// Gain in tenths of a dB (999999 selects max gain)
    #[arg(long, default_value_t = 999999, value_parser = parse_gain)]
    pub gain: i32,

    /// Enable Automatic Gain Control
    #[arg(long, default_value_t = false)]
    pub enable_agc: bool,

    /// Tuner frequency in Hz
    #[arg(long, default_value_t = 1_090_000_000)]
    pub freq: u32,

    /// Read samples from a file instead of a live device ('-' for stdin)
    #[arg(long = "ifile")]
    pub filename: Option<String>,

    /// With --ifile, read the same file in a loop
    #[arg(long = "loop", default_value_t = false)]
    pub loop_file: bool,

    /// Disable single/two-bit CRC error correction
    #[arg(long = "no-fix", action = clap::ArgAction::SetFalse)]
    pub fix_errors: bool,

    /// Disable CRC validation entirely (discouraged)
    #[arg(long = "no-crc-check", action = clap::ArgAction::SetFalse)]
    pub check_crc: bool,

    /// Spend more CPU trying to fix two-bit CRC errors
    #[arg(long, default_value_t = false)]
    pub aggressive: bool,

    /// Retry marginal-SNR messages with a one-sample phase shift
    #[arg(long = "phase-enhance", default_value_t = false)]
    pub phase_enhance: bool,

    /// Scan for legacy Mode A/C (ATCRBS) replies alongside Mode S
    #[arg(long = "modeac", default_value_t = false)]
    pub mode_ac: bool,

    /// Show only raw message hex values
    #[arg(long, default_value_t = false)]
    pub raw: bool,

    /// Show only the ICAO addresses of received messages
    #[arg(long, default_value_t = false)]
    pub onlyaddr: bool,

    /// Use metric units in output
    #[arg(long, default_value_t = true)]
    pub metric: bool,

    /// Use imperial units in output
    #[arg(long, default_value_t = false, conflicts_with = "metric")]
    pub imperial: bool,

    /// Interactive mode, refreshing a table on screen
    #[arg(long, default_value_t = false)]
    pub interactive: bool,

    /// Max rows shown in interactive mode
    #[arg(long, default_value_t = 15)]
    pub interactive_rows: usize,

    /// Remove an aircraft from the list after this many idle seconds
    #[arg(long, default_value_t = 60)]
    pub interactive_ttl: u64,

    /// Minimum messages required before showing an aircraft (filters ghosts)
    #[arg(long, default_value_t = 2)]
    pub min_messages: u64,

    /// Receiver latitude, for distance/bearing and surface CPR decode
    #[arg(long)]
    pub receiver_lat: Option<f64>,

    /// Receiver longitude, for distance/bearing and surface CPR decode
    #[arg(long)]
    pub receiver_lon: Option<f64>,

    /// Print summary stats at exit (with --ifile)
    #[arg(long, default_value_t = false)]
    pub stats: bool,

    /// Debug flags: any combination of d/D/c/C/p/n/j
    #[arg(long, default_value = "")]
    debug_flags: String,

    #[arg(skip)]
    pub debug: DebugFlags,
}

fn parse_gain(s: &str) -> Result<i32, String> {
    if s == "999999" {
        return Ok(999999);
    }
    s.parse::<f64>()
        .map(|g| (g * 10.0) as i32)
        .map_err(|e| e.to_string())
}

impl Config {
    pub fn from_args() -> Self {
        let mut config = Self::parse();
        config.debug = DebugFlags::parse(&config.debug_flags);
        if config.imperial {
            config.metric = false;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_device_type_is_rtl_sdr() {
        assert_eq!(DeviceType::default(), DeviceType::RtlSdr);
    }

    #[test]
    fn test_debug_flags_parse() {
        let flags = DebugFlags::parse("Dcj");
        assert!(flags.demod);
        assert!(flags.bad_crc);
        assert!(flags.js);
        assert!(!flags.good_crc);
    }

    #[test]
    fn test_parse_gain_max() {
        assert_eq!(parse_gain("999999").unwrap(), 999999);
        assert_eq!(parse_gain("49.6").unwrap(), 496);
    }

    #[test]
    fn test_config_parses_minimal_args() {
        let config = Config::parse_from(["modes-radar", "--ifile", "sample.bin"]);
        assert_eq!(config.filename.as_deref(), Some("sample.bin"));
        assert_eq!(config.device_type, DeviceType::RtlSdr);
        assert!(config.fix_errors);
    }
}
