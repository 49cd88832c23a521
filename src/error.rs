//! Error types for the fallible boundaries of the program: spawning an SDR
//! capture command and reading samples from a file or device. Internal
//! decode failures are never represented as `Result` — per the aircraft and
//! demodulator modules, a bad CRC or an unrecognized DF type is telemetry
//! (a counter bump), not an error to propagate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RadarError {
    #[error("failed to start {device}: {source}")]
    Spawn {
        device: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{device} produced no stdout")]
    NoStdout { device: &'static str },

    #[error("reading samples failed: {0}")]
    Read(#[from] std::io::Error),
}
