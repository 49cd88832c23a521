//! modes-radar: a Mode S / Mode A-C decoder for 1090 MHz SSR traffic
//!
//! Rust port and extension of antirez/dump1090, restructured around an
//! orchestrator that owns the aircraft roster, frame log, and a
//! cooperative shutdown flag shared by every background task.

mod aircraft;
mod config;
mod correlator;
mod cpr;
mod crc;
mod decoder;
mod demodulator;
mod framelog;
mod magnitude;
mod modeac;
mod orchestrator;
mod ring;
mod signal;

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::decoder::ModesMessage;
use crate::orchestrator::Orchestrator;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_args();

    if !config.interactive {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
        info!("modes-radar starting...");
        info!("Configuration: {:?}", config);
    }

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let orchestrator = Orchestrator::new(config.clone());

        let cleanup_handle = {
            let orchestrator = std::sync::Arc::new(orchestrator);
            let orch_for_cleanup = std::sync::Arc::clone(&orchestrator);
            let cleanup_handle = tokio::spawn(async move {
                orch_for_cleanup.run_cleanup_task().await;
            });

            let interactive_handle = if config.interactive {
                let orch = std::sync::Arc::clone(&orchestrator);
                let rows = config.interactive_rows;
                let metric = config.metric;
                let receiver_lat = config.receiver_lat;
                let receiver_lon = config.receiver_lon;
                Some(tokio::spawn(async move {
                    interactive_display(orch, rows, metric, receiver_lat, receiver_lon).await;
                }))
            } else {
                None
            };

            let processor_handle = {
                let orch = std::sync::Arc::clone(&orchestrator);
                let interactive = config.interactive;
                let raw = config.raw;
                let onlyaddr = config.onlyaddr;
                tokio::spawn(async move {
                    orch.run_message_processor(|msg, accepted| {
                        if !accepted || interactive {
                            return;
                        }
                        if raw {
                            println!("{}", msg.to_raw_string());
                        } else if onlyaddr {
                            println!("{:06X}", msg.icao_address());
                        } else {
                            println!("{}", msg);
                        }
                    })
                    .await;
                })
            };

            run_demodulation(&orchestrator).await;

            if config.interactive {
                println!("\nFile processing complete. Press Ctrl+C to exit...");
                tokio::signal::ctrl_c().await.ok();
            }

            if config.stats {
                orchestrator.log_correlations();
            }

            orchestrator.request_shutdown();
            cleanup_handle.abort();
            if let Some(h) = interactive_handle {
                h.abort();
            }
            processor_handle.abort();
            cleanup_handle
        };
        let _ = cleanup_handle.await;
    });

    Ok(())
}

async fn run_demodulation(orchestrator: &Orchestrator) {
    use crate::config::DeviceType;

    let config = &orchestrator.config;
    let msg_tx = orchestrator.message_sender();
    let mut demodulator = orchestrator.new_demodulator();

    if let Some(ref filename) = config.filename {
        if !config.interactive {
            info!("Reading from file: {}", filename);
        }
        if let Err(e) = demodulator.process_file(filename, &msg_tx) {
            if !config.interactive {
                error!("Error processing file: {}", e);
            }
        }
    } else {
        let result = match config.device_type {
            DeviceType::RtlSdr => {
                if !config.interactive {
                    info!("Attempting to read from RTL-SDR...");
                }
                run_rtlsdr_command(config, &mut demodulator, &msg_tx).await
            }
            DeviceType::HackRf => {
                if !config.interactive {
                    info!("Attempting to read from HackRF One...");
                }
                run_hackrf_command(config, &mut demodulator, &msg_tx).await
            }
        };

        if let Err(e) = result {
            let device_name = match config.device_type {
                DeviceType::RtlSdr => "RTL-SDR",
                DeviceType::HackRf => "HackRF",
            };
            error!("Error with {}: {}", device_name, e);
            if !config.interactive {
                match config.device_type {
                    DeviceType::RtlSdr => {
                        eprintln!("\nMake sure rtl-sdr is installed: sudo dnf install rtl-sdr");
                    }
                    DeviceType::HackRf => {
                        eprintln!("\nMake sure hackrf is installed: sudo dnf install hackrf");
                    }
                }
                eprintln!("Or use --ifile to read from a file");
            }
        }
    }

    if config.stats {
        orchestrator.print_stats(&demodulator.stats);
    }
}

const READ_SIZE: usize = 16 * 16384;

/// Spawn a blocking OS thread that reads fixed-size blocks from `reader` and
/// pushes them into `ring`, normalizing to RTL-SDR's unsigned-centered-at-127
/// sample format. Decoupling the blocking read from the decode loop via the
/// ring is what lets the decoder fall behind a slow block without the reader
/// stalling against process stdout.
fn spawn_block_reader(
    mut reader: impl std::io::Read + Send + 'static,
    ring: std::sync::Arc<crate::ring::SampleRing>,
    signed: bool,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut raw = vec![0u8; READ_SIZE];
        loop {
            let mut total_read = 0;
            while total_read < READ_SIZE {
                match reader.read(&mut raw[total_read..]) {
                    Ok(0) => {
                        ring.close();
                        return;
                    }
                    Ok(n) => total_read += n,
                    Err(_) => {
                        ring.close();
                        return;
                    }
                }
            }

            let block = if signed {
                raw.iter()
                    .map(|&b| (b as i8 as i16 + 128) as u8)
                    .collect()
            } else {
                raw.clone()
            };
            ring.push(block);
        }
    })
}

async fn run_rtlsdr_command(
    config: &Config,
    demodulator: &mut crate::demodulator::Demodulator,
    msg_tx: &Sender<ModesMessage>,
) -> Result<(), crate::error::RadarError> {
    use std::process::{Command, Stdio};

    let mut cmd = Command::new("rtl_sdr");
    cmd.arg("-f")
        .arg(config.freq.to_string())
        .arg("-s")
        .arg("2000000")
        .arg("-g")
        .arg(if config.gain < 0 {
            "0".to_string()
        } else {
            (config.gain / 10).to_string()
        })
        .arg("-")
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|source| crate::error::RadarError::Spawn {
        device: "rtl_sdr",
        source,
    })?;
    let stdout = child
        .stdout
        .take()
        .ok_or(crate::error::RadarError::NoStdout { device: "rtl_sdr" })?;

    run_sdr_consume_loop(stdout, false, demodulator, msg_tx).await
}

/// Run HackRF One using hackrf_transfer command
async fn run_hackrf_command(
    config: &Config,
    demodulator: &mut crate::demodulator::Demodulator,
    msg_tx: &Sender<ModesMessage>,
) -> Result<(), crate::error::RadarError> {
    use std::process::{Command, Stdio};

    let mut cmd = Command::new("hackrf_transfer");
    cmd.arg("-r")
        .arg("-")
        .arg("-f")
        .arg(config.freq.to_string())
        .arg("-s")
        .arg("2000000")
        .arg("-a")
        .arg("1")
        .arg("-l")
        .arg("32")
        .arg("-g")
        .arg("20")
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd
        .spawn()
        .map_err(|source| crate::error::RadarError::Spawn {
            device: "hackrf_transfer",
            source,
        })?;
    let stdout = child.stdout.take().ok_or(crate::error::RadarError::NoStdout {
        device: "hackrf_transfer",
    })?;

    // HackRF samples are signed 8-bit centered at 0; RTL-SDR format is
    // unsigned centered at 127.
    run_sdr_consume_loop(stdout, true, demodulator, msg_tx).await
}

/// Drain blocks from the reader thread's ring, stitching in the trailing
/// overlap each full message window needs, and feed the decoder.
async fn run_sdr_consume_loop(
    reader: impl std::io::Read + Send + 'static,
    signed: bool,
    demodulator: &mut crate::demodulator::Demodulator,
    msg_tx: &Sender<ModesMessage>,
) -> Result<(), crate::error::RadarError> {
    let ring = std::sync::Arc::new(crate::ring::SampleRing::new());
    let _reader_thread = spawn_block_reader(reader, std::sync::Arc::clone(&ring), signed);

    let overlap = (8 + 112 - 1) * 4;
    let mut data = vec![127u8; READ_SIZE + overlap];

    loop {
        let Some(recv) = ring.pop_blocking() else {
            return Ok(());
        };
        if recv.blocks_lost > 0 {
            let lost_samples = crate::ring::tick_compensation(recv.blocks_lost, READ_SIZE as u64);
            demodulator.advance_tick(lost_samples);
            tracing::debug!(
                blocks_lost = recv.blocks_lost,
                lost_samples,
                "decoder fell behind, dropped sample blocks"
            );
        }

        data.copy_within(READ_SIZE..READ_SIZE + overlap, 0);
        data[overlap..overlap + recv.block.len()].copy_from_slice(&recv.block);

        let magnitude = crate::magnitude::compute_magnitude_vector(
            &data[..overlap + recv.block.len()],
            &demodulator.mag_lut,
        );
        demodulator.detect_modes_external(&magnitude, msg_tx);
    }
}

async fn interactive_display(
    orchestrator: std::sync::Arc<Orchestrator>,
    max_rows: usize,
    metric: bool,
    receiver_lat: Option<f64>,
    receiver_lon: Option<f64>,
) {
    let refresh_interval = Duration::from_millis(250);

    loop {
        tokio::time::sleep(refresh_interval).await;
        if orchestrator.is_shutting_down() {
            break;
        }

        print!("\x1B[2J\x1B[H");
        let _ = io::stdout().flush();

        const RED: &str = "\x1B[91m";
        const YELLOW: &str = "\x1B[93m";
        const GREEN: &str = "\x1B[92m";
        const BOLD: &str = "\x1B[1m";
        const RESET: &str = "\x1B[0m";

        let has_position = receiver_lat.is_some() && receiver_lon.is_some();

        if has_position {
            println!(
                "{BOLD}{:<6} {:<8} {:>7} {:>5} {:>6} {:>5} {:>5} {:>5} {:>4} {:>6} {:>3}{RESET}",
                "Hex", "Flight", "Alt", "Spd", "Dist", "Brg", "VRate", "IAS", "M", "Msgs", "Age"
            );
        } else {
            println!(
                "{BOLD}{:<6} {:<8} {:>7} {:>5} {:>9} {:>10} {:>5} {:>5} {:>5} {:>4} {:>6} {:>3}{RESET}",
                "Hex", "Flight", "Alt", "Spd", "Lat", "Lon", "Track", "VRate", "IAS", "M", "Msgs", "Age"
            );
        }
        println!("{}", "-".repeat(if has_position { 75 } else { 95 }));

        let store = orchestrator.aircraft.read();
        let now = Instant::now();

        let mut aircraft: Vec<_> = store.visible().collect();
        aircraft.sort_by(|a, b| b.seen.cmp(&a.seen));

        let count = aircraft.len();
        for ac in aircraft.iter().take(max_rows) {
            let seen_secs = now.duration_since(ac.seen).as_secs();

            let is_emergency = matches!(ac.squawk, 7500 | 7600 | 7700);
            let squawk_color = match ac.squawk {
                7500 => RED,
                7600 => YELLOW,
                7700 => RED,
                _ => "",
            };

            let (altitude, speed) = if metric {
                (
                    (ac.altitude as f64 / 3.2808) as i32,
                    (ac.speed as f64 * 1.852) as u16,
                )
            } else {
                (ac.altitude, ac.speed)
            };

            let alt_str = if altitude != 0 {
                format!("{}", altitude)
            } else {
                String::new()
            };

            let speed_str = if speed != 0 {
                format!("{}", speed)
            } else {
                String::new()
            };

            let vrate_str = if let Some(rate) = ac.baro_altitude_rate {
                if rate > 100 {
                    format!("{GREEN}▲{:+}{RESET}", rate)
                } else if rate < -100 {
                    format!("{YELLOW}▼{:+}{RESET}", rate)
                } else {
                    format!("{:+}", rate)
                }
            } else {
                String::new()
            };

            let ias_str = ac
                .indicated_airspeed
                .map(|v| format!("{}", v))
                .unwrap_or_default();

            let mach_str = ac.mach.map(|m| format!("{:.2}", m)).unwrap_or_default();

            if has_position {
                let (dist_str, brg_str) = if ac.lat != 0.0 && ac.lon != 0.0 {
                    let (dist, brg) = calculate_distance_bearing(
                        receiver_lat.unwrap(),
                        receiver_lon.unwrap(),
                        ac.lat,
                        ac.lon,
                    );
                    let dist_val = if metric { dist } else { dist * 0.539957 };
                    let unit = if metric { "km" } else { "nm" };
                    (format!("{:.1}{}", dist_val, unit), format!("{:.0}°", brg))
                } else {
                    (String::new(), String::new())
                };

                let hex_display = if is_emergency {
                    format!("{}{}{}", squawk_color, ac.hex_addr, RESET)
                } else {
                    ac.hex_addr.clone()
                };

                println!(
                    "{:<6} {:<8} {:>7} {:>5} {:>6} {:>5} {:>5} {:>5} {:>4} {:>6} {:>2}s",
                    hex_display,
                    ac.flight,
                    alt_str,
                    speed_str,
                    dist_str,
                    brg_str,
                    vrate_str,
                    ias_str,
                    mach_str,
                    ac.messages,
                    seen_secs
                );
            } else {
                let lat_str = if ac.lat != 0.0 {
                    format!("{:.4}", ac.lat)
                } else {
                    String::new()
                };

                let lon_str = if ac.lon != 0.0 {
                    format!("{:.4}", ac.lon)
                } else {
                    String::new()
                };

                let track_str = if ac.track != 0 {
                    format!("{}", ac.track)
                } else {
                    String::new()
                };

                let hex_display = if is_emergency {
                    format!("{}{}{}", squawk_color, ac.hex_addr, RESET)
                } else {
                    ac.hex_addr.clone()
                };

                println!(
                    "{:<6} {:<8} {:>7} {:>5} {:>9} {:>10} {:>5} {:>5} {:>5} {:>4} {:>6} {:>2}s",
                    hex_display,
                    ac.flight,
                    alt_str,
                    speed_str,
                    lat_str,
                    lon_str,
                    track_str,
                    vrate_str,
                    ias_str,
                    mach_str,
                    ac.messages,
                    seen_secs
                );
            }

            if is_emergency {
                let warning = match ac.squawk {
                    7500 => format!("{RED}  ⚠ HIJACK (7500){RESET}"),
                    7600 => format!("{YELLOW}  ⚠ RADIO FAILURE (7600){RESET}"),
                    7700 => format!("{RED}  ⚠ EMERGENCY (7700){RESET}"),
                    _ => String::new(),
                };
                if !warning.is_empty() {
                    println!("{}", warning);
                }
            }
        }

        println!("{}", "-".repeat(if has_position { 75 } else { 95 }));
        let pos_info = if has_position {
            format!(
                " | Pos: {:.4},{:.4}",
                receiver_lat.unwrap(),
                receiver_lon.unwrap()
            )
        } else {
            String::new()
        };
        println!(
            "Aircraft: {} | {} mode{} | Ctrl+C to exit",
            count,
            if metric { "Metric" } else { "Imperial" },
            pos_info
        );

        io::stdout().flush().ok();
    }
}

/// Calculate distance (km) and bearing (degrees) between two lat/lon points
/// using the Haversine formula.
fn calculate_distance_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    let distance = EARTH_RADIUS_KM * c;

    let y = delta_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();
    let bearing_rad = y.atan2(x);
    let bearing = (bearing_rad.to_degrees() + 360.0) % 360.0;

    (distance, bearing)
}
