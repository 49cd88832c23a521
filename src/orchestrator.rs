//! Wires the reader, demodulator, aircraft roster, frame log and cleanup
//! tasks together and owns the shutdown signal.
//!
//! This replaces ad hoc task spawning in `main` with a single place that
//! knows what background work exists and how to stop it: a cancellation
//! flag shared via `Arc<AtomicBool>`, polled by each task's loop, rather
//! than aborting tokio task handles from the outside.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::RwLock;
use tracing::info;

use crate::aircraft::AircraftStore;
use crate::config::Config;
use crate::correlator;
use crate::decoder::ModesMessage;
use crate::demodulator::{DemodStats, Demodulator};
use crate::framelog::FrameLog;

const FRAME_LOG_CAPACITY: usize = 4096;

/// Shared state handed to every background task.
pub struct Orchestrator {
    pub config: Config,
    pub aircraft: Arc<RwLock<AircraftStore>>,
    pub frame_log: Arc<FrameLog>,
    pub shutdown: Arc<AtomicBool>,
    msg_tx: Sender<ModesMessage>,
    msg_rx: Receiver<ModesMessage>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        let mut store = AircraftStore::with_min_messages(config.interactive_ttl, config.min_messages);
        if let (Some(lat), Some(lon)) = (config.receiver_lat, config.receiver_lon) {
            store.set_receiver_position(lat, lon);
        }

        let (msg_tx, msg_rx) = bounded(1024);
        // §5: the frame log must be purged before (or alongside) the
        // aircraft it points at, so it shares the roster's TTL exactly.
        let frame_log_ttl = Duration::from_secs(config.interactive_ttl);

        Self {
            aircraft: Arc::new(RwLock::new(store)),
            frame_log: Arc::new(FrameLog::new(FRAME_LOG_CAPACITY, frame_log_ttl)),
            shutdown: Arc::new(AtomicBool::new(false)),
            msg_tx,
            msg_rx,
            config,
        }
    }

    pub fn message_sender(&self) -> Sender<ModesMessage> {
        self.msg_tx.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Drain decoded messages into the roster and frame log until the
    /// channel closes or shutdown is requested. Returns whether each
    /// message passed CRC (for the caller's own display/stats use).
    pub async fn run_message_processor(&self, on_message: impl Fn(&ModesMessage, bool)) {
        loop {
            if self.is_shutting_down() {
                break;
            }
            match self.msg_rx.try_recv() {
                Ok(msg) => {
                    let accepted = msg.crc_ok || !self.config.check_crc;
                    if accepted {
                        // §4.10/§7: uncorrectable CRC failures never enter
                        // the frame log, only the roster update is gated on
                        // `check_crc`'s laxer "accepted" definition.
                        if msg.crc_ok {
                            self.frame_log.record(&msg);
                        }
                        self.aircraft.write().update_from_message(&msg);
                    }
                    on_message(&msg, accepted);
                }
                Err(crossbeam_channel::TryRecvError::Empty) => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                Err(crossbeam_channel::TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Periodically evict stale aircraft and frame-log entries, and run
    /// Mode S / Mode A-C correlation (§4.9 — invoked from the periodic tick,
    /// not from message receipt).
    pub async fn run_cleanup_task(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            if self.is_shutting_down() {
                break;
            }
            interval.tick().await;
            self.aircraft.write().remove_stale();
            self.frame_log.try_evict_expired();
            correlator::correlate(&mut self.aircraft.write());
        }
    }

    /// Run Mode S/Mode A-C squawk+altitude correlation once and log what was
    /// found (used for the final `--stats` report on shutdown).
    pub fn log_correlations(&self) {
        let hits = correlator::correlate(&mut self.aircraft.write());
        for hit in hits {
            info!(
                "correlated {:06X} <-> synthetic {:06X}: {:?}",
                hit.modes_addr, hit.synthetic_addr, hit.kind
            );
        }
    }

    pub fn print_stats(&self, demod: &DemodStats) {
        println!(
            "preambles={} good={} bad_crc={} fixed1={} fixed2={} phase_fixed={} mode_ac={} tracked_aircraft={}",
            demod.valid_preambles,
            demod.good_messages,
            demod.bad_crc,
            demod.fixed_single_bit,
            demod.fixed_two_bit,
            demod.phase_corrected,
            demod.mode_ac_messages,
            self.aircraft.read().len_total(),
        );
    }

    pub fn new_demodulator(&self) -> Demodulator {
        Demodulator::new(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::synthetic_mode_ac_message;

    fn test_config() -> Config {
        Config::from_args_for_test()
    }

    impl Config {
        // Test-only constructor bypassing `clap::Parser`'s process-args
        // entrypoint; exercising CLI parsing itself lives in config.rs.
        fn from_args_for_test() -> Self {
            use clap::Parser;
            Config::parse_from(["modes-radar"])
        }
    }

    #[tokio::test]
    async fn test_message_processor_updates_roster() {
        let orch = Orchestrator::new(test_config());
        let tx = orch.message_sender();
        tx.send(synthetic_mode_ac_message(7700, Some(35000), false, false, 1000))
            .unwrap();
        drop(tx);

        orch.run_message_processor(|_, _| {}).await;

        assert_eq!(orch.aircraft.read().len_total(), 1);
    }

    #[test]
    fn test_shutdown_flag_roundtrip() {
        let orch = Orchestrator::new(test_config());
        assert!(!orch.is_shutting_down());
        orch.request_shutdown();
        assert!(orch.is_shutting_down());
    }
}
