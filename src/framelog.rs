//! Time-ordered log of recently decoded frames, keyed back to the aircraft
//! roster by ICAO/synthetic address rather than owning a copy of it.
//!
//! Kept behind a `parking_lot::Mutex` like the rest of the crate's shared
//! state; eviction runs on a best-effort `try_lock` so a producer never
//! blocks waiting for a reader to finish draining the log.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::decoder::{MODES_LONG_MSG_BYTES, ModesMessage};

#[derive(Debug, Clone)]
pub struct FrameEntry {
    pub addr: u32,
    pub msg_type: u8,
    pub crc_ok: bool,
    pub signal_level: u16,
    /// Full raw 14-byte payload as received, zero-padded past `msg_bits`.
    pub raw: [u8; MODES_LONG_MSG_BYTES],
    /// 12 MHz tick timestamp of the frame's first sample (§3, §4.3).
    pub tick_timestamp: u64,
    pub at: Instant,
}

impl FrameEntry {
    fn from_message(mm: &ModesMessage) -> Self {
        Self {
            addr: mm.icao_address(),
            msg_type: mm.msg_type,
            crc_ok: mm.crc_ok,
            signal_level: mm.signal_level,
            raw: mm.msg,
            tick_timestamp: mm.tick_timestamp,
            at: Instant::now(),
        }
    }
}

struct FrameLogState {
    entries: VecDeque<FrameEntry>,
    capacity: usize,
    ttl: Duration,
}

/// Mutex-protected ring of recent frame metadata, for tools that want a raw
/// activity feed (e.g. an interactive "last N messages" view) independent of
/// the aggregated per-aircraft roster.
pub struct FrameLog {
    state: Mutex<FrameLogState>,
}

impl FrameLog {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(FrameLogState {
                entries: VecDeque::with_capacity(capacity),
                capacity,
                ttl,
            }),
        }
    }

    pub fn record(&self, mm: &ModesMessage) {
        let mut st = self.state.lock();
        if st.entries.len() >= st.capacity {
            st.entries.pop_front();
        }
        st.entries.push_back(FrameEntry::from_message(mm));
    }

    /// Drop expired entries if the lock is immediately available; skips
    /// silently under contention rather than blocking the caller.
    pub fn try_evict_expired(&self) {
        let Some(mut st) = self.state.try_lock() else {
            return;
        };
        let ttl = st.ttl;
        let now = Instant::now();
        while let Some(front) = st.entries.front() {
            if now.duration_since(front.at) > ttl {
                st.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn snapshot(&self) -> Vec<FrameEntry> {
        self.state.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ModesMessage;

    fn msg(addr: u32) -> ModesMessage {
        let mut mm = ModesMessage::default();
        mm.aa = [
            ((addr >> 16) & 0xFF) as u8,
            ((addr >> 8) & 0xFF) as u8,
            (addr & 0xFF) as u8,
        ];
        mm
    }

    #[test]
    fn test_record_and_snapshot() {
        let log = FrameLog::new(4, Duration::from_secs(60));
        log.record(&msg(0x100));
        log.record(&msg(0x200));

        let snap = log.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].addr, 0x100);
        assert_eq!(snap[1].addr, 0x200);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = FrameLog::new(2, Duration::from_secs(60));
        log.record(&msg(0x1));
        log.record(&msg(0x2));
        log.record(&msg(0x3));

        let snap = log.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].addr, 0x2);
        assert_eq!(snap[1].addr, 0x3);
    }

    #[test]
    fn test_try_evict_expired_removes_old_entries() {
        let log = FrameLog::new(10, Duration::from_millis(1));
        log.record(&msg(0x1));
        std::thread::sleep(Duration::from_millis(20));
        log.try_evict_expired();
        assert!(log.is_empty());
    }
}
