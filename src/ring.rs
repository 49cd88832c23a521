//! Fixed-capacity sample ring buffer between the reader and decoder threads.
//!
//! Blocks are transferred by ownership (moved into and out of the ring), not
//! copied. When the decoder falls behind and the ring fills, the oldest
//! unread block is dropped to make room for the newest one, and the drop is
//! counted so the consumer can compensate its timing rather than silently
//! drift behind real time.

use parking_lot::{Condvar, Mutex};

/// Number of slots in the ring. Must be a power of two.
const RING_SLOTS: usize = 16;

struct RingState {
    slots: [Option<Vec<u8>>; RING_SLOTS],
    i_data_in: u64,
    i_data_out: u64,
    i_data_lost: u64,
    closed: bool,
}

impl RingState {
    fn ready(&self) -> u64 {
        self.i_data_in - self.i_data_out
    }
}

/// A block handed to the consumer, along with how many earlier blocks were
/// dropped before it arrived (for tick-timestamp compensation).
pub struct RingRecv {
    pub block: Vec<u8>,
    pub blocks_lost: u64,
}

/// Single-producer single-consumer ring of owned sample blocks.
pub struct SampleRing {
    state: Mutex<RingState>,
    not_empty: Condvar,
}

impl SampleRing {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RingState {
                slots: std::array::from_fn(|_| None),
                i_data_in: 0,
                i_data_out: 0,
                i_data_lost: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Push a block, ownership moves into the ring. If the ring is full the
    /// oldest unread slot is dropped and `i_data_lost` is incremented.
    pub fn push(&self, block: Vec<u8>) {
        let mut st = self.state.lock();
        if st.ready() as usize == RING_SLOTS {
            let drop_idx = (st.i_data_out % RING_SLOTS as u64) as usize;
            st.slots[drop_idx] = None;
            st.i_data_out += 1;
            st.i_data_lost += 1;
        }
        let idx = (st.i_data_in % RING_SLOTS as u64) as usize;
        st.slots[idx] = Some(block);
        st.i_data_in += 1;
        self.not_empty.notify_one();
    }

    /// Block until a sample block is available or the ring is closed.
    /// Returns `None` once closed and drained.
    pub fn pop_blocking(&self) -> Option<RingRecv> {
        let mut st = self.state.lock();
        loop {
            if st.ready() > 0 {
                let idx = (st.i_data_out % RING_SLOTS as u64) as usize;
                let block = st.slots[idx].take().expect("ready slot must be occupied");
                let blocks_lost = st.i_data_lost;
                st.i_data_lost = 0;
                st.i_data_out += 1;
                return Some(RingRecv { block, blocks_lost });
            }
            if st.closed {
                return None;
            }
            self.not_empty.wait(&mut st);
        }
    }

    /// Signal the consumer to stop waiting once the ring drains.
    pub fn close(&self) {
        let mut st = self.state.lock();
        st.closed = true;
        self.not_empty.notify_all();
    }

    pub fn blocks_dropped(&self) -> u64 {
        self.state.lock().i_data_lost
    }
}

impl Default for SampleRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Tick timestamp advance owed to the consumer for each block the ring
/// silently dropped, expressed in sample units, per the producer's block size.
pub fn tick_compensation(blocks_lost: u64, samples_per_block: u64) -> u64 {
    blocks_lost * samples_per_block * 6
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_pop_preserves_order() {
        let ring = SampleRing::new();
        ring.push(vec![1, 2, 3]);
        ring.push(vec![4, 5, 6]);

        let first = ring.pop_blocking().unwrap();
        assert_eq!(first.block, vec![1, 2, 3]);
        assert_eq!(first.blocks_lost, 0);

        let second = ring.pop_blocking().unwrap();
        assert_eq!(second.block, vec![4, 5, 6]);
    }

    #[test]
    fn test_overflow_drops_oldest_and_counts_loss() {
        let ring = SampleRing::new();
        for i in 0..RING_SLOTS + 3 {
            ring.push(vec![i as u8]);
        }

        // The oldest 3 slots (0, 1, 2) were evicted.
        let recv = ring.pop_blocking().unwrap();
        assert_eq!(recv.block, vec![3u8]);
        assert_eq!(recv.blocks_lost, 3);
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let ring = Arc::new(SampleRing::new());
        let reader = Arc::clone(&ring);
        let handle = thread::spawn(move || reader.pop_blocking());

        thread::sleep(std::time::Duration::from_millis(20));
        ring.close();

        assert!(handle.join().unwrap().is_none());
    }

    #[test]
    fn test_tick_compensation() {
        assert_eq!(tick_compensation(2, 100), 1200);
        assert_eq!(tick_compensation(0, 100), 0);
    }
}
