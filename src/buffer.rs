use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::*;

use crate::signal::Batch;

/// What `enqueue` does when the buffer is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Block the producer until the drainer makes room.
    Block,
    /// Evict the oldest queued batch to make room for the new one.
    DropOldest,
    /// Discard the incoming batch.
    DropNewest,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = failure::Error;

    fn from_str(s: &str) -> Result<OverflowPolicy, Self::Err> {
        match s {
            "block" => Ok(OverflowPolicy::Block),
            "drop-oldest" => Ok(OverflowPolicy::DropOldest),
            "drop-newest" => Ok(OverflowPolicy::DropNewest),
            other => Err(failure::format_err!(
                "unknown overflow policy '{}' (expected block, drop-oldest or drop-newest)",
                other
            )),
        }
    }
}

/// Bounded FIFO of batches, the sole hand-off point between the producer
/// thread and the drainer. One writer, one reader; batches come out in
/// enqueue order and are never split or merged.
pub struct ChannelBuffer {
    tx: Sender<Batch>,
    rx: Receiver<Batch>,
    policy: OverflowPolicy,
    dropped: AtomicU64,
}

impl ChannelBuffer {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> ChannelBuffer {
        let (tx, rx) = bounded(capacity);
        ChannelBuffer {
            tx,
            rx,
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    /// Append a batch at the tail. Only the `Block` policy can suspend the
    /// caller; the drop policies resolve overflow immediately and count the
    /// casualty.
    pub fn enqueue(&self, batch: Batch) {
        match self.policy {
            OverflowPolicy::Block => {
                // Both ends live in self, so the channel cannot disconnect.
                let _ = self.tx.send(batch);
            }
            OverflowPolicy::DropNewest => {
                if let Err(TrySendError::Full(b)) = self.tx.try_send(batch) {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!("buffer full, dropping incoming batch for {:?}", b.channel);
                }
            }
            OverflowPolicy::DropOldest => {
                let mut batch = batch;
                loop {
                    match self.tx.try_send(batch) {
                        Ok(()) => break,
                        Err(TrySendError::Full(b)) => {
                            if self.rx.try_recv().is_ok() {
                                self.dropped.fetch_add(1, Ordering::Relaxed);
                                warn!("buffer full, evicted oldest batch");
                            }
                            batch = b;
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
            }
        }
    }

    /// Remove and return every batch present when the call starts, in
    /// enqueue order. Never blocks: an empty buffer yields an empty vec,
    /// and batches enqueued while draining wait for the next call.
    pub fn drain_all(&self) -> Vec<Batch> {
        let present = self.rx.len();
        let mut batches = Vec::with_capacity(present);
        for _ in 0..present {
            match self.rx.try_recv() {
                Ok(batch) => batches.push(batch),
                Err(_) => break,
            }
        }
        trace!("drained {} batches", batches.len());
        batches
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Batches discarded by a drop policy since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{ChannelId, Sample};

    fn batch(seq: u32) -> Batch {
        Batch {
            channel: ChannelId(0),
            samples: vec![Sample {
                t: seq as f64,
                value: 0.0,
            }],
        }
    }

    fn seq_of(b: &Batch) -> u32 {
        b.samples[0].t as u32
    }

    #[test]
    fn drain_preserves_enqueue_order_across_drains() {
        let buf = ChannelBuffer::new(16, OverflowPolicy::Block);
        for i in 0..3 {
            buf.enqueue(batch(i));
        }
        let first: Vec<u32> = buf.drain_all().iter().map(seq_of).collect();
        assert_eq!(first, vec![0, 1, 2]);

        buf.enqueue(batch(3));
        buf.enqueue(batch(4));
        let second: Vec<u32> = buf.drain_all().iter().map(seq_of).collect();
        assert_eq!(second, vec![3, 4]);
    }

    #[test]
    fn drain_of_empty_buffer_is_empty_and_idempotent() {
        let buf = ChannelBuffer::new(4, OverflowPolicy::Block);
        assert!(buf.drain_all().is_empty());

        buf.enqueue(batch(0));
        assert_eq!(buf.drain_all().len(), 1);
        assert!(buf.is_empty());
        assert!(buf.drain_all().is_empty());
    }

    #[test]
    fn drop_oldest_keeps_newest_batches() {
        let buf = ChannelBuffer::new(2, OverflowPolicy::DropOldest);
        for i in 0..5 {
            buf.enqueue(batch(i));
        }
        let kept: Vec<u32> = buf.drain_all().iter().map(seq_of).collect();
        assert_eq!(kept, vec![3, 4]);
        assert_eq!(buf.dropped(), 3);
    }

    #[test]
    fn drop_newest_keeps_oldest_batches() {
        let buf = ChannelBuffer::new(2, OverflowPolicy::DropNewest);
        for i in 0..5 {
            buf.enqueue(batch(i));
        }
        let kept: Vec<u32> = buf.drain_all().iter().map(seq_of).collect();
        assert_eq!(kept, vec![0, 1]);
        assert_eq!(buf.dropped(), 3);
    }

    #[test]
    fn concurrent_enqueue_and_drain_loses_nothing() {
        let buf = ChannelBuffer::new(8, OverflowPolicy::Block);
        let total = 200u32;

        crossbeam::thread::scope(|scope| {
            scope.spawn(|_| {
                for i in 0..total {
                    buf.enqueue(batch(i));
                }
            });

            let mut seen: Vec<u32> = Vec::with_capacity(total as usize);
            while seen.len() < total as usize {
                seen.extend(buf.drain_all().iter().map(seq_of));
            }
            let expected: Vec<u32> = (0..total).collect();
            assert_eq!(seen, expected);
        })
        .unwrap();

        assert!(buf.is_empty());
        assert_eq!(buf.dropped(), 0);
    }
}
