use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use failure::{format_err, Error};
use log::*;

use crate::buffer::ChannelBuffer;
use crate::signal::SampleSource;

/// Generates one time-slice per cycle and enqueues one batch per channel,
/// then sleeps `slice` wall-clock time. The logical clock it stamps into
/// samples advances by `count * ts` per cycle and is independent of the
/// wall-clock pacing.
pub struct Producer {
    source: SampleSource,
    buffer: Arc<ChannelBuffer>,
    slice: Duration,
    t: f64,
}

impl Producer {
    pub fn new(source: SampleSource, buffer: Arc<ChannelBuffer>, slice: Duration) -> Producer {
        Producer {
            source,
            buffer,
            slice,
            t: 0.0,
        }
    }

    pub fn buffer(&self) -> &Arc<ChannelBuffer> {
        &self.buffer
    }

    /// One Generating -> Enqueuing step, without the sleep. The spawned
    /// loop calls this; tests call it directly to drive the pipeline
    /// without threads or wall-clock time.
    pub fn cycle(&mut self) {
        let (batches, next_t) = self.source.next_slice(self.t);
        trace!(
            "produced slice t={:.6}..{:.6} ({} channels)",
            self.t,
            next_t,
            batches.len()
        );
        for batch in batches {
            self.buffer.enqueue(batch);
        }
        self.t = next_t;
    }

    /// Move the producer onto its own named thread. The returned handle
    /// owns the thread; dropping it without calling `stop` detaches the
    /// loop, `stop` shuts it down deterministically.
    pub fn spawn(self) -> Result<ProducerHandle, Error> {
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let mut this = self;
        let thread = thread::Builder::new()
            .name("softscope-producer".to_string())
            .spawn(move || {
                debug!("producer loop starting (slice {:?})", this.slice);
                loop {
                    this.cycle();
                    // The stop channel doubles as a cancellable sleep.
                    match stop_rx.recv_timeout(this.slice) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
                debug!("producer loop exiting");
            })?;

        Ok(ProducerHandle { stop_tx, thread })
    }
}

/// Owned handle to the background producer thread.
pub struct ProducerHandle {
    stop_tx: Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl ProducerHandle {
    /// Signal the loop to exit and wait for it to finish. Batches already
    /// enqueued stay in the buffer for the drainer.
    pub fn stop(self) -> Result<(), Error> {
        drop(self.stop_tx);
        self.thread
            .join()
            .map_err(|_| format_err!("producer thread panicked"))
    }
}
