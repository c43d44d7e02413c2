use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, tick, Receiver};
use log::*;

use crate::buffer::ChannelBuffer;
use crate::signal::ChannelId;
use crate::{Repaint, ScopeError, SeriesSink};

pub(crate) struct SinkEntry {
    pub label: String,
    pub sink: Box<dyn SeriesSink>,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Batches dispatched to a sink.
    pub batches: usize,
    /// Samples appended across all sinks.
    pub samples: usize,
    /// Whether a redraw was requested.
    pub redraw: bool,
}

/// Drains the buffer on each tick, routes every batch to its channel's
/// sink, and requests at most one redraw per tick.
pub struct Drainer<R: Repaint> {
    buffer: Arc<ChannelBuffer>,
    sinks: HashMap<ChannelId, SinkEntry>,
    repaint: R,
}

impl<R: Repaint> Drainer<R> {
    pub(crate) fn new(
        buffer: Arc<ChannelBuffer>,
        sinks: HashMap<ChannelId, SinkEntry>,
        repaint: R,
    ) -> Drainer<R> {
        Drainer {
            buffer,
            sinks,
            repaint,
        }
    }

    pub fn buffer(&self) -> &Arc<ChannelBuffer> {
        &self.buffer
    }

    /// One Waiting -> Draining -> Dispatching -> Redrawing pass.
    ///
    /// An empty buffer is a no-op and triggers no redraw. A batch whose
    /// channel has no sink, or whose sink fails to append, is logged and
    /// skipped; the remaining batches are still dispatched and the first
    /// error comes back after the tick completes. The drain is bounded:
    /// batches enqueued after it starts wait for the next tick.
    pub fn tick(&mut self) -> Result<DrainReport, ScopeError> {
        let batches = self.buffer.drain_all();
        if batches.is_empty() {
            return Ok(DrainReport::default());
        }

        let mut report = DrainReport::default();
        let mut first_err: Option<ScopeError> = None;

        for batch in batches {
            match self.sinks.get_mut(&batch.channel) {
                Some(entry) => match entry.sink.append(&batch.samples) {
                    Ok(()) => {
                        report.batches += 1;
                        report.samples += batch.samples.len();
                    }
                    Err(cause) => {
                        error!("sink append failed for '{}': {}", entry.label, cause);
                        if first_err.is_none() {
                            first_err = Some(ScopeError::Sink {
                                channel: batch.channel,
                                cause,
                            });
                        }
                    }
                },
                None => {
                    error!("no sink registered for {:?}, dropping batch", batch.channel);
                    if first_err.is_none() {
                        first_err = Some(ScopeError::Routing {
                            channel: batch.channel,
                        });
                    }
                }
            }
        }

        if report.batches > 0 {
            self.repaint.request_redraw();
            report.redraw = true;
        }
        debug!(
            "tick dispatched {} batches / {} samples",
            report.batches, report.samples
        );

        match first_err {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Timer-driven drain loop. Tick failures are logged and never break
    /// the loop; only the shutdown signal (or its sender going away) ends
    /// it.
    pub fn run(&mut self, period: Duration, shutdown: Receiver<()>) {
        let ticker = tick(period);
        debug!("drainer loop starting (period {:?})", period);
        loop {
            select! {
                recv(ticker) -> _ => {
                    if let Err(err) = self.tick() {
                        error!("drain tick failed: {}", err);
                    }
                }
                recv(shutdown) -> _ => break,
            }
        }
        // Final sweep so batches produced just before shutdown still land.
        if let Err(err) = self.tick() {
            error!("final drain failed: {}", err);
        }
        debug!("drainer loop exiting");
    }
}
