pub mod buffer;
pub mod config;
pub mod drainer;
pub mod producer;
pub mod signal;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use failure::Fail;

pub use crate::buffer::{ChannelBuffer, OverflowPolicy};
pub use crate::config::ScopeConfig;
pub use crate::drainer::{DrainReport, Drainer};
pub use crate::producer::{Producer, ProducerHandle};
pub use crate::signal::{Batch, ChannelId, NoisySine, Sample, SampleSource, Signal, Sine};

use crate::drainer::SinkEntry;

/// Append-only receiver for one channel's samples. The sink owns its own
/// representation; it must treat an empty slice as a no-op, preserve
/// order, and return quickly so it never stalls the drainer.
pub trait SeriesSink: Send {
    fn append(&mut self, samples: &[Sample]) -> Result<(), failure::Error>;
}

/// Redraw request hook into the presentation layer. Fire-and-forget and
/// idempotent between renders.
pub trait Repaint {
    fn request_redraw(&self);
}

impl<F> Repaint for F
where
    F: Fn(),
{
    fn request_redraw(&self) {
        self()
    }
}

#[derive(Debug, Fail)]
pub enum ScopeError {
    /// Invalid startup configuration; the pipeline never starts.
    #[fail(display = "invalid configuration: {}", reason)]
    Config { reason: String },
    /// A drained batch had no registered sink. This means producer and
    /// drainer were wired from different registries.
    #[fail(display = "no sink registered for channel {:?}", channel)]
    Routing { channel: ChannelId },
    /// A sink rejected an append.
    #[fail(display = "sink append failed for channel {:?}: {}", channel, cause)]
    Sink {
        channel: ChannelId,
        cause: failure::Error,
    },
}

/// Startup wiring for the pipeline: registers channels (label, generator,
/// sink), validates the configuration, and hands back the two halves.
///
/// Labels are resolved to `ChannelId`s here, exactly once; after `build`
/// every id the producer can emit has a matching sink.
pub struct ScopeBuilder {
    config: ScopeConfig,
    channels: Vec<(String, Box<dyn Signal>, Box<dyn SeriesSink>)>,
}

impl ScopeBuilder {
    pub fn new(config: ScopeConfig) -> ScopeBuilder {
        ScopeBuilder {
            config,
            channels: Vec::new(),
        }
    }

    pub fn channel<S: Into<String>>(
        mut self,
        label: S,
        signal: Box<dyn Signal>,
        sink: Box<dyn SeriesSink>,
    ) -> ScopeBuilder {
        self.channels.push((label.into(), signal, sink));
        self
    }

    pub fn build<R: Repaint>(self, repaint: R) -> Result<(Producer, Drainer<R>), ScopeError> {
        self.config.validate()?;
        if self.channels.is_empty() {
            return Err(ScopeError::Config {
                reason: "at least one channel must be registered".to_string(),
            });
        }
        for (i, (label, _, _)) in self.channels.iter().enumerate() {
            if self.channels[..i].iter().any(|(l, _, _)| l == label) {
                return Err(ScopeError::Config {
                    reason: format!("duplicate channel label '{}'", label),
                });
            }
        }

        let buffer = Arc::new(ChannelBuffer::new(
            self.config.buffer_capacity,
            self.config.overflow,
        ));

        let mut generators = Vec::with_capacity(self.channels.len());
        let mut sinks = HashMap::with_capacity(self.channels.len());
        for (i, (label, signal, sink)) in self.channels.into_iter().enumerate() {
            let id = ChannelId(i as u32);
            generators.push((id, signal));
            sinks.insert(id, SinkEntry { label, sink });
        }

        let source = SampleSource::new(
            self.config.sample_interval,
            self.config.slice_duration,
            generators,
        );
        let producer = Producer::new(
            source,
            buffer.clone(),
            Duration::from_secs_f64(self.config.slice_duration),
        );
        let drainer = Drainer::new(buffer, sinks, repaint);

        Ok((producer, drainer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;

    impl SeriesSink for NullSink {
        fn append(&mut self, _samples: &[Sample]) -> Result<(), failure::Error> {
            Ok(())
        }
    }

    fn is_config_err(res: Result<(Producer, Drainer<fn()>), ScopeError>) -> bool {
        match res {
            Err(ScopeError::Config { .. }) => true,
            _ => false,
        }
    }

    fn noop() {}

    #[test]
    fn build_rejects_empty_channel_set() {
        let res = ScopeBuilder::new(ScopeConfig::default()).build(noop as fn());
        assert!(is_config_err(res));
    }

    #[test]
    fn build_rejects_duplicate_labels() {
        let res = ScopeBuilder::new(ScopeConfig::default())
            .channel("C1", Box::new(|_t: f64| 0.0), Box::new(NullSink))
            .channel("C1", Box::new(|_t: f64| 1.0), Box::new(NullSink))
            .build(noop as fn());
        assert!(is_config_err(res));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let mut config = ScopeConfig::default();
        config.sample_interval = -1.0;
        let res = ScopeBuilder::new(config)
            .channel("C1", Box::new(|_t: f64| 0.0), Box::new(NullSink))
            .build(noop as fn());
        assert!(is_config_err(res));
    }

    #[test]
    fn build_assigns_sequential_channel_ids() {
        let (mut producer, mut drainer) = ScopeBuilder::new(ScopeConfig::default())
            .channel("C1", Box::new(|_t: f64| 0.0), Box::new(NullSink))
            .channel("C2", Box::new(|_t: f64| 1.0), Box::new(NullSink))
            .build(noop as fn())
            .unwrap();

        producer.cycle();
        let batches = drainer.buffer().drain_all();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].channel, ChannelId(0));
        assert_eq!(batches[1].channel, ChannelId(1));
        // buffer already drained by hand, so the tick sees nothing
        assert_eq!(drainer.tick().unwrap().batches, 0);
    }
}
