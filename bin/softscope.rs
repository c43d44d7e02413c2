use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::bounded;
use failure::Error;
use log::*;
use structopt::StructOpt;

use softscope::{
    NoisySine, OverflowPolicy, Sample, ScopeBuilder, ScopeConfig, SeriesSink, Sine,
};

#[derive(StructOpt)]
#[structopt(name = "softscope", about = "two-channel synthetic signal streamer")]
struct Cli {
    /// Logical sampling interval ts in seconds
    #[structopt(long, default_value = "0.0001")]
    sample_interval: f64,

    /// Time-slice duration dt in seconds (also the producer pacing)
    #[structopt(long, default_value = "0.2")]
    slice_duration: f64,

    /// Drain tick period in milliseconds
    #[structopt(long, default_value = "50")]
    tick_ms: u64,

    /// Buffer capacity in batches
    #[structopt(long, default_value = "64")]
    capacity: usize,

    /// Overflow policy: block, drop-oldest or drop-newest
    #[structopt(long, default_value = "drop-oldest")]
    overflow: OverflowPolicy,

    /// How long to stream before shutting down, in seconds
    #[structopt(long, default_value = "5")]
    run_secs: u64,
}

/// Stand-in for a chart series: counts what it is handed and remembers
/// how far the logical clock got.
struct StatsSink {
    label: &'static str,
    samples: Arc<AtomicU64>,
    last_t: f64,
}

impl SeriesSink for StatsSink {
    fn append(&mut self, samples: &[Sample]) -> Result<(), Error> {
        if samples.is_empty() {
            return Ok(());
        }
        self.samples
            .fetch_add(samples.len() as u64, Ordering::Relaxed);
        self.last_t = samples[samples.len() - 1].t;
        trace!(
            "{}: +{} samples, logical clock at {:.4}s",
            self.label,
            samples.len(),
            self.last_t
        );
        Ok(())
    }
}

fn main() -> Result<(), Error> {
    pretty_env_logger::init();
    let args = Cli::from_args();

    let config = ScopeConfig {
        sample_interval: args.sample_interval,
        slice_duration: args.slice_duration,
        tick_period: Duration::from_millis(args.tick_ms),
        buffer_capacity: args.capacity,
        overflow: args.overflow,
    };

    let c1_samples = Arc::new(AtomicU64::new(0));
    let c2_samples = Arc::new(AtomicU64::new(0));
    let redraws = Arc::new(AtomicU64::new(0));

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(1);

    let repaint = {
        let redraws = redraws.clone();
        move || {
            redraws.fetch_add(1, Ordering::Relaxed);
            trace!("redraw requested");
        }
    };

    let (producer, mut drainer) = ScopeBuilder::new(config)
        .channel(
            "C1",
            Box::new(Sine {
                amplitude: 4.0,
                freq_hz: 400.0,
                offset: -2.0,
            }),
            Box::new(StatsSink {
                label: "C1",
                samples: c1_samples.clone(),
                last_t: 0.0,
            }),
        )
        .channel(
            "C2",
            Box::new(NoisySine::new(
                Sine {
                    amplitude: 6.0,
                    freq_hz: 3.0,
                    offset: 5.0,
                },
                0.1,
                seed,
            )),
            Box::new(StatsSink {
                label: "C2",
                samples: c2_samples.clone(),
                last_t: 0.0,
            }),
        )
        .build(repaint)?;

    info!(
        "streaming 2 channels for {}s (ts={}s, dt={}s, tick={}ms)",
        args.run_secs, args.sample_interval, args.slice_duration, args.tick_ms
    );

    let handle = producer.spawn()?;

    // The shutdown sender dropping is enough to stop the drain loop.
    let (stop_tx, stop_rx) = bounded::<()>(0);
    let run_secs = args.run_secs;
    let timer = thread::spawn(move || {
        thread::sleep(Duration::from_secs(run_secs));
        drop(stop_tx);
    });

    drainer.run(config.tick_period, stop_rx);

    let _ = timer.join();
    handle.stop()?;

    println!("C1 samples: {}", c1_samples.load(Ordering::Relaxed));
    println!("C2 samples: {}", c2_samples.load(Ordering::Relaxed));
    println!("redraws:    {}", redraws.load(Ordering::Relaxed));
    println!("dropped:    {}", drainer.buffer().dropped());

    Ok(())
}
