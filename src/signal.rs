use std::f64::consts::PI;

/// One measurement: `t` is the producer's logical clock in seconds,
/// not wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub t: f64,
    pub value: f64,
}

/// Identifier assigned to a channel when it is registered with the
/// `ScopeBuilder`. Batches carry the id instead of the label so routing
/// never touches strings after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u32);

/// One labeled, chronologically ordered group of samples produced in a
/// single producer cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub channel: ChannelId,
    pub samples: Vec<Sample>,
}

/// A per-channel generator function. Must return a finite value in
/// bounded time; no blocking, no I/O. `&mut self` so stochastic
/// generators can keep PRNG state.
pub trait Signal: Send {
    fn value_at(&mut self, t: f64) -> f64;
}

impl<F> Signal for F
where
    F: FnMut(f64) -> f64 + Send,
{
    fn value_at(&mut self, t: f64) -> f64 {
        self(t)
    }
}

/// Plain sine generator: `amplitude * sin(2π * freq_hz * t) + offset`.
#[derive(Debug, Clone, Copy)]
pub struct Sine {
    pub amplitude: f64,
    pub freq_hz: f64,
    pub offset: f64,
}

impl Signal for Sine {
    fn value_at(&mut self, t: f64) -> f64 {
        self.amplitude * (2.0 * PI * self.freq_hz * t).sin() + self.offset
    }
}

/// Sine with additive uniform noise in `[0, noise_amplitude)`.
///
/// Noise comes from an xorshift64* generator seeded at construction, so a
/// fixed seed gives a reproducible stream.
#[derive(Debug, Clone, Copy)]
pub struct NoisySine {
    pub base: Sine,
    pub noise_amplitude: f64,
    state: u64,
}

impl NoisySine {
    pub fn new(base: Sine, noise_amplitude: f64, seed: u64) -> NoisySine {
        NoisySine {
            base,
            noise_amplitude,
            // xorshift state must be non-zero
            state: seed.max(1),
        }
    }

    fn next_unit(&mut self) -> f64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        let r = self.state.wrapping_mul(0x2545_f491_4f6c_dd1d);
        (r >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl Signal for NoisySine {
    fn value_at(&mut self, t: f64) -> f64 {
        self.base.value_at(t) + self.noise_amplitude * self.next_unit()
    }
}

/// Synthesizes one time-slice of samples for every registered channel.
///
/// Pure over the logical clock: the caller passes `t` in and gets the
/// advanced clock back, so the producer owns the clock state.
pub struct SampleSource {
    sample_interval: f64,
    slice_duration: f64,
    channels: Vec<(ChannelId, Box<dyn Signal>)>,
}

impl SampleSource {
    pub fn new(
        sample_interval: f64,
        slice_duration: f64,
        channels: Vec<(ChannelId, Box<dyn Signal>)>,
    ) -> SampleSource {
        SampleSource {
            sample_interval,
            slice_duration,
            channels,
        }
    }

    /// Number of samples per channel in one slice: `floor(dt/ts)`.
    pub fn samples_per_slice(&self) -> usize {
        (self.slice_duration / self.sample_interval).floor() as usize
    }

    /// Produce one batch per channel covering `[t, t + count*ts)` and
    /// return the advanced logical clock `t + count*ts`.
    pub fn next_slice(&mut self, t: f64) -> (Vec<Batch>, f64) {
        let count = self.samples_per_slice();
        let ts = self.sample_interval;

        let mut batches = Vec::with_capacity(self.channels.len());
        for (id, signal) in self.channels.iter_mut() {
            let mut samples = Vec::with_capacity(count);
            for i in 0..count {
                let st = t + i as f64 * ts;
                samples.push(Sample {
                    t: st,
                    value: signal.value_at(st),
                });
            }
            batches.push(Batch {
                channel: *id,
                samples,
            });
        }

        (batches, t + count as f64 * ts)
    }
}
