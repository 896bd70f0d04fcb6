//! Run-length level sequences to dense digital sample buffers.
//!
//! A timing sequence such as
//!
//! ```text
//! mask  duration
//! 0b10  3s
//! 0b01  2s
//! 0b10  4s
//! ```
//!
//! sampled at 1 Hz becomes the wave `[2, 2, 2, 1, 1, 2, 2, 2, 2]`:
//!
//! ```text
//! bit1: ‾‾‾__‾‾‾‾
//! bit0: ___‾‾____
//!       0  3 5   9  s
//! ```

use std::fmt;

use polars::prelude::*;

use crate::level_run::LevelRun;

const TIME_COLUMN_NAME: &str = "time";
const LANE_MASK: u64 = 0xFF;

/// Storage element of one output lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    U8,
    U16,
}

impl SampleWidth {
    /// Narrowest width able to hold `bit_num` lines.
    pub fn for_bit_num(bit_num: u32) -> Self {
        if bit_num <= 8 {
            SampleWidth::U8
        } else {
            SampleWidth::U16
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            SampleWidth::U8 => 8,
            SampleWidth::U16 => 16,
        }
    }

    pub fn max_value(&self) -> u64 {
        match self {
            SampleWidth::U8 => u64::from(u8::MAX),
            SampleWidth::U16 => u64::from(u16::MAX),
        }
    }
}

impl fmt::Display for SampleWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleWidth::U8 => write!(f, "u8"),
            SampleWidth::U16 => write!(f, "u16"),
        }
    }
}

/// What to do with runs that cannot produce any samples.
///
/// A zero or negative sample rate makes every run degenerate, so it follows
/// the same policy. NaN and infinite rates or durations are always errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegenerateRunPolicy {
    /// Non-positive durations and rates, and runs rounding to zero samples,
    /// are errors.
    #[default]
    Reject,
    /// Such runs contribute zero samples. A non-positive rate yields an
    /// empty wave.
    Drop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveConfig {
    pub bit_num: u32,
    pub n_channel: usize,
    pub sample_width: SampleWidth,
    pub degenerate_runs: DegenerateRunPolicy,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self::new(8)
    }
}

impl WaveConfig {
    /// Single-lane config whose sample width is derived from `bit_num`.
    pub fn new(bit_num: u32) -> Self {
        Self {
            bit_num,
            n_channel: 1,
            sample_width: SampleWidth::for_bit_num(bit_num),
            degenerate_runs: DegenerateRunPolicy::default(),
        }
    }

    pub fn with_channels(mut self, n_channel: usize) -> Self {
        self.n_channel = n_channel;
        self
    }

    pub fn with_sample_width(mut self, sample_width: SampleWidth) -> Self {
        self.sample_width = sample_width;
        self
    }

    pub fn with_degenerate_runs(mut self, policy: DegenerateRunPolicy) -> Self {
        self.degenerate_runs = policy;
        self
    }

    fn validate(&self) -> Result<(), TimingWaveError> {
        if self.bit_num == 0 {
            return Err(TimingWaveError::InvalidBitNum);
        }
        if self.n_channel == 0 {
            return Err(TimingWaveError::InvalidChannelCount);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TimingWaveError {
    #[error("Timing sequence is empty")]
    EmptySequence,

    #[error("Sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),

    #[error("Run {index} has invalid duration {duration}")]
    InvalidDuration { index: usize, duration: f64 },

    #[error("Run {index} lasting {duration}s produces no samples")]
    DegenerateRun { index: usize, duration: f64 },

    #[error("Bit width must be at least 1")]
    InvalidBitNum,

    #[error("Channel count must be at least 1")]
    InvalidChannelCount,

    #[error("Wave needs {count} samples up to run {index}, more than can be buffered")]
    TooManySamples { index: usize, count: f64 },

    #[error("Run {index} mask {mask:#x} does not fit in {width} samples")]
    MaskOverflow {
        index: usize,
        mask: u64,
        width: SampleWidth,
    },
}

/// Samples of one output lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveSamples {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

impl WaveSamples {
    pub fn len(&self) -> usize {
        match self {
            WaveSamples::U8(v) => v.len(),
            WaveSamples::U16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> SampleWidth {
        match self {
            WaveSamples::U8(_) => SampleWidth::U8,
            WaveSamples::U16(_) => SampleWidth::U16,
        }
    }

    pub fn get(&self, index: usize) -> Option<u16> {
        match self {
            WaveSamples::U8(v) => v.get(index).map(|&x| u16::from(x)),
            WaveSamples::U16(v) => v.get(index).copied(),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = u16> + '_> {
        match self {
            WaveSamples::U8(v) => Box::new(v.iter().map(|&x| u16::from(x))),
            WaveSamples::U16(v) => Box::new(v.iter().copied()),
        }
    }

    pub fn to_u16_vec(&self) -> Vec<u16> {
        self.iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveShape {
    /// One lane carrying the whole mask.
    Flat(WaveSamples),
    /// Parallel byte-lanes, least-significant lane first.
    Lanes(Vec<WaveSamples>),
}

/// A materialized digital waveform ready to be streamed at `sample_rate`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingWave {
    sample_rate: f64,
    bit_num: u32,
    shape: WaveShape,
}

impl TimingWave {
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn bit_num(&self) -> u32 {
        self.bit_num
    }

    pub fn shape(&self) -> &WaveShape {
        &self.shape
    }

    pub fn into_shape(self) -> WaveShape {
        self.shape
    }

    /// The single lane of a flat wave.
    pub fn as_flat(&self) -> Option<&WaveSamples> {
        match &self.shape {
            WaveShape::Flat(samples) => Some(samples),
            WaveShape::Lanes(_) => None,
        }
    }

    /// All lanes; a flat wave counts as one lane.
    pub fn lanes(&self) -> &[WaveSamples] {
        match &self.shape {
            WaveShape::Flat(samples) => std::slice::from_ref(samples),
            WaveShape::Lanes(lanes) => lanes,
        }
    }

    pub fn lane(&self, index: usize) -> Option<&WaveSamples> {
        self.lanes().get(index)
    }

    pub fn n_lanes(&self) -> usize {
        self.lanes().len()
    }

    /// Samples per lane.
    pub fn len(&self) -> usize {
        self.lanes().first().map_or(0, WaveSamples::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_width(&self) -> SampleWidth {
        self.lanes()
            .first()
            .map_or(SampleWidth::U8, WaveSamples::width)
    }

    /// Playback time of the wave, which may differ from the sum of the run
    /// durations because every run is rounded on its own.
    pub fn realized_duration(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate
    }

    /// One boolean column per logical line, next to a `time` column.
    ///
    /// Line `n` of lane `l` is named `bit_{l * bit_num + n}`.
    pub fn bit_traces(&self) -> PolarsResult<DataFrame> {
        #[cfg(feature = "cpu-profiling")]
        let _zone = tracy_client::Client::running()
            .map(|client| client.span(tracy_client::span_location!("bit_traces"), 0));

        let period = 1.0 / self.sample_rate;
        let time: Vec<f64> = (0..self.len()).map(|i| i as f64 * period).collect();

        let mut columns: Vec<Column> =
            Vec::with_capacity(1 + self.n_lanes() * self.bit_num as usize);
        columns.push(Series::new(TIME_COLUMN_NAME.into(), time).into());

        for (lane_index, lane) in self.lanes().iter().enumerate() {
            for bit in 0..self.bit_num {
                let line = lane_index as u64 * u64::from(self.bit_num) + u64::from(bit);
                let values: Vec<bool> = lane
                    .iter()
                    .map(|v| u64::from(v).checked_shr(bit).unwrap_or(0) & 1 == 1)
                    .collect();
                columns.push(Series::new(format!("bit_{}", line).into(), values).into());
            }
        }

        DataFrame::new(columns)
    }
}

/// Samples per run and their total.
fn sample_counts(
    runs: &[LevelRun],
    sample_rate: f64,
    policy: DegenerateRunPolicy,
) -> Result<(Vec<usize>, usize), TimingWaveError> {
    if runs.is_empty() {
        return Err(TimingWaveError::EmptySequence);
    }
    let rejects_rate = policy == DegenerateRunPolicy::Reject && sample_rate <= 0.0;
    if !sample_rate.is_finite() || rejects_rate {
        return Err(TimingWaveError::InvalidSampleRate(sample_rate));
    }

    let mut counts = Vec::with_capacity(runs.len());
    let mut total: usize = 0;
    for (index, run) in runs.iter().enumerate() {
        let count = run.sample_count(sample_rate);
        if !count.is_finite() {
            return Err(TimingWaveError::InvalidDuration {
                index,
                duration: run.duration,
            });
        }
        if run.duration <= 0.0 || count < 1.0 {
            match policy {
                DegenerateRunPolicy::Reject => {
                    return Err(TimingWaveError::DegenerateRun {
                        index,
                        duration: run.duration,
                    })
                }
                DegenerateRunPolicy::Drop => {
                    counts.push(0);
                    continue;
                }
            }
        }

        // `usize::MAX as f64` rounds up, so equality is already out of range.
        let checked = if count < usize::MAX as f64 {
            total.checked_add(count as usize)
        } else {
            None
        };
        total = checked.ok_or(TimingWaveError::TooManySamples {
            index,
            count: total as f64 + count,
        })?;
        counts.push(count as usize);
    }
    Ok((counts, total))
}

/// Byte of `mask` driving `lane` when each lane holds `bit_num` lines.
fn lane_value(mask: u64, bit_num: u32, lane: usize) -> u64 {
    u32::try_from(lane)
        .ok()
        .and_then(|lane| bit_num.checked_mul(lane))
        .and_then(|shift| mask.checked_shr(shift))
        .unwrap_or(0)
        & LANE_MASK
}

fn fill<T>(
    runs: &[LevelRun],
    counts: &[usize],
    total: usize,
    width: SampleWidth,
    value_of: impl Fn(u64) -> u64,
) -> Result<Vec<T>, TimingWaveError>
where
    T: Copy + TryFrom<u64>,
{
    let mut samples = Vec::new();
    samples
        .try_reserve_exact(total)
        .map_err(|_| TimingWaveError::TooManySamples {
            index: runs.len().saturating_sub(1),
            count: total as f64,
        })?;
    for (index, (run, &count)) in runs.iter().zip(counts).enumerate() {
        let value = T::try_from(value_of(run.mask)).map_err(|_| TimingWaveError::MaskOverflow {
            index,
            mask: run.mask,
            width,
        })?;
        samples.resize(samples.len() + count, value);
    }
    Ok(samples)
}

fn fill_lane(
    runs: &[LevelRun],
    counts: &[usize],
    total: usize,
    width: SampleWidth,
    value_of: impl Fn(u64) -> u64,
) -> Result<WaveSamples, TimingWaveError> {
    Ok(match width {
        SampleWidth::U8 => WaveSamples::U8(fill(runs, counts, total, width, value_of)?),
        SampleWidth::U16 => WaveSamples::U16(fill(runs, counts, total, width, value_of)?),
    })
}

/// Expand `runs` into a per-sample wave at `sample_rate`.
///
/// Each run lasts `round(duration * sample_rate)` samples, rounded on its
/// own with ties to even. With one channel every sample holds the run's mask
/// and a mask wider than the sample width is an error. With `n` channels,
/// lane `i` holds `(mask >> (bit_num * i)) & 0xFF`. A wave too long to
/// allocate is [`TimingWaveError::TooManySamples`].
///
/// ```
/// use timing_wave_rs::{generate_timing_wave, LevelRun, WaveConfig};
///
/// let runs = [
///     LevelRun::new(0b10, 3.0),
///     LevelRun::new(0b01, 2.0),
///     LevelRun::new(0b10, 4.0),
/// ];
/// let wave = generate_timing_wave(&runs, 1.0, &WaveConfig::default())?;
/// assert_eq!(wave.lanes()[0].to_u16_vec(), [2, 2, 2, 1, 1, 2, 2, 2, 2]);
/// # Ok::<(), timing_wave_rs::TimingWaveError>(())
/// ```
pub fn generate_timing_wave(
    runs: &[LevelRun],
    sample_rate: f64,
    config: &WaveConfig,
) -> Result<TimingWave, TimingWaveError> {
    #[cfg(feature = "cpu-profiling")]
    let _zone = tracy_client::Client::running()
        .map(|client| client.span(tracy_client::span_location!("generate_timing_wave"), 0));

    config.validate()?;
    let (counts, total) = sample_counts(runs, sample_rate, config.degenerate_runs)?;

    let shape = if config.n_channel == 1 {
        WaveShape::Flat(fill_lane(runs, &counts, total, config.sample_width, |mask| {
            mask
        })?)
    } else {
        let lanes = (0..config.n_channel)
            .map(|lane| {
                fill_lane(runs, &counts, total, config.sample_width, |mask| {
                    lane_value(mask, config.bit_num, lane)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        WaveShape::Lanes(lanes)
    };

    Ok(TimingWave {
        sample_rate,
        bit_num: config.bit_num,
        shape,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(pairs: &[(u64, f64)]) -> Vec<LevelRun> {
        pairs.iter().copied().map(LevelRun::from).collect()
    }

    fn flat(wave: &TimingWave) -> Vec<u16> {
        wave.as_flat().expect("flat wave").to_u16_vec()
    }

    #[test]
    fn test_three_run_sequence() {
        let wave = generate_timing_wave(
            &runs(&[(0b10, 3.0), (0b01, 2.0), (0b10, 4.0)]),
            1.0,
            &WaveConfig::default(),
        )
        .unwrap();

        assert_eq!(flat(&wave), vec![2, 2, 2, 1, 1, 2, 2, 2, 2]);
        assert_eq!(wave.sample_width(), SampleWidth::U8);
        assert_eq!(wave.realized_duration(), 9.0);
    }

    #[test]
    fn test_two_lanes_split_by_byte() {
        let config = WaveConfig::new(8).with_channels(2);
        let wave =
            generate_timing_wave(&runs(&[(0xFF00, 1.0), (0x00FF, 1.0)]), 1.0, &config).unwrap();

        assert!(wave.as_flat().is_none());
        assert_eq!(wave.n_lanes(), 2);
        assert_eq!(wave.lane(0).unwrap().to_u16_vec(), vec![0x00, 0xFF]);
        assert_eq!(wave.lane(1).unwrap().to_u16_vec(), vec![0xFF, 0x00]);
    }

    #[test]
    fn test_zero_sample_run_dropped_when_allowed() {
        let sequence = runs(&[(1, 2.0), (3, 0.0001), (2, 1.0)]);
        let config = WaveConfig::default().with_degenerate_runs(DegenerateRunPolicy::Drop);
        let wave = generate_timing_wave(&sequence, 1.0, &config).unwrap();

        assert_eq!(flat(&wave), vec![1, 1, 2]);
    }

    #[test]
    fn test_zero_sample_run_rejected_by_default() {
        let sequence = runs(&[(1, 2.0), (3, 0.0001), (2, 1.0)]);
        let err = generate_timing_wave(&sequence, 1.0, &WaveConfig::default()).unwrap_err();

        assert_eq!(
            err,
            TimingWaveError::DegenerateRun {
                index: 1,
                duration: 0.0001
            }
        );
    }

    #[test]
    fn test_non_positive_duration() {
        let sequence = runs(&[(1, 1.0), (2, -1.0)]);
        assert!(matches!(
            generate_timing_wave(&sequence, 10.0, &WaveConfig::default()),
            Err(TimingWaveError::DegenerateRun { index: 1, .. })
        ));

        let lenient = WaveConfig::default().with_degenerate_runs(DegenerateRunPolicy::Drop);
        let wave = generate_timing_wave(&sequence, 10.0, &lenient).unwrap();
        assert_eq!(wave.len(), 10);
    }

    #[test]
    fn test_non_finite_duration_always_rejected() {
        let sequence = runs(&[(1, f64::NAN)]);
        let lenient = WaveConfig::default().with_degenerate_runs(DegenerateRunPolicy::Drop);
        assert!(matches!(
            generate_timing_wave(&sequence, 1.0, &lenient),
            Err(TimingWaveError::InvalidDuration { index: 0, .. })
        ));
    }

    #[test]
    fn test_malformed_inputs() {
        let config = WaveConfig::default();
        assert_eq!(
            generate_timing_wave(&[], 1.0, &config),
            Err(TimingWaveError::EmptySequence)
        );
        assert_eq!(
            generate_timing_wave(&runs(&[(1, 1.0)]), 0.0, &config),
            Err(TimingWaveError::InvalidSampleRate(0.0))
        );
        assert!(matches!(
            generate_timing_wave(&runs(&[(1, 1.0)]), f64::INFINITY, &config),
            Err(TimingWaveError::InvalidSampleRate(_))
        ));
        assert_eq!(
            generate_timing_wave(&runs(&[(1, 1.0)]), 1.0, &WaveConfig::new(0)),
            Err(TimingWaveError::InvalidBitNum)
        );
        assert_eq!(
            generate_timing_wave(&runs(&[(1, 1.0)]), 1.0, &config.clone().with_channels(0)),
            Err(TimingWaveError::InvalidChannelCount)
        );
    }

    #[test]
    fn test_non_positive_rate_follows_policy() {
        let sequence = runs(&[(1, 1.0), (2, 2.0)]);
        assert_eq!(
            generate_timing_wave(&sequence, -5.0, &WaveConfig::default()),
            Err(TimingWaveError::InvalidSampleRate(-5.0))
        );

        let lenient = WaveConfig::default().with_degenerate_runs(DegenerateRunPolicy::Drop);
        let wave = generate_timing_wave(&sequence, 0.0, &lenient).unwrap();
        assert!(wave.is_empty());
        assert_eq!(wave.realized_duration(), 0.0);
        assert_eq!(wave.bit_traces().unwrap().height(), 0);

        assert!(generate_timing_wave(&sequence, -1.0, &lenient).unwrap().is_empty());
        assert!(matches!(
            generate_timing_wave(&sequence, f64::NAN, &lenient),
            Err(TimingWaveError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn test_huge_run_is_rejected() {
        let config = WaveConfig::default();
        assert!(matches!(
            generate_timing_wave(&[LevelRun::new(1, 1e300)], 1.0, &config),
            Err(TimingWaveError::TooManySamples { index: 0, .. })
        ));

        // Each run fits a counter on its own but their sum does not.
        assert!(matches!(
            generate_timing_wave(&runs(&[(1, 1e19), (2, 1e19)]), 1.0, &config),
            Err(TimingWaveError::TooManySamples { .. })
        ));

        // Countable but far beyond what a buffer can hold.
        assert!(matches!(
            generate_timing_wave(&runs(&[(1, 1e18), (2, 1e18)]), 8.0, &config.with_channels(2)),
            Err(TimingWaveError::TooManySamples { .. })
        ));
    }

    #[test]
    fn test_mask_overflow_is_reported() {
        let err = generate_timing_wave(&runs(&[(1, 1.0), (0x100, 1.0)]), 1.0, &WaveConfig::new(8))
            .unwrap_err();
        assert_eq!(
            err,
            TimingWaveError::MaskOverflow {
                index: 1,
                mask: 0x100,
                width: SampleWidth::U8
            }
        );

        let wide = WaveConfig::new(8).with_sample_width(SampleWidth::U16);
        let wave = generate_timing_wave(&runs(&[(1, 1.0), (0x100, 1.0)]), 1.0, &wide).unwrap();
        assert_eq!(wave.sample_width(), SampleWidth::U16);
        assert_eq!(flat(&wave), vec![1, 0x100]);

        assert!(matches!(
            generate_timing_wave(&runs(&[(0x1_0000, 1.0)]), 1.0, &WaveConfig::new(16)),
            Err(TimingWaveError::MaskOverflow { .. })
        ));
    }

    #[test]
    fn test_width_follows_bit_num() {
        assert_eq!(SampleWidth::for_bit_num(1), SampleWidth::U8);
        assert_eq!(SampleWidth::for_bit_num(8), SampleWidth::U8);
        assert_eq!(SampleWidth::for_bit_num(9), SampleWidth::U16);
        assert_eq!(WaveConfig::new(12).sample_width, SampleWidth::U16);
        assert_eq!(SampleWidth::U8.max_value(), 0xFF);
        assert_eq!(SampleWidth::U16.max_value(), 0xFFFF);
        assert_eq!(SampleWidth::U16.to_string(), "u16");
    }

    #[test]
    fn test_length_is_sum_of_rounded_runs() {
        let sequence = runs(&[(1, 0.25), (2, 0.15), (3, 0.35), (4, 1.0)]);
        let wave = generate_timing_wave(&sequence, 10.0, &WaveConfig::default()).unwrap();

        let expected: f64 = sequence.iter().map(|r| r.sample_count(10.0)).sum();
        assert_eq!(wave.len(), expected as usize);

        let ties = runs(&[(1, 2.5), (2, 2.5)]);
        let wave = generate_timing_wave(&ties, 1.0, &WaveConfig::default()).unwrap();
        assert_eq!(flat(&wave), vec![1, 1, 2, 2]);
        assert_eq!(wave.realized_duration(), 4.0);
    }

    #[test]
    fn test_each_run_segment_is_constant() {
        let sequence = runs(&[(0x0102, 3.0), (0x0304, 1.0), (0x0506, 2.0)]);
        let config = WaveConfig::new(8).with_channels(2);
        let wave = generate_timing_wave(&sequence, 1.0, &config).unwrap();

        let mut start = 0;
        for run in &sequence {
            let count = run.sample_count(1.0) as usize;
            for (lane_index, lane) in wave.lanes().iter().enumerate() {
                let expected = ((run.mask >> (8 * lane_index)) & 0xFF) as u16;
                assert!((start..start + count).all(|i| lane.get(i) == Some(expected)));
            }
            start += count;
        }
        assert_eq!(start, wave.len());
    }

    #[test]
    fn test_lanes_match_flat_length() {
        let sequence = runs(&[(0xABCDEF, 0.3), (0x123456, 0.7)]);
        let wide = WaveConfig::new(8).with_sample_width(SampleWidth::U16);
        let single = generate_timing_wave(&sequence, 1000.0, &wide);
        assert!(matches!(single, Err(TimingWaveError::MaskOverflow { .. })));

        let flat_len = generate_timing_wave(
            &runs(&[(0, 0.3), (0, 0.7)]),
            1000.0,
            &WaveConfig::default(),
        )
        .unwrap()
        .len();

        let lanes =
            generate_timing_wave(&sequence, 1000.0, &WaveConfig::new(8).with_channels(3)).unwrap();
        assert_eq!(lanes.n_lanes(), 3);
        assert!(lanes.lanes().iter().all(|lane| lane.len() == flat_len));
        assert_eq!(lanes.lane(2).unwrap().get(0), Some(0xAB));
        assert_eq!(lanes.lane(0).unwrap().get(flat_len - 1), Some(0x56));
    }

    #[test]
    fn test_lane_shift_past_mask_width_is_zero() {
        let config = WaveConfig::new(32).with_channels(3);
        let wave = generate_timing_wave(&runs(&[(u64::MAX, 1.0)]), 1.0, &config).unwrap();

        assert_eq!(wave.sample_width(), SampleWidth::U16);
        assert_eq!(wave.lane(0).unwrap().to_u16_vec(), vec![0xFF]);
        assert_eq!(wave.lane(1).unwrap().to_u16_vec(), vec![0xFF]);
        assert_eq!(wave.lane(2).unwrap().to_u16_vec(), vec![0x00]);
    }

    #[test]
    fn test_generation_is_repeatable() {
        let sequence = runs(&[(7, 0.01), (0, 0.02), (5, 0.005)]);
        let config = WaveConfig::new(8).with_channels(2);
        let first = generate_timing_wave(&sequence, 48_000.0, &config).unwrap();
        let second = generate_timing_wave(&sequence, 48_000.0, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_concatenation_of_runs() {
        let a = LevelRun::new(0b0110, 0.004);
        let b = LevelRun::new(0b1001, 0.0075);
        let config = WaveConfig::default();

        let joined = generate_timing_wave(&[a, b], 2000.0, &config).unwrap();
        let mut pieces = flat(&generate_timing_wave(&[a], 2000.0, &config).unwrap());
        pieces.extend(flat(&generate_timing_wave(&[b], 2000.0, &config).unwrap()));

        assert_eq!(flat(&joined), pieces);
    }

    #[test]
    fn test_bit_traces() {
        let wave = generate_timing_wave(
            &runs(&[(0b10, 3.0), (0b01, 2.0)]),
            2.0,
            &WaveConfig::new(2),
        )
        .unwrap();
        let df = wave.bit_traces().unwrap();

        assert_eq!(df.width(), 3);
        assert_eq!(df.height(), 10);

        let time: Vec<f64> = df.column("time").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(time[0], 0.0);
        assert_eq!(time[3], 1.5);

        let bit0: Vec<bool> = df.column("bit_0").unwrap().bool().unwrap().into_no_null_iter().collect();
        let bit1: Vec<bool> = df.column("bit_1").unwrap().bool().unwrap().into_no_null_iter().collect();
        assert_eq!(bit0, [vec![false; 6], vec![true; 4]].concat());
        assert_eq!(bit1, [vec![true; 6], vec![false; 4]].concat());
    }

    #[test]
    fn test_bit_traces_number_lines_across_lanes() {
        let config = WaveConfig::new(4).with_channels(2);
        let wave = generate_timing_wave(&runs(&[(0b0001_0000, 1.0)]), 1.0, &config).unwrap();
        let df = wave.bit_traces().unwrap();

        assert_eq!(df.width(), 1 + 2 * 4);
        let bit4 = df.column("bit_4").unwrap().bool().unwrap().get(0);
        assert_eq!(bit4, Some(true));
        let bit0 = df.column("bit_0").unwrap().bool().unwrap().get(0);
        assert_eq!(bit0, Some(false));
    }
}
