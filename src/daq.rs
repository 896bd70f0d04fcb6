//! Boundary to the data-acquisition driver.
//!
//! The driver itself is external. A digital-output task streams a
//! [`TimingWave`] at a fixed sample clock and holds the last level until it
//! is stopped, while an analog-input task fills an [`AnalogBuffer`] once its
//! start trigger fires. Implement [`DigitalOutput`] and [`AnalogInput`] for a
//! concrete driver, or use the simulated devices in [`crate::sim`].

use std::time::Duration;

use polars::prelude::*;

use crate::timing_wave::TimingWave;

const TIME_COLUMN_NAME: &str = "time";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("At least one channel is required")]
    NoChannels,

    #[error("Sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),

    #[error("Sample time of {sample_time:?} at {sample_rate} S/s yields no samples")]
    NoSamples {
        sample_time: Duration,
        sample_rate: f64,
    },
}

fn check_rate(sample_rate: f64) -> Result<(), ConfigError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidSampleRate(sample_rate))
    }
}

/// Continuous, sample-clocked digital output on one or more ports.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitalOutputConfig {
    pub channels: Vec<String>,
    pub sample_rate: f64,
}

impl DigitalOutputConfig {
    pub fn new<S: Into<String>>(
        channels: impl IntoIterator<Item = S>,
        sample_rate: f64,
    ) -> Result<Self, ConfigError> {
        let channels: Vec<String> = channels.into_iter().map(Into::into).collect();
        if channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        check_rate(sample_rate)?;
        Ok(Self {
            channels,
            sample_rate,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edge {
    #[default]
    Rising,
    Falling,
}

/// Digital edge that starts an acquisition.
///
/// The source is passed to the driver as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTrigger {
    pub source: String,
    pub edge: Edge,
}

impl StartTrigger {
    pub fn rising(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            edge: Edge::Rising,
        }
    }

    pub fn falling(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            edge: Edge::Falling,
        }
    }
}

/// Finite voltage acquisition of `sample_time` on every channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogInputConfig {
    pub channels: Vec<String>,
    pub sample_rate: f64,
    pub sample_time: Duration,
    pub trigger: Option<StartTrigger>,
}

impl AnalogInputConfig {
    pub fn new<S: Into<String>>(
        channels: impl IntoIterator<Item = S>,
        sample_rate: f64,
        sample_time: Duration,
    ) -> Result<Self, ConfigError> {
        let channels: Vec<String> = channels.into_iter().map(Into::into).collect();
        if channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        check_rate(sample_rate)?;

        let config = Self {
            channels,
            sample_rate,
            sample_time,
            trigger: None,
        };
        if config.samples_per_channel() == 0 {
            return Err(ConfigError::NoSamples {
                sample_time,
                sample_rate,
            });
        }
        Ok(config)
    }

    pub fn with_trigger(mut self, trigger: StartTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Whole samples that fit in `sample_time`; a partial sample is dropped.
    pub fn samples_per_channel(&self) -> usize {
        (self.sample_time.as_secs_f64() * self.sample_rate) as usize
    }

    pub fn allocate_buffer(&self) -> AnalogBuffer {
        AnalogBuffer::new(
            self.channels.len(),
            self.samples_per_channel(),
            self.sample_rate,
        )
    }
}

/// Acquired voltages, one row per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogBuffer {
    n_channels: usize,
    samples_per_channel: usize,
    sample_rate: f64,
    data: Vec<f64>,
}

impl AnalogBuffer {
    pub fn new(n_channels: usize, samples_per_channel: usize, sample_rate: f64) -> Self {
        Self {
            n_channels,
            samples_per_channel,
            sample_rate,
            data: vec![0.0; n_channels * samples_per_channel],
        }
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn samples_per_channel(&self) -> usize {
        self.samples_per_channel
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channel(&self, index: usize) -> Option<&[f64]> {
        if index >= self.n_channels {
            return None;
        }
        let start = index * self.samples_per_channel;
        self.data.get(start..start + self.samples_per_channel)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f64]> {
        if index >= self.n_channels {
            return None;
        }
        let start = index * self.samples_per_channel;
        self.data.get_mut(start..start + self.samples_per_channel)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Columns `time` followed by one column per channel, named by `names`.
    pub fn to_dataframe<S: AsRef<str>>(&self, names: &[S]) -> PolarsResult<DataFrame> {
        if names.len() != self.n_channels {
            return Err(PolarsError::ShapeMismatch(
                format!("{} column names for {} channels", names.len(), self.n_channels).into(),
            ));
        }

        let columns: Vec<Column> = names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let values = self.channel(index).unwrap_or_default();
                Series::new(name.as_ref().into(), values).into()
            })
            .collect();

        let mut selection = vec![col(TIME_COLUMN_NAME)];
        selection.extend(names.iter().map(|name| col(name.as_ref())));

        DataFrame::new(columns)?
            .lazy()
            .with_row_index("row_index", Some(0))
            .with_columns([(col("row_index").cast(DataType::Float64)
                * lit(1.0 / self.sample_rate))
            .alias(TIME_COLUMN_NAME)])
            .select(selection)
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Channel {0} is not available on this device")]
    UnknownChannel(String),

    #[error("Task has not been configured")]
    NotConfigured,

    #[error("Task has not been started")]
    NotStarted,

    #[error("Task has no data to output")]
    NothingWritten,

    #[error("Wave has {actual} lanes but the task drives {expected} channels")]
    LaneMismatch { expected: usize, actual: usize },

    #[error("Buffer holds {actual} channels but the task reads {expected}")]
    BufferMismatch { expected: usize, actual: usize },

    #[error("Timed out after {0:?} waiting for samples")]
    Timeout(Duration),

    #[error("Driver error: {0}")]
    Driver(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A sample-clocked digital-output task.
pub trait DigitalOutput {
    fn configure(&mut self, config: &DigitalOutputConfig) -> Result<(), DeviceError>;

    /// Hand the wave over to the task's output buffer.
    fn write(&mut self, wave: TimingWave) -> Result<(), DeviceError>;

    /// Begin streaming. The wave regenerates until [`DigitalOutput::stop`].
    fn start(&mut self) -> Result<(), DeviceError>;

    fn stop(&mut self) -> Result<(), DeviceError>;

    fn close(&mut self) -> Result<(), DeviceError>;
}

/// A triggered, finite analog-input task.
pub trait AnalogInput {
    fn configure(&mut self, config: &AnalogInputConfig) -> Result<(), DeviceError>;

    /// Arm the task; acquisition begins on the start trigger.
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Block until `buffer` is full. `None` waits forever.
    fn read(&mut self, buffer: &mut AnalogBuffer, timeout: Option<Duration>)
        -> Result<(), DeviceError>;

    fn stop(&mut self) -> Result<(), DeviceError>;

    fn close(&mut self) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digital_output_config_validation() {
        assert!(DigitalOutputConfig::new(["Dev1/port0"], 1e4).is_ok());
        assert_eq!(
            DigitalOutputConfig::new(Vec::<String>::new(), 1e4),
            Err(ConfigError::NoChannels)
        );
        assert_eq!(
            DigitalOutputConfig::new(["Dev1/port0"], -5.0),
            Err(ConfigError::InvalidSampleRate(-5.0))
        );
    }

    #[test]
    fn test_samples_per_channel_truncates() {
        let config =
            AnalogInputConfig::new(["Dev1/ai0"], 2.5e4, Duration::from_millis(1)).unwrap();
        assert_eq!(config.samples_per_channel(), 25);

        let config =
            AnalogInputConfig::new(["Dev1/ai0"], 3.0, Duration::from_millis(1500)).unwrap();
        assert_eq!(config.samples_per_channel(), 4);

        assert!(matches!(
            AnalogInputConfig::new(["Dev1/ai0"], 10.0, Duration::from_millis(50)),
            Err(ConfigError::NoSamples { .. })
        ));
    }

    #[test]
    fn test_trigger_defaults_to_rising() {
        let config = AnalogInputConfig::new(["Dev1/ai0"], 100.0, Duration::from_secs(1))
            .unwrap()
            .with_trigger(StartTrigger::rising("/Dev1/PFI0"));
        assert_eq!(config.trigger.as_ref().map(|t| t.edge), Some(Edge::Rising));
        assert_eq!(Edge::default(), Edge::Rising);
        assert_eq!(StartTrigger::falling("PFI1").edge, Edge::Falling);
    }

    #[test]
    fn test_buffer_rows() {
        let config = AnalogInputConfig::new(["ai0", "ai1"], 4.0, Duration::from_secs(1)).unwrap();
        let mut buffer = config.allocate_buffer();
        assert_eq!(buffer.n_channels(), 2);
        assert_eq!(buffer.samples_per_channel(), 4);
        assert_eq!(buffer.as_slice().len(), 8);

        buffer.channel_mut(1).unwrap().fill(1.5);
        assert_eq!(buffer.channel(0).unwrap(), &[0.0; 4]);
        assert_eq!(buffer.channel(1).unwrap(), &[1.5; 4]);
        assert!(buffer.channel(2).is_none());
        assert!(buffer.channel_mut(2).is_none());
    }

    #[test]
    fn test_buffer_to_dataframe() {
        let mut buffer = AnalogBuffer::new(2, 3, 2.0);
        buffer.as_mut_slice().copy_from_slice(&[1.0, 2.0, 3.0, -1.0, -2.0, -3.0]);

        let df = buffer.to_dataframe(&["ai0", "ai1"]).unwrap();
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["time", "ai0", "ai1"]);

        let time: Vec<f64> = df.column("time").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(time, vec![0.0, 0.5, 1.0]);
        let ai1: Vec<f64> = df.column("ai1").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(ai1, vec![-1.0, -2.0, -3.0]);

        assert!(buffer.to_dataframe(&["ai0"]).is_err());
    }

    #[test]
    fn test_empty_buffer_to_dataframe() {
        let buffer = AnalogBuffer::new(2, 0, 10.0);
        assert_eq!(buffer.channel(1), Some(&[][..]));

        let df = buffer.to_dataframe(&["ai0", "ai1"]).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("ai1").unwrap().dtype(), &DataType::Float64);
    }
}
