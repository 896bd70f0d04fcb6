//! A timing-wave experiment driven through explicit phases.
//!
//! ```text
//! Experiment::configure -> ConfiguredExperiment
//!     .arm()            -> ArmedExperiment      (wave written to the timing task)
//!     .run()            -> RunningExperiment    (timing task, then sampling task started)
//!     .drain()          -> DrainedExperiment    (blocking read of the acquisition)
//!     .teardown()       -> (AnalogBuffer, output, input)
//! ```
//!
//! A failing phase hands back a [`Failed`] holding both devices, so they can
//! still be stopped and closed with [`Failed::abort`]. Once the devices are
//! released an error comes back as [`Aborted`], which owns the devices and,
//! if the read completed, the acquired data.

use std::fmt;
use std::time::Duration;

use crate::daq::{
    AnalogBuffer, AnalogInput, AnalogInputConfig, ConfigError, DeviceError, DigitalOutput,
    DigitalOutputConfig,
};
use crate::level_run::LevelRun;
use crate::timing_wave::{generate_timing_wave, TimingWave, TimingWaveError, WaveConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configure,
    Arm,
    Run,
    Drain,
    Teardown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Configure => "configure",
            Phase::Arm => "arm",
            Phase::Run => "run",
            Phase::Drain => "drain",
            Phase::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("Timing wave error: {0}")]
    Wave(#[from] TimingWaveError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Timing wave has {lanes} lanes but {ports} output ports are configured")]
    PortMismatch { lanes: usize, ports: usize },

    #[error("Device error during {phase}: {source}")]
    Device { phase: Phase, source: DeviceError },
}

impl ExperimentError {
    fn device(phase: Phase) -> impl FnOnce(DeviceError) -> Self {
        move |source| Self::Device { phase, source }
    }
}

/// Everything needed to play one timing sequence and record one acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub runs: Vec<LevelRun>,
    pub wave: WaveConfig,
    pub timing: DigitalOutputConfig,
    pub sampling: AnalogInputConfig,
    pub read_timeout: Option<Duration>,
}

impl ExperimentConfig {
    pub fn new(
        runs: impl IntoIterator<Item = LevelRun>,
        timing: DigitalOutputConfig,
        sampling: AnalogInputConfig,
    ) -> Self {
        Self {
            runs: runs.into_iter().collect(),
            wave: WaveConfig::default(),
            timing,
            sampling,
            read_timeout: None,
        }
    }

    pub fn with_wave(mut self, wave: WaveConfig) -> Self {
        self.wave = wave;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }
}

struct Rig<O, I> {
    output: O,
    input: I,
    output_running: bool,
    input_running: bool,
}

impl<O: DigitalOutput, I: AnalogInput> Rig<O, I> {
    /// Stop and close the sampling task, then the timing task.
    ///
    /// Every step is attempted; the first failure is returned.
    fn shutdown(&mut self) -> Result<(), DeviceError> {
        let mut first_error = None;
        let mut record = |step: &str, result: Result<(), DeviceError>| {
            if let Err(e) = result {
                log::warn!("Failed to {}: {}", step, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        };

        if self.input_running {
            record("stop sampling task", self.input.stop());
            self.input_running = false;
        }
        record("close sampling task", self.input.close());
        if self.output_running {
            record("stop timing task", self.output.stop());
            self.output_running = false;
        }
        record("close timing task", self.output.close());

        first_error.map_or(Ok(()), Err)
    }

    fn into_devices(self) -> (O, I) {
        (self.output, self.input)
    }
}

/// An experiment that ended with an error after its devices were released.
pub struct Aborted<O, I> {
    pub error: ExperimentError,
    /// The acquisition, when the failure came after it was read.
    pub data: Option<AnalogBuffer>,
    pub output: O,
    pub input: I,
}

impl<O, I> Aborted<O, I> {
    fn new(error: ExperimentError, output: O, input: I) -> Self {
        Self {
            error,
            data: None,
            output,
            input,
        }
    }
}

impl<O, I> fmt::Debug for Aborted<O, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aborted")
            .field("error", &self.error)
            .field("data", &self.data.as_ref().map(AnalogBuffer::samples_per_channel))
            .finish_non_exhaustive()
    }
}

impl<O, I> fmt::Display for Aborted<O, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Experiment aborted: {}", self.error)
    }
}

impl<O, I> std::error::Error for Aborted<O, I> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<O, I> From<Aborted<O, I>> for ExperimentError {
    fn from(aborted: Aborted<O, I>) -> Self {
        aborted.error
    }
}

/// A phase failed; the devices are still configured and possibly running.
pub struct Failed<O, I> {
    rig: Rig<O, I>,
    error: ExperimentError,
}

impl<O, I> fmt::Debug for Failed<O, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failed")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<O: DigitalOutput, I: AnalogInput> Failed<O, I> {
    pub fn error(&self) -> &ExperimentError {
        &self.error
    }

    /// Tear the devices down, keeping the error that caused the failure.
    ///
    /// A teardown error is only logged.
    pub fn abort(mut self) -> Aborted<O, I> {
        log::warn!("Aborting experiment: {}", self.error);
        if let Err(e) = self.rig.shutdown() {
            log::error!("Teardown after failure did not complete: {}", e);
        }
        let (output, input) = self.rig.into_devices();
        Aborted::new(self.error, output, input)
    }
}

fn abort_rig<O: DigitalOutput, I: AnalogInput>(
    mut rig: Rig<O, I>,
) -> Result<(O, I), Aborted<O, I>> {
    let _span = tracing::debug_span!("abort").entered();
    log::info!("Aborting experiment on request");
    let result = rig.shutdown();
    let (output, input) = rig.into_devices();
    match result {
        Ok(()) => Ok((output, input)),
        Err(e) => Err(Aborted::new(
            ExperimentError::device(Phase::Teardown)(e),
            output,
            input,
        )),
    }
}

pub struct Experiment;

impl Experiment {
    /// Generate the timing wave and configure both tasks.
    ///
    /// The wave must have one lane per output port; this is checked before
    /// any device is touched. If the sampling task cannot be configured the
    /// timing task is closed again before the error is returned.
    pub fn configure<O: DigitalOutput, I: AnalogInput>(
        config: ExperimentConfig,
        mut output: O,
        mut input: I,
    ) -> Result<ConfiguredExperiment<O, I>, Aborted<O, I>> {
        let _span = tracing::debug_span!("configure").entered();

        let wave =
            match generate_timing_wave(&config.runs, config.timing.sample_rate, &config.wave) {
                Ok(wave) => wave,
                Err(e) => return Err(Aborted::new(e.into(), output, input)),
            };
        log::debug!(
            "Generated timing wave of {} samples x {} lanes ({:.6} s)",
            wave.len(),
            wave.n_lanes(),
            wave.realized_duration()
        );

        let ports = config.timing.channels.len();
        if wave.n_lanes() != ports {
            let error = ExperimentError::PortMismatch {
                lanes: wave.n_lanes(),
                ports,
            };
            return Err(Aborted::new(error, output, input));
        }

        if let Err(e) = output.configure(&config.timing) {
            let error = ExperimentError::device(Phase::Configure)(e);
            return Err(Aborted::new(error, output, input));
        }

        if let Err(e) = input.configure(&config.sampling) {
            if let Err(close_error) = output.close() {
                log::warn!("Failed to close timing task: {}", close_error);
            }
            let error = ExperimentError::device(Phase::Configure)(e);
            return Err(Aborted::new(error, output, input));
        }

        let buffer = config.sampling.allocate_buffer();
        log::debug!(
            "Sampling {} channel(s) x {} samples",
            buffer.n_channels(),
            buffer.samples_per_channel()
        );

        Ok(ConfiguredExperiment {
            rig: Rig {
                output,
                input,
                output_running: false,
                input_running: false,
            },
            wave,
            buffer,
            read_timeout: config.read_timeout,
        })
    }

    /// Run every phase in order, aborting on the first failure.
    pub fn run_to_completion<O: DigitalOutput, I: AnalogInput>(
        config: ExperimentConfig,
        output: O,
        input: I,
    ) -> Result<(AnalogBuffer, O, I), Aborted<O, I>> {
        Self::configure(config, output, input)?
            .arm()
            .and_then(ArmedExperiment::run)
            .and_then(RunningExperiment::drain)
            .map_err(Failed::abort)?
            .teardown()
    }
}

pub struct ConfiguredExperiment<O, I> {
    rig: Rig<O, I>,
    wave: TimingWave,
    buffer: AnalogBuffer,
    read_timeout: Option<Duration>,
}

impl<O: DigitalOutput, I: AnalogInput> ConfiguredExperiment<O, I> {
    pub fn wave(&self) -> &TimingWave {
        &self.wave
    }

    /// Move the timing wave into the timing task's buffer.
    pub fn arm(mut self) -> Result<ArmedExperiment<O, I>, Failed<O, I>> {
        let _span = tracing::debug_span!("arm").entered();
        log::debug!("Writing {} samples to timing task", self.wave.len());

        match self.rig.output.write(self.wave) {
            Ok(()) => Ok(ArmedExperiment {
                rig: self.rig,
                buffer: self.buffer,
                read_timeout: self.read_timeout,
            }),
            Err(e) => Err(Failed {
                rig: self.rig,
                error: ExperimentError::device(Phase::Arm)(e),
            }),
        }
    }

    pub fn abort(self) -> Result<(O, I), Aborted<O, I>> {
        abort_rig(self.rig)
    }
}

pub struct ArmedExperiment<O, I> {
    rig: Rig<O, I>,
    buffer: AnalogBuffer,
    read_timeout: Option<Duration>,
}

impl<O: DigitalOutput, I: AnalogInput> ArmedExperiment<O, I> {
    /// Start the timing loop, then arm the triggered acquisition.
    pub fn run(mut self) -> Result<RunningExperiment<O, I>, Failed<O, I>> {
        let _span = tracing::debug_span!("run").entered();

        log::info!("Starting timing task");
        if let Err(e) = self.rig.output.start() {
            return Err(Failed {
                rig: self.rig,
                error: ExperimentError::device(Phase::Run)(e),
            });
        }
        self.rig.output_running = true;

        log::info!("Starting sampling task");
        if let Err(e) = self.rig.input.start() {
            return Err(Failed {
                rig: self.rig,
                error: ExperimentError::device(Phase::Run)(e),
            });
        }
        self.rig.input_running = true;

        Ok(RunningExperiment {
            rig: self.rig,
            buffer: self.buffer,
            read_timeout: self.read_timeout,
        })
    }

    pub fn abort(self) -> Result<(O, I), Aborted<O, I>> {
        abort_rig(self.rig)
    }
}

pub struct RunningExperiment<O, I> {
    rig: Rig<O, I>,
    buffer: AnalogBuffer,
    read_timeout: Option<Duration>,
}

impl<O: DigitalOutput, I: AnalogInput> RunningExperiment<O, I> {
    /// Block until the acquisition buffer is full or the read times out.
    pub fn drain(mut self) -> Result<DrainedExperiment<O, I>, Failed<O, I>> {
        let _span = tracing::debug_span!("drain").entered();
        match self.read_timeout {
            Some(timeout) => log::debug!("Reading samples, timeout {:?}", timeout),
            None => log::debug!("Reading samples, waiting indefinitely"),
        }

        match self.rig.input.read(&mut self.buffer, self.read_timeout) {
            Ok(()) => {
                log::info!(
                    "Acquired {} samples per channel",
                    self.buffer.samples_per_channel()
                );
                Ok(DrainedExperiment {
                    rig: self.rig,
                    buffer: self.buffer,
                })
            }
            Err(e) => Err(Failed {
                rig: self.rig,
                error: ExperimentError::device(Phase::Drain)(e),
            }),
        }
    }

    pub fn abort(self) -> Result<(O, I), Aborted<O, I>> {
        abort_rig(self.rig)
    }
}

pub struct DrainedExperiment<O, I> {
    rig: Rig<O, I>,
    buffer: AnalogBuffer,
}

impl<O: DigitalOutput, I: AnalogInput> DrainedExperiment<O, I> {
    pub fn data(&self) -> &AnalogBuffer {
        &self.buffer
    }

    /// Release both tasks and hand back the acquisition and the devices.
    ///
    /// If a task fails to stop or close, the acquisition still comes back
    /// inside [`Aborted::data`].
    pub fn teardown(mut self) -> Result<(AnalogBuffer, O, I), Aborted<O, I>> {
        let _span = tracing::debug_span!("teardown").entered();
        log::info!("Releasing sampling and timing tasks");

        let result = self.rig.shutdown();
        let (output, input) = self.rig.into_devices();
        match result {
            Ok(()) => Ok((self.buffer, output, input)),
            Err(e) => Err(Aborted {
                error: ExperimentError::device(Phase::Teardown)(e),
                data: Some(self.buffer),
                output,
                input,
            }),
        }
    }
}
