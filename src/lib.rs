//! # Timing Wave RS
//!
//! A Rust library for turning run-length digital timing sequences into
//! sample buffers for clocked digital-output hardware, and for driving a
//! timing-plus-acquisition experiment through explicit phases.
//!
//! ## Features
//!
//! - **Timing waves**: `(mask, seconds)` runs expanded to one sample per clock tick
//! - **Byte lanes**: wide masks split across several output ports
//! - **Explicit storage width**: `u8` or `u16` samples, overflow reported instead of truncated
//! - **Experiment pipeline**: configure → arm → run → drain → teardown as separate types
//! - **DataFrame output**: Uses `polars` for bit traces and acquired voltages
//! - **Simulated devices**: Run the whole pipeline without hardware
//!
//! ## Examples
//!
//! ### Single port
//!
//! ```rust
//! use timing_wave_rs::{generate_timing_wave, LevelRun, WaveConfig};
//!
//! let runs = vec![
//!     LevelRun::new(0b10, 3.0),
//!     LevelRun::new(0b01, 2.0),
//!     LevelRun::new(0b10, 4.0),
//! ];
//! let wave = generate_timing_wave(&runs, 1.0, &WaveConfig::default())?;
//! assert_eq!(wave.len(), 9);
//! assert_eq!(wave.as_flat().unwrap().to_u16_vec(), [2, 2, 2, 1, 1, 2, 2, 2, 2]);
//! # Ok::<(), timing_wave_rs::TimingWaveError>(())
//! ```
//!
//! ### Several ports
//!
//! ```rust
//! use timing_wave_rs::{generate_timing_wave, LevelRun, WaveConfig};
//!
//! let runs = ["0xFF00:1".parse::<LevelRun>()?, "0x00FF:1".parse::<LevelRun>()?];
//! let wave = generate_timing_wave(&runs, 1.0, &WaveConfig::new(8).with_channels(2))?;
//!
//! assert_eq!(wave.lane(0).unwrap().to_u16_vec(), [0x00, 0xFF]);
//! assert_eq!(wave.lane(1).unwrap().to_u16_vec(), [0xFF, 0x00]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Experiment
//!
//! ```rust
//! use std::time::Duration;
//! use timing_wave_rs::sim::{EventLog, SimulatedAnalogInput, SimulatedDigitalOutput};
//! use timing_wave_rs::{
//!     AnalogInputConfig, DigitalOutputConfig, Experiment, ExperimentConfig, LevelRun,
//!     StartTrigger,
//! };
//!
//! let config = ExperimentConfig::new(
//!     [LevelRun::new(0b10, 0.3), LevelRun::new(0b01, 0.2)],
//!     DigitalOutputConfig::new(["Dev1/port0"], 1e4)?,
//!     AnalogInputConfig::new(["Dev2/ai0"], 5e4, Duration::from_millis(10))?
//!         .with_trigger(StartTrigger::rising("/Dev2/PFI0")),
//! );
//!
//! let log = EventLog::new();
//! let (data, _output, _input) = Experiment::run_to_completion(
//!     config,
//!     SimulatedDigitalOutput::new(log.clone()),
//!     SimulatedAnalogInput::new(log),
//! )?;
//! assert_eq!(data.samples_per_channel(), 500);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod daq;
pub mod experiment;
pub mod level_run;
pub mod sim;
pub mod timing_wave;

// Re-export the main types for convenience
pub use level_run::{LevelRun, ParseLevelRunError};

pub use timing_wave::{
    generate_timing_wave, DegenerateRunPolicy, SampleWidth, TimingWave, TimingWaveError,
    WaveConfig, WaveSamples, WaveShape,
};

pub use daq::{
    AnalogBuffer, AnalogInput, AnalogInputConfig, ConfigError, DeviceError, DigitalOutput,
    DigitalOutputConfig, Edge, StartTrigger,
};

pub use experiment::{
    Aborted, ArmedExperiment, ConfiguredExperiment, DrainedExperiment, Experiment,
    ExperimentConfig, ExperimentError, Failed, Phase, RunningExperiment,
};
