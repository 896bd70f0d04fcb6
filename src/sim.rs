//! In-memory stand-ins for the acquisition driver.
//!
//! Both devices push every call into a shared [`EventLog`] so the order of a
//! pipeline run can be checked afterwards.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::daq::{
    AnalogBuffer, AnalogInput, AnalogInputConfig, DeviceError, DigitalOutput,
    DigitalOutputConfig,
};
use crate::timing_wave::TimingWave;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    OutputConfigured {
        channels: Vec<String>,
        sample_rate: f64,
    },
    WaveWritten {
        lanes: usize,
        samples: usize,
    },
    OutputStarted,
    OutputStopped,
    OutputClosed,
    InputConfigured {
        channels: Vec<String>,
        samples_per_channel: usize,
    },
    InputStarted,
    SamplesRead {
        samples_per_channel: usize,
    },
    InputStopped,
    InputClosed,
}

/// Cloneable handle to a shared, ordered list of device events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<DeviceEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: DeviceEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn close_result(fails: bool, task: &str) -> Result<(), DeviceError> {
    if fails {
        return Err(DeviceError::Driver(
            format!("simulated {} task failed to close", task).into(),
        ));
    }
    Ok(())
}

fn check_channels(available: Option<&[String]>, requested: &[String]) -> Result<(), DeviceError> {
    if let Some(available) = available {
        if let Some(missing) = requested.iter().find(|c| !available.contains(*c)) {
            return Err(DeviceError::UnknownChannel(missing.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct SimulatedDigitalOutput {
    available: Option<Vec<String>>,
    config: Option<DigitalOutputConfig>,
    wave: Option<TimingWave>,
    running: bool,
    close_fails: bool,
    log: EventLog,
}

impl SimulatedDigitalOutput {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Restrict the ports this device accepts.
    pub fn with_available_channels<S: Into<String>>(
        mut self,
        channels: impl IntoIterator<Item = S>,
    ) -> Self {
        self.available = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    /// `close` releases the task but reports a driver error.
    pub fn with_failing_close(mut self) -> Self {
        self.close_fails = true;
        self
    }

    pub fn config(&self) -> Option<&DigitalOutputConfig> {
        self.config.as_ref()
    }

    pub fn wave(&self) -> Option<&TimingWave> {
        self.wave.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Port values driven at `sample_index`, one per lane.
    ///
    /// The written wave regenerates, so indices wrap around its length.
    pub fn levels_at(&self, sample_index: usize) -> Option<Vec<u16>> {
        let wave = self.wave.as_ref()?;
        if wave.is_empty() {
            return None;
        }
        let index = sample_index % wave.len();
        wave.lanes().iter().map(|lane| lane.get(index)).collect()
    }
}

impl DigitalOutput for SimulatedDigitalOutput {
    fn configure(&mut self, config: &DigitalOutputConfig) -> Result<(), DeviceError> {
        check_channels(self.available.as_deref(), &config.channels)?;
        log::debug!(
            "Simulated DO task on {:?} at {} S/s",
            config.channels,
            config.sample_rate
        );
        self.config = Some(config.clone());
        self.log.push(DeviceEvent::OutputConfigured {
            channels: config.channels.clone(),
            sample_rate: config.sample_rate,
        });
        Ok(())
    }

    fn write(&mut self, wave: TimingWave) -> Result<(), DeviceError> {
        let config = self.config.as_ref().ok_or(DeviceError::NotConfigured)?;
        if wave.n_lanes() != config.channels.len() {
            return Err(DeviceError::LaneMismatch {
                expected: config.channels.len(),
                actual: wave.n_lanes(),
            });
        }
        self.log.push(DeviceEvent::WaveWritten {
            lanes: wave.n_lanes(),
            samples: wave.len(),
        });
        self.wave = Some(wave);
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        if self.config.is_none() {
            return Err(DeviceError::NotConfigured);
        }
        if self.wave.is_none() {
            return Err(DeviceError::NothingWritten);
        }
        self.running = true;
        self.log.push(DeviceEvent::OutputStarted);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.running = false;
        self.log.push(DeviceEvent::OutputStopped);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.running = false;
        self.config = None;
        self.wave = None;
        self.log.push(DeviceEvent::OutputClosed);
        close_result(self.close_fails, "DO")
    }
}

type Signal = Box<dyn Fn(usize, f64) -> f64 + Send + Sync>;

/// Analog input whose voltages come from `signal(channel, seconds)`.
pub struct SimulatedAnalogInput {
    available: Option<Vec<String>>,
    config: Option<AnalogInputConfig>,
    armed: bool,
    triggered: bool,
    close_fails: bool,
    signal: Signal,
    log: EventLog,
}

impl fmt::Debug for SimulatedAnalogInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedAnalogInput")
            .field("available", &self.available)
            .field("config", &self.config)
            .field("armed", &self.armed)
            .field("triggered", &self.triggered)
            .field("close_fails", &self.close_fails)
            .finish_non_exhaustive()
    }
}

impl SimulatedAnalogInput {
    pub fn new(log: EventLog) -> Self {
        Self {
            available: None,
            config: None,
            armed: false,
            triggered: true,
            close_fails: false,
            signal: Box::new(|_, _| 0.0),
            log,
        }
    }

    pub fn with_signal(mut self, signal: impl Fn(usize, f64) -> f64 + Send + Sync + 'static) -> Self {
        self.signal = Box::new(signal);
        self
    }

    pub fn with_available_channels<S: Into<String>>(
        mut self,
        channels: impl IntoIterator<Item = S>,
    ) -> Self {
        self.available = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    /// The start trigger never fires, so every read times out.
    pub fn never_triggered(mut self) -> Self {
        self.triggered = false;
        self
    }

    /// `close` releases the task but reports a driver error.
    pub fn with_failing_close(mut self) -> Self {
        self.close_fails = true;
        self
    }

    pub fn config(&self) -> Option<&AnalogInputConfig> {
        self.config.as_ref()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl AnalogInput for SimulatedAnalogInput {
    fn configure(&mut self, config: &AnalogInputConfig) -> Result<(), DeviceError> {
        check_channels(self.available.as_deref(), &config.channels)?;
        if let Some(trigger) = &config.trigger {
            log::debug!(
                "Simulated AI task waits for {:?} edge on {}",
                trigger.edge,
                trigger.source
            );
        }
        self.config = Some(config.clone());
        self.log.push(DeviceEvent::InputConfigured {
            channels: config.channels.clone(),
            samples_per_channel: config.samples_per_channel(),
        });
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        if self.config.is_none() {
            return Err(DeviceError::NotConfigured);
        }
        self.armed = true;
        self.log.push(DeviceEvent::InputStarted);
        Ok(())
    }

    fn read(
        &mut self,
        buffer: &mut AnalogBuffer,
        timeout: Option<Duration>,
    ) -> Result<(), DeviceError> {
        let config = self.config.as_ref().ok_or(DeviceError::NotConfigured)?;
        if !self.armed {
            return Err(DeviceError::NotStarted);
        }
        if buffer.n_channels() != config.channels.len() {
            return Err(DeviceError::BufferMismatch {
                expected: config.channels.len(),
                actual: buffer.n_channels(),
            });
        }
        if !self.triggered {
            return Err(DeviceError::Timeout(timeout.unwrap_or(Duration::MAX)));
        }

        let period = 1.0 / config.sample_rate;
        for channel in 0..buffer.n_channels() {
            if let Some(row) = buffer.channel_mut(channel) {
                for (i, value) in row.iter_mut().enumerate() {
                    *value = (self.signal)(channel, i as f64 * period);
                }
            }
        }

        self.log.push(DeviceEvent::SamplesRead {
            samples_per_channel: buffer.samples_per_channel(),
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.armed = false;
        self.log.push(DeviceEvent::InputStopped);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.armed = false;
        self.config = None;
        self.log.push(DeviceEvent::InputClosed);
        close_result(self.close_fails, "AI")
    }
}
