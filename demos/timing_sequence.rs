// Timing sequence example
//
// This example expands a timing sequence given on the command line into a
// digital wave, prints its bit traces and plays it through a simulated
// timing + acquisition experiment.

use clap::Parser;
use std::time::Duration;
use timing_wave_rs::sim::{EventLog, SimulatedAnalogInput, SimulatedDigitalOutput};
use timing_wave_rs::{
    generate_timing_wave, AnalogInputConfig, DegenerateRunPolicy, DigitalOutputConfig,
    Experiment, ExperimentConfig, LevelRun, StartTrigger, WaveConfig,
};

#[derive(Parser)]
#[command(name = "timing_sequence")]
#[command(version = "1.0")]
#[command(about = "Expand a timing sequence and play it through simulated DAQ tasks")]
struct Args {
    /// Runs as MASK:SECONDS, e.g. 0b10:3 0b01:2 0b10:4
    #[arg(required = true)]
    runs: Vec<LevelRun>,

    /// Digital output sample rate in S/s
    #[arg(short, long, default_value_t = 1.0)]
    rate: f64,

    /// Lines per output port
    #[arg(short, long, default_value_t = 8)]
    bit_num: u32,

    /// Number of output ports the mask is split across
    #[arg(short = 'n', long, default_value_t = 1)]
    channels: usize,

    /// Drop runs that round to zero samples instead of failing
    #[arg(long)]
    drop_empty_runs: bool,

    /// Analog input sample rate in S/s
    #[arg(long, default_value_t = 50.0)]
    sample_rate: f64,

    /// Analog acquisition time in milliseconds
    #[arg(long, default_value_t = 200)]
    sample_time: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let policy = if args.drop_empty_runs {
        DegenerateRunPolicy::Drop
    } else {
        DegenerateRunPolicy::Reject
    };
    let wave_config = WaveConfig::new(args.bit_num)
        .with_channels(args.channels)
        .with_degenerate_runs(policy);

    println!("Timing Sequence Example");
    println!("=======================\n");
    for run in &args.runs {
        println!("  {}", run);
    }

    // Step 1: expand the runs
    let wave = generate_timing_wave(&args.runs, args.rate, &wave_config)?;
    println!(
        "\n1. Generated {} samples x {} lane(s) of {} ({} bits), {:.6} s at {} S/s",
        wave.len(),
        wave.n_lanes(),
        wave.sample_width(),
        wave.sample_width().bits(),
        wave.realized_duration(),
        wave.sample_rate()
    );

    let traces = wave.bit_traces()?;
    println!("\n2. Bit traces");
    println!("{}", traces.head(Some(10)));

    // Step 2: play it through the simulated tasks
    let ports: Vec<String> = (0..args.channels)
        .map(|i| format!("Dev1/port{}", i))
        .collect();
    let timing = DigitalOutputConfig::new(ports, args.rate)?;
    let sampling = AnalogInputConfig::new(
        ["Dev2/ai0"],
        args.sample_rate,
        Duration::from_millis(args.sample_time),
    )?
    .with_trigger(StartTrigger::rising("/Dev2/PFI0"));

    let config = ExperimentConfig::new(args.runs, timing, sampling)
        .with_wave(wave_config)
        .with_read_timeout(Duration::from_secs(10));

    let log = EventLog::new();
    let input = SimulatedAnalogInput::new(log.clone())
        .with_signal(|_, t| (2.0 * std::f64::consts::PI * 5.0 * t).sin());
    let (data, _, _) =
        Experiment::run_to_completion(config, SimulatedDigitalOutput::new(log.clone()), input)?;

    println!("\n3. Device calls");
    for event in log.events() {
        println!("   {:?}", event);
    }

    println!("\n4. Acquired data");
    println!("{}", data.to_dataframe(&["ai0"])?.head(Some(10)));

    Ok(())
}
