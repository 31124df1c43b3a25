use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fusiontrack::sim::{EstimateRecord, MeasurementRecord, generate_scenario, run_tracker};

/// Run the lidar/radar fusion tracker over a CSV dataset, or over a seeded synthetic
/// scenario when no dataset is given.
#[derive(Parser, Debug)]
#[command(name = "fusiontrack", version, about)]
struct Args {
    /// Input dataset CSV (sensor readings plus ground truth). Generated if omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Where to write the per-step estimate CSV.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Number of readings to generate when no input dataset is given.
    #[arg(long, default_value_t = 100)]
    steps: usize,
    /// Interval between generated readings, in microseconds.
    #[arg(long, default_value_t = 100_000)]
    interval_us: i64,
    /// RNG seed for the generated scenario.
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Print the estimate after every reading.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let records = match &args.input {
        Some(path) => match MeasurementRecord::from_csv(path) {
            Ok(records) => records,
            Err(err) => {
                eprintln!("failed to read {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => {
            println!(
                "no input dataset; generating {} readings (seed {})",
                args.steps, args.seed
            );
            generate_scenario(args.seed, args.steps, args.interval_us)
        }
    };
    if records.is_empty() {
        eprintln!("dataset is empty");
        return ExitCode::FAILURE;
    }

    let run = match run_tracker(&records) {
        Ok(run) => run,
        Err(err) => {
            eprintln!("tracker run failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    if args.verbose {
        for record in &run.records {
            println!(
                "t: {:>10} us  position: [{:8.3}, {:8.3}]  velocity: [{:7.3}, {:7.3}]",
                record.timestamp_us, record.px, record.py, record.vx, record.vy
            );
        }
    }

    println!("processed {} readings", records.len());
    println!(
        "RMSE: px {:.4}  py {:.4}  vx {:.4}  vy {:.4}",
        run.rmse[0], run.rmse[1], run.rmse[2], run.rmse[3]
    );

    if let Some(path) = &args.output {
        if let Err(err) = EstimateRecord::to_csv(&run.records, path) {
            eprintln!("failed to write {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
        println!("estimates written to {}", path.display());
    }

    ExitCode::SUCCESS
}
