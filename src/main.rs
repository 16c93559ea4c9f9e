use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;

use stochastic_mlp::export::export_instance_image;
use stochastic_mlp::stochastic::{REFERENCE_PAIRS, precision_study};
use stochastic_mlp::{Dataset, ExportTarget, FixedPoint, Overflow, RunConfig, WeightExporter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on a one-hot labelled data file, report test accuracy and export the weights
    Train {
        /// Whitespace-separated features followed by one-hot label columns
        #[arg(long)]
        data: PathBuf,

        /// JSON run configuration; defaults apply to missing fields
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory for weights.txt / weights.dat
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// firmware, memory or both
        #[arg(long, default_value = "both")]
        target: ExportTarget,

        /// How out-of-range weights are stored in the memory image: saturate or wrap
        #[arg(long, default_value = "saturate")]
        overflow: Overflow,

        /// Override the configured number of epochs
        #[arg(long)]
        epochs: Option<usize>,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Mean relative error of stochastic multiplication per bitstream length
    Study {
        #[arg(long, value_delimiter = ',', default_values_t = vec![64usize, 256, 1024])]
        lengths: Vec<usize>,

        /// Repetitions per operand pair
        #[arg(long, default_value_t = 100)]
        trials: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Convert a data file into a $readmemb instance image
    Convert {
        #[arg(long)]
        data: PathBuf,

        #[arg(long)]
        out: PathBuf,

        /// Feature columns per line
        #[arg(long, default_value_t = 256)]
        inputs: usize,

        /// One-hot label columns per line
        #[arg(long, default_value_t = 10)]
        classes: usize,
    },
}

fn main() {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    );
    builder
        .format(|buf, record| {
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        })
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(args.command) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Train {
            data,
            config,
            out,
            target,
            overflow,
            epochs,
            seed,
        } => {
            let mut cfg = match &config {
                Some(path) => RunConfig::load(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => RunConfig::default(),
            };
            if let Some(epochs) = epochs {
                cfg.epochs = epochs;
            }
            if let Some(seed) = seed {
                cfg.seed = seed;
            }
            cfg.validate().context("invalid run configuration")?;
            train(&cfg, &data, &out, target, overflow)
        }
        Command::Study {
            lengths,
            trials,
            seed,
        } => {
            let points = precision_study(&lengths, &REFERENCE_PAIRS, trials, seed)
                .context("precision study failed")?;
            println!("{:>10}  {:>20}", "length", "mean relative error");
            for p in points {
                println!("{:>10}  {:>20.6}", p.length, p.mean_relative_error);
            }
            Ok(())
        }
        Command::Convert {
            data,
            out,
            inputs,
            classes,
        } => {
            let dataset = Dataset::load(&data, inputs, classes)
                .with_context(|| format!("failed to read {}", data.display()))?;
            export_instance_image(&dataset.to_instances(), classes, &out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            Ok(())
        }
    }
}

fn train(
    cfg: &RunConfig,
    data: &Path,
    out: &Path,
    target: ExportTarget,
    overflow: Overflow,
) -> Result<()> {
    let mut dataset = Dataset::load(data, cfg.input_units(), cfg.output_units())
        .with_context(|| format!("failed to read {}", data.display()))?;
    log::info!("loaded {} instances from {}", dataset.len(), data.display());

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    dataset.shuffle(&mut rng);
    let (train_set, test_set) = dataset.split(cfg.test_fraction)?;
    log::info!(
        "{} training / {} test instances",
        train_set.len(),
        test_set.len()
    );

    let mut net = cfg.build_network()?;
    net.train(&train_set, cfg.train_config())
        .context("training failed")?;

    if test_set.is_empty() {
        log::warn!("test split is empty; skipping evaluation");
    } else {
        let report = net.evaluate(&test_set)?;
        println!(
            "Correctly classified {}/{} test instances ({:.2}%)",
            report.correct,
            report.total,
            report.accuracy() * 100.0
        );
    }

    let exporter = WeightExporter::new(FixedPoint::new(cfg.bitstream_length, overflow)?);
    let written = exporter
        .export_to_dir(&net, out, target)
        .with_context(|| format!("failed to export weights to {}", out.display()))?;
    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}
