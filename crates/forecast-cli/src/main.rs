use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;

use forecast_cli::experiments::features::feature_metrics;
use forecast_cli::experiments::performance::general_performance;
use forecast_cli::experiments::resume::resume;
use forecast_cli::experiments::stability::stability;
use forecast_cli::experiments::{run_all, Experiment};
use forecast_cli::input::ExperimentConfig;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("FORECAST_LOG", "error,forecast=info"))
        .init();

    let matches = Command::new("forecast")
        .version(clap::crate_version!())
        .author("health-forecast developers")
        .about("Feature selection and classification experiments on genomic health data")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(experiment_command(
            "run",
            "Grid-search, evaluate and persist every configured pipeline",
        ))
        .subcommand(experiment_command(
            "stability",
            "Count how often each feature is selected across the experiment splits",
        ))
        .subcommand(experiment_command(
            "features",
            "Refit the saved best pipelines on the experiment splits and summarise feature weights",
        ))
        .subcommand(
            experiment_command("resume", "Collect saved results into one CSV table").arg(
                Arg::new("output")
                    .short('o')
                    .long("output")
                    .help("Path of the resumed results CSV. Defaults to <output_root>/resumed_results.csv")
                    .value_parser(clap::value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath),
            ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Written by {author-with-newline}Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("run", sub_m)) => handle_grid(sub_m, "run", |config, exp| {
            general_performance(config, exp).map(|_| ())
        }),
        Some(("stability", sub_m)) => handle_grid(sub_m, "stability", stability),
        Some(("features", sub_m)) => handle_grid(sub_m, "features", |config, exp| {
            feature_metrics(config, exp).map(|_| ())
        }),
        Some(("resume", sub_m)) => handle_resume(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn experiment_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("config")
                .help("Path to the experiment configuration file (JSON)")
                .required(false)
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("data_root")
                .long("data-root")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Directory holding the datasets. Overrides data_root in the configuration file.")
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("output_root")
                .long("output-root")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Directory results are written to. Overrides output_root in the configuration file.")
                .value_hint(ValueHint::DirPath),
        )
}

/// The configuration to run with, or `None` after printing the default
/// configuration when no file was given.
fn load_config(matches: &ArgMatches) -> Result<Option<ExperimentConfig>> {
    match matches.get_one::<PathBuf>("config") {
        Some(config_path) => {
            log::info!("[forecast] Using config: {:?}", config_path);
            let config = ExperimentConfig::from_arguments(config_path, matches)?;
            configure_threads(&config);
            Ok(Some(config))
        }
        None => {
            let mut config = ExperimentConfig::default();
            config.apply_overrides(matches);
            eprintln!("[forecast] No config file provided; default configuration:");
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(None)
        }
    }
}

fn configure_threads(config: &ExperimentConfig) {
    if let Some(n) = config.num_threads {
        match rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            Ok(()) => log::info!("[forecast] Using {} worker threads", n),
            Err(e) => log::warn!("[forecast] Could not size the thread pool: {}", e),
        }
    }
}

fn handle_grid<F>(matches: &ArgMatches, task: &str, routine: F) -> Result<()>
where
    F: Fn(&ExperimentConfig, &Experiment) -> Result<()>,
{
    let Some(config) = load_config(matches)? else {
        return Ok(());
    };
    let summary = run_all(&config, task, routine);
    if !summary.is_success() {
        log::error!(
            "[forecast::{}] {} configuration(s) failed: {}",
            task,
            summary.failed.len(),
            summary.failed.join("; ")
        );
        std::process::exit(1)
    }
    Ok(())
}

fn handle_resume(matches: &ArgMatches) -> Result<()> {
    let Some(config) = load_config(matches)? else {
        return Ok(());
    };
    let output = match matches.get_one::<PathBuf>("output") {
        Some(path) => path.clone(),
        None => {
            std::fs::create_dir_all(&config.output_root)
                .with_context(|| format!("Failed to create {}", config.output_root))?;
            PathBuf::from(&config.output_root).join("resumed_results.csv")
        }
    };
    match resume(&config, &output) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Resume failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
