use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{ArgGroup, Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use shotscale_dataset::app::{App, PrepareOptions, SaveTarget};
use shotscale_dataset::config::ConfigLoader;
use shotscale_dataset::domain::{ResizeAlgorithm, SplitStrategy};
use shotscale_dataset::error::ShotScaleError;
use shotscale_dataset::output::{self, JsonOutput, LogProgress, OutputMode};
use shotscale_dataset::store::open_store;

#[derive(Parser)]
#[command(name = "shotscale")]
#[command(about = "Pre-process the shot scale dataset into training, validation and testing layouts")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch, split, resize and archive the dataset")]
    Prepare(PrepareArgs),
    #[command(about = "Load the catalog and report how much of it links to asset groups")]
    Inspect,
}

#[derive(Args)]
#[command(group(ArgGroup::new("resize").required(true).args(["cropped", "rescale"])))]
#[command(group(ArgGroup::new("split").args(["no_split", "split_random", "split_director", "split_movie"])))]
#[command(group(ArgGroup::new("target").required(true).args(["local_save", "remote_save"])))]
struct PrepareArgs {
    #[arg(long, help = "Crop the image to fit the targeted size")]
    cropped: bool,

    #[arg(long, help = "Simply rescale the images")]
    rescale: bool,

    #[arg(
        long = "no_split",
        visible_alias = "no-split",
        help = "Keep every record in a single training directory"
    )]
    no_split: bool,

    #[arg(
        long = "split_random",
        visible_alias = "split-random",
        help = "Split the dataset randomly (default)"
    )]
    split_random: bool,

    #[arg(
        long = "split_director",
        visible_alias = "split-director",
        help = "Keep every director within a single subset"
    )]
    split_director: bool,

    #[arg(
        long = "split_movie",
        visible_alias = "split-movie",
        help = "Keep every movie within a single subset"
    )]
    split_movie: bool,

    #[arg(long = "local_save", visible_alias = "local-save", value_name = "DIR")]
    local_save: Option<String>,

    #[arg(
        long = "remote_save",
        visible_alias = "remote-save",
        help = "Upload the archive to the configured store"
    )]
    remote_save: bool,

    #[arg(long, help = "Maximum number of records to export")]
    limit: Option<usize>,

    #[arg(long, help = "Drop records whose frame is missing from the store")]
    validate: bool,

    #[arg(long, help = "Seed for the random split")]
    seed: Option<u64>,
}

impl PrepareArgs {
    fn algorithm(&self) -> Option<ResizeAlgorithm> {
        if self.cropped {
            Some(ResizeAlgorithm::Cropped)
        } else if self.rescale {
            Some(ResizeAlgorithm::Rescale)
        } else {
            None
        }
    }

    fn strategy(&self) -> SplitStrategy {
        if self.no_split {
            SplitStrategy::None
        } else if self.split_director {
            SplitStrategy::Director
        } else if self.split_movie {
            SplitStrategy::Movie
        } else {
            SplitStrategy::Random
        }
    }

    fn target(&self) -> SaveTarget {
        match &self.local_save {
            Some(path) => SaveTarget::Local(Utf8PathBuf::from(path)),
            None => SaveTarget::Remote,
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ShotScaleError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ShotScaleError) -> u8 {
    match error {
        ShotScaleError::MissingConfig
        | ShotScaleError::ConfigRead(_)
        | ShotScaleError::ConfigParse(_)
        | ShotScaleError::InvalidConfig(_)
        | ShotScaleError::UnsupportedAlgorithm(_)
        | ShotScaleError::UnsupportedStrategy(_)
        | ShotScaleError::CatalogRead(_)
        | ShotScaleError::CatalogRow { .. }
        | ShotScaleError::MissingColumn(_)
        | ShotScaleError::UnmappedClass { .. }
        | ShotScaleError::MovieKeyCollision { .. } => 2,
        ShotScaleError::StoreHttp(_)
        | ShotScaleError::StoreStatus { .. }
        | ShotScaleError::GroupEnumeration(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = open_store(&config.store, &config.fetch)?;
    let app = App::new(config, store);

    match cli.command {
        Commands::Prepare(args) => {
            let options = PrepareOptions {
                algorithm: args.algorithm(),
                strategy: args.strategy(),
                target: args.target(),
                limit: args.limit,
                validate: args.validate,
                seed: args.seed,
            };
            match output_mode {
                OutputMode::Interactive => {
                    let result = app.prepare(options, &LogProgress)?;
                    output::print_prepare_summary(&result);
                }
                OutputMode::NonInteractive => {
                    let result = app.prepare(options, &JsonOutput)?;
                    JsonOutput::print_prepare(&result).into_diagnostic()?;
                }
            }
        }
        Commands::Inspect => match output_mode {
            OutputMode::Interactive => {
                let result = app.inspect(&LogProgress)?;
                output::print_inspect_summary(&result);
            }
            OutputMode::NonInteractive => {
                let result = app.inspect(&JsonOutput)?;
                JsonOutput::print_inspect(&result).into_diagnostic()?;
            }
        },
    }
    Ok(())
}
