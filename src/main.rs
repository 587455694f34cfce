/*!
 * Command-line interface for fs2dad
 */

use std::io;
use std::sync::Arc;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use fs2dad::config::{Args, Config, ConfigFile};
use fs2dad::generator::Generator;
use fs2dad::report::{ReportFormat, Reporter};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fs2dad={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> io::Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    let (config_path, explicit) = args.config_path();

    if args.init {
        ConfigFile::default().save(&config_path)?;
        println!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    // Defaults, then the configuration file, then flags
    let mut file = ConfigFile::load_or_default(&config_path, explicit)?;
    file.apply_args(&args);
    if args.save_config {
        file.save(&config_path)?;
        debug!(path = %config_path.display(), "effective configuration saved");
    }

    let config = match Config::from_file(file, args.threads) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim.white} {pos} files ⏱️  {elapsed_precise}")
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
    );
    progress.enable_steady_tick(std::time::Duration::from_millis(100));
    progress.set_prefix("📊 Processing");
    progress.set_message(format!(
        "📂 Scanning directory: {}",
        config.target_dir.display()
    ));

    let generator = Generator::new(config).with_progress(Arc::new(progress.clone()));
    let result = generator.run();

    // Clear the progress bar
    progress.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let reporter = Reporter::new(ReportFormat::ConsoleTable);
    reporter.print_report(&outcome.to_report());
    println!("\n{}", outcome.message());

    Ok(())
}
