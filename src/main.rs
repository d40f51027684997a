use clap::Parser;
use color_eyre::Result;
use dxview::{AppConfig, Args, ConfigManager, RunOptions, APP_NAME};
use tracing_subscriber::EnvFilter;

fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Handle flags that do their work and exit without starting the server.
fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let manager = ConfigManager::new(APP_NAME)?;
        match manager.write_default_config(args.force) {
            Ok(path) => {
                println!("Configuration file written to {}", path.display());
                return Ok(Some(()));
            }
            Err(e) => {
                eprintln!("Error writing configuration: {}", e);
                std::process::exit(1);
            }
        }
    }
    Ok(None)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging(args.debug);

    if handle_early_exit_flags(&args)?.is_some() {
        return Ok(());
    }

    let config = AppConfig::load(APP_NAME)?;
    let options = RunOptions::from_args_and_config(&args, &config);
    dxview::run(options, config).await
}
