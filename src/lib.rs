//! dxview: a browser dashboard for exploring CSV and Excel files.
//!
//! A local server loads a dataset from a directory, groups and aggregates it, and serves
//! the resulting table page by page together with bar charts and a CSV export.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod aggregate;
pub mod chart;
pub mod chart_render;
pub mod config;
pub mod error;
pub mod error_display;
pub mod export;
pub mod filter;
pub mod server;
pub mod session;
pub mod source;
pub mod table;
pub mod table_view;
pub mod view;

pub use aggregate::{aggregate, AggregationMethod};
pub use chart::{project, ChartSpec};
pub use config::{AppConfig, ConfigManager, LoadProfile};
pub use dxview_cli::Args;
pub use error::{DxError, DxResult};
pub use export::{export, timestamped_filename, ExportFile};
pub use session::SessionStore;
pub use source::{list_datasets, load, DataSource, LoadOptions, TableLoader};
pub use table::{ColumnKind, ColumnSpec};
pub use table_view::{DisplayedTable, SortColumn, SortDirection, TableQuery};
pub use view::{DatasetIdentity, ViewRequest, ViewStateController, ViewUpdate};

/// Application name used for the config directory.
pub const APP_NAME: &str = "dxview";

/// Startup settings after merging command-line arguments over configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub open_browser: bool,
    pub open_browser_delay: Duration,
    pub page_size: usize,
    pub max_plot_bars: usize,
}

impl RunOptions {
    /// Command-line values win over configuration values.
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Self {
        let configured_dir = config.file_loading.data_dir.as_ref().map(PathBuf::from);
        Self {
            data_dir: view::default_directory(args.data_dir.as_deref().or(configured_dir.as_deref())),
            host: args
                .host
                .clone()
                .unwrap_or_else(|| config.server.host.clone()),
            port: args.port.unwrap_or(config.server.port),
            open_browser: config.server.open_browser && !args.no_browser,
            open_browser_delay: Duration::from_millis(config.server.open_browser_delay_ms),
            page_size: args.page_size.unwrap_or(config.display.default_page_size),
            max_plot_bars: args.max_plot_bars.unwrap_or(config.display.max_plot_bars),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > config::MAX_PAGE_SIZE {
            return Err(eyre!(
                "--page-size must be between 1 and {}, got {}",
                config::MAX_PAGE_SIZE,
                self.page_size
            ));
        }
        if self.max_plot_bars > config::MAX_PLOT_BARS {
            return Err(eyre!(
                "--max-plot-bars must be at most {}, got {}",
                config::MAX_PLOT_BARS,
                self.max_plot_bars
            ));
        }
        if self.port == 0 {
            return Err(eyre!("--port must be greater than 0"));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build the shared server state for `options`.
pub fn app_state(options: &RunOptions, config: &AppConfig) -> Arc<server::AppState> {
    let loader: Arc<dyn TableLoader> = Arc::new(DataSource::new(config.profiles.clone()));
    Arc::new(server::AppState::new(
        loader,
        server::ServerSettings {
            data_dir: options.data_dir.clone(),
            default_page_size: options.page_size,
            max_plot_bars: options.max_plot_bars,
            chart: config.chart.clone(),
        },
    ))
}

/// Serve the dashboard until the process is stopped.
pub async fn run(options: RunOptions, config: AppConfig) -> Result<()> {
    options.validate()?;
    tracing::info!("data directory: {}", options.data_dir.display());
    let state = app_state(&options, &config);
    let open_browser = options.open_browser.then_some(options.open_browser_delay);
    server::serve(state, &options.address(), open_browser).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_overrides_config() {
        let mut config = AppConfig::default();
        config.server.port = 9100;
        config.display.default_page_size = 20;
        config.file_loading.data_dir = Some("/srv/data".to_string());

        let args = Args::try_parse_from(["dxview", "--page-size", "50", "--no-browser"]).unwrap();
        let opts = RunOptions::from_args_and_config(&args, &config);
        assert_eq!(opts.port, 9100);
        assert_eq!(opts.page_size, 50);
        assert_eq!(opts.max_plot_bars, 10);
        assert!(!opts.open_browser);
        assert_eq!(opts.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(opts.address(), "127.0.0.1:9100");

        let args = Args::try_parse_from(["dxview", "/tmp/x"]).unwrap();
        let opts = RunOptions::from_args_and_config(&args, &config);
        assert_eq!(opts.data_dir, PathBuf::from("/tmp/x"));
        assert!(opts.open_browser);
    }

    #[test]
    fn run_options_validation() {
        let args = Args::try_parse_from(["dxview", "--max-plot-bars", "51"]).unwrap();
        let opts = RunOptions::from_args_and_config(&args, &AppConfig::default());
        assert!(opts.validate().is_err());

        let args = Args::try_parse_from(["dxview", "--page-size", "0"]).unwrap();
        let opts = RunOptions::from_args_and_config(&args, &AppConfig::default());
        assert!(opts.validate().is_err());

        let args = Args::try_parse_from(["dxview"]).unwrap();
        let opts = RunOptions::from_args_and_config(&args, &AppConfig::default());
        assert!(opts.validate().is_ok());
    }
}
