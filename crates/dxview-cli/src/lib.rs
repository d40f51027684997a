//! Shared CLI definitions for dxview.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser};
use std::path::PathBuf;

/// Command-line arguments for dxview
#[derive(Clone, Parser, Debug)]
#[command(
    name = "dxview",
    version,
    about = "Data Exploration Viewer",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Directory scanned for .csv, .xls, .xlsm and .xlsx datasets (default: current directory)
    #[arg(value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Address the dashboard server binds to (default: 127.0.0.1)
    #[arg(long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Port the dashboard server listens on (default: 8050)
    #[arg(long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Do not open the default browser on startup
    #[arg(long = "no-browser", action)]
    pub no_browser: bool,

    /// Initial number of table rows per page (1-500, default: 10)
    #[arg(long = "page-size", value_name = "N")]
    pub page_size: Option<usize>,

    /// Initial maximum number of bars per chart (0-50, default: 10)
    #[arg(long = "max-plot-bars", value_name = "N")]
    pub max_plot_bars: Option<usize>,

    /// Enable debug logging (overridden by RUST_LOG when set)
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Generate default configuration file at ~/.config/dxview/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn value_placeholder(arg: &clap::Arg) -> String {
    arg.get_value_names()
        .map(|names| {
            names
                .iter()
                .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; output is written to stdout.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let option_str = if arg.is_positional() {
            let placeholder = value_placeholder(arg);
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            let placeholder = if arg.get_action().takes_values() {
                value_placeholder(arg)
            } else {
                String::new()
            };
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
