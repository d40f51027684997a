use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::source::TypeHint;

/// Largest page size the page-size control accepts
pub const MAX_PAGE_SIZE: usize = 500;

/// Largest value of the max-plot-bars slider
pub const MAX_PLOT_BARS: usize = 50;

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string with comments.
    /// All fields are commented out so defaults are used, but users can uncomment to override.
    pub fn generate_default_config(&self) -> String {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config)
            .unwrap_or_else(|e| panic!("Failed to serialize default config: {}", e));

        let comments: HashMap<&str, &str> = FIELD_COMMENTS.iter().copied().collect();

        let mut result = String::new();
        result.push_str("# dxview configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        let mut seen: HashSet<String> = HashSet::new();
        for line in toml_str.lines() {
            if let Some(section) = Self::extract_section_name(line) {
                if let Some((_, header)) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push_str(header);
                    result.push('\n');
                }
                current_section = section;
            } else if let Some(field_path) = Self::extract_field_path(line, &current_section) {
                if let Some(comment) = comments.get(field_path.as_str()) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                seen.insert(field_path);
            } else if line.trim().is_empty() {
                result.push('\n');
                continue;
            }
            result.push_str("# ");
            result.push_str(line);
            result.push('\n');
        }

        // Option fields are skipped by the serializer when None
        if !seen.contains("file_loading.data_dir") {
            result = result.replacen(
                "# [file_loading]\n",
                "# [file_loading]\n# Directory listed on startup. null = current working directory\n# data_dir = \"/path/to/data\"\n",
                1,
            );
        }

        result.push_str(PROFILE_EXAMPLE);
        result
    }

    /// Extract section name from TOML line like "[server]" or "[chart.theme]"
    fn extract_section_name(line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            Some(trimmed.trim_matches(|c| c == '[' || c == ']').to_string())
        } else {
            None
        }
    }

    fn extract_field_path(line: &str, current_section: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }
        let (field_name, _) = trimmed.split_once('=')?;
        let field_name = field_name.trim();
        if current_section.is_empty() {
            Some(field_name.to_string())
        } else {
            Some(format!("{}.{}", current_section, field_name))
        }
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config())?;

        Ok(config_path)
    }
}

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "server",
        "# ============================================================================\n# Local Web Server\n# ============================================================================",
    ),
    (
        "display",
        "# ============================================================================\n# Table and Controls\n# ============================================================================",
    ),
    (
        "chart",
        "# ============================================================================\n# Bar Charts\n# ============================================================================",
    ),
    (
        "chart.theme",
        "# Visual theme applied to every chart. Colors are hex #rrggbb.",
    ),
    (
        "file_loading",
        "# ============================================================================\n# File Loading\n# ============================================================================",
    ),
];

const FIELD_COMMENTS: &[(&str, &str)] = &[
    (
        "version",
        "Configuration format version (for future compatibility)",
    ),
    (
        "profiles",
        "Known dataset structures (type hints and column order). See example at the end.",
    ),
    ("server.host", "Address the dashboard binds to"),
    ("server.port", "Port the dashboard listens on"),
    (
        "server.open_browser",
        "Open the default browser on startup",
    ),
    (
        "server.open_browser_delay_ms",
        "Delay before opening the browser, in milliseconds",
    ),
    (
        "display.default_page_size",
        "Initial number of table rows per page (1-500)",
    ),
    (
        "display.max_plot_bars",
        "Initial maximum number of bars per chart (0-50). 0 hides charts",
    ),
    ("chart.width", "Rendered chart width in pixels"),
    ("chart.height", "Rendered chart height in pixels"),
    ("chart.theme.font_family", "Font family for titles and labels"),
    ("chart.theme.font_size", "Title font size"),
    ("chart.theme.font_color", "Color of titles, labels and axes"),
    ("chart.theme.bar_color", "Color of unselected bars"),
    ("chart.theme.accent_color", "Color of bars for selected rows"),
];

const PROFILE_EXAMPLE: &str = "
# ============================================================================
# Dataset Profiles
# ============================================================================
# Applied to files whose name contains `match`. `dtypes` values: string,
# int64, int32, float64, float32, double, or anything containing \"date\".
# [[profiles]]
# match = \"orders\"
# columns = [\"id\", \"Category\", \"Qty\", \"Price\", \"Date\"]
# [profiles.dtypes]
# id = \"string\"
# Qty = \"int64\"
# Price = \"float64\"
# Date = \"datetime64\"
";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub profiles: Vec<LoadProfile>,
    pub server: ServerConfig,
    pub display: DisplayConfig,
    pub chart: ChartConfig,
    pub file_loading: FileLoadingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            profiles: Vec::new(),
            server: ServerConfig::default(),
            display: DisplayConfig::default(),
            chart: ChartConfig::default(),
            file_loading: FileLoadingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub open_browser: bool,
    pub open_browser_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8050,
            open_browser: true,
            open_browser_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub default_page_size: usize,
    pub max_plot_bars: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_plot_bars: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    pub theme: ChartTheme,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 900,
            height: 450,
            theme: ChartTheme::default(),
        }
    }
}

/// Fixed look applied uniformly to every rendered chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChartTheme {
    pub font_family: String,
    pub font_size: u32,
    pub font_color: String,
    pub bar_color: String,
    pub accent_color: String,
}

impl Default for ChartTheme {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 20,
            font_color: "#a5b1cd".to_string(),
            bar_color: "#0074D9".to_string(),
            accent_color: "#7FDBFF".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FileLoadingConfig {
    /// Directory listed on startup. None = current working directory.
    pub data_dir: Option<String>,
}

/// Known structure for datasets whose filename contains `pattern`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LoadProfile {
    #[serde(rename = "match")]
    pub pattern: String,
    pub columns: Option<Vec<String>>,
    pub dtypes: BTreeMap<String, String>,
}

impl LoadProfile {
    pub fn matches(&self, filename: &str) -> bool {
        !self.pattern.is_empty() && filename.contains(self.pattern.as_str())
    }
}

impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        Self::load_with(&ConfigManager::new(app_name)?)
    }

    pub fn load_with(manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        let config_path = manager.config_path("config.toml");
        if config_path.exists() {
            config.merge(Self::from_file(&config_path)?);
        }

        config.validate().map_err(|e| {
            eyre!(
                "Invalid configuration in {}: {}",
                config_path.display(),
                e
            )
        })?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read config file at {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file at {}: {}", path.display(), e))
    }

    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }
        if !other.profiles.is_empty() {
            self.profiles = other.profiles;
        }
        self.server.merge(other.server);
        self.display.merge(other.display);
        self.chart.merge(other.chart);
        if other.file_loading.data_dir.is_some() {
            self.file_loading.data_dir = other.file_loading.data_dir;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.server.port == 0 {
            return Err(eyre!("server.port must be greater than 0"));
        }

        let page_size = self.display.default_page_size;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(eyre!(
                "display.default_page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                page_size
            ));
        }

        if self.display.max_plot_bars > MAX_PLOT_BARS {
            return Err(eyre!(
                "display.max_plot_bars must be at most {}, got {}",
                MAX_PLOT_BARS,
                self.display.max_plot_bars
            ));
        }

        if self.chart.width == 0 || self.chart.height == 0 {
            return Err(eyre!("chart.width and chart.height must be greater than 0"));
        }

        self.chart.theme.validate()?;

        for profile in &self.profiles {
            for (column, hint) in &profile.dtypes {
                TypeHint::from_str(hint).map_err(|e| {
                    eyre!("profiles[match={}].dtypes.{}: {}", profile.pattern, column, e)
                })?;
            }
        }

        Ok(())
    }
}

impl ServerConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ServerConfig::default();
        if other.host != default.host {
            self.host = other.host;
        }
        if other.port != default.port {
            self.port = other.port;
        }
        if other.open_browser != default.open_browser {
            self.open_browser = other.open_browser;
        }
        if other.open_browser_delay_ms != default.open_browser_delay_ms {
            self.open_browser_delay_ms = other.open_browser_delay_ms;
        }
    }
}

impl DisplayConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DisplayConfig::default();
        if other.default_page_size != default.default_page_size {
            self.default_page_size = other.default_page_size;
        }
        if other.max_plot_bars != default.max_plot_bars {
            self.max_plot_bars = other.max_plot_bars;
        }
    }
}

impl ChartConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ChartConfig::default();
        if other.width != default.width {
            self.width = other.width;
        }
        if other.height != default.height {
            self.height = other.height;
        }
        self.theme.merge(other.theme);
    }
}

impl ChartTheme {
    pub fn merge(&mut self, other: Self) {
        let default = ChartTheme::default();
        if other.font_family != default.font_family {
            self.font_family = other.font_family;
        }
        if other.font_size != default.font_size {
            self.font_size = other.font_size;
        }
        if other.font_color != default.font_color {
            self.font_color = other.font_color;
        }
        if other.bar_color != default.bar_color {
            self.bar_color = other.bar_color;
        }
        if other.accent_color != default.accent_color {
            self.accent_color = other.accent_color;
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("font_color", &self.font_color),
            ("bar_color", &self.bar_color),
            ("accent_color", &self.accent_color),
        ] {
            parse_hex(value).map_err(|e| eyre!("chart.theme.{}: {}", name, e))?;
        }
        if self.font_size == 0 {
            return Err(eyre!("chart.theme.font_size must be greater than 0"));
        }
        Ok(())
    }
}

/// Parse a "#rrggbb" color into its components.
pub fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    let s = s.trim();
    if !s.starts_with('#') || s.len() != 7 {
        return Err(eyre!(
            "Invalid hex color format: '{}'. Expected format: #rrggbb",
            s
        ));
    }

    let r = u8::from_str_radix(&s[1..3], 16)
        .map_err(|_| eyre!("Invalid red component in hex color: {}", s))?;
    let g = u8::from_str_radix(&s[3..5], 16)
        .map_err(|_| eyre!("Invalid green component in hex color: {}", s))?;
    let b = u8::from_str_radix(&s[5..7], 16)
        .map_err(|_| eyre!("Invalid blue component in hex color: {}", s))?;

    Ok((r, g, b))
}
