use dxview::config::{AppConfig, ConfigManager};
use std::fs;
use tempfile::TempDir;

// Helper to create a temporary config directory for testing
fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

fn write_config(manager: &ConfigManager, content: &str) {
    manager.ensure_config_dir().unwrap();
    fs::write(manager.config_path("config.toml"), content).unwrap();
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.version, "0.1");
    assert!(config.profiles.is_empty());

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8050);
    assert!(config.server.open_browser);
    assert_eq!(config.server.open_browser_delay_ms, 1000);

    assert_eq!(config.display.default_page_size, 10);
    assert_eq!(config.display.max_plot_bars, 10);

    assert_eq!(config.chart.theme.font_family, "Arial");
    assert_eq!(config.chart.theme.font_size, 20);
    assert_eq!(config.chart.theme.font_color, "#a5b1cd");
    assert_eq!(config.chart.theme.bar_color, "#0074D9");
    assert_eq!(config.chart.theme.accent_color, "#7FDBFF");

    assert!(config.file_loading.data_dir.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_generate_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let template = config_manager.generate_default_config();

    assert!(template.contains("# [server]"));
    assert!(template.contains("# [display]"));
    assert!(template.contains("# [chart.theme]"));
    assert!(template.contains("# [file_loading]"));
    assert!(template.contains("# data_dir = \"/path/to/data\""));
    assert!(template.contains("# [[profiles]]"));
    assert!(template.contains("# Port the dashboard listens on"));

    // Every non-empty line is a comment so the defaults stay in effect
    for line in template.lines() {
        let trimmed = line.trim();
        assert!(
            trimmed.is_empty() || trimmed.starts_with('#'),
            "uncommented line: {}",
            line
        );
    }
}

#[test]
fn test_write_default_config_respects_force() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let path = config_manager.write_default_config(false).unwrap();
    assert!(path.exists());
    assert_eq!(path, config_manager.config_path("config.toml"));

    assert!(config_manager.write_default_config(false).is_err());
    fs::write(&path, "# edited\n").unwrap();
    config_manager.write_default_config(true).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("# dxview configuration file"));
}

#[test]
fn test_generated_config_loads_as_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager.write_default_config(false).unwrap();

    let config = AppConfig::load_with(&config_manager).unwrap();
    assert_eq!(config.server, AppConfig::default().server);
    assert_eq!(config.display, AppConfig::default().display);
    assert_eq!(config.chart, AppConfig::default().chart);
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let config = AppConfig::load_with(&config_manager).unwrap();
    assert_eq!(config.server.port, 8050);
    assert!(config.profiles.is_empty());
}

#[test]
fn test_user_config_merges_over_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_config(
        &config_manager,
        r##"
[server]
port = 9000
open_browser = false

[display]
max_plot_bars = 25

[chart.theme]
bar_color = "#112233"

[file_loading]
data_dir = "/srv/datasets"
"##,
    );

    let config = AppConfig::load_with(&config_manager).unwrap();
    assert_eq!(config.server.port, 9000);
    assert!(!config.server.open_browser);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.display.max_plot_bars, 25);
    assert_eq!(config.display.default_page_size, 10);
    assert_eq!(config.chart.theme.bar_color, "#112233");
    assert_eq!(config.chart.theme.accent_color, "#7FDBFF");
    assert_eq!(config.chart.width, 900);
    assert_eq!(
        config.file_loading.data_dir.as_deref(),
        Some("/srv/datasets")
    );
}

#[test]
fn test_profiles_parse_with_match_key() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_config(
        &config_manager,
        r#"
[[profiles]]
match = "orders"
columns = ["id", "Qty", "Date"]

[profiles.dtypes]
id = "string"
Qty = "int64"
Date = "datetime64"
"#,
    );

    let config = AppConfig::load_with(&config_manager).unwrap();
    assert_eq!(config.profiles.len(), 1);
    let profile = &config.profiles[0];
    assert!(profile.matches("orders_2023.csv"));
    assert_eq!(profile.pattern, "orders");
    assert_eq!(
        profile.columns.as_deref(),
        Some(&["id".to_string(), "Qty".to_string(), "Date".to_string()][..])
    );
    assert_eq!(profile.dtypes.get("Qty").map(String::as_str), Some("int64"));
    assert!(!profile.matches("inventory.csv"));
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        "[server]\nport = 0\n",
        "[display]\ndefault_page_size = 0\n",
        "[display]\ndefault_page_size = 501\n",
        "[display]\nmax_plot_bars = 51\n",
        "[chart.theme]\nbar_color = \"blue\"\n",
        "[chart.theme]\nfont_size = 0\n",
        "version = \"0.2\"\n",
        "[[profiles]]\nmatch = \"x\"\n[profiles.dtypes]\nQty = \"decimal\"\n",
    ];

    for content in cases {
        let (_temp_dir, config_manager) = setup_test_config_dir();
        write_config(&config_manager, content);
        let result = AppConfig::load_with(&config_manager);
        assert!(result.is_err(), "accepted invalid config: {}", content);
    }
}

#[test]
fn test_malformed_toml_is_reported() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_config(&config_manager, "[server\nport = ");
    let err = AppConfig::load_with(&config_manager).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}
