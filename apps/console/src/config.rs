use std::fs;

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Usually discovered from the controller; only needed when the
    /// snapshot payload omits its id.
    pub screen_id: Option<String>,
    pub request_timeout_secs: u64,
    pub refresh_interval_ms: u64,
    pub min_layer_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "10.0.0.22".into(),
            port: 8001,
            screen_id: None,
            request_timeout_secs: client_core::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            refresh_interval_ms: 2000,
            min_layer_size: client_core::DEFAULT_MIN_LAYER_SIZE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    host: Option<String>,
    port: Option<u16>,
    screen_id: Option<String>,
    request_timeout_secs: Option<u64>,
    refresh_interval_ms: Option<u64>,
    min_layer_size: Option<u32>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("console.toml") {
        apply_file_config(&mut settings, &raw);
    }
    apply_env(&mut settings);

    debug!(host = %settings.host, port = settings.port, "settings loaded");
    settings
}

fn apply_file_config(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<FileSettings>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.host {
        settings.host = v;
    }
    if let Some(v) = file_cfg.port {
        settings.port = v;
    }
    if let Some(v) = file_cfg.screen_id {
        settings.screen_id = Some(v);
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.refresh_interval_ms {
        settings.refresh_interval_ms = v;
    }
    if let Some(v) = file_cfg.min_layer_size {
        settings.min_layer_size = v;
    }
}

fn apply_env(settings: &mut Settings) {
    if let Ok(v) = std::env::var("COEX_HOST") {
        settings.host = v;
    }
    if let Ok(v) = std::env::var("COEX_PORT") {
        if let Ok(parsed) = v.parse() {
            settings.port = parsed;
        }
    }
    if let Ok(v) = std::env::var("COEX_SCREEN_ID") {
        settings.screen_id = Some(v);
    }
    if let Ok(v) = std::env::var("COEX_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Ok(v) = std::env::var("COEX_REFRESH_MS") {
        if let Ok(parsed) = v.parse() {
            settings.refresh_interval_ms = parsed;
        }
    }
    if let Ok(v) = std::env::var("COEX_MIN_LAYER_SIZE") {
        if let Ok(parsed) = v.parse() {
            settings.min_layer_size = parsed;
        }
    }
}
