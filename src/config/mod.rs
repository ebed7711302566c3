use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::channel::{DEFAULT_PORT, DeviceAddress, Timeouts};

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub device: DeviceConfig,
    pub ui: UiConfig,
    pub exports: ExportsConfig,
    pub catalog: CatalogConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl DeviceConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            read: Duration::from_millis(self.read_timeout_ms),
        }
    }

    /// `host`/`port` flags take precedence over the configured device.
    pub fn address(&self, host: Option<&str>, port: Option<u16>) -> Option<DeviceAddress> {
        let host = host
            .map(str::to_string)
            .or_else(|| self.host.clone())
            .filter(|h| !h.trim().is_empty())?;
        Some(DeviceAddress::new(host.trim(), port.unwrap_or(self.port)))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportsConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl EffectiveConfig {
    fn defaults(home_dir: &Path) -> Self {
        Self {
            device: DeviceConfig {
                host: None,
                port: DEFAULT_PORT,
                connect_timeout_ms: 5000,
                read_timeout_ms: 5000,
            },
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            exports: ExportsConfig {
                dir: default_exports_dir(home_dir),
            },
            catalog: CatalogConfig { path: None },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    device: Option<RawDeviceConfig>,
    ui: Option<RawUiConfig>,
    exports: Option<RawExportsConfig>,
    catalog: Option<RawCatalogConfig>,
}

#[derive(Debug, Deserialize)]
struct RawDeviceConfig {
    host: Option<String>,
    port: Option<u16>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawExportsConfig {
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawCatalogConfig {
    path: Option<PathBuf>,
}

pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("HOME is not set"))
}

pub fn config_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/avlab")
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    config_dir(home_dir).join("config.toml")
}

pub fn default_exports_dir(home_dir: &Path) -> PathBuf {
    config_dir(home_dir).join("exports")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::defaults(home_dir);

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw, home_dir);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg, home_dir)?;

    Ok(cfg)
}

/// Expands a leading `~/` against `home_dir`.
fn expand_home(path: PathBuf, home_dir: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir.join(rest),
        Err(_) => path,
    }
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig, home_dir: &Path) {
    if let Some(device) = raw.device {
        if let Some(host) = device.host {
            cfg.device.host = Some(host);
        }
        if let Some(port) = device.port {
            cfg.device.port = port;
        }
        if let Some(ms) = device.connect_timeout_ms {
            cfg.device.connect_timeout_ms = ms;
        }
        if let Some(ms) = device.read_timeout_ms {
            cfg.device.read_timeout_ms = ms;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(exports) = raw.exports {
        if let Some(dir) = exports.dir {
            cfg.exports.dir = expand_home(dir, home_dir);
        }
    }

    if let Some(catalog) = raw.catalog {
        if let Some(path) = catalog.path {
            cfg.catalog.path = Some(expand_home(path, home_dir));
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig, home_dir: &Path) -> Result<()> {
    if let Ok(v) = std::env::var("AVLAB_DEVICE_HOST") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.device.host = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("AVLAB_DEVICE_PORT") {
        cfg.device.port = v.trim().parse::<u16>().with_context(|| "AVLAB_DEVICE_PORT")?;
    }
    if let Ok(v) = std::env::var("AVLAB_DEVICE_CONNECT_TIMEOUT_MS") {
        cfg.device.connect_timeout_ms = v
            .trim()
            .parse::<u64>()
            .with_context(|| "AVLAB_DEVICE_CONNECT_TIMEOUT_MS")?;
    }
    if let Ok(v) = std::env::var("AVLAB_DEVICE_READ_TIMEOUT_MS") {
        cfg.device.read_timeout_ms = v
            .trim()
            .parse::<u64>()
            .with_context(|| "AVLAB_DEVICE_READ_TIMEOUT_MS")?;
    }
    if let Ok(v) = std::env::var("AVLAB_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "AVLAB_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("AVLAB_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "AVLAB_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("AVLAB_EXPORTS_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.exports.dir = expand_home(PathBuf::from(v), home_dir);
        }
    }
    if let Ok(v) = std::env::var("AVLAB_CATALOG") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.catalog.path = Some(expand_home(PathBuf::from(v), home_dir));
        }
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_configured_device() {
        let mut device = EffectiveConfig::defaults(Path::new("/home/u")).device;
        assert_eq!(device.address(None, None), None);

        device.host = Some("10.0.0.5".into());
        assert_eq!(
            device.address(None, None),
            Some(DeviceAddress::new("10.0.0.5", 2222))
        );
        assert_eq!(
            device.address(Some("vrroom.local"), Some(23)),
            Some(DeviceAddress::new("vrroom.local", 23))
        );
        assert_eq!(device.timeouts().read, Duration::from_secs(5));
    }

    #[test]
    fn raw_sections_apply_over_defaults() {
        let home = Path::new("/home/u");
        let mut cfg = EffectiveConfig::defaults(home);
        let raw: RawConfig = toml::from_str(
            r#"
            [device]
            host = "192.168.1.40"
            read_timeout_ms = 1500

            [exports]
            dir = "~/av/exports"
            "#,
        )
        .expect("toml");
        apply_raw_config(&mut cfg, raw, home);
        assert_eq!(cfg.device.host.as_deref(), Some("192.168.1.40"));
        assert_eq!(cfg.device.port, 2222);
        assert_eq!(cfg.device.read_timeout_ms, 1500);
        assert_eq!(cfg.exports.dir, PathBuf::from("/home/u/av/exports"));
        assert!(cfg.ui.color);
    }

    #[test]
    fn bool_spellings() {
        assert!(parse_bool(" Yes ").expect("yes"));
        assert!(!parse_bool("off").expect("off"));
        assert!(parse_bool("maybe").is_err());
    }
}
