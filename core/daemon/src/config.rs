//! Runtime configuration loaded from `hide.toml`.
//!
//! A missing file yields defaults that point at the Android system layout.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use hide_core::{HideOptions, HidePaths};

const HOME_ENV: &str = "HIDE_HOME";
const CONFIG_ENV: &str = "HIDE_CONFIG";
const DEFAULT_HOME_DIR: &str = ".process-hide";
const CONFIG_FILE_NAME: &str = "hide.toml";
const SOCKET_NAME: &str = "daemon.sock";
const DB_NAME: &str = "hide.db";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub socket_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub app_data_dir: PathBuf,
    pub packages_xml: PathBuf,
    pub proc_root: PathBuf,
    pub mnt_ns_path: PathBuf,
    pub sdk_int: u32,
    /// Run the late-boot property pass on auto start.
    pub late_props: bool,
    pub manager_package: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let options = HideOptions::default();
        Self {
            socket_path: None,
            db_path: None,
            app_data_dir: options.paths.app_data_dir,
            packages_xml: options.paths.packages_xml,
            proc_root: options.paths.proc_root,
            mnt_ns_path: options.paths.mnt_ns_path,
            sdk_int: options.sdk_int,
            late_props: false,
            manager_package: None,
        }
    }
}

impl DaemonConfig {
    pub fn socket_path(&self, home: &Path) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(|| home.join(SOCKET_NAME))
    }

    pub fn db_path(&self, home: &Path) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| home.join(DB_NAME))
    }

    pub fn hide_options(&self) -> HideOptions {
        HideOptions {
            paths: HidePaths {
                app_data_dir: self.app_data_dir.clone(),
                packages_xml: self.packages_xml.clone(),
                proc_root: self.proc_root.clone(),
                mnt_ns_path: self.mnt_ns_path.clone(),
            },
            sdk_int: self.sdk_int,
            manager_package: self.manager_package.clone(),
        }
    }
}

/// Directory holding the socket, database and config (`$HIDE_HOME`, else `~/.process-hide`).
pub fn hide_home() -> Result<PathBuf, String> {
    if let Some(home) = non_empty_env(HOME_ENV) {
        return Ok(home);
    }
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(DEFAULT_HOME_DIR))
}

pub fn config_path(home: &Path) -> PathBuf {
    non_empty_env(CONFIG_ENV).unwrap_or_else(|| home.join(CONFIG_FILE_NAME))
}

pub fn load_config(path: &Path) -> Result<DaemonConfig, String> {
    if !path.exists() {
        return Ok(DaemonConfig::default());
    }

    let content = fs_err::read_to_string(path)
        .map_err(|err| format!("Failed to read config {}: {}", path.display(), err))?;
    toml::from_str::<DaemonConfig>(&content)
        .map_err(|err| format!("Failed to parse config {}: {}", path.display(), err))
}

fn non_empty_env(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
