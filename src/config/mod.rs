//! Connection and suite configuration with a three-step fallback chain.
//!
//! Every setting resolves explicit value first, then the `eggdrive.config`
//! key=value file, then a built-in default. The engine does not have to be
//! running for any of this; resolution is pure file access.

use std::{
    collections::HashMap,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use directories::BaseDirs;

pub const DEFAULT_HOST: &str = "http://127.0.0.1";
pub const DEFAULT_PORT: u16 = 5400;
pub const DEFAULT_SCRIPTS_DIR: &str = "Scripts";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Resolved configuration consumed once at library construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Path to the engine suite directory (`*.suite`). May be empty when
    /// nothing was configured and no suite was found next to the config.
    pub suite: PathBuf,
    /// Directory inside the suite where the scripts live.
    pub scripts_dir: String,
    pub request_timeout_secs: u64,
}

/// Explicit values that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub suite: Option<PathBuf>,
    pub scripts_dir: Option<String>,
}

impl Config {
    pub fn resolve(overrides: Overrides) -> Self {
        let config_path = overrides
            .config_path
            .clone()
            .unwrap_or_else(default_config_path);
        let file = read_config_file(&config_path);

        let host = overrides
            .host
            .or_else(|| file.get("host").cloned())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = overrides
            .port
            .or_else(|| file.get("port").and_then(|v| v.parse().ok()))
            .unwrap_or(DEFAULT_PORT);
        let scripts_dir = overrides
            .scripts_dir
            .or_else(|| file.get("scripts_dir").cloned())
            .unwrap_or_else(|| DEFAULT_SCRIPTS_DIR.to_string());
        let request_timeout_secs = file
            .get("request_timeout")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let suite = overrides
            .suite
            .or_else(|| file.get("suite").map(PathBuf::from))
            .unwrap_or_else(|| find_suite_near(&config_path).unwrap_or_default());
        let suite = absolutize(suite);

        Self {
            host,
            port,
            suite,
            scripts_dir,
            request_timeout_secs,
        }
    }

    /// Engine endpoint, e.g. `http://127.0.0.1:5400`.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn scripts_root(&self) -> PathBuf {
        self.suite.join(&self.scripts_dir)
    }
}

fn read_config_file(path: &Path) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Ok(file) = fs::File::open(path) {
        let reader = BufReader::new(file);
        for line in reader.lines().map_while(|l| l.ok()) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((k, v)) = line.split_once('=') {
                map.insert(k.trim().to_string(), v.trim().to_string());
            }
        }
    }
    map
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("eggdrive").join("eggdrive.config")
}

/// First `*.suite` entry in the config file's directory, then in the
/// working directory.
fn find_suite_near(config_path: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = config_path.parent() {
        candidates.push(dir.to_path_buf());
    }
    candidates.push(PathBuf::from("."));

    for dir in candidates {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("suite") {
                return Some(path);
            }
        }
    }
    None
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return path;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&path))
        .unwrap_or(path)
}
