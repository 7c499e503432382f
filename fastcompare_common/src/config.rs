use crate::{CompareConfig, FastCompareError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "fastcompare.toml";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: CompareConfig,
    pub path: PathBuf,
    pub exists: bool,
    pub portable: bool,
}

/// Load the settings, falling back to defaults when no file exists yet
pub fn load_config(prefer_portable: bool) -> Result<LoadedConfig, FastCompareError> {
    let (path, portable) = resolve_config_path(prefer_portable)?;
    load_config_from(path, portable)
}

pub fn load_config_from(path: PathBuf, portable: bool) -> Result<LoadedConfig, FastCompareError> {
    let exists = path.exists();

    let config = if exists {
        let data = fs::read_to_string(&path)?;
        toml::from_str(&data).map_err(|e| FastCompareError::Serialization(e.to_string()))?
    } else {
        CompareConfig::default()
    };

    Ok(LoadedConfig {
        config,
        path,
        exists,
        portable,
    })
}

pub fn ensure_config(prefer_portable: bool) -> Result<LoadedConfig, FastCompareError> {
    let mut loaded = load_config(prefer_portable)?;
    if !loaded.exists {
        save_config(&loaded.path, &loaded.config)?;
        loaded.exists = true;
    }
    Ok(loaded)
}

pub fn save_config(path: &Path, config: &CompareConfig) -> Result<(), FastCompareError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = toml::to_string_pretty(config)
        .map_err(|e| FastCompareError::Serialization(e.to_string()))?;
    fs::write(path, data)?;
    Ok(())
}

fn resolve_config_path(prefer_portable: bool) -> Result<(PathBuf, bool), FastCompareError> {
    if let Some(portable_path) = portable_config_path() {
        if prefer_portable || portable_path.exists() {
            return Ok((portable_path, true));
        }
    }

    let dirs = ProjectDirs::from("", "fastcompare", "fastcompare")
        .ok_or_else(|| FastCompareError::Config("Unable to determine config directory".to_string()))?;
    Ok((dirs.config_dir().join(CONFIG_FILE_NAME), false))
}

fn portable_config_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
}
