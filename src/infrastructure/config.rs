use crate::domain::{config::PaiCoreConfig, error::{PaiCoreError, PaiCoreResult}};
use std::path::{Path, PathBuf};
use std::fs;
use tracing::debug;

const CONFIG_DIR: &str = ".paicore";
const CONFIG_FILE: &str = "config.toml";

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> PaiCoreResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Create a manager over explicit locations
    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    /// Load configuration; a project file takes precedence over the global one
    pub fn load_config(&self) -> PaiCoreResult<PaiCoreConfig> {
        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                debug!("Loading project configuration from {}", project_path.display());
                return self.load_config_from_path(project_path);
            }
        }

        if self.global_config_path.exists() {
            debug!("Loading global configuration from {}", self.global_config_path.display());
            return self.load_config_from_path(&self.global_config_path);
        }

        Ok(PaiCoreConfig::default())
    }

    /// Get global configuration path
    fn get_global_config_path() -> PaiCoreResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| PaiCoreError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("paicore").join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> PaiCoreResult<PaiCoreConfig> {
        let content = fs::read_to_string(path).map_err(|e| PaiCoreError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: PaiCoreConfig = toml::from_str(&content).map_err(|e| PaiCoreError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        config.frame.validate()?;
        Ok(config)
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &PaiCoreConfig) -> PaiCoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PaiCoreError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| PaiCoreError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| PaiCoreError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Create default project configuration under `path`
    pub fn init_project_config(&self, path: &Path) -> PaiCoreResult<PathBuf> {
        let config_file = path.join(CONFIG_DIR).join(CONFIG_FILE);

        if config_file.exists() {
            return Err(PaiCoreError::Config {
                message: "Project configuration already exists".to_string(),
            });
        }

        self.save_config_to_path(&config_file, &PaiCoreConfig::default())?;
        Ok(config_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::FrameError;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_paths(temp_dir.path().join("missing.toml"), None);
        let config = manager.load_config().unwrap();

        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config, PaiCoreConfig::default());
    }

    #[test]
    fn test_project_overrides_global() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        fs::write(&global, "[serial]\nbaud_rate = 115200\n").unwrap();

        let manager = ConfigManager::with_paths(global.clone(), None);
        assert_eq!(manager.load_config().unwrap().serial.baud_rate, 115200);

        let project = manager.init_project_config(temp_dir.path()).unwrap();
        let manager = ConfigManager::with_paths(global, Some(project));
        assert_eq!(manager.load_config().unwrap().serial.baud_rate, 9600);
    }

    #[test]
    fn test_init_project_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_paths(temp_dir.path().join("global.toml"), None);

        let config_file = manager.init_project_config(temp_dir.path()).unwrap();
        assert_eq!(config_file, temp_dir.path().join(".paicore").join("config.toml"));

        let content = fs::read_to_string(&config_file).unwrap();
        let config: PaiCoreConfig = toml::from_str(&content).unwrap();
        assert_eq!(config, PaiCoreConfig::default());

        assert!(manager.init_project_config(temp_dir.path()).is_err());
    }

    #[test]
    fn test_out_of_range_frame_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[frame]\npll_clkod = 16\n").unwrap();

        let manager = ConfigManager::with_paths(temp_dir.path().join("global.toml"), None);
        let err = manager.load_config_from_path(&path).unwrap_err();
        assert!(matches!(
            err,
            PaiCoreError::Frame(FrameError::FieldOutOfRange { field: "pll_clkod", .. })
        ));
    }

    #[test]
    fn test_unparseable_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[serial\nport = ").unwrap();

        let manager = ConfigManager::with_paths(temp_dir.path().join("global.toml"), None);
        assert!(matches!(
            manager.load_config_from_path(&path),
            Err(PaiCoreError::Config { .. })
        ));
    }
}
