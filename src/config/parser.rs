use super::FleetConfig;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAMES: [&str; 2] = ["devdeck.yaml", "devdeck.yml"];

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Find config file starting from current directory
    pub fn find_config_file(&self) -> Result<PathBuf> {
        let current_dir = std::env::current_dir()?;
        Self::find_config_in_dir(&current_dir)
    }

    pub fn find_config_in_dir(dir: &Path) -> Result<PathBuf> {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        // Try parent directory
        if let Some(parent) = dir.parent() {
            return Self::find_config_in_dir(parent);
        }

        Err(Error::Config(
            "Could not find devdeck.yaml in current directory or any parent".to_string(),
        ))
    }

    /// Load config from file path.
    ///
    /// Relative service directories are resolved against the directory
    /// containing the config file.
    pub fn load_config<P: AsRef<Path>>(&self, path: P) -> Result<FleetConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config = self.parse_config(&content)?;

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        for service in &mut config.services {
            if service.directory.is_relative() {
                service.directory = base.join(&service.directory);
            }
        }

        Ok(config)
    }

    pub fn parse_config(&self, content: &str) -> Result<FleetConfig> {
        let config: FleetConfig = serde_yaml::from_str(content)?;

        let mut seen = HashSet::new();
        for service in &config.services {
            if service.name.trim().is_empty() {
                return Err(Error::Config("Service with empty name".to_string()));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(Error::DuplicateService(service.name.clone()));
            }
        }

        for (profile_name, profile) in &config.profiles {
            for member in &profile.services {
                if !seen.contains(member.as_str()) {
                    return Err(Error::Config(format!(
                        "Profile '{}' references unknown service '{}'",
                        profile_name, member
                    )));
                }
            }
        }

        Ok(config)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
