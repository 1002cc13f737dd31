//! Configuration file
//!
//! Read once at startup. The `puppetconfig` section describes the entity
//! store, the optional `generate` section the facts file target.

use crate::core::{FactError, Result};
use crate::snapshot::SnapshotTarget;
use crate::storage::{EntityStore, FileEntityStore, TableServiceConfig, TableServiceStore};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "/etc/puppetconfig.yml";

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Table,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: Backend,
    pub endpoint: Option<String>,
    pub sas_token: Option<String>,
    pub table_name: Option<String>,
    pub proxy: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub data_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerateSection {
    pub facts_dir: PathBuf,
    pub yaml_file: String,
    pub puppet_user: Option<String>,
    pub puppet_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub puppetconfig: StoreSection,
    pub generate: Option<GenerateSection>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(FactError::Config(format!("puppetconfig.{} is required", name))),
    }
}

impl Config {
    /// Load and validate the configuration at `path`. A missing file is a
    /// configuration error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FactError::Config(format!("Config file {} does not exist", path.display())));
        }
        let text = fs::read_to_string(path)
            .map_err(|e| FactError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.puppetconfig.backend {
            Backend::Table => {
                self.table_service_config()?
                    .validate()
                    .map_err(|e| FactError::Config(format!("puppetconfig: {}", e)))?;
            }
            Backend::File => {
                if self.puppetconfig.data_file.is_none() {
                    return Err(FactError::Config(
                        "puppetconfig.data_file is required for the file backend".to_string(),
                    ));
                }
            }
        }

        if let Some(generate) = &self.generate {
            if generate.yaml_file.trim().is_empty() {
                return Err(FactError::Config("generate.yaml_file cannot be empty".to_string()));
            }
            if generate.puppet_user.is_some() != generate.puppet_group.is_some() {
                return Err(FactError::Config(
                    "generate.puppet_user and generate.puppet_group must be set together".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn table_service_config(&self) -> Result<TableServiceConfig> {
        let section = &self.puppetconfig;
        let mut config = TableServiceConfig::new(
            required(&section.endpoint, "endpoint")?,
            required(&section.table_name, "table_name")?,
            required(&section.sas_token, "sas_token")?,
        )
        .timeout(Duration::from_secs(section.timeout_secs));

        if let Some(proxy) = section.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            config = config.proxy(proxy);
        }
        Ok(config)
    }

    /// Build the entity store the configuration selects.
    pub fn open_store(&self) -> Result<Arc<dyn EntityStore>> {
        match self.puppetconfig.backend {
            Backend::Table => Ok(Arc::new(TableServiceStore::new(self.table_service_config()?)?)),
            Backend::File => {
                let path = self.puppetconfig.data_file.as_ref().ok_or_else(|| {
                    FactError::Config("puppetconfig.data_file is required for the file backend".to_string())
                })?;
                Ok(Arc::new(FileEntityStore::open(path)?))
            }
        }
    }

    pub fn snapshot_target(&self) -> Result<SnapshotTarget> {
        let generate = self
            .generate
            .as_ref()
            .ok_or_else(|| FactError::Config("generate section is missing".to_string()))?;

        Ok(SnapshotTarget {
            facts_dir: generate.facts_dir.clone(),
            yaml_file: generate.yaml_file.clone(),
            owner_user: generate.puppet_user.clone(),
            owner_group: generate.puppet_group.clone(),
        })
    }
}
