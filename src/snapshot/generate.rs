//! Facts file generation
//!
//! Scans every machine record into a [`FactsDocument`] and writes it to the
//! configured path. An existing file is first copied to a timestamped backup
//! next to it; backups are never removed.

use super::document::FactsDocument;
use super::owner::Ownership;
use crate::core::{FactError, Result, RunContext};
use crate::machines::MachineManager;
use chrono::{DateTime, Local};
use futures::TryStreamExt;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Backup suffix format: day-month-year-hour-minute-second.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%d-%m-%Y-%H-%M-%S";

/// Where the facts file goes and who owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTarget {
    pub facts_dir: PathBuf,
    pub yaml_file: String,
    pub owner_user: Option<String>,
    pub owner_group: Option<String>,
}

impl SnapshotTarget {
    pub fn new(facts_dir: impl Into<PathBuf>, yaml_file: impl Into<String>) -> Self {
        Self {
            facts_dir: facts_dir.into(),
            yaml_file: yaml_file.into(),
            owner_user: None,
            owner_group: None,
        }
    }

    pub fn owner(mut self, user: &str, group: &str) -> Self {
        self.owner_user = Some(user.to_string());
        self.owner_group = Some(group.to_string());
        self
    }

    pub fn path(&self) -> PathBuf {
        self.facts_dir.join(&self.yaml_file)
    }

    pub fn backup_path(&self, at: DateTime<Local>) -> PathBuf {
        self.facts_dir
            .join(format!("{}.{}", self.yaml_file, at.format(BACKUP_TIMESTAMP_FORMAT)))
    }

    /// Resolve the configured owner. `None` when no owner is configured.
    pub fn ownership(&self) -> Result<Option<Ownership>> {
        match (&self.owner_user, &self.owner_group) {
            (Some(user), Some(group)) => Ownership::resolve(user, group).map(Some),
            (None, None) => Ok(None),
            _ => Err(FactError::Config(
                "puppet_user and puppet_group must be set together".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
    pub machine_count: usize,
    pub fact_count: usize,
}

pub struct Generator {
    machines: MachineManager,
    target: SnapshotTarget,
    ctx: RunContext,
}

impl Generator {
    pub fn new(machines: MachineManager, target: SnapshotTarget, ctx: RunContext) -> Self {
        Self { machines, target, ctx }
    }

    /// Scan every machine record into a document.
    pub async fn build_document(&self) -> Result<FactsDocument> {
        let mut document = FactsDocument::new();
        let mut records = self.machines.list_records();

        while let Some((machine, facts)) = records.try_next().await? {
            if self.ctx.verbose {
                info!(machine = %machine, facts = facts.len(), "adding machine");
                for (fact, value) in facts.iter() {
                    info!(machine = %machine, fact, value, "adding fact");
                }
            }
            document.insert_machine(machine, facts);
        }

        Ok(document)
    }

    pub async fn generate(&self) -> Result<(FactsDocument, GenerateReport)> {
        self.generate_at(Local::now()).await
    }

    /// Generate using `now` for the backup timestamp.
    pub async fn generate_at(&self, now: DateTime<Local>) -> Result<(FactsDocument, GenerateReport)> {
        let ownership = self.target.ownership()?;
        if ownership.is_none() {
            warn!("no puppet_user/puppet_group configured, leaving file ownership unchanged");
        }

        let document = self.build_document().await?;
        let yaml = document.to_yaml()?;

        let dir = &self.target.facts_dir;
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                FactError::Infrastructure(format!("Failed to create {}: {}", dir.display(), e))
            })?;
            if let Some(owner) = ownership {
                owner.apply(dir)?;
            }
            info!(dir = %dir.display(), "created facts directory");
        }

        let path = self.target.path();
        let backup = if path.exists() {
            let backup = self.target.backup_path(now);
            fs::copy(&path, &backup).map_err(|e| {
                FactError::Infrastructure(format!(
                    "Failed to back up {} to {}: {}",
                    path.display(),
                    backup.display(),
                    e
                ))
            })?;
            info!(from = %path.display(), to = %backup.display(), "backed up facts file");
            Some(backup)
        } else {
            None
        };

        write_replacing(&path, yaml.as_bytes(), ownership)?;

        let fact_count = document.iter().map(|(_, _, facts)| facts.len()).sum();
        let report = GenerateReport {
            path,
            backup,
            machine_count: document.machine_count(),
            fact_count,
        };
        info!(path = %report.path.display(), machines = report.machine_count, "facts file written");

        Ok((document, report))
    }
}

// Readers never observe a half-written file: the content goes to a temp file
// in the same directory, which then replaces the target. Mode and owner are
// set on the temp file, so a failure leaves the previous file in place.
fn write_replacing(path: &Path, contents: &[u8], ownership: Option<Ownership>) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o644))?;
    if let Some(owner) = ownership {
        owner.apply(temp.path())?;
    }
    temp.persist(path).map_err(|e| {
        FactError::Infrastructure(format!("Failed to write {}: {}", path.display(), e))
    })?;
    Ok(())
}
