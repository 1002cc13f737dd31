//! Cross-check a generated facts file against the live store.
//!
//! Every machine, fact and value in the document is checked and all
//! discrepancies are collected; nothing is written to the store or the file.

use super::document::FactsDocument;
use crate::core::{FactError, Result, RunContext};
use crate::machines::MachineManager;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub machines_checked: usize,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Validator {
    machines: MachineManager,
    ctx: RunContext,
}

impl Validator {
    pub fn new(machines: MachineManager, ctx: RunContext) -> Self {
        Self { machines, ctx }
    }

    /// Load the facts file at `path` and validate it.
    pub async fn validate_file(&self, path: &Path) -> Result<ValidationReport> {
        let text = fs::read_to_string(path).map_err(|e| {
            FactError::Infrastructure(format!("Failed to read facts file {}: {}", path.display(), e))
        })?;
        let document = FactsDocument::from_yaml(&text)?;
        self.validate_document(&document).await
    }

    /// For each machine: it must exist in the store (otherwise its facts are
    /// skipped); each fact must be registered; a fact with enumerated values
    /// must hold one of them.
    pub async fn validate_document(&self, document: &FactsDocument) -> Result<ValidationReport> {
        let registry = self.machines.registry();
        let mut report = ValidationReport::default();

        info!("starting validation");
        for (_section, machine, facts) in document.iter() {
            report.machines_checked += 1;
            if self.ctx.verbose {
                info!(machine, "checking machine");
            }

            if !self.machines.machine_exists(machine).await? {
                report.errors.push(format!("Machine {} does not exist in table", machine));
                continue;
            }

            for (fact, value) in facts.iter() {
                if self.ctx.verbose {
                    info!(machine, fact, "checking fact");
                }

                if !registry.fact_exists(fact).await? {
                    report.errors.push(format!("Fact {} is invalid", fact));
                    continue;
                }

                if registry.fact_has_enumerated_values(fact).await?
                    && !registry.value_is_valid(fact, value).await?
                {
                    report.errors.push(format!(
                        "Value {} for fact {} on machine {} is invalid",
                        value, fact, machine
                    ));
                }
            }
        }

        info!(errors = report.errors.len(), "validation finished");
        Ok(report)
    }
}
