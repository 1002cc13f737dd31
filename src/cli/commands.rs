use super::{Cli, Command};
use crate::config::Config;
use crate::core::{Result, RunContext};
use crate::machines::MachineManager;
use crate::registry::FactRegistry;
use crate::result::ResultTable;
use crate::snapshot::{Generator, SnapshotTarget, Validator};
use futures::TryStreamExt;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Exit code for a completed validation that found errors.
const VALIDATION_FAILED: u8 = 1;

/// Load the configuration, open the store and execute the parsed command,
/// writing command output to `out`. Returns the exit code for a command that
/// ran to completion; failures come back as errors carrying their own code.
pub async fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<u8> {
    let ctx = cli.context();
    let config = Config::load(&cli.config_file)?;
    debug!(config = %cli.config_file.display(), backend = ?config.puppetconfig.backend, "configuration loaded");

    let store = config.open_store()?;
    let registry = FactRegistry::new(store.clone(), ctx);
    let machines = MachineManager::new(store, registry);

    execute(&cli.command, &config, machines, ctx, out).await
}

async fn execute<W: Write>(
    command: &Command,
    config: &Config,
    machines: MachineManager,
    ctx: RunContext,
    out: &mut W,
) -> Result<u8> {
    let registry = machines.registry();

    match command {
        Command::ListMachines => {
            let mut names = machines.list_machines();
            while let Some(name) = names.try_next().await? {
                writeln!(out, "{}", name)?;
            }
        }
        Command::ShowMachine { machine } => {
            let facts = machines.get_facts(machine).await?;
            let mut table = ResultTable::new(["Fact", "Value"]);
            for (fact, value) in facts.iter() {
                table.push_row([fact, value]);
            }
            writeln!(out)?;
            writeln!(out, "Facts for machine {}", machine)?;
            writeln!(out)?;
            write!(out, "{}", table)?;
        }
        Command::SetFact { machine, fact, value } => {
            machines.set_fact(machine, fact, value).await?;
            writeln!(out, "Added fact {} value {} to machine {}", fact, value, machine)?;
        }
        Command::DeleteFact { machine, fact } => {
            machines.delete_fact(machine, fact).await?;
            writeln!(out, "Deleted fact {} from machine {}", fact, machine)?;
        }
        Command::AddMachine { machine } => {
            machines.add_machine(machine).await?;
            writeln!(out, "Machine {} added to configuration", machine)?;
        }
        Command::DeleteMachine { machine } => {
            machines.delete_machine(machine).await?;
            writeln!(out, "Machine {} deleted", machine)?;
        }
        Command::AddValidFact { fact } => {
            registry.add_fact(fact).await?;
            writeln!(out, "Valid Fact {} added to configuration", fact)?;
        }
        Command::ListValidFact => {
            let facts: Vec<_> = registry.list_facts().try_collect().await?;
            let mut table = ResultTable::new(["Valid Facts", "Has List Of Valid Values"]);
            for fact in facts {
                table.push_row([fact.name, flag(fact.has_values).to_string()]);
            }
            write!(out, "{}", table)?;
        }
        Command::DeleteValidFact { fact } => {
            registry.delete_fact(fact).await?;
            writeln!(out, "Valid Fact {} deleted", fact)?;
        }
        Command::AddValidFactValue { fact, value } => {
            registry.add_fact_value(fact, value).await?;
            writeln!(out, "Valid Fact Value {} added to fact {}", value, fact)?;
        }
        Command::ListValidFactValue { fact } => {
            let values: Vec<String> = registry.list_fact_values(fact).try_collect().await?;
            if values.is_empty() {
                writeln!(out, "No valid values for fact {}", fact)?;
            } else {
                let mut table = ResultTable::new([format!("Valid Values for fact {}", fact)]);
                for value in values {
                    table.push_row([value]);
                }
                write!(out, "{}", table)?;
            }
        }
        Command::DeleteValidFactValue { fact, value } => {
            registry.delete_fact_value(fact, value).await?;
            writeln!(out, "Value {} removed from fact {}", value, fact)?;
        }
        Command::ListMachinesWithFact { fact, value } => {
            let mut names = machines.list_machines_with_fact(fact, value.as_deref());
            while let Some(name) = names.try_next().await? {
                writeln!(out, "{}", name)?;
            }
        }
        Command::Generate => return generate(machines, config.snapshot_target()?, ctx, out).await,
        Command::Validate => return validate(machines, &config.snapshot_target()?.path(), ctx, out).await,
    }

    Ok(0)
}

async fn generate<W: Write>(
    machines: MachineManager,
    target: SnapshotTarget,
    ctx: RunContext,
    out: &mut W,
) -> Result<u8> {
    let generator = Generator::new(machines, target, ctx);
    let (_, report) = generator.generate().await?;

    if let Some(backup) = &report.backup {
        writeln!(out, "Backed up {} to {}", report.path.display(), backup.display())?;
    }
    writeln!(
        out,
        "Wrote {} ({} machines, {} facts)",
        report.path.display(),
        report.machine_count,
        report.fact_count
    )?;
    Ok(0)
}

async fn validate<W: Write>(
    machines: MachineManager,
    path: &Path,
    ctx: RunContext,
    out: &mut W,
) -> Result<u8> {
    let report = Validator::new(machines, ctx).validate_file(path).await?;

    if report.ok() {
        writeln!(out, "Validation successful")?;
        return Ok(0);
    }

    writeln!(out, "Validation unsuccessful")?;
    let mut table = ResultTable::new(["Errors"]);
    for error in &report.errors {
        table.push_row([error.as_str()]);
    }
    write!(out, "{}", table)?;
    Ok(VALIDATION_FAILED)
}

fn flag(has_values: bool) -> &'static str {
    if has_values { "yes" } else { "no" }
}
