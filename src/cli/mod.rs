//! Command-line surface
//!
//! Each subcommand maps to one registry, machine manager, generator or
//! validator operation. [`run`] returns the process exit code.

mod commands;

pub use commands::run;

use crate::config::DEFAULT_CONFIG_FILE;
use crate::core::RunContext;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "puppetconfig")]
#[command(about = "Manage per-machine Puppet facts held in a table store")]
#[command(version)]
pub struct Cli {
    /// Log store round trips and internal detail
    #[arg(long, global = true)]
    pub debug: bool,

    /// Report progress of generate and validate
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Configuration file
    #[arg(
        long,
        global = true,
        env = "PUPPETCONFIG_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn context(&self) -> RunContext {
        RunContext::new(self.debug, self.verbose)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every machine
    ListMachines,
    /// Show the facts set on a machine
    ShowMachine { machine: String },
    /// Set a fact on a machine
    SetFact {
        machine: String,
        fact: String,
        value: String,
    },
    /// Remove a fact from a machine
    DeleteFact { machine: String, fact: String },
    AddMachine { machine: String },
    DeleteMachine { machine: String },
    /// Write the facts file from the store, backing up the previous one
    Generate,
    /// Check the facts file against the store
    Validate,
    AddValidFact { fact: String },
    ListValidFact,
    DeleteValidFact { fact: String },
    AddValidFactValue { fact: String, value: String },
    ListValidFactValue { fact: String },
    DeleteValidFactValue { fact: String, value: String },
    /// List machines that have a fact, optionally with a given value
    ListMachinesWithFact {
        fact: String,
        #[arg(long)]
        value: Option<String>,
    },
}
