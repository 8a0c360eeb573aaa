//! # Ontobase CLI Module
//!
//! This module implements the CLI interface for Ontobase.
//!
//! ## Available Commands
//!
//! - `init` - Build the data dictionary
//! - `status` - Show connection and dictionary status
//! - `collections` - List collections with kinds and sizes
//! - `term` - Get, add or bulk-import terms
//! - `descriptor` - Add, get or delete descriptors
//! - `relate` - Link two documents with a predicate

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use ontobase_core::{OntobaseError, Server, Value, Wrapper};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Ontobase - document store with a built-in ontology
///
/// Terms, descriptors and typed relations over a pluggable storage driver.
#[derive(Parser, Debug)]
#[command(name = "ontobase")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Connection string (overrides config and ONTOBASE_SOURCE)
    #[arg(short = 'S', long, global = true)]
    pub source: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database holding the ontology
    #[arg(short = 'D', long, global = true)]
    pub database: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the data dictionary
    Init {
        /// Erase and rebuild an existing dictionary
        #[arg(short, long)]
        force: bool,
    },

    /// Show connection and dictionary status
    Status,

    /// List collections
    Collections,

    /// Term operations
    #[command(subcommand)]
    Term(TermCommand),

    /// Descriptor operations
    #[command(subcommand)]
    Descriptor(DescriptorCommand),

    /// Store a predicate edge between two documents
    Relate {
        /// Key of the predicate term
        #[arg(short, long)]
        predicate: String,

        /// Source document identifier (collection/key)
        #[arg(short, long)]
        from: String,

        /// Destination document identifier (collection/key)
        #[arg(short, long)]
        to: String,

        /// Edge collection receiving the predicate
        #[arg(long, default_value = "relations")]
        collection: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TermCommand {
    /// Show a term by key
    Get { key: String },

    /// Create and store a term
    Add {
        /// Local identifier
        #[arg(short, long)]
        lid: String,

        /// Key of the namespace term
        #[arg(short = 'N', long)]
        namespace: Option<String>,

        /// Default-language name
        #[arg(short, long)]
        name: String,
    },

    /// Store terms from a JSON array of {lid, namespace?, name}
    Import {
        /// Path to the input file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum DescriptorCommand {
    /// Create and store a descriptor
    Add {
        /// Local identifier
        #[arg(short, long)]
        lid: String,

        /// Symbol used as a field name
        #[arg(short, long)]
        symbol: String,

        /// Data type (string, integer, float, ...)
        #[arg(short = 't', long = "type")]
        data_type: String,

        /// Data kinds (repeatable)
        #[arg(short, long = "kind")]
        kinds: Vec<String>,

        /// Key of the namespace term
        #[arg(short = 'N', long)]
        namespace: Option<String>,

        /// Default-language name
        #[arg(short, long)]
        name: String,
    },

    /// Show a descriptor by key or symbol
    Get { key: String },

    /// Delete an unused descriptor
    Delete { key: String },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Connect a wrapper for the configured database without bootstrapping it.
pub fn open_wrapper(config: &Config) -> Result<Wrapper, OntobaseError> {
    let server = Server::new(&config.source)?;
    let database = server.database(&config.database_name()?);
    let wrapper = Wrapper::new(database, config.cache.build());
    wrapper.init_cache()?;
    Ok(wrapper)
}

/// Run `command` against `config` and return its report.
pub fn run(config: &Config, command: Commands) -> Result<Value, OntobaseError> {
    let wrapper = open_wrapper(config)?;
    if !matches!(command, Commands::Init { .. }) {
        wrapper.ensure_ready()?;
    }

    match command {
        Commands::Init { force } => cmd_init(&wrapper, force),
        Commands::Status => cmd_status(&wrapper),
        Commands::Collections => cmd_collections(&wrapper),
        Commands::Term(TermCommand::Get { key }) => cmd_term_get(&wrapper, &key),
        Commands::Term(TermCommand::Add {
            lid,
            namespace,
            name,
        }) => cmd_term_add(&wrapper, &lid, namespace.as_deref(), &name),
        Commands::Term(TermCommand::Import { file }) => {
            cmd_term_import(&wrapper, &file, config.buffer_size)
        }
        Commands::Descriptor(DescriptorCommand::Add {
            lid,
            symbol,
            data_type,
            kinds,
            namespace,
            name,
        }) => cmd_descriptor_add(
            &wrapper,
            &DescriptorArgs {
                lid: &lid,
                symbol: &symbol,
                data_type: &data_type,
                kinds: &kinds,
                namespace: namespace.as_deref(),
                name: &name,
            },
        ),
        Commands::Descriptor(DescriptorCommand::Get { key }) => cmd_descriptor_get(&wrapper, &key),
        Commands::Descriptor(DescriptorCommand::Delete { key }) => {
            cmd_descriptor_delete(&wrapper, &key)
        }
        Commands::Relate {
            predicate,
            from,
            to,
            collection,
        } => cmd_relate(&wrapper, &predicate, &from, &to, &collection),
    }
}

/// Execute the CLI with parsed arguments, printing the report.
pub fn execute(cli: Cli) -> Result<(), OntobaseError> {
    let config = Config::resolve(cli.config.as_deref(), cli.source, cli.database)?;
    // No subcommand - show status by default
    let command = cli.command.unwrap_or(Commands::Status);
    let report = run(&config, command)?;

    if cli.json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
    } else if !cli.quiet {
        print!("{}", render_text(&report));
    }
    Ok(())
}
