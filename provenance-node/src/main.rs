//! Provenance Node
//!
//! ## Usage
//!
//! ```bash
//! # Write a default config
//! provenance-node init-config ./provenance.toml
//!
//! # Register a unit and an attribute type
//! provenance-node --config ./provenance.toml invoke addUnit Liter
//! provenance-node invoke putAttributeDefinition Quality String
//!
//! # Create an asset with a private price, as another organisation
//! provenance-node invoke --caller Org2MSP --transient Price=0.42 \
//!     createAsset milk1 CollectionOne milklot 50 Liter '["Quality"]' '["Bio"]'
//! ```
//!
//! The envelope is printed to stdout. The exit status only reflects host
//! failures, never a rejected invocation.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use provenance::Invocation;
use provenance_node::{parse_transient, Config, ProvenanceNode};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "provenance-node")]
#[command(about = "Run provenance contract functions against a local ledger")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "PROVENANCE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(long, env = "PROVENANCE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Invoke one contract function
    Invoke {
        function: String,

        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Private attribute value as name=value, repeatable
        #[arg(long = "transient", value_parser = transient_arg)]
        transient: Vec<(String, String)>,

        /// Organisation identity to invoke as
        #[arg(long, env = "PROVENANCE_CALLER")]
        caller: Option<String>,
    },

    /// Write a default config file
    InitConfig { path: PathBuf },
}

fn transient_arg(raw: &str) -> Result<(String, String), String> {
    parse_transient(raw).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("provenance=info".parse()?)
                .add_directive("provenance_node=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    match args.command {
        Command::InitConfig { path } => {
            config.save(&path)?;
            info!(path = %path.display(), "Created default config");
        }
        Command::Invoke {
            function,
            args,
            transient,
            caller,
        } => {
            if let Some(caller) = caller {
                config.caller = caller;
            }
            info!(
                data_dir = %config.data_dir.display(),
                caller = %config.caller,
                "Starting provenance-node"
            );

            let mut node = ProvenanceNode::open(&config)
                .with_context(|| format!("opening ledger in {}", config.data_dir.display()))?;

            let mut invocation = Invocation::new(function, args);
            invocation.transient.extend(transient);

            let envelope = node.invoke(&invocation)?;
            println!("{}", envelope.to_json());
        }
    }

    Ok(())
}
