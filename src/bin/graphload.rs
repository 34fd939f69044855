//! graphload - bulk load a JSON-lines command file into a graph store
//!
//! Usage:
//!   graphload <db-path> <input.jsonl> [--workers N] [--batch-size N]
//!
//! Each input line is one command:
//!   {"op":"vertexType","name":"Person"}
//!   {"op":"edgeType","name":"Friend","superclass":"E"}
//!   {"op":"vertex","id":"luigi","vertexType":"Person","properties":{"age":40}}
//!   {"op":"edge","fromId":"luigi","fromType":"Person","toId":"luca","toType":"Person","edgeType":"Friend"}

use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use graphload::{EdgeSpec, Loader, LoaderConfig, StoreHandle, VertexSpec};

const LOG_ENV: &str = "GRAPHLOAD_LOG";

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum Command {
    VertexType {
        name: String,
        #[serde(default)]
        superclass: Option<String>,
    },
    EdgeType {
        name: String,
        #[serde(default)]
        superclass: Option<String>,
    },
    Vertex(VertexSpec),
    Edge(EdgeSpec),
}

fn usage() -> ! {
    eprintln!("Usage: graphload <db-path> <input.jsonl> [--workers N] [--batch-size N]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <db-path>       sled directory, or memory:<name>");
    eprintln!("  <input.jsonl>   one JSON command per line");
    eprintln!("  --workers       ingestion worker threads (default: CPU count)");
    eprintln!("  --batch-size    finalization page size (default: 100)");
    std::process::exit(1);
}

fn flag_value(args: &[String], flag: &str) -> Result<Option<usize>> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(i) => {
            let raw = args
                .get(i + 1)
                .with_context(|| format!("{} needs a value", flag))?;
            let value = raw
                .parse()
                .with_context(|| format!("{} is not a number: {}", flag, raw))?;
            Ok(Some(value))
        }
    }
}

fn apply(loader: &Loader<StoreHandle>, command: Command) -> graphload::Result<()> {
    match command {
        Command::VertexType { name, superclass } => {
            loader.create_vertex_type(&name, superclass.as_deref())
        }
        Command::EdgeType { name, superclass } => {
            loader.create_edge_type(&name, superclass.as_deref())
        }
        Command::Vertex(spec) => loader.add_vertex(spec.id, &spec.vertex_type, spec.properties),
        Command::Edge(spec) => loader.add_edge(
            spec.from_id,
            &spec.from_type,
            spec.to_id,
            &spec.to_type,
            &spec.edge_type,
            spec.properties,
        ),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let mut config = LoaderConfig::from_env()?;
    if let Some(workers) = flag_value(&args, "--workers")? {
        config.workers = workers;
    }
    if let Some(size) = flag_value(&args, "--batch-size")? {
        config.finalize_batch_size = size;
    }

    let input = File::open(&args[2]).with_context(|| format!("cannot open {}", args[2]))?;
    let loader = Loader::connect_with_config(&args[1], config)
        .with_context(|| format!("cannot connect to {}", args[1]))?;
    tracing::info!("Loading {} into {}", args[2], args[1]);

    for (n, line) in BufReader::new(input).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command: Command = match serde_json::from_str(&line) {
            Ok(command) => command,
            Err(err) => bail!("line {}: {}", n + 1, err),
        };
        apply(&loader, command).with_context(|| format!("line {}", n + 1))?;
    }

    let report = loader.close()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
