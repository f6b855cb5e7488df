//! Manual exercise CLI for the engine — `query`/`update`/`ontology load`
//! against a project-local SQLite file, standing in for the D-Bus service
//! surface the crate itself stays out of (see SPEC_FULL.md §6).

use std::path::PathBuf;

use clap::{Parser as ClapParser, Subcommand};
use tracker_engine::Engine;

#[derive(ClapParser)]
#[command(name = "tracker-enginectl", version, about = "Exercise the tracker SPARQL engine from the shell")]
struct Cli {
    /// Project root holding (or to create) `.tracker-engine/`.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a SPARQL SELECT/ASK query and print the resulting rows.
    Query { sparql: String },
    /// Run a SPARQL INSERT DATA/DELETE DATA/DELETE WHERE/MODIFY update.
    Update { sparql: String },
    /// Ontology descriptor management.
    Ontology {
        #[command(subcommand)]
        action: OntologyCommand,
    },
    /// Rehash the inverted word index's bucket directory.
    OptimizeIndex,
}

#[derive(Subcommand)]
enum OntologyCommand {
    /// Install descriptor files from `dir` for the next `Engine::open`.
    Load { dir: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Query { sparql } => {
            let engine = Engine::open(&cli.root)?;
            let result = engine.query(&sparql)?;
            print_rows(&result);
        }
        Command::Update { sparql } => {
            let engine = Engine::open(&cli.root)?;
            let report = engine.update(&sparql)?;
            if report.minted_blank_nodes.is_empty() {
                println!("ok");
            } else {
                for (label, uri) in &report.minted_blank_nodes {
                    println!("_:{label} -> {uri}");
                }
            }
        }
        Command::Ontology {
            action: OntologyCommand::Load { dir },
        } => {
            Engine::install_ontology_dir(&cli.root, &dir)?;
            println!(
                "installed descriptors from {} into {}/.tracker-engine/ontology (effective on next open)",
                dir.display(),
                cli.root.display()
            );
        }
        Command::OptimizeIndex => {
            let engine = Engine::open(&cli.root)?;
            engine.optimize_index()?;
            println!("optimized ({} buckets, {} records)", engine.index().bucket_count(), engine.index().record_count());
        }
    }

    Ok(())
}

fn print_rows(result: &tracker_engine::QueryResult) {
    println!("{}", result.variables.join("\t"));
    for row in &result.rows {
        let cells: Vec<String> = (0..result.variables.len())
            .map(|i| row.text(i).unwrap_or_default())
            .collect();
        println!("{}", cells.join("\t"));
    }
}
