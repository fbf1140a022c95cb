//! fff-graph CLI entry point.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use regex::Regex;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use fff_graph::hierarchy::render_outline;
use fff_graph::persistence::{FileGateway, PersistenceGateway};
use fff_graph::{
    AlgorithmOrchestrator, Graph, GraphStore, LocalAnalysisService, OrchestratorConfig, RuleSet,
    ValidationPolicy, Workspace,
};

static PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*?)\s*$").expect("param pattern")
});

/// Form/Function/Failure risk-model graph tool.
#[derive(Parser, Debug)]
#[command(name = "fff-graph", version, about)]
struct Cli {
    /// Classification rule table (JSON). Defaults to the Form/Function/Failure table.
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Analysis domain sent with every request
    #[arg(long, global = true, default_value = "automotive")]
    domain: String,

    /// Directory used by save/load/list/delete
    #[arg(long, global = true, env = "FFF_STORE", default_value = ".fff-store")]
    store: PathBuf,

    /// More logging (-v info, -vv debug, -vvv trace). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the derived hierarchy
    Tree {
        /// Graph file (reads stdin if not provided)
        input: Option<PathBuf>,
        /// Emit the hierarchy as JSON instead of an outline
        #[arg(long)]
        json: bool,
    },
    /// Run the diagram checks
    Validate {
        input: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Validate, then run an analysis algorithm
    Run {
        algorithm: String,
        input: Option<PathBuf>,
        /// Algorithm parameter, `key=value` (value parsed as JSON when possible)
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
        /// What to do when the validator is unavailable
        #[arg(long, value_enum, default_value = "fail-open")]
        policy: ValidationPolicy,
        /// Write the resulting graph here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Move a node under a new parent
    Move {
        node: String,
        parent: String,
        relation: String,
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save a graph to the store and print its id
    Save {
        input: Option<PathBuf>,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Overwrite this stored diagram instead of creating a new one
        #[arg(long)]
        id: Option<String>,
    },
    /// Print a stored graph
    Load {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List stored diagrams, newest first
    List {
        /// Only this domain
        #[arg(long = "only")]
        only: Option<String>,
    },
    /// Delete a stored diagram
    Delete { id: String },
    /// List the built-in algorithms
    Algorithms,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let rules = load_rules(cli.rules.as_deref())?;
    let gateway = FileGateway::new(&cli.store);

    match cli.command {
        Command::Tree { input, json } => {
            let store = GraphStore::from_graph(read_graph(input.as_deref())?, rules)?;
            let tree = store.hierarchy();
            if json {
                emit(&serde_json::to_string_pretty(tree)?, None)?;
            } else {
                let rows = tree.outline(&store.graph().nodes, store.rules());
                emit(&render_outline(&rows), None)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { input, json } => {
            let graph = read_graph(input.as_deref())?;
            let orchestrator = orchestrator(&cli.domain, rules.clone(), ValidationPolicy::FailOpen);
            let store = GraphStore::from_graph(graph, rules)?.into_shared();
            let report = orchestrator.validate(&store).await?;
            let validation = report
                .validation
                .ok_or_else(|| anyhow!("validation did not produce a report"))?;
            if json {
                emit(&serde_json::to_string_pretty(&validation)?, None)?;
            } else {
                print_log(&orchestrator)?;
            }
            Ok(exit_code(validation.valid))
        }
        Command::Run {
            algorithm,
            input,
            params,
            policy,
            output,
        } => {
            let params = parse_params(&params)?;
            let graph = read_graph(input.as_deref())?;
            let orchestrator = orchestrator(&cli.domain, rules.clone(), policy);
            let store = GraphStore::from_graph(graph, rules)?.into_shared();
            let report = orchestrator.submit(&store, &algorithm, params).await?;
            print_log(&orchestrator)?;
            if let Some(path) = output {
                let graph = store.read().await.snapshot();
                emit(&graph.to_json_pretty()?, Some(&path))?;
            }
            Ok(exit_code(report.is_success()))
        }
        Command::Move {
            node,
            parent,
            relation,
            input,
            output,
        } => {
            let mut store = GraphStore::from_graph(read_graph(input.as_deref())?, rules)?;
            let outcome = store.reparent(&node, &parent, &relation)?;
            eprintln!(
                "moved {node} under {parent} via {relation} (removed {} edge(s), added {})",
                outcome.removed.len(),
                outcome.added.id
            );
            emit(&store.graph().to_json_pretty()?, output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Save {
            input,
            name,
            description,
            id,
        } => {
            let graph = read_graph(input.as_deref())?;
            let id = match id {
                Some(id) => {
                    let mut workspace = Workspace::open(&gateway, &id, rules).await?;
                    workspace.rename(name);
                    workspace.store().write().await.replace_graph(graph)?;
                    workspace.save(&gateway, &description).await?
                }
                None => {
                    let mut workspace = Workspace::new(name, &cli.domain, rules);
                    workspace.store().write().await.replace_graph(graph)?;
                    workspace.save(&gateway, &description).await?
                }
            };
            emit(&format!("{id}\n"), None)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Load { id, output } => {
            let record = gateway.load(&id).await?;
            emit(&record.graph.to_json_pretty()?, output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::List { only } => {
            let mut out = String::new();
            for d in gateway.list(only.as_deref()).await? {
                out.push_str(&format!(
                    "{}\t{}\t{}\t{} nodes\t{} edges\t{}\n",
                    d.id, d.name, d.domain, d.node_count, d.edge_count, d.updated_at
                ));
            }
            emit(&out, None)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Delete { id } => {
            gateway.delete(&id).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Algorithms => {
            let service = LocalAnalysisService::new(&cli.domain, rules);
            let mut out = String::new();
            for (name, description) in service.algorithms() {
                out.push_str(&format!("{name}\t{description}\n"));
            }
            emit(&out, None)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn orchestrator(domain: &str, rules: RuleSet, policy: ValidationPolicy) -> AlgorithmOrchestrator {
    let service = Arc::new(LocalAnalysisService::new(domain, rules));
    let config = OrchestratorConfig::new()
        .with_domain(domain)
        .with_policy(policy);
    AlgorithmOrchestrator::new(service, config)
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet> {
    match path {
        None => Ok(RuleSet::reference()),
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("cannot read '{}'", path.display()))?;
            RuleSet::from_json(&text).with_context(|| format!("invalid rules in '{}'", path.display()))
        }
    }
}

/// Read a `{nodes, edges}` document from a file, or stdin when `path` is None.
fn read_graph(path: Option<&Path>) -> Result<Graph> {
    let text = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("cannot read '{}'", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            buf
        }
    };
    Ok(Graph::from_json(&text)?)
}

fn parse_params(raw: &[String]) -> Result<Map<String, Value>> {
    let mut params = Map::new();
    for item in raw {
        let Some(caps) = PARAM.captures(item) else {
            bail!("parameter '{item}' is not of the form key=value");
        };
        let value = &caps[2];
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        params.insert(caps[1].to_string(), value);
    }
    Ok(params)
}

fn print_log(orchestrator: &AlgorithmOrchestrator) -> Result<()> {
    let mut out = String::new();
    for entry in orchestrator.log().snapshot() {
        out.push_str(&entry.message);
        out.push('\n');
    }
    emit(&out, None)
}

fn emit(text: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("cannot write '{}'", path.display()))
        }
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(text.as_bytes())?;
            stdout.flush().context("cannot flush stdout")
        }
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::from(1) }
}
