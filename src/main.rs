use anyhow::Context;
use clap::{Parser, Subcommand};
use gene_consensus::config::Config;
use gene_consensus::consensus::filter_groups;
use gene_consensus::report::{ConsensusReport, JsonFileSink, ReportSink, StdoutSink};
use gene_consensus::storage::SavedRun;
use gene_consensus::types::get_supported_sources;
use gene_consensus::logging;
use gene_consensus::{AgreementDenominator, Pipeline, RunOutcome, SequenceInput, SourceKind, SourceRegistry, TaskEvent};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "gene_consensus")]
#[command(about = "Query gene prediction tools for a sequence and compare their calls")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Serve Prometheus metrics on this port while running
    #[arg(long, global = true)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the enabled sources and print the consensus table
    Run {
        /// FASTA file with the sequence to annotate
        fasta: PathBuf,
        /// Sources to query (comma-separated labels). Overrides the config file.
        #[arg(long)]
        sources: Option<String>,
        /// Model organism for GeneMark.hmm
        #[arg(long)]
        species: Option<String>,
        /// Save the run for later re-aggregation
        #[arg(long)]
        save: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Re-aggregate a saved run without querying any source
    Reaggregate {
        saved: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List the supported sources
    Sources,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Count every enabled source, not just successful ones, for "all agree"
    #[arg(long)]
    count_failed: bool,
    /// Only keep groups called by at least this many sources
    #[arg(long)]
    min_calls: Option<usize>,
    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
    /// Print a GenBank-style feature table instead of the text table
    #[arg(long)]
    features: bool,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    Ok(config.with_env_credentials())
}

fn parse_sources(list: &str) -> anyhow::Result<Vec<SourceKind>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<SourceKind>().map_err(anyhow::Error::from))
        .collect()
}

fn emit(outcome: &RunOutcome, policy: AgreementDenominator, output: &OutputArgs) -> anyhow::Result<()> {
    let mut groups = outcome.consensus(policy);
    if let Some(min) = output.min_calls {
        groups = filter_groups(groups, |n| n >= min);
    }
    let report = ConsensusReport::build(outcome, &groups, policy);

    if output.features {
        report.write_feature_table(&mut std::io::stdout().lock())?;
    } else {
        StdoutSink.write(&report)?;
    }
    if let Some(path) = &output.json {
        JsonFileSink::new(path).write(&report)?;
    }

    let failures = outcome.failures();
    if !failures.is_empty() {
        warn!("{} of {} sources failed", failures.len(), outcome.enabled_sources().len());
        eprintln!("\nFailed sources:");
        for failure in &failures {
            eprintln!("   - {} ({}): {}", failure.source.display_name(), failure.kind, failure.message);
        }
    }
    Ok(())
}

fn policy(config: &Config, output: &OutputArgs) -> AgreementDenominator {
    if output.count_failed {
        AgreementDenominator::Enabled
    } else {
        config.agreement
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _guard = logging::init_logging(cli.verbose);
    if let Some(port) = cli.metrics_port {
        gene_consensus::metrics::init_metrics(port);
    }

    match cli.command {
        Commands::Run {
            fasta,
            sources,
            species,
            save,
            output,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(list) = sources {
                config.enabled_sources = parse_sources(&list)?;
            }
            if species.is_some() {
                config.species = species;
            }
            let sequence = SequenceInput::from_fasta_file(&fasta)
                .with_context(|| format!("reading {}", fasta.display()))?;

            let registry = SourceRegistry::from_config(&config)?;
            let pipeline = Pipeline::new(config.clone(), registry);
            let mut handle = pipeline.start_run(sequence);
            info!("run {} started", handle.run_id());

            if let Some(mut events) = handle.take_events() {
                tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        match event {
                            TaskEvent::Started { source } => {
                                eprintln!("querying {}...", source.display_name())
                            }
                            TaskEvent::Completed { source, outcome } => {
                                let status = if outcome.is_success() { "done" } else { "failed" };
                                eprintln!("{} {}", source.display_name(), status);
                            }
                        }
                    }
                });
            }

            let cancel = handle.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling run");
                    cancel.cancel();
                }
            });

            let outcome = handle.wait().await;
            if let Some(path) = &save {
                outcome.to_saved_run(&config).save(path)?;
            }
            emit(&outcome, policy(&config, &output), &output)?;
        }
        Commands::Reaggregate { saved, output } => {
            let run = SavedRun::load(&saved)?;
            let outcome = RunOutcome::from_saved_run(&run);
            emit(&outcome, policy(&run.config, &output), &output)?;
        }
        Commands::Sources => {
            for label in get_supported_sources() {
                let kind: SourceKind = label.parse()?;
                println!("{:<10} {}", label, kind.display_name());
            }
        }
    }
    Ok(())
}
