//! CLI interface for reverie

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{self, Config, DataLayout};
use crate::generation::{ChatClient, Generator};
use crate::memory::ArtifactStore;
use crate::orchestrator::{CycleReport, StageContext};
use crate::stages::{self, StageFilter};
use crate::weights::{WeightDomain, WeightStore, WeightedSampler};

#[derive(Parser)]
#[command(name = "reverie")]
#[command(about = "Self-tuning daily journal, dream and reflection pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Data root holding config/ and memory/
    #[arg(long, global = true, env = "REVERIE_ROOT")]
    pub root: Option<PathBuf>,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log stage progress (INFO); RUST_LOG overrides
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily cycle once
    Run {
        /// Failure policy (default from config)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Stage to leave out (repeatable)
        #[arg(long)]
        skip: Vec<String>,
        /// Run only these stages (repeatable)
        #[arg(long)]
        only: Vec<String>,
    },
    /// Run only the weight adaptations and print the changes
    Evolve {
        /// Show changes without writing weight files
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect weight domains
    Weights {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Inspect run reports
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    FailFast,
    Continue,
}

impl PolicyArg {
    fn as_str(&self) -> &'static str {
        match self {
            PolicyArg::FailFast => "fail-fast",
            PolicyArg::Continue => "continue",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DomainArg {
    Archetypes,
    Resonance,
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Print the effective weights
    Show { domain: DomainArg },
    /// Draw categories from a domain
    Sample {
        domain: DomainArg,
        /// Number of draws
        #[arg(short, default_value = "1")]
        k: usize,
        /// Fixed seed for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Print the newest run report
    Latest {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file location
    Path,
}

/// Execute the parsed command; returns the process exit code
pub async fn run(cli: Cli) -> Result<i32> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };
    let config = Config::load_from(&config_path)?;
    let layout = DataLayout::new(config.root_dir(cli.root.as_deref())?);

    match cli.command {
        Commands::Run { policy, skip, only } => {
            let policy = config.failure_policy(policy.map(|p| p.as_str()))?;
            let generator = ChatClient::from_config(&config.generation)?
                .map(|client| Arc::new(client) as Arc<dyn Generator>);
            if generator.is_none() {
                tracing::warn!(
                    "{} is not set; generation stages will be skipped",
                    config.generation.api_key_env
                );
            }

            let filter = StageFilter { only, skip };
            let orchestrator = stages::build_pipeline(&config, &layout, generator, policy, &filter)?;
            let report = orchestrator.run(&mut context(&layout)).await;
            print!("{}", report.summary());
            Ok(report.exit_code())
        }
        Commands::Evolve { dry_run } => {
            let orchestrator = stages::build_evolve(&config, &layout, dry_run)?;
            let report = orchestrator.run(&mut context(&layout)).await;
            for stage in &report.stages {
                println!("{}:", stage.name);
                let detail = stage.error.as_deref().or(stage.note.as_deref()).unwrap_or("-");
                for part in detail.split("; ") {
                    println!("  {}", part);
                }
            }
            Ok(report.exit_code())
        }
        Commands::Weights { command } => {
            let store = WeightStore::new(layout.weights_dir());
            match command {
                WeightCommands::Show { domain } => {
                    let domain = weight_domain(&config, domain)?;
                    let weights = store.load(&domain)?;
                    println!("# {} {} ({})", domain.name, domain.range, store.path_for(&domain).display());
                    for (key, weight) in weights.iter() {
                        println!("{:<20} {:.3}", key, weight);
                    }
                }
                WeightCommands::Sample { domain, k, seed } => {
                    let domain = weight_domain(&config, domain)?;
                    let weights = store.load(&domain)?;
                    let mut sampler = match seed {
                        Some(seed) => WeightedSampler::seeded(seed),
                        None => WeightedSampler::new(),
                    };
                    for key in sampler.sample(&weights, k) {
                        println!("{}", key);
                    }
                }
            }
            Ok(0)
        }
        Commands::Report { command } => match command {
            ReportCommands::Latest { json } => match CycleReport::latest(&layout.logs_dir())? {
                Some(report) if json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(0)
                }
                Some(report) => {
                    print!("{}", report.summary());
                    if let Some(error) = &report.error {
                        println!("\n{}", error);
                    }
                    Ok(0)
                }
                None => {
                    println!("No run reports in {}", layout.logs_dir().display());
                    Ok(1)
                }
            },
        },
        Commands::Config { command } => {
            match command {
                ConfigCommands::Show => {
                    let toml = toml::to_string_pretty(&config).context("Failed to serialize config")?;
                    println!("# {}", config_path.display());
                    println!("# data root: {}\n", layout.root().display());
                    print!("{}", toml);
                }
                ConfigCommands::Path => println!("{}", config_path.display()),
            }
            Ok(0)
        }
    }
}

fn context(layout: &DataLayout) -> StageContext {
    StageContext::new(Local::now().date_naive(), ArtifactStore::with_dir(layout.memory_dir()))
}

fn weight_domain(config: &Config, domain: DomainArg) -> Result<WeightDomain> {
    Ok(match domain {
        DomainArg::Archetypes => WeightDomain::archetypes(config.weights.archetype_range()?),
        DomainArg::Resonance => WeightDomain::resonance_tags(config.weights.resonance_range()?),
    })
}
