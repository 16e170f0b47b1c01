use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use epigrid::{
    config::{Scenario, SimConfig},
    report::ReportWriter,
    simulator::Simulator,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "SIR epidemic simulator on a 2D grid")]
struct Cli {
    /// Path to a YAML config file (built-in defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured scenario
    #[arg(long, value_enum)]
    scenario: Option<Scenario>,

    /// Override the number of agents
    #[arg(long)]
    entities: Option<usize>,

    /// Override the RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Let infected agents die according to their mortality
    #[arg(long)]
    allow_deaths: bool,

    /// Sample ages and use age-banded mortality
    #[arg(long)]
    allow_age: bool,

    /// Maximum number of simulated steps for a headless run
    #[arg(long, default_value_t = 365)]
    steps: u32,

    /// Write the per-step report series to this JSON-lines file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Serve the live observation UI instead of running headless
    #[arg(long)]
    serve: bool,

    /// Listen host for --serve
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Listen port for --serve
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimConfig::from_yaml(path)?,
        None => SimConfig::default(),
    };
    if let Some(scenario) = cli.scenario {
        config.scenario = scenario;
    }
    if let Some(entities) = cli.entities {
        config.entities = entities;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if cli.allow_deaths {
        config.allow_deaths = true;
    }
    if cli.allow_age {
        config.allow_age = true;
    }

    if cli.serve {
        return web::run(WebServerConfig {
            config,
            host: cli.host,
            port: cli.port,
        })
        .await;
    }

    let scenario = config.scenario;
    let mut simulator = Simulator::new(config)?;

    let mut writer = match &cli.report {
        Some(path) => Some(ReportWriter::create(path, simulator.config())?),
        None => None,
    };
    if let Some(writer) = &mut writer {
        writer.append(&simulator.latest_report())?;
    }

    let reports = simulator.run(cli.steps);
    if let Some(writer) = &mut writer {
        for report in &reports {
            writer.append(report)?;
        }
    }
    if let Some(writer) = writer {
        writer.finish()?;
    }

    let last = simulator.latest_report();
    println!(
        "Scenario {:?} finished on day {}: {} susceptible, {} infected, {} recovered, {} dead (peak infected {})",
        scenario,
        last.day,
        last.susceptible,
        last.infected,
        last.recovered,
        last.dead,
        last.peak_infected_concurrent
    );
    Ok(())
}
