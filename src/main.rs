use std::sync::Arc;

use anyhow::{Context, Result, bail};
use climarisk::{
    CityRiskCalculator, HistoricalRiskTable, HttpGeodataProvider, InMemoryDirectory,
    ProgressReporter, RiskConfig, RiskDistribution, RiskService, ZoneRiskResult, logging, web,
};
use tracing::{debug, info};

const USAGE: &str = "usage: climarisk <city_code> <uf> | climarisk serve";

#[derive(Debug, PartialEq)]
enum Command {
    Serve,
    Calculate { city_code: String, uf: String },
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args {
        [command] if command == "serve" => Ok(Command::Serve),
        [city_code, uf] => Ok(Command::Calculate {
            city_code: city_code.clone(),
            uf: uf.clone(),
        }),
        _ => bail!(USAGE),
    }
}

fn build_service(config: &RiskConfig) -> Result<RiskService> {
    let provider = HttpGeodataProvider::new(&config.services)?;
    let calculator = CityRiskCalculator::new(
        Arc::new(provider),
        Arc::new(InMemoryDirectory::with_entries(&config.municipalities)),
        Arc::new(HistoricalRiskTable::default()),
        &config.grid,
    )
    .context("Failed to set up the risk calculator")?;

    Ok(RiskService::new(calculator, &config.cache))
}

fn print_results(city_code: &str, uf: &str, results: &[ZoneRiskResult]) {
    println!("Risk zones for {city_code}/{uf} (highest first):");
    println!(
        "{:>5} {:>6} {:<12} {:>8} {:>8}  {}",
        "zone", "score", "level", "priority", "slope%", "center"
    );
    for result in results {
        println!(
            "{:>5} {:>6} {:<12} {:>8} {:>8.2}  {}",
            result.id,
            result.normalized_score,
            result.level.as_str(),
            result.priority,
            result.slope_percent,
            result.coordinates.format()
        );
    }

    let distribution = RiskDistribution::from_results(results);
    println!();
    println!(
        "{} zones: {} muito alto, {} alto, {} moderado, {} baixo, {} muito baixo",
        distribution.total,
        distribution.muito_alto,
        distribution.alto,
        distribution.moderado,
        distribution.baixo,
        distribution.muito_baixo
    );
    println!(
        "score average {:.1}, min {:.0}, max {:.0}, {} shown on the map",
        distribution.average_score,
        distribution.min_score,
        distribution.max_score,
        distribution.high_or_above()
    );
    if let Some(top) = results.first() {
        println!("zone {}: {}", top.id, top.level.description());
    }
}

async fn calculate_once(service: &RiskService, city_code: &str, uf: &str) -> Result<()> {
    let (progress, mut events) = ProgressReporter::channel();
    let listener = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if event.status.is_terminal() {
                info!("Run finished: {:?} at {}%", event.status, event.percentage);
            } else {
                debug!(
                    "{:?}: {}% ({}/{})",
                    event.status, event.percentage, event.completed, event.total
                );
            }
        }
    });

    let outcome = service.calculate(city_code, uf, None, progress).await;
    let _ = listener.await;

    let results = outcome.map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;
    print_results(city_code, uf, &results);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let config = RiskConfig::load()?;
    logging::init(&config.logging)?;
    info!("climarisk {} starting", climarisk::VERSION);

    let service = build_service(&config)?;

    match command {
        Command::Serve => web::run(Arc::new(service), config.server.port).await,
        Command::Calculate { city_code, uf } => calculate_once(&service, &city_code, &uf).await,
    }
}
