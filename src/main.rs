use std::sync::Arc;

use rand::Rng;

use kanadojo_drill::catalog;
use kanadojo_drill::config::Config;
use kanadojo_drill::drill::registry::{install_registry, EngineRegistry};
use kanadojo_drill::drill::{FileSnapshotStore, Direction, Dojo, DrillConfig, LoadReport};
use kanadojo_drill::{drill_engine, logging};

#[derive(Debug)]
struct SessionArgs {
    rounds: usize,
    groups: Vec<usize>,
    accuracy: f64,
}

impl Default for SessionArgs {
    fn default() -> Self {
        Self {
            rounds: 40,
            groups: vec![0, 1],
            accuracy: 0.75,
        }
    }
}

impl SessionArgs {
    fn parse() -> Result<Self, String> {
        Self::parse_from(std::env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            let value = args
                .next()
                .ok_or_else(|| format!("missing value for {flag}"))?;
            match flag.as_str() {
                "--rounds" => {
                    parsed.rounds = value
                        .parse()
                        .map_err(|_| format!("invalid --rounds: {value}"))?;
                }
                "--groups" => {
                    parsed.groups = value
                        .split(',')
                        .map(|part| part.trim().parse::<usize>())
                        .collect::<Result<_, _>>()
                        .map_err(|_| format!("invalid --groups: {value}"))?;
                }
                "--accuracy" => {
                    let accuracy: f64 = value
                        .parse()
                        .map_err(|_| format!("invalid --accuracy: {value}"))?;
                    if !accuracy.is_finite() {
                        return Err(format!("invalid --accuracy: {value}"));
                    }
                    parsed.accuracy = accuracy.clamp(0.0, 1.0);
                }
                other => return Err(format!("unknown argument {other}")),
            }
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config);

    let args = match SessionArgs::parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("usage: kanadojo-drill [--rounds N] [--groups 0,1,2] [--accuracy 0.75]");
            std::process::exit(2);
        }
    };

    let storage = Arc::new(FileSnapshotStore::new(&config.data_dir));
    let registry = EngineRegistry::new(DrillConfig::from_env(), storage);
    tracing::info!(data_dir = %config.data_dir.display(), "drill storage ready");

    for (dojo, report) in registry.load_all().await {
        match report {
            LoadReport::Recovered { reason } => {
                tracing::warn!(%dojo, %reason, "saved progress could not be used, starting over");
            }
            report => tracing::info!(%dojo, ?report, "dojo loaded"),
        }
    }
    install_registry(registry);

    let engine = drill_engine(Dojo::Kana);

    let pool = catalog::pool_from_groups(&args.groups);
    let mut rng = rand::rng();

    for round in 1..=args.rounds {
        let draw = match engine.next(&pool) {
            Ok(draw) => draw,
            Err(err) => {
                tracing::error!(error = %err, groups = ?args.groups, "nothing to drill");
                std::process::exit(1);
            }
        };

        let correct = rng.random_bool(args.accuracy);
        let response_time_ms = rng.random_range(600..4000);
        let prompt = match draw.direction {
            Direction::Forward => draw.item.to_string(),
            Direction::Reverse => catalog::romaji_for(&draw.item)
                .unwrap_or("?")
                .to_string(),
        };
        println!(
            "{round:>3}. [{}] {prompt} -> {}",
            draw.direction.as_str(),
            if correct { "correct" } else { "missed" }
        );

        let outcome = kanadojo_drill::drill::Outcome::new(draw.item, draw.direction, correct)
            .with_response_time(response_time_ms);
        if let Err(err) = engine.record_answer(outcome) {
            tracing::error!(error = %err, "failed to record answer");
        }
    }

    match engine.flush().await {
        Ok(true) => tracing::info!("progress saved"),
        Ok(false) => tracing::warn!("progress kept in memory only"),
        Err(err) => tracing::error!(error = %err, "flush failed"),
    }

    if let Ok(summary) = engine.progress(&pool) {
        println!(
            "items {} | seen {} | accuracy {} | mastered {} | struggling {}",
            summary.items,
            summary.seen,
            summary
                .accuracy
                .map(|a| format!("{:.0}%", a * 100.0))
                .unwrap_or_else(|| "-".to_string()),
            summary.mastered,
            summary.struggling
        );
    }
}
