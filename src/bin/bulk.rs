use anyhow::{Context, Result};
use clap::Parser;
use norm_scoring::{read_bulk, score_attempt, NormRow, ScoringConfig, TestDefinition};
use serde_json::json;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Scores every attempt of a CSV file, one JSON line per attempt.
#[derive(Parser)]
struct Args {
    #[arg(long)]
    test: PathBuf,
    #[arg(long)]
    norms: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// CSV with header `id,<question id>...`
    path: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let (definition, config, norms) = load_inputs(&args)?;
    let reader = BufReader::new(
        File::open(&args.path).with_context(|| format!("opening {}", args.path.display()))?,
    );
    let (mut scored, mut failed) = (0, 0);
    for row in read_bulk(reader, config.likert) {
        let line = match row {
            Ok((id, answers)) => match score_attempt(
                &answers,
                &definition.bank,
                &definition.competencies,
                &norms,
                &config,
            ) {
                Ok(report) => {
                    scored += 1;
                    let flags = report.result.flagged(&config.bands);
                    json!({ "id": id, "report": report, "flags": flags })
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!("attempt `{}` rejected: {}", id, e);
                    json!({ "id": id, "error": e.to_string() })
                }
            },
            Err(rejected) => {
                failed += 1;
                tracing::warn!("{}", rejected);
                json!({ "id": rejected.id, "error": rejected.error.to_string() })
            }
        };
        println!("{}", line);
    }
    tracing::info!("scored {} attempt(s), {} rejected", scored, failed);
    Ok(())
}

fn load_inputs(args: &Args) -> Result<(TestDefinition, ScoringConfig, Vec<NormRow>)> {
    let definition = TestDefinition::from_reader(BufReader::new(
        File::open(&args.test).with_context(|| format!("opening {}", args.test.display()))?,
    ))
    .with_context(|| format!("reading test definition {}", args.test.display()))?;
    let mut config = match &args.config {
        Some(path) => ScoringConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ScoringConfig::default(),
    };
    config.test_id.get_or_insert_with(|| definition.id.clone());
    if let Some(likert) = definition.likert {
        config.likert = likert;
    }
    config.validate()?;
    let norms = NormRow::load(&args.norms)
        .with_context(|| format!("reading norms {}", args.norms.display()))?;
    Ok((definition, config, norms))
}

/// The library's events plus this binary's own, which log under its crate name.
fn default_filter() -> String {
    format!("norm_scoring=warn,{}=info", env!("CARGO_CRATE_NAME"))
}
