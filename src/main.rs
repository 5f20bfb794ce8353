use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use norm_scoring::{score_attempt, AnswerSet, NormRow, ScoringConfig, TestDefinition};

/// Scores one test attempt and prints the report as JSON.
#[derive(Parser)]
#[command(name = "norm-score", version)]
struct Args {
    /// Test definition (questions and competencies), JSON
    #[arg(long)]
    test: PathBuf,
    /// Norm table, CSV or JSON
    #[arg(long)]
    norms: PathBuf,
    /// Answers of the attempt, JSON object keyed by question id or array in order
    answers: PathBuf,
    /// Scoring configuration, TOML
    #[arg(long)]
    config: Option<PathBuf>,
    /// List scores outside the average band after the report
    #[arg(long)]
    flags: bool,
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

    let definition = TestDefinition::from_reader(BufReader::new(
        File::open(&args.test).with_context(|| format!("opening {}", args.test.display()))?,
    ))
    .with_context(|| format!("reading test definition {}", args.test.display()))?;
    let config = load_config(args.config.as_ref(), &definition)?;

    let norms = NormRow::load(&args.norms)
        .with_context(|| format!("reading norms {}", args.norms.display()))?;
    let document: serde_json::Value = serde_json::from_reader(BufReader::new(
        File::open(&args.answers).with_context(|| format!("opening {}", args.answers.display()))?,
    ))
    .with_context(|| format!("reading answers {}", args.answers.display()))?;
    let answers = AnswerSet::from_json(&document, config.likert)?;

    tracing::info!(
        "scoring {} answer(s) against test `{}`",
        answers.len(),
        definition.id
    );
    let report = score_attempt(
        &answers,
        &definition.bank,
        &definition.competencies,
        &norms,
        &config,
    )?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.flags {
        for flag in report.result.flagged(&config.bands) {
            println!(
                "{} {} => {:?} (T = {:.1})",
                flag.level, flag.name, flag.band, flag.t_score
            );
        }
    }
    Ok(())
}

/// The test definition supplies the test id and Likert range unless the
/// configuration file sets them.
fn load_config(path: Option<&PathBuf>, definition: &TestDefinition) -> Result<ScoringConfig> {
    let mut config = match path {
        Some(path) => ScoringConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ScoringConfig::default(),
    };
    if config.test_id.is_none() {
        config.test_id = Some(definition.id.clone());
    }
    if let Some(likert) = definition.likert {
        config.likert = likert;
    }
    config.validate()?;
    Ok(config)
}

/// The library's events plus this binary's own, which log under its crate name.
fn default_filter() -> String {
    format!("norm_scoring=info,{}=info", env!("CARGO_CRATE_NAME"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_filter() {
        let filter = default_filter();
        assert!(filter.contains("norm_score=info"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }
}
