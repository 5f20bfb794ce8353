use serde::Serialize;
use std::collections::BTreeMap;

use crate::answer::AnswerSet;
use crate::config::{ScoringConfig, TScoreBounds};
use crate::norm::{DroppedNorm, Level, Lookup, MappedNorms, NormMapper, NormRow, TOTAL};
use crate::question::{Aggregation, Competency, QuestionBank};
use crate::Error;

/// Raw score with its standardized counterpart.
///
/// `t_score` is `None` whenever there is no data or no usable norm, and `issue`
/// then says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub raw: f64,
    pub t_score: Option<f64>,
    /// The standardized value fell outside the reporting bounds
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub clamped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<ScoreIssue>,
}

impl Score {
    fn no_data() -> Self {
        Self {
            raw: 0.0,
            t_score: None,
            clamped: false,
            issue: Some(ScoreIssue::NoData),
        }
    }

    fn standardize(raw: f64, lookup: Lookup, bounds: &TScoreBounds) -> Self {
        match lookup {
            Lookup::Found(norm) => {
                let (t_score, clamped) = bounds.clamp(norm.t_score(raw));
                Self {
                    raw,
                    t_score: Some(t_score),
                    clamped,
                    issue: None,
                }
            }
            Lookup::Invalid(invalid) => Self {
                raw,
                t_score: None,
                clamped: false,
                issue: Some(ScoreIssue::InvalidNorm {
                    std_dev: invalid.std_dev,
                }),
            },
            Lookup::Missing => Self {
                raw,
                t_score: None,
                clamped: false,
                issue: Some(ScoreIssue::MissingNorm),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ScoreIssue {
    /// No norm row for this scale, competency or total
    MissingNorm,
    /// A norm row exists, but its standard deviation is not positive
    InvalidNorm { std_dev: f64 },
    /// None of the items behind this score were answered
    NoData,
}

/// The persisted document of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub scales: BTreeMap<String, Score>,
    pub competencies: BTreeMap<String, Score>,
    pub total: Score,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringWarning {
    /// Answered item without a scale; its answer is not counted
    UncategorizedQuestion { question_id: String },
    UnansweredQuestion { question_id: String },
    /// Competency formula names a scale with no items in the test
    UnknownMemberScale { competency: String, scale: String },
    DroppedNorm(DroppedNorm),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub norm_set_id: Option<String>,
    #[serde(flatten)]
    pub result: ScoreResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ScoringWarning>,
}

/// Computes scale, competency and total scores of one attempt. Pure: the same
/// inputs always give the same report.
#[derive(Debug, Clone)]
pub struct ScoreCalculator<'a> {
    config: &'a ScoringConfig,
}

impl<'a> ScoreCalculator<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    pub fn calculate(
        &self,
        answers: &AnswerSet,
        bank: &QuestionBank,
        competencies: &[Competency],
        norms: &MappedNorms,
    ) -> Result<ScoreReport, Error> {
        let range = answers.range();
        if range != self.config.likert {
            return Err(Error::InvalidConfig(format!(
                "answers use a {}..={} scale, the test expects {}..={}",
                range.min, range.max, self.config.likert.min, self.config.likert.max
            )));
        }
        for competency in competencies {
            competency.validate()?;
        }
        let resolved = answers.resolve(bank)?;
        let mut warnings = Vec::new();

        let unanswered = bank
            .iter()
            .filter(|question| !resolved.contains_key(&question.id))
            .map(|question| question.id.clone())
            .collect::<Vec<_>>();
        if self.config.require_complete && !unanswered.is_empty() {
            return Err(Error::Incomplete(unanswered));
        }
        warnings.extend(
            unanswered
                .into_iter()
                .map(|question_id| ScoringWarning::UnansweredQuestion { question_id }),
        );

        // scales with at least one counted answer
        let mut scale_raws = BTreeMap::<String, f64>::new();
        for question in bank.iter() {
            let Some(&value) = resolved.get(&question.id) else {
                continue;
            };
            let Some(scale) = question.scale() else {
                tracing::warn!("question `{}` has no category, answer ignored", question.id);
                warnings.push(ScoringWarning::UncategorizedQuestion {
                    question_id: question.id.clone(),
                });
                continue;
            };
            let value = if question.reverse {
                range.reverse(value)
            } else {
                value
            };
            *scale_raws.entry(scale.to_string()).or_insert(0.0) += f64::from(value);
        }

        let bounds = &self.config.t_score;
        let bank_scales = bank.scales();
        let scales = bank_scales
            .iter()
            .map(|&name| {
                let score = match scale_raws.get(name) {
                    Some(&raw) => Score::standardize(raw, norms.lookup(Level::Scale, name), bounds),
                    None => Score::no_data(),
                };
                (name.to_string(), score)
            })
            .collect::<BTreeMap<_, _>>();

        let mut competency_scores = BTreeMap::new();
        for competency in competencies {
            let score = match aggregate(competency, &bank_scales, &scale_raws, &mut warnings) {
                Some(raw) => Score::standardize(
                    raw,
                    norms.lookup(Level::Competency, &competency.name),
                    bounds,
                ),
                None => Score::no_data(),
            };
            competency_scores.insert(competency.name.clone(), score);
        }

        let total_raw = if competencies.is_empty() {
            sum_of(scale_raws.values().copied())
        } else {
            sum_of(
                competency_scores
                    .values()
                    .filter(|score| score.issue != Some(ScoreIssue::NoData))
                    .map(|score| score.raw),
            )
        };
        let total = match total_raw {
            Some(raw) => Score::standardize(raw, norms.lookup(Level::Total, TOTAL), bounds),
            None => Score::no_data(),
        };

        for (name, score) in scales.iter().chain(competency_scores.iter()) {
            if let Some(issue) = score.issue {
                tracing::warn!("no T-score for `{}`: {:?}", name, issue);
            }
        }
        warnings.extend(norms.dropped.iter().cloned().map(ScoringWarning::DroppedNorm));

        Ok(ScoreReport {
            test_id: self.config.test_id.clone(),
            norm_set_id: self.config.norm_set_id.clone(),
            result: ScoreResult {
                scales,
                competencies: competency_scores,
                total,
            },
            warnings,
        })
    }
}

/// `None` when no member scale has any counted answer.
fn aggregate(
    competency: &Competency,
    bank_scales: &[&str],
    scale_raws: &BTreeMap<String, f64>,
    warnings: &mut Vec<ScoringWarning>,
) -> Option<f64> {
    let mut sum = 0.0;
    let mut weights = 0.0;
    for member in &competency.scales {
        if let Some(raw) = scale_raws.get(member.scale()) {
            sum += member.weight() * raw;
            weights += member.weight();
        } else if !bank_scales.contains(&member.scale()) {
            tracing::warn!(
                "competency `{}` lists unknown scale `{}`",
                competency.name,
                member.scale()
            );
            warnings.push(ScoringWarning::UnknownMemberScale {
                competency: competency.name.clone(),
                scale: member.scale().to_string(),
            });
        }
    }
    // weights are validated positive, so none counted means no data
    if weights <= 0.0 {
        return None;
    }
    Some(match competency.aggregation {
        Aggregation::Sum => sum,
        Aggregation::Mean => sum / weights,
    })
}

fn sum_of(raws: impl Iterator<Item = f64>) -> Option<f64> {
    raws.fold(None, |total, raw| Some(total.unwrap_or(0.0) + raw))
}

/// Maps `norms` for the configured test, then scores the attempt.
pub fn score_attempt(
    answers: &AnswerSet,
    bank: &QuestionBank,
    competencies: &[Competency],
    norms: &[NormRow],
    config: &ScoringConfig,
) -> Result<ScoreReport, Error> {
    config.validate()?;
    let mapped = NormMapper::new(competencies, config.scale_norm_policy)
        .for_test(config.test_id.as_deref())
        .map(norms);
    ScoreCalculator::new(config).calculate(answers, bank, competencies, &mapped)
}
