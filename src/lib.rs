//! Norm-referenced scoring of Likert questionnaires.
//!
//! Raw answers are summed into scale scores (reverse-scored items inverted
//! first), scales are aggregated into competencies, and every raw score is
//! standardized into a T-score (mean 50, SD 10) against population norms.

pub mod answer;
pub mod bulk;
pub mod config;
mod error;
pub mod interpret;
pub mod norm;
pub mod question;
pub mod score;

pub use answer::{AnswerKey, AnswerSet};
pub use bulk::{read_bulk, RowError};
pub use config::{BandCutoffs, LikertRange, ScaleNormPolicy, ScoringConfig, TScoreBounds};
pub use error::Error;
pub use interpret::{Band, Flag, Interpret};
pub use norm::{MappedNorms, Norm, NormMapper, NormRow};
pub use question::{Aggregation, Competency, Member, Question, QuestionBank, Section, TestDefinition};
pub use score::{
    score_attempt, Score, ScoreCalculator, ScoreIssue, ScoreReport, ScoreResult, ScoringWarning,
};
