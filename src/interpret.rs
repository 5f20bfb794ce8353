use serde::Serialize;

use crate::config::BandCutoffs;
use crate::score::{Score, ScoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Low,
    Average,
    High,
}

pub trait Interpret {
    /// Band of the T-score, `None` when there is no T-score to read.
    fn band(&self, cutoffs: &BandCutoffs) -> Option<Band>;

    fn is_flagged(&self, cutoffs: &BandCutoffs) -> bool {
        matches!(self.band(cutoffs), Some(Band::Low | Band::High))
    }
}

impl Interpret for Score {
    fn band(&self, cutoffs: &BandCutoffs) -> Option<Band> {
        self.t_score.map(|t| match t {
            t if t <= cutoffs.low => Band::Low,
            t if t >= cutoffs.high => Band::High,
            _ => Band::Average,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flag {
    pub level: &'static str,
    pub name: String,
    pub band: Band,
    pub t_score: f64,
}

impl ScoreResult {
    /// Scales, competencies and the total whose T-score leaves the average band.
    pub fn flagged(&self, cutoffs: &BandCutoffs) -> Vec<Flag> {
        let scales = self.scales.iter().map(|(name, score)| ("scale", name.as_str(), score));
        let competencies = self
            .competencies
            .iter()
            .map(|(name, score)| ("competency", name.as_str(), score));
        let total = std::iter::once(("total", "TOTAL", &self.total));

        scales
            .chain(competencies)
            .chain(total)
            .filter_map(|(level, name, score)| match (score.band(cutoffs), score.t_score) {
                (Some(band @ (Band::Low | Band::High)), Some(t_score)) => Some(Flag {
                    level,
                    name: name.to_string(),
                    band,
                    t_score,
                }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::score::ScoreIssue;
    use std::collections::BTreeMap;

    fn score(t_score: Option<f64>) -> Score {
        Score {
            raw: 0.0,
            t_score,
            clamped: false,
            issue: t_score.is_none().then_some(ScoreIssue::MissingNorm),
        }
    }

    #[test]
    fn test_band() {
        let cutoffs = BandCutoffs::default();
        assert_eq!(score(Some(35.0)).band(&cutoffs), Some(Band::Low));
        assert_eq!(score(Some(35.1)).band(&cutoffs), Some(Band::Average));
        assert_eq!(score(Some(64.9)).band(&cutoffs), Some(Band::Average));
        assert_eq!(score(Some(65.0)).band(&cutoffs), Some(Band::High));
        assert_eq!(score(None).band(&cutoffs), None);
        assert!(!score(None).is_flagged(&cutoffs));
        assert!(score(Some(20.0)).is_flagged(&cutoffs));
    }

    #[test]
    fn test_flagged() {
        let result = ScoreResult {
            scales: BTreeMap::from([
                ("A".to_string(), score(Some(20.0))),
                ("B".to_string(), score(Some(50.0))),
                ("C".to_string(), score(None)),
            ]),
            competencies: BTreeMap::from([("X".to_string(), score(Some(72.5)))]),
            total: score(Some(50.0)),
        };
        let flags = result.flagged(&BandCutoffs::default());
        assert_eq!(
            flags,
            vec![
                Flag {
                    level: "scale",
                    name: "A".to_string(),
                    band: Band::Low,
                    t_score: 20.0,
                },
                Flag {
                    level: "competency",
                    name: "X".to_string(),
                    band: Band::High,
                    t_score: 72.5,
                },
            ]
        );
    }
}
