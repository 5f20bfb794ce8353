use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;

/// Parameters of one scoring invocation.
///
/// Test and norm-set identifiers live here rather than in the calling code,
/// so that the same scorer can serve any test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Test whose specific norm rows override the global ones
    pub test_id: Option<String>,
    /// Identifier of the norm table in use, echoed into the report
    pub norm_set_id: Option<String>,
    pub likert: LikertRange,
    pub t_score: TScoreBounds,
    pub scale_norm_policy: ScaleNormPolicy,
    /// Reject attempts with unanswered questions
    pub require_complete: bool,
    pub bands: BandCutoffs,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            test_id: None,
            norm_set_id: None,
            likert: LikertRange::default(),
            t_score: TScoreBounds::default(),
            scale_norm_policy: ScaleNormPolicy::default(),
            require_complete: false,
            bands: BandCutoffs::default(),
        }
    }
}

impl ScoringConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!("loaded scoring config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.likert.validate()?;
        self.t_score.validate()?;
        self.bands.validate()
    }
}

/// Response range of the Likert items, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LikertRange {
    pub min: u8,
    pub max: u8,
}

impl Default for LikertRange {
    fn default() -> Self {
        Self { min: 1, max: 5 }
    }
}

impl LikertRange {
    pub fn validate(&self) -> Result<(), Error> {
        if self.min >= self.max {
            return Err(Error::InvalidConfig(format!(
                "likert min {} must be below max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn contains(&self, value: i64) -> bool {
        (i64::from(self.min)..=i64::from(self.max)).contains(&value)
    }

    /// 1-5 scale: 1 => 5, 2 => 4, 3 => 3, 4 => 2, 5 => 1
    pub fn reverse(&self, value: u8) -> u8 {
        let reversed = u16::from(self.min) + u16::from(self.max) - u16::from(value);
        // value in min..=max keeps the result in min..=max
        reversed as u8
    }
}

/// Reporting range of T-scores. Standardized values outside it are pulled to
/// the nearest bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TScoreBounds {
    pub floor: f64,
    pub ceiling: f64,
}

/// Floor of the reported T-score range, three standard deviations below the mean.
pub const DEFAULT_T_FLOOR: f64 = 20.0;
/// Ceiling of the reported T-score range, three standard deviations above the mean.
pub const DEFAULT_T_CEILING: f64 = 80.0;

impl Default for TScoreBounds {
    fn default() -> Self {
        Self {
            floor: DEFAULT_T_FLOOR,
            ceiling: DEFAULT_T_CEILING,
        }
    }
}

impl TScoreBounds {
    pub fn validate(&self) -> Result<(), Error> {
        if !self.floor.is_finite() || !self.ceiling.is_finite() || self.floor >= self.ceiling {
            return Err(Error::InvalidConfig(format!(
                "t_score floor {} must be below ceiling {}",
                self.floor, self.ceiling
            )));
        }
        Ok(())
    }

    /// Returns the clamped value and whether a bound applied.
    pub fn clamp(&self, t: f64) -> (f64, bool) {
        if t < self.floor {
            (self.floor, true)
        } else if t > self.ceiling {
            (self.ceiling, true)
        } else {
            (t, false)
        }
    }
}

/// Whether scale-level norms need a competency that lists the scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleNormPolicy {
    /// Every scale-level norm is kept, linked to a competency or not
    #[default]
    PassThrough,
    /// Only scales named in some competency formula keep their norm
    RequireMembership,
}

/// T-score cut-offs separating the low, average and high bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandCutoffs {
    /// At or below is low
    pub low: f64,
    /// At or above is high
    pub high: f64,
}

impl Default for BandCutoffs {
    fn default() -> Self {
        Self {
            low: 35.0,
            high: 65.0,
        }
    }
}

impl BandCutoffs {
    pub fn validate(&self) -> Result<(), Error> {
        if self.low >= self.high {
            return Err(Error::InvalidConfig(format!(
                "band cut-off low {} must be below high {}",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default() {
        let config = ScoringConfig::default();
        assert_eq!(config.likert, LikertRange { min: 1, max: 5 });
        assert_eq!(config.t_score.floor, 20.0);
        assert_eq!(config.t_score.ceiling, 80.0);
        assert_eq!(config.scale_norm_policy, ScaleNormPolicy::PassThrough);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = ScoringConfig::from_toml_str(
            r#"
            test_id = "big-five-v2"
            norm_set_id = "2024-kr"
            scale_norm_policy = "require_membership"
            require_complete = true

            [likert]
            min = 1
            max = 4

            [t_score]
            floor = 0.0
            ceiling = 100.0
            "#,
        )
        .unwrap();
        assert_eq!(config.test_id.as_deref(), Some("big-five-v2"));
        assert_eq!(config.norm_set_id.as_deref(), Some("2024-kr"));
        assert_eq!(config.scale_norm_policy, ScaleNormPolicy::RequireMembership);
        assert!(config.require_complete);
        assert_eq!(config.likert.max, 4);
        assert_eq!(config.t_score.floor, 0.0);
        assert_eq!(config.bands, BandCutoffs::default());
    }

    #[test]
    fn test_from_toml_str_rejects_inverted_bounds() {
        let result = ScoringConfig::from_toml_str(
            r#"
            [t_score]
            floor = 80.0
            ceiling = 20.0
            "#,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let result = ScoringConfig::from_toml_str(
            r#"
            [likert]
            min = 5
            max = 5
            "#,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "test_id = \"t-1\"").unwrap();
        let config = ScoringConfig::load(file.path()).unwrap();
        assert_eq!(config.test_id.as_deref(), Some("t-1"));
        assert!(ScoringConfig::load("does/not/exist.toml").is_err());
    }

    #[test]
    fn test_reverse() {
        let likert = LikertRange::default();
        assert_eq!(likert.reverse(1), 5);
        assert_eq!(likert.reverse(3), 3);
        assert_eq!(likert.reverse(5), 1);
        let four = LikertRange { min: 1, max: 4 };
        assert_eq!(four.reverse(1), 4);
        assert_eq!(four.reverse(2), 3);

        let high = LikertRange { min: 100, max: 200 };
        assert!(high.validate().is_ok());
        assert_eq!(high.reverse(150), 150);
        assert_eq!(high.reverse(100), 200);
        assert_eq!(high.reverse(200), 100);
    }

    #[test]
    fn test_clamp() {
        let bounds = TScoreBounds::default();
        assert_eq!(bounds.clamp(17.8), (20.0, true));
        assert_eq!(bounds.clamp(50.0), (50.0, false));
        assert_eq!(bounds.clamp(80.0), (80.0, false));
        assert_eq!(bounds.clamp(91.2), (80.0, true));
    }
}
