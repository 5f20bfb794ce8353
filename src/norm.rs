use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::config::ScaleNormPolicy;
use crate::question::Competency;
use crate::Error;

pub const SCALE_PREFIX: &str = "Scale_";
pub const COMPETENCY_PREFIX: &str = "Comp_";
pub const TOTAL: &str = "TOTAL";

/// A norm row as stored in the norm table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormRow {
    pub category_name: String,
    pub mean_value: f64,
    pub std_dev_value: f64,
    /// Absent for norms shared by every test
    #[serde(default)]
    pub test_id: Option<String>,
}

impl NormRow {
    pub fn new<S: Into<String>>(category_name: S, mean_value: f64, std_dev_value: f64) -> Self {
        Self {
            category_name: category_name.into(),
            mean_value,
            std_dev_value,
            test_id: None,
        }
    }

    /// Loads a norm table, as CSV when the file ends in `.csv`, as JSON otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Self>, Error> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let rows = match path.extension().and_then(|extension| extension.to_str()) {
            Some(extension) if extension.eq_ignore_ascii_case("csv") => {
                Self::from_csv_reader(reader)?
            }
            _ => Self::from_json_reader(reader)?,
        };
        tracing::debug!("read {} norm row(s) from {}", rows.len(), path.display());
        Ok(rows)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Vec<Self>, Error> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Header: `category_name,mean_value,std_dev_value[,test_id]`
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Vec<Self>, Error> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut rows = Vec::new();
        for row in reader.deserialize::<NormRow>() {
            let mut row = row?;
            if row.test_id.as_deref().is_some_and(str::is_empty) {
                row.test_id = None;
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Population mean and standard deviation. The standard deviation is always
/// positive and both values finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Norm {
    mean: f64,
    std_dev: f64,
}

impl Norm {
    pub fn new(category: &str, mean: f64, std_dev: f64) -> Result<Self, Error> {
        if !mean.is_finite() || !std_dev.is_finite() || std_dev <= 0.0 {
            return Err(Error::InvalidNorm {
                category: category.to_string(),
                mean,
                std_dev,
            });
        }
        Ok(Self { mean, std_dev })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// T = 50 + 10 × (x − mean) / sd, unclamped
    pub fn t_score(&self, raw: f64) -> f64 {
        50.0 + 10.0 * (raw - self.mean) / self.std_dev
    }
}

/// Norm row whose statistics cannot standardize anything.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InvalidNorm {
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// `Comp_` row naming no declared competency
    UnknownCompetency,
    /// Scale not listed by any competency under `require_membership`
    NotAMember,
    /// Row belongs to a different test
    OtherTest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedNorm {
    pub category_name: String,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Scale,
    Competency,
    Total,
}

/// Norms split by level, keyed by bare scale/competency name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedNorms {
    pub scales: BTreeMap<String, Norm>,
    pub competencies: BTreeMap<String, Norm>,
    pub total: Option<Norm>,
    /// Rows that matched a level but carried unusable statistics
    pub invalid: BTreeMap<(Level, String), InvalidNorm>,
    pub dropped: Vec<DroppedNorm>,
}

impl MappedNorms {
    pub fn lookup(&self, level: Level, name: &str) -> Lookup {
        let norm = match level {
            Level::Scale => self.scales.get(name).copied(),
            Level::Competency => self.competencies.get(name).copied(),
            Level::Total => self.total,
        };
        match norm {
            Some(norm) => Lookup::Found(norm),
            None => match self.invalid.get(&(level, name.to_string())) {
                Some(invalid) => Lookup::Invalid(*invalid),
                None => Lookup::Missing,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    Found(Norm),
    Invalid(InvalidNorm),
    Missing,
}

/// Splits stored norm rows into scale-level and competency-level norms for
/// one test.
#[derive(Debug, Clone)]
pub struct NormMapper<'a> {
    competencies: &'a [Competency],
    policy: ScaleNormPolicy,
    test_id: Option<&'a str>,
}

impl<'a> NormMapper<'a> {
    pub fn new(competencies: &'a [Competency], policy: ScaleNormPolicy) -> Self {
        Self {
            competencies,
            policy,
            test_id: None,
        }
    }

    /// Rows of this test override global rows; rows of other tests are ignored.
    pub fn for_test(mut self, test_id: Option<&'a str>) -> Self {
        self.test_id = test_id;
        self
    }

    pub fn map(&self, rows: &[NormRow]) -> MappedNorms {
        let competency_names = self
            .competencies
            .iter()
            .map(|competency| competency.name.as_str())
            .collect::<HashSet<_>>();
        let member_scales = self
            .competencies
            .iter()
            .flat_map(|competency| competency.scales.iter().map(|member| member.scale()))
            .collect::<HashSet<_>>();

        let mut mapped = MappedNorms::default();
        // (level, name) -> (test specific, row)
        let mut chosen: BTreeMap<(Level, String), (bool, &NormRow)> = BTreeMap::new();

        for row in rows {
            let specific = match (row.test_id.as_deref(), self.test_id) {
                (None, _) => false,
                (Some(row_test), Some(test)) if row_test == test => true,
                (Some(row_test), _) => {
                    tracing::debug!(
                        "skipping norm `{}` of test `{}`",
                        row.category_name,
                        row_test
                    );
                    mapped.dropped.push(DroppedNorm {
                        category_name: row.category_name.clone(),
                        reason: DropReason::OtherTest,
                    });
                    continue;
                }
            };

            let (level, name) = match classify(&row.category_name, &competency_names) {
                Ok(classified) => classified,
                Err(reason) => {
                    tracing::warn!("dropping norm `{}`: {:?}", row.category_name, reason);
                    mapped.dropped.push(DroppedNorm {
                        category_name: row.category_name.clone(),
                        reason,
                    });
                    continue;
                }
            };

            if level == Level::Scale
                && self.policy == ScaleNormPolicy::RequireMembership
                && !member_scales.contains(name.as_str())
            {
                tracing::warn!(
                    "dropping scale norm `{}`: no competency lists it",
                    row.category_name
                );
                mapped.dropped.push(DroppedNorm {
                    category_name: row.category_name.clone(),
                    reason: DropReason::NotAMember,
                });
                continue;
            }

            match chosen.get(&(level, name.clone())) {
                Some((true, _)) if !specific => {
                    tracing::debug!("global norm `{}` shadowed by test norm", row.category_name);
                    continue;
                }
                Some((was_specific, previous)) if *was_specific == specific => {
                    tracing::warn!(
                        "norm `{}` defined more than once, using the last one (was `{}`)",
                        row.category_name,
                        previous.category_name
                    );
                }
                _ => {}
            }
            chosen.insert((level, name), (specific, row));
        }

        for ((level, name), (_, row)) in chosen {
            match Norm::new(&row.category_name, row.mean_value, row.std_dev_value) {
                Ok(norm) => match level {
                    Level::Scale => {
                        mapped.scales.insert(name, norm);
                    }
                    Level::Competency => {
                        mapped.competencies.insert(name, norm);
                    }
                    Level::Total => mapped.total = Some(norm),
                },
                Err(e) => {
                    tracing::warn!("{}", e);
                    mapped.invalid.insert(
                        (level, name),
                        InvalidNorm {
                            mean: row.mean_value,
                            std_dev: row.std_dev_value,
                        },
                    );
                }
            }
        }

        tracing::debug!(
            "mapped {} scale norm(s), {} competency norm(s), total {}",
            mapped.scales.len(),
            mapped.competencies.len(),
            if mapped.total.is_some() { "present" } else { "absent" }
        );
        mapped
    }
}

fn classify(category: &str, competencies: &HashSet<&str>) -> Result<(Level, String), DropReason> {
    let category = category.trim();
    if let Some(name) = category.strip_prefix(COMPETENCY_PREFIX) {
        if name.eq_ignore_ascii_case(TOTAL) {
            return Ok((Level::Total, TOTAL.to_string()));
        }
        if competencies.contains(name) {
            return Ok((Level::Competency, name.to_string()));
        }
        return Err(DropReason::UnknownCompetency);
    }
    if category.eq_ignore_ascii_case(TOTAL) {
        return Ok((Level::Total, TOTAL.to_string()));
    }
    if let Some(name) = category.strip_prefix(SCALE_PREFIX) {
        return Ok((Level::Scale, name.to_string()));
    }
    if competencies.contains(category) {
        return Ok((Level::Competency, category.to_string()));
    }
    Ok((Level::Scale, category.to_string()))
}
