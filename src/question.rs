use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;

use crate::config::LikertRange;
use crate::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Scale the item counts towards
    #[serde(default)]
    pub category: Option<String>,
    /// Higher answers mean less of the trait
    #[serde(default)]
    pub reverse: bool,
}

impl Question {
    /// Scale name, if the item carries a non-blank category.
    pub fn scale(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Instruction shown above the questions of the section
    #[serde(default)]
    pub title: Option<String>,
    pub questions: Vec<Question>,
}

/// Ordered question list of one test, grouped into sections for presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub sections: Vec<Section>,
}

impl QuestionBank {
    pub fn new(sections: Vec<Section>) -> Result<Self, Error> {
        let bank = Self { sections };
        bank.check_unique_ids()?;
        Ok(bank)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let bank: Self = serde_json::from_reader(reader)?;
        bank.check_unique_ids()?;
        Ok(bank)
    }

    fn check_unique_ids(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for question in self.iter() {
            if !seen.insert(question.id.as_str()) {
                return Err(Error::DuplicateQuestion(question.id.clone()));
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.sections
            .iter()
            .flat_map(|section| section.questions.iter())
    }

    /// Question at a 0-based ordinal position.
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.iter().nth(index)
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.iter().find(|question| question.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.iter().position(|question| question.id == id)
    }

    pub fn questions(&self) -> Vec<&Question> {
        self.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct scale names in order of first appearance.
    pub fn scales(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.iter()
            .filter_map(Question::scale)
            .filter(|scale| seen.insert(*scale))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Σ weight × scale raw
    #[default]
    Sum,
    /// Σ weight × scale raw / Σ weight
    Mean,
}

/// One scale reference in a competency formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Member {
    Scale(String),
    Weighted { scale: String, weight: f64 },
}

impl Member {
    pub fn scale(&self) -> &str {
        match self {
            Member::Scale(scale) => scale,
            Member::Weighted { scale, .. } => scale,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Member::Scale(_) => 1.0,
            Member::Weighted { weight, .. } => *weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competency {
    pub name: String,
    pub scales: Vec<Member>,
    #[serde(default)]
    pub aggregation: Aggregation,
}

impl Competency {
    pub fn new<S: Into<String>>(name: S, scales: &[&str]) -> Self {
        Self {
            name: name.into(),
            scales: scales
                .iter()
                .map(|scale| Member::Scale(scale.to_string()))
                .collect(),
            aggregation: Aggregation::Sum,
        }
    }

    /// Every member weight must be finite and positive.
    pub fn validate(&self) -> Result<(), Error> {
        for member in &self.scales {
            let weight = member.weight();
            if !weight.is_finite() || weight <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "competency `{}` weighs scale `{}` by {}, weights must be positive",
                    self.name,
                    member.scale(),
                    weight
                )));
            }
        }
        Ok(())
    }

    pub fn has_member(&self, scale: &str) -> bool {
        self.scales.iter().any(|member| member.scale() == scale)
    }
}

/// Everything the scorer needs to know about a test, as authored.
#[derive(Debug, Clone, Deserialize)]
pub struct TestDefinition {
    pub id: String,
    #[serde(default)]
    pub likert: Option<LikertRange>,
    #[serde(flatten)]
    pub bank: QuestionBank,
    #[serde(default)]
    pub competencies: Vec<Competency>,
}

impl TestDefinition {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let definition: Self = serde_json::from_reader(reader)?;
        definition.bank.check_unique_ids()?;
        for competency in &definition.competencies {
            competency.validate()?;
        }
        Ok(definition)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn question(id: &str, category: Option<&str>) -> Question {
        Question {
            id: id.to_string(),
            text: None,
            category: category.map(str::to_string),
            reverse: false,
        }
    }

    fn bank() -> QuestionBank {
        QuestionBank::new(vec![
            Section {
                title: Some("About you".to_string()),
                questions: vec![
                    question("q1", Some("Openness")),
                    question("q2", Some("Diligence")),
                ],
            },
            Section {
                title: None,
                questions: vec![
                    question("q3", Some("Openness")),
                    question("q4", Some("  ")),
                    question("q5", None),
                ],
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_get() {
        let bank = bank();
        assert_eq!(Some("q1"), bank.get(0).map(|q| q.id.as_str()));
        assert_eq!(Some("q5"), bank.get(4).map(|q| q.id.as_str()));
        assert_eq!(None, bank.get(5).map(|q| q.id.as_str()));
    }

    #[test]
    fn test_question() {
        let bank = bank();
        assert_eq!(Some("q3"), bank.question("q3").map(|q| q.id.as_str()));
        assert_eq!(None, bank.question("q9"));
        assert_eq!(Some(2), bank.position("q3"));
        assert_eq!(bank.len(), 5);
    }

    #[test]
    fn test_scales() {
        assert_eq!(bank().scales(), vec!["Openness", "Diligence"]);
        assert_eq!(bank().get(3).and_then(Question::scale), None);
    }

    #[test]
    fn test_duplicate_question() {
        let result = QuestionBank::new(vec![Section {
            title: None,
            questions: vec![question("q1", None), question("q1", None)],
        }]);
        assert!(matches!(result, Err(Error::DuplicateQuestion(id)) if id == "q1"));
    }

    #[test]
    fn test_member_forms() {
        let competency: Competency = serde_json::from_str(
            r#"{"name": "Leadership", "scales": ["Drive", {"scale": "Influence", "weight": 2.0}], "aggregation": "mean"}"#,
        )
        .unwrap();
        assert_eq!(competency.aggregation, Aggregation::Mean);
        assert_eq!(competency.scales[0].scale(), "Drive");
        assert_eq!(competency.scales[0].weight(), 1.0);
        assert_eq!(competency.scales[1].weight(), 2.0);
        assert!(competency.has_member("Influence"));
        assert!(!competency.has_member("Calm"));
    }

    #[test]
    fn test_competency_weights() {
        let weighted = |weight: f64| Competency {
            name: "Leadership".to_string(),
            scales: vec![
                Member::Scale("Drive".to_string()),
                Member::Weighted {
                    scale: "Influence".to_string(),
                    weight,
                },
            ],
            aggregation: Aggregation::Sum,
        };
        assert!(weighted(0.5).validate().is_ok());
        for weight in [f64::NAN, f64::INFINITY, 0.0, -1.0] {
            assert!(matches!(
                weighted(weight).validate(),
                Err(Error::InvalidConfig(message)) if message.contains("Leadership")
            ));
        }

        let json = r#"{
            "id": "work-style",
            "sections": [{"questions": [{"id": "a", "category": "Calm"}]}],
            "competencies": [{"name": "Resilience", "scales": [{"scale": "Calm", "weight": -2.0}]}]
        }"#;
        assert!(matches!(
            TestDefinition::from_reader(json.as_bytes()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_definition_from_reader() {
        let json = r#"{
            "id": "work-style",
            "likert": {"min": 1, "max": 4},
            "sections": [{"questions": [{"id": "a", "category": "Calm", "reverse": true}]}],
            "competencies": [{"name": "Resilience", "scales": ["Calm"]}]
        }"#;
        let definition = TestDefinition::from_reader(json.as_bytes()).unwrap();
        assert_eq!(definition.id, "work-style");
        assert_eq!(definition.likert, Some(LikertRange { min: 1, max: 4 }));
        assert!(definition.bank.question("a").unwrap().reverse);
        assert_eq!(definition.competencies.len(), 1);
    }
}
