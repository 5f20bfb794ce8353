use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::LikertRange;
use crate::question::QuestionBank;
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnswerKey {
    Id(String),
    /// 0-based ordinal in the question bank
    Position(usize),
}

impl AnswerKey {
    fn label(&self) -> String {
        match self {
            AnswerKey::Id(id) => id.clone(),
            AnswerKey::Position(index) => format!("#{}", index),
        }
    }
}

/// Raw responses of one attempt. Values are range-checked on the way in.
#[derive(Debug, Clone)]
pub struct AnswerSet {
    range: LikertRange,
    values: BTreeMap<AnswerKey, u8>,
    offset: usize,
}

impl Default for AnswerSet {
    fn default() -> Self {
        Self::new(LikertRange::default())
    }
}

impl AnswerSet {
    pub fn new(range: LikertRange) -> Self {
        Self {
            range,
            values: BTreeMap::new(),
            offset: 0,
        }
    }

    pub fn range(&self) -> LikertRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stores the answer to the next question in order.
    pub fn push(&mut self, value: i64) -> Result<(), Error> {
        self.store(AnswerKey::Position(self.offset), value)?;
        self.offset += 1;
        Ok(())
    }

    /// Leaves the next question in order unanswered.
    pub fn skip(&mut self) {
        self.offset += 1;
    }

    pub fn insert(&mut self, id: &str, value: i64) -> Result<(), Error> {
        self.store(AnswerKey::Id(id.to_string()), value)
    }

    pub fn insert_at(&mut self, index: usize, value: i64) -> Result<(), Error> {
        self.store(AnswerKey::Position(index), value)
    }

    fn store(&mut self, key: AnswerKey, value: i64) -> Result<(), Error> {
        if !self.range.contains(value) {
            return Err(Error::IllegalAnswer {
                question: key.label(),
                value,
                min: self.range.min,
                max: self.range.max,
            });
        }
        if self.values.contains_key(&key) {
            return Err(Error::DuplicateAnswer(key.label()));
        }
        // in range, so it fits
        self.values.insert(key, value as u8);
        Ok(())
    }

    /// Reads a JSON object keyed by question id, or a JSON array in question
    /// order. `null` leaves a question unanswered. Strings and fractional
    /// numbers are rejected, not coerced.
    pub fn from_json(document: &Value, range: LikertRange) -> Result<Self, Error> {
        let mut answers = Self::new(range);
        match document {
            Value::Object(map) => {
                for (id, value) in map {
                    if let Some(value) = integer(id, value)? {
                        answers.insert(id, value)?;
                    }
                }
            }
            Value::Array(values) => {
                for (index, value) in values.iter().enumerate() {
                    match integer(&format!("#{}", index), value)? {
                        Some(value) => answers.push(value)?,
                        None => answers.skip(),
                    }
                }
            }
            _ => return Err(Error::IllegalAnswerDocument),
        }
        Ok(answers)
    }

    /// Maps every answer onto a question id of `bank`.
    pub fn resolve(&self, bank: &QuestionBank) -> Result<BTreeMap<String, u8>, Error> {
        let len = bank.len();
        let mut resolved = BTreeMap::new();
        for (key, &value) in &self.values {
            let id = match key {
                AnswerKey::Id(id) => bank
                    .question(id)
                    .map(|question| question.id.clone())
                    .ok_or_else(|| Error::UnknownQuestion(id.clone()))?,
                AnswerKey::Position(index) => bank
                    .get(*index)
                    .map(|question| question.id.clone())
                    .ok_or(Error::IllegalIndex { index: *index, len })?,
            };
            if resolved.insert(id.clone(), value).is_some() {
                return Err(Error::DuplicateAnswer(id));
            }
        }
        Ok(resolved)
    }
}

fn integer(question: &str, value: &Value) -> Result<Option<i64>, Error> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => number.as_i64().map(Some).ok_or_else(|| Error::NonNumericAnswer {
            question: question.to_string(),
            value: number.to_string(),
        }),
        other => Err(Error::NonNumericAnswer {
            question: question.to_string(),
            value: other.to_string(),
        }),
    }
}
