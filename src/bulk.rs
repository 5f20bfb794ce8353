use std::io::Read;

use crate::answer::AnswerSet;
use crate::config::LikertRange;
use crate::Error;

/// A rejected CSV row. `id` is absent when the row could not be read at all.
#[derive(Debug, thiserror::Error)]
#[error("attempt `{}`: {error}", .id.as_deref().unwrap_or("?"))]
pub struct RowError {
    pub id: Option<String>,
    #[source]
    pub error: Error,
}

impl From<Error> for RowError {
    fn from(error: Error) -> Self {
        Self { id: None, error }
    }
}

/// Reads one attempt per CSV row.
///
/// The first column holds the attempt id, the remaining header cells name
/// question ids. An empty cell leaves the question unanswered. A bad row
/// yields an error for that row only, the iterator keeps going.
pub fn read_bulk<R: Read>(
    reader: R,
    range: LikertRange,
) -> impl Iterator<Item = Result<(String, AnswerSet), RowError>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(reader);
    let (headers, mut pending) = match reader.headers() {
        Ok(headers) => (headers.clone(), None),
        Err(e) => (csv::StringRecord::new(), Some(Error::from(e))),
    };

    let mut records = reader.into_records();
    let mut done = false;
    std::iter::from_fn(move || {
        if let Some(e) = pending.take() {
            done = true;
            return Some(Err(RowError::from(e)));
        }
        if done {
            return None;
        }
        let record = records.next()?;
        Some(match record {
            Ok(record) => {
                let id = record.get(0).unwrap_or_default().to_string();
                row(&headers, &record, range)
                    .map(|answers| (id.clone(), answers))
                    .map_err(|error| RowError {
                        id: Some(id),
                        error,
                    })
            }
            Err(e) => Err(RowError::from(Error::from(e))),
        })
    })
}

fn row(
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
    range: LikertRange,
) -> Result<AnswerSet, Error> {
    let mut answers = AnswerSet::new(range);
    for (question, cell) in headers.iter().zip(record.iter()).skip(1) {
        if cell.is_empty() {
            continue;
        }
        let value = cell.parse::<i64>().map_err(|_| Error::NonNumericAnswer {
            question: question.to_string(),
            value: cell.to_string(),
        })?;
        answers.insert(question, value)?;
    }
    Ok(answers)
}
