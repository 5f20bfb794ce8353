use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Answer refers to a question id the bank does not contain
    #[error("unknown question id `{0}`")]
    UnknownQuestion(String),

    /// Positional answer beyond the end of the bank
    #[error("answer index {index} is out of range for a bank of {len} questions")]
    IllegalIndex { index: usize, len: usize },

    /// Answer value is not an integer
    #[error("answer for `{question}` is not an integer: {value}")]
    NonNumericAnswer { question: String, value: String },

    /// Answer value outside the Likert range
    #[error("answer for `{question}` is {value}, expected {min}..={max}")]
    IllegalAnswer {
        question: String,
        value: i64,
        min: u8,
        max: u8,
    },

    /// Same question answered more than once
    #[error("question `{0}` is answered more than once")]
    DuplicateAnswer(String),

    #[error("question id `{0}` appears more than once in the question bank")]
    DuplicateQuestion(String),

    /// Unanswered questions while the configuration requires a complete attempt
    #[error("attempt is incomplete, {} question(s) unanswered: {}", .0.len(), .0.join(", "))]
    Incomplete(Vec<String>),

    #[error("invalid norm for `{category}`: mean {mean}, standard deviation {std_dev}")]
    InvalidNorm {
        category: String,
        mean: f64,
        std_dev: f64,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("answer document must be a JSON object or array")]
    IllegalAnswerDocument,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
