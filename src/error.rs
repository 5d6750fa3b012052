use thiserror::Error;

/// Fatal ingestion failures. Any of these aborts the whole submission.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("response row was not created")]
    ResponseNotCreated,
    #[error("insert chunk size {0} is outside 1..={max}", max = crate::db::MAX_ANSWERS_PER_INSERT)]
    InvalidChunkSize(usize),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("question {0} is already mapped")]
    AlreadyMapped(i32),
    #[error("no question found with text \"{0}\"")]
    QuestionNotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("failed to read survey definition: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse survey definition: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{key} has invalid value \"{value}\"")]
    Invalid { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook rejected notification with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
