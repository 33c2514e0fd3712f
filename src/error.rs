use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Source API error: {0}")]
    Api(#[from] ApiError),

    #[error("Article parse error: {0}")]
    WebParse(#[from] WebParseError),

    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Send error: {0}")]
    Send(#[from] SendError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable '{key}'")]
    MissingVar { key: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidVar { key: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected status {status} from '{url}'")]
    Status { url: String, status: u16 },

    #[error("Malformed index document: {0}")]
    InvalidDocument(String),

    #[error("Unparseable article timestamp '{0}'")]
    Timestamp(String),

    #[error("Gave up on '{url}' after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },
}

#[derive(Error, Debug)]
pub enum WebParseError {
    #[error("Article page has no title")]
    MissingTitle,

    #[error("Article page has no body content")]
    MissingBody,
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("Message request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Messaging API rejected the message (status {status}): {description}")]
    Api { status: u16, description: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
