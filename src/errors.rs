use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error-autolists-config-1 Required environment variable not set: {var_name}")]
    EnvVarRequired { var_name: String },

    #[error("error-autolists-config-2 Version not available")]
    VersionNotAvailable,

    #[error("error-autolists-config-3 Invalid number for {name}: {value}")]
    InvalidNumber { name: String, value: String },

    #[error("error-autolists-config-4 Invalid timeout value: {value}")]
    InvalidTimeout { value: String },

    #[error("error-autolists-config-5 Invalid URL: {url}: {details}")]
    InvalidUrl { url: String, details: String },
}

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("error-autolists-rule-1 Invalid match pattern for list {list_id}: {pattern}: {details}")]
    InvalidPattern {
        list_id: String,
        pattern: String,
        details: String,
    },

    #[error("error-autolists-rule-2 Rule has no target list: MatchPattern={pattern}")]
    MissingListId { pattern: String },

    #[error("error-autolists-rule-3 Rule index out of range: {index} >= {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("error-autolists-rule-4 Rule file I/O failed: {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error-autolists-rule-5 Rule file is not valid JSON: {path}: {source}")]
    FileFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum ListError {
    #[error("error-autolists-list-1 HTTP request failed: {0}")]
    HttpRequestFailed(#[from] reqwest::Error),

    #[error("error-autolists-list-2 Unexpected response status: {operation}: {status}")]
    UnexpectedStatus { operation: String, status: u16 },

    #[error("error-autolists-list-3 List name is required")]
    MissingListName,

    #[error("error-autolists-list-4 Invalid list mode: {mode}")]
    InvalidMode { mode: String },

    #[error("error-autolists-list-5 Invalid list API URL: {url}: {details}")]
    InvalidUrl { url: String, details: String },
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("error-autolists-feed-1 Timeline request failed: {0}")]
    HttpRequestFailed(#[from] reqwest::Error),

    #[error("error-autolists-feed-2 Unexpected timeline response status: {status}")]
    UnexpectedStatus { status: u16 },
}
