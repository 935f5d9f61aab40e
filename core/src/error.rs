use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config {path} not found")]
    FileNotFound { path: String, source: std::io::Error },

    #[error("Config {path} contains invalid configuration")]
    InvalidYaml { path: String, source: serde_yaml::Error },

    #[error("Rule '{rule}' is invalid - {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("No rule named '{name}' is defined in this config")]
    NoSuchRule { name: String },
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("remote fetch of {uri} failed: {reason}")]
    Remote { uri: String, reason: String },

    #[error("fetched file from {uri} was empty")]
    EmptyFile { uri: String },

    #[error("unable to create directory {path}: {source}")]
    CannotCreateDir { path: String, source: std::io::Error },

    #[error("unable to write temp file {path}: {source}")]
    CannotWriteTempFile { path: String, source: std::io::Error },

    #[error("unable to rename {from} to {to}: {source}")]
    CannotRename { from: String, to: String, source: std::io::Error },

    #[error("shell command failed for {path}: {reason}")]
    PostProcessFailed { path: String, reason: String },

    #[error("expected file {path} was not present after post-processing")]
    ExpectedFileMissing { path: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Ftp(#[from] ftp::FtpError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum LockError {
    #[error("lock {path} is already held by another worker")]
    Contended { path: String },

    #[error("unable to acquire lock {path}: {source}")]
    Io { path: String, source: std::io::Error },
}
