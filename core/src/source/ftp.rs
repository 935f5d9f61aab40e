use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use ::ftp::FtpStream;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{build_transform, default_retry_count, default_retry_delay_seconds};
use crate::error::FetchError;
use crate::fetch::fetch_file;
use crate::reporter::ResultHandler;
use crate::transform::TransformConfig;

fn connect(hostname: &str) -> Result<FtpStream, FetchError> {
    let mut stream = FtpStream::connect(format!("{}:21", hostname))?;
    stream.login("anonymous", "anonymous")?;
    Ok(stream)
}

///
/// Download each path in `paths` from `hostname`, reconnecting and retrying up to
/// `retries` times with `retry_delay` between attempts on a transient (connection-reset
/// style) failure.
///
fn fetch_paths(
    hostname: &str,
    target_dir: &std::path::Path,
    reporter: &dyn ResultHandler,
    paths: &[String],
    override_existing: bool,
    transform: &Option<TransformConfig>,
    retries: u32,
    retry_delay: f64,
) -> Result<(), FetchError> {
    let transform = build_transform(transform)?;
    let mut stream = connect(hostname).map_err(|e| FetchError::Remote { uri: format!("ftp://{}", hostname), reason: e.to_string() })?;

    for path in paths {
        let uri = format!("ftp://{}{}", hostname, path);
        let basename = path.rsplit('/').next().unwrap_or(path).to_string();
        let mut retry_count = 0u32;

        loop {
            let result = stream.simple_retr(path);

            match result {
                Ok(cursor) => {
                    let bytes = cursor.into_inner();
                    fetch_file(
                        &uri,
                        |tmp| std::fs::write(tmp, &bytes).is_ok(),
                        reporter,
                        &basename,
                        target_dir,
                        transform.as_deref(),
                        override_existing,
                    );
                    break;
                }
                Err(_) if retry_count < retries => {
                    log::debug!("Error fetching {}, reconnecting to ftp server", path);
                    thread::sleep(Duration::from_secs_f64(retry_delay));
                    retry_count += 1;
                    stream = connect(hostname).map_err(|e| FetchError::Remote { uri: uri.clone(), reason: e.to_string() })?;
                }
                Err(err) => {
                    return Err(FetchError::Remote { uri, reason: err.to_string() });
                }
            }
        }
    }

    let _ = stream.quit();
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpFilesSource {
    pub hostname: String,
    pub paths: Vec<String>,
    pub target_dir: PathBuf,
    pub filename_transform: Option<TransformConfig>,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: f64,
}

impl FtpFilesSource {
    pub fn trigger(&self, reporter: &dyn ResultHandler) -> Result<(), FetchError> {
        fetch_paths(&self.hostname, &self.target_dir, reporter, &self.paths, true, &self.filename_transform, self.retry_count, self.retry_delay_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpListingSource {
    pub hostname: String,
    pub source_dir: String,
    pub name_pattern: String,
    pub target_dir: PathBuf,
    pub filename_transform: Option<TransformConfig>,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: f64,
}

impl FtpListingSource {
    pub fn trigger(&self, reporter: &dyn ResultHandler) -> Result<(), FetchError> {
        let name_pattern = Regex::new(&self.name_pattern)
            .map_err(|e| FetchError::Remote { uri: "<ftp-directory>".into(), reason: e.to_string() })?;

        let mut stream = connect(&self.hostname)
            .map_err(|e| FetchError::Remote { uri: format!("ftp://{}", self.hostname), reason: e.to_string() })?;

        let listing = match stream.nlst(Some(&self.source_dir)) {
            Ok(files) => files,
            Err(err) => {
                let message = err.to_string();
                // The server reports an empty directory as a "file not found" style error
                // rather than a successful empty listing.
                if message.contains("550 No files found") || message.trim_start().starts_with("450") {
                    log::info!("No files in remote directory {}", self.source_dir);
                    Vec::new()
                } else {
                    return Err(FetchError::Remote { uri: format!("ftp://{}{}", self.hostname, self.source_dir), reason: message });
                }
            }
        };
        let _ = stream.quit();

        let paths: Vec<String> = listing.into_iter()
            .filter(|f| {
                let basename = f.rsplit('/').next().unwrap_or(f);
                name_pattern.is_match(basename)
            })
            .collect();

        log::debug!("Filtered FTP listing to {} files", paths.len());

        fetch_paths(&self.hostname, &self.target_dir, reporter, &paths, true, &self.filename_transform, self.retry_count, self.retry_delay_seconds)
    }
}
