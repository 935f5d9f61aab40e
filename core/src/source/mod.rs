pub mod daterange;
pub mod empty;
pub mod ftp;
pub mod http;
pub mod rsync;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::reporter::ResultHandler;
use crate::transform::TransformConfig;

///
/// A polymorphic remote-file producer. Every variant implements `trigger`, which is
/// expected to surface an initial listing/feed failure as an `Err` (the Worker converts
/// this to a non-zero exit) while routing individual file failures through the Reporter
/// instead.
///
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Source {
    HttpFiles(http::HttpFilesSource),
    HttpDirectory(http::HttpListingSource),
    Rss(http::RssSource),
    FtpFiles(ftp::FtpFilesSource),
    FtpDirectory(ftp::FtpListingSource),
    Rsync(rsync::RsyncMirrorSource),
    DateRange(daterange::DateRangeSource),
    Empty(empty::EmptySource),
}

impl Source {
    pub fn trigger(&self, reporter: &dyn ResultHandler) -> Result<(), FetchError> {
        match self {
            Source::HttpFiles(source) => source.trigger(reporter),
            Source::HttpDirectory(source) => source.trigger(reporter),
            Source::Rss(source) => source.trigger(reporter),
            Source::FtpFiles(source) => source.trigger(reporter),
            Source::FtpDirectory(source) => source.trigger(reporter),
            Source::Rsync(source) => source.trigger(reporter),
            Source::DateRange(source) => source.trigger(reporter),
            Source::Empty(source) => source.trigger(reporter),
        }
    }
}

pub(crate) fn default_connection_timeout() -> u64 { 100 }
pub(crate) fn default_retry_count() -> u32 { 3 }
pub(crate) fn default_retry_delay_seconds() -> f64 { 5.0 }
pub(crate) fn default_name_pattern() -> String { ".*".to_string() }

pub(crate) fn build_transform(config: &Option<TransformConfig>) -> Result<Option<Box<dyn crate::transform::FilenameTransform>>, FetchError> {
    match config {
        Some(config) => Ok(Some(config.build().map_err(|e| FetchError::Remote { uri: "<config>".into(), reason: e.to_string() })?)),
        None => Ok(None),
    }
}
