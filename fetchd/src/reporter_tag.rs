use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fetchd_core::reporter::ResultHandler;

///
/// Wraps the rule's `FanoutReporter`, tagging every completion's metadata with the rule's
/// cron pattern, name, and the UTC time the worker was triggered at - the properties a
/// downstream bus consumer needs to correlate an ancillary update back to the rule that
/// produced it.
///
pub struct TaggingReporter<'a> {
    pub inner: &'a dyn ResultHandler,
    pub cron_pattern: String,
    pub trigger_name: String,
    pub trigger_time: DateTime<Utc>,
}

impl<'a> TaggingReporter<'a> {
    fn tags(&self) -> HashMap<String, String> {
        let mut tags = HashMap::new();
        tags.insert("fetch-cron-pattern".to_string(), self.cron_pattern.clone());
        tags.insert("fetch-trigger-name".to_string(), self.trigger_name.clone());
        tags.insert("fetch-trigger-time".to_string(), self.trigger_time.format("%Y-%m-%d %H:%M:%S").to_string());
        tags
    }
}

impl<'a> ResultHandler for TaggingReporter<'a> {
    fn file_error(&self, uri: &str, summary: &str, body: &str) {
        self.inner.file_error(uri, summary, body);
    }

    fn file_complete(&self, source_uri: &str, path: &Path, metadata: Option<HashMap<String, String>>) {
        let mut tags = self.tags();
        if let Some(metadata) = metadata {
            tags.extend(metadata);
        }
        self.inner.file_complete(source_uri, path, Some(tags));
    }

    fn files_complete(&self, source_uri: &str, paths: &[PathBuf], metadata: Option<HashMap<String, String>>) {
        let mut tags = self.tags();
        if let Some(metadata) = metadata {
            tags.extend(metadata);
        }
        self.inner.files_complete(source_uri, paths, Some(tags));
    }
}
