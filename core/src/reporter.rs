use std::collections::HashMap;
use std::path::Path;

use lettre::{Message, SmtpTransport, Transport};
use serde::Serialize;

use crate::process::PostProcessor;
use crate::uri::Uri;

///
/// Sink for per-file success/error events raised while a Source triggers.
///
pub trait ResultHandler {
    fn file_error(&self, uri: &str, summary: &str, body: &str);

    fn file_complete(&self, source_uri: &str, path: &Path, metadata: Option<HashMap<String, String>>);

    /// Bulk completion, e.g. for an rsync mirror reporting many files in one pass.
    /// Default implementation just calls `file_complete` per path; sinks that can batch
    /// (the message bus) should override this.
    fn files_complete(&self, source_uri: &str, paths: &[std::path::PathBuf], metadata: Option<HashMap<String, String>>) {
        for path in paths {
            self.file_complete(source_uri, path, metadata.clone());
        }
    }
}

///
/// An optional publish sink for "ancillary update" events. No-op when the operator hasn't
/// configured `messaging`.
///
pub trait MessageBus: Send + Sync {
    fn publish(&self, event: &AncillaryUpdate);
}

#[derive(Debug, Serialize)]
pub struct AncillaryUpdate {
    pub ancillary_type: String,
    pub uris: Vec<String>,
    pub properties: HashMap<String, String>,
}

pub struct NoopBus;

impl MessageBus for NoopBus {
    fn publish(&self, event: &AncillaryUpdate) {
        log::debug!("No message bus configured, dropping update for {}", event.ancillary_type);
    }
}

///
/// Publishes ancillary-update events as JSON to a configured webhook URL. A concrete,
/// buildable stand-in for whatever internal message-bus client an operator's site
/// actually runs - the wire format is opaque to the rest of the system either way.
///
pub struct WebhookBus {
    url: String,
    client: reqwest::blocking::Client,
}

impl WebhookBus {
    pub fn new(url: &str) -> Self {
        Self { url: url.to_string(), client: reqwest::blocking::Client::new() }
    }
}

impl MessageBus for WebhookBus {
    fn publish(&self, event: &AncillaryUpdate) {
        if let Err(err) = self.client.post(&self.url).json(event).send() {
            log::warn!("Failed to publish ancillary update to {}: {}", self.url, err);
        }
    }
}

///
/// Sends failure notifications by email. Used both for per-file errors (one email per
/// error) and whole-worker failures (one email per failing worker, body = log contents).
///
pub struct EmailNotifier {
    addresses: Vec<String>,
    relay: String,
}

impl EmailNotifier {
    pub fn new(addresses: Vec<String>, relay: &str) -> Self {
        Self { addresses, relay: relay.to_string() }
    }

    pub fn notify_file_failure(&self, process_name: &str, uri: &str, summary: &str, body: &str) {
        let text = format!("uri: {}\n{}\n\n{}", uri, summary, body);
        self.send(process_name, &text);
    }

    pub fn notify_process_failure(&self, process_name: &str, exit_code: i32, log_contents: &str) {
        // A negative exit code means the worker was signal-killed, probably by the operator.
        if exit_code < 0 {
            return;
        }
        self.send(process_name, log_contents);
    }

    fn send(&self, process_name: &str, body: &str) {
        if self.addresses.is_empty() {
            return;
        }

        let hostname = hostname_or_default();
        let from = format!("fetchd-{}@{}", std::process::id(), hostname);

        for address in &self.addresses {
            let message = Message::builder()
                .from(from.parse().unwrap_or_else(|_| "fetchd@localhost".parse().unwrap()))
                .to(match address.parse() {
                    Ok(addr) => addr,
                    Err(err) => {
                        log::warn!("Invalid notify address {}: {}", address, err);
                        continue;
                    }
                })
                .subject(format!("{} failure on {}", process_name, hostname))
                .body(body.to_string());

            let message = match message {
                Ok(m) => m,
                Err(err) => {
                    log::warn!("Unable to build failure email to {}: {}", address, err);
                    continue;
                }
            };

            match SmtpTransport::relay(&self.relay).and_then(|t| Ok(t.build())) {
                Ok(mailer) => {
                    if let Err(err) = mailer.send(&message) {
                        log::warn!("Failed to send failure email to {}: {}", address, err);
                    }
                }
                Err(err) => log::warn!("Unable to reach mail relay {}: {}", self.relay, err),
            }
        }
    }
}

fn hostname_or_default() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

///
/// The canonical ResultHandler used in production: runs the rule's PostProcessor (if any)
/// on each completed file, then fans out completion to the log and message bus, and
/// failures to the log and email notifier. Failure of the bus or email must never abort
/// the caller - both are best-effort.
///
pub struct FanoutReporter<'a> {
    pub rule_name: String,
    pub sanitized_name: String,
    pub post_processor: Option<&'a dyn PostProcessor>,
    pub bus: &'a dyn MessageBus,
    pub email: Option<&'a EmailNotifier>,
}

impl<'a> FanoutReporter<'a> {
    /// `file://` URI for a fetched path, FQDN-qualified so a bus consumer on another host
    /// can resolve it unambiguously.
    fn qualified_uri(path: &std::path::Path) -> String {
        Uri::parse(&path.to_string_lossy())
            .qualified(&hostname_or_default())
            .to_string()
    }
}

impl<'a> ResultHandler for FanoutReporter<'a> {
    fn file_error(&self, uri: &str, summary: &str, body: &str) {
        log::error!("[{}] fetch failed for {}: {} - {}", self.rule_name, uri, summary, body);

        if let Some(email) = self.email {
            email.notify_file_failure(&self.rule_name, uri, summary, body);
        }
    }

    fn file_complete(&self, source_uri: &str, path: &std::path::Path, metadata: Option<HashMap<String, String>>) {
        let final_path = match self.post_processor {
            Some(processor) => match processor.process(path) {
                Ok(processed) => processed,
                Err(err) => {
                    log::error!("[{}] post-processing failed for {}: {}", self.rule_name, path.display(), err);
                    return;
                }
            },
            None => path.to_path_buf(),
        };

        log::info!("[{}] fetched {} -> {}", self.rule_name, source_uri, final_path.display());

        let mut properties = metadata.unwrap_or_default();
        properties.entry("source-uri".to_string()).or_insert_with(|| source_uri.to_string());

        self.bus.publish(&AncillaryUpdate {
            ancillary_type: self.sanitized_name.clone(),
            uris: vec![Self::qualified_uri(&final_path)],
            properties,
        });
    }

    fn files_complete(&self, source_uri: &str, paths: &[std::path::PathBuf], metadata: Option<HashMap<String, String>>) {
        // Bulk completions (e.g. rsync) skip per-file post-processing: they're already a
        // finished mirror, not individually templated downloads.
        let mut properties = metadata.unwrap_or_default();
        properties.entry("source-uri".to_string()).or_insert_with(|| source_uri.to_string());

        log::info!("[{}] {} files fetched from {}", self.rule_name, paths.len(), source_uri);

        self.bus.publish(&AncillaryUpdate {
            ancillary_type: self.sanitized_name.clone(),
            uris: paths.iter().map(|p| Self::qualified_uri(p)).collect(),
            properties,
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingHandler {
        pub(crate) errors: Mutex<Vec<(String, String, String)>>,
        pub(crate) completes: Mutex<Vec<(String, std::path::PathBuf)>>,
    }

    impl ResultHandler for RecordingHandler {
        fn file_error(&self, uri: &str, summary: &str, body: &str) {
            self.errors.lock().unwrap().push((uri.to_string(), summary.to_string(), body.to_string()));
        }

        fn file_complete(&self, source_uri: &str, path: &Path, _metadata: Option<HashMap<String, String>>) {
            self.completes.lock().unwrap().push((source_uri.to_string(), path.to_path_buf()));
        }
    }
}
