use std::collections::HashMap;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::process::{PostProcessor, ShellFileProcessor};
use crate::sanitize::sanitize;
use crate::source::Source;

///
/// A single `name: {schedule, source, process?}` entry from the `rules` map. Immutable
/// once loaded - the Supervisor only ever replaces the whole `Config`, never mutates a
/// `Rule` in place.
///
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    sanitized_name: String,
    cron_pattern: String,
    source: Source,
    process: Option<ShellProcessConfig>,
}

impl Rule {
    pub fn new(name: &str, cron_pattern: &str, source: Source) -> Self {
        Self {
            sanitized_name: sanitize(name),
            name: name.to_string(),
            cron_pattern: cron_pattern.to_string(),
            source,
            process: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased name with every non-alphanumeric character mapped to `-`, computed once
    /// at load time and used to derive lock/log file names.
    pub fn sanitized_name(&self) -> &str {
        &self.sanitized_name
    }

    pub fn cron_pattern(&self) -> &str {
        &self.cron_pattern
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn build_processor(&self) -> Result<Option<Box<dyn PostProcessor>>, ConfigError> {
        match &self.process {
            Some(config) => Ok(Some(Box::new(config.build()?))),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleConfig {
    schedule: String,
    source: Source,
    process: Option<ShellProcessConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
struct ShellProcessConfig {
    command: String,
    expect_file: String,
    input_files: Option<InputFilesConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct InputFilesConfig {
    pattern: String,
    templates: Vec<String>,
}

impl ShellProcessConfig {
    fn build(&self) -> Result<ShellFileProcessor, ConfigError> {
        let required_files = match &self.input_files {
            Some(cfg) => {
                let pattern = regex::Regex::new(&cfg.pattern)
                    .map_err(|source| ConfigError::InvalidRule { rule: cfg.pattern.clone(), reason: source.to_string() })?;
                Some((pattern, cfg.templates.clone()))
            }
            None => None,
        };

        Ok(ShellFileProcessor::new(&self.command, &self.expect_file, required_files))
    }
}

///
/// The top-level configuration document: a base directory for `lock/`/`log/`, an ordered
/// set of named rules, and the optional notification/messaging/logging settings.
///
#[derive(Debug, Clone)]
pub struct Config {
    base_directory: PathBuf,
    notify_emails: Vec<String>,
    messaging: Option<MessagingConfig>,
    smtp_relay: String,
    log_levels: HashMap<String, String>,
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessagingConfig {
    pub webhook_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotifyConfig {
    email: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    directory: PathBuf,
    notify: Option<NotifyConfig>,
    messaging: Option<MessagingConfig>,
    #[serde(default = "default_smtp_relay")]
    smtp_relay: String,
    log: Option<HashMap<String, String>>,
    rules: Option<HashMap<String, RuleConfig>>,
}

fn default_smtp_relay() -> String {
    "localhost".to_string()
}

impl Config {
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    pub fn notify_emails(&self) -> &[String] {
        &self.notify_emails
    }

    pub fn messaging(&self) -> Option<&MessagingConfig> {
        self.messaging.as_ref()
    }

    pub fn smtp_relay(&self) -> &str {
        &self.smtp_relay
    }

    pub fn log_levels(&self) -> &HashMap<String, String> {
        &self.log_levels
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    ///
    /// Load and validate a config document from disk. Unknown fields, missing required
    /// fields, and invalid cron/regex patterns are all rejected here with a pointed error -
    /// a rejected reload must never replace the live config.
    ///
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let rdr = BufReader::new(std::fs::File::open(path)
            .map_err(|source| ConfigError::FileNotFound { path: path.to_string_lossy().into(), source })?);

        let raw: RawConfig = serde_yaml::from_reader(rdr)
            .map_err(|source| ConfigError::InvalidYaml { path: path.to_string_lossy().into(), source })?;

        if !raw.directory.is_dir() {
            return Err(ConfigError::InvalidRule {
                rule: "directory".into(),
                reason: format!("{} does not exist", raw.directory.display()),
            });
        }

        let mut rules = Vec::new();
        for (name, rule_config) in raw.rules.unwrap_or_default() {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidRule { rule: name, reason: "rule name must not be empty".into() });
            }

            rule_config.schedule.parse::<cron::Schedule>()
                .map_err(|source| ConfigError::InvalidRule { rule: name.clone(), reason: source.to_string() })?;

            rules.push(Rule {
                sanitized_name: sanitize(&name),
                name,
                cron_pattern: rule_config.schedule,
                source: rule_config.source,
                process: rule_config.process,
            });
        }

        // Keep rules in a stable, deterministic order regardless of the map's iteration order
        // so the schedule's tie-breaking-by-insertion-order behaves the same way run to run.
        rules.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Config {
            base_directory: raw.directory,
            notify_emails: raw.notify.and_then(|n| n.email).unwrap_or_default(),
            messaging: raw.messaging,
            smtp_relay: raw.smtp_relay,
            log_levels: raw.log.unwrap_or_default(),
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let base = dir.join("base");
        std::fs::create_dir_all(&base).unwrap();
        let path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "directory: {}", base.display()).unwrap();
        writeln!(file, "{}", contents).unwrap();
        path
    }

    #[test]
    fn rejects_missing_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "directory: /does/not/exist\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn loads_rules_with_sanitized_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"
rules:
  "LS8 BPF":
    schedule: "0 * * * * *"
    source:
      kind: empty
"#);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.rules().len(), 1);
        assert_eq!(config.rules()[0].sanitized_name(), "ls8-bpf");
    }

    #[test]
    fn rejects_invalid_cron_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"
rules:
  broken:
    schedule: "not a cron expression"
    source:
      kind: empty
"#);

        assert!(Config::load(&path).is_err());
    }
}
