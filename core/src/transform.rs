use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

///
/// The config-file representation of a `FilenameTransform`, dispatched on the YAML
/// `kind` tag (`regexp-extract` / `date-pattern`) to the concrete implementation.
///
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransformConfig {
    RegexpExtract { pattern: String },
    DatePattern { format: String, fixed_date: Option<DateTime<Utc>> },
}

impl TransformConfig {
    pub fn build(&self) -> Result<Box<dyn FilenameTransform>, ConfigError> {
        match self {
            TransformConfig::RegexpExtract { pattern } =>
                Ok(Box::new(RegexpOutputPathTransform::new(pattern)?)),
            TransformConfig::DatePattern { format, fixed_date } =>
                Ok(Box::new(DateFilenameTransform::new(format, *fixed_date))),
        }
    }
}

///
/// Pluggable rewrite of a destination directory and filename, driven by the name of the
/// remote object being fetched.
///
pub trait FilenameTransform {
    /// Rewrite the destination directory. Sees the *original* source name, not the
    /// transformed filename.
    fn transform_dir(&self, dest_dir: &Path, source_name: &str) -> PathBuf;

    /// Rewrite the filename itself.
    fn transform_name(&self, source_name: &str) -> String;
}

///
/// Extracts named regex groups from the source name and substitutes them as `{group}`
/// placeholders into the destination directory template. Leaves the filename untouched.
///
#[derive(Debug, Clone)]
pub struct RegexpOutputPathTransform {
    pattern: Regex,
}

impl RegexpOutputPathTransform {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = Regex::new(pattern)
            .map_err(|source| ConfigError::InvalidRule { rule: pattern.into(), reason: source.to_string() })?;
        Ok(Self { pattern })
    }
}

impl FilenameTransform for RegexpOutputPathTransform {
    fn transform_dir(&self, dest_dir: &Path, source_name: &str) -> PathBuf {
        let captures = match self.pattern.captures(source_name) {
            Some(c) => c,
            None => return dest_dir.to_path_buf(),
        };

        let mut rendered = dest_dir.to_string_lossy().to_string();
        for name in self.pattern.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                rendered = rendered.replace(&format!("{{{}}}", name), value.as_str());
            }
        }

        PathBuf::from(rendered)
    }

    fn transform_name(&self, source_name: &str) -> String {
        source_name.to_string()
    }
}

///
/// Substitutes date fields (and the original filename/path) into a format-string template
/// to produce the new filename. Uses a fixed date if one was configured, otherwise the
/// current UTC date.
///
#[derive(Debug, Clone)]
pub struct DateFilenameTransform {
    format: String,
    fixed_date: Option<DateTime<Utc>>,
}

impl DateFilenameTransform {
    pub fn new(format: &str, fixed_date: Option<DateTime<Utc>>) -> Self {
        Self { format: format.to_string(), fixed_date }
    }

    fn effective_date(&self) -> DateTime<Utc> {
        self.fixed_date.unwrap_or_else(Utc::now)
    }
}

impl FilenameTransform for DateFilenameTransform {
    fn transform_dir(&self, dest_dir: &Path, _source_name: &str) -> PathBuf {
        dest_dir.to_path_buf()
    }

    fn transform_name(&self, source_name: &str) -> String {
        let date = self.effective_date();
        let path = Path::new(source_name);
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let suffix = path.extension().map(|s| format!(".{}", s.to_string_lossy())).unwrap_or_default();
        let parent = path.parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();

        self.format
            .replace("{year}", &format!("{:04}", date.year()))
            .replace("{month}", &format!("{:02}", date.month()))
            .replace("{day}", &format!("{:02}", date.day()))
            .replace("{julday}", &format!("{:03}", date.ordinal()))
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
            .replace("{path_stem}", &stem)
            .replace("{path_suffix}", &suffix)
            .replace("{path_parent}", &parent)
            .replace("{path}", source_name)
            .replace("{filename}", source_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_transform_substitutes_named_groups() {
        let transform = RegexpOutputPathTransform::new(r"LS8_(?P<year>\d{4})").unwrap();
        let result = transform.transform_dir(Path::new("/tmp/out/{year}"), "LS8_2003");
        assert_eq!(result, PathBuf::from("/tmp/out/2003"));
    }

    #[test]
    fn regex_transform_leaves_dir_unchanged_on_mismatch() {
        let transform = RegexpOutputPathTransform::new(r"LS8_(?P<year>\d{4})").unwrap();
        let result = transform.transform_dir(Path::new("/tmp/out/{year}"), "other.txt");
        assert_eq!(result, PathBuf::from("/tmp/out/{year}"));
    }

    #[test]
    fn date_transform_substitutes_fixed_date() {
        let fixed = DateTime::parse_from_rfc3339("2013-08-06T00:00:00Z").unwrap().with_timezone(&Utc);
        let transform = DateFilenameTransform::new("{year}{month}{day}.{filename}", Some(fixed));
        assert_eq!(transform.transform_name("output.log"), "20130806.output.log");
    }
}
