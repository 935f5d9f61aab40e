use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;

use crate::error::FetchError;

///
/// An optional step run on each completed file, producing a possibly-renamed output path.
///
pub trait PostProcessor {
    fn process(&self, file_path: &Path) -> Result<PathBuf, FetchError>;
}

///
/// Runs a templated shell command against each completed file, then verifies a templated
/// "expected output" path exists before reporting completion with that path.
///
pub struct ShellFileProcessor {
    command: String,
    expect_file: String,
    /// (pattern matched against the completed file's path, templates that must all resolve
    /// to existing files before the command is run)
    required_files: Option<(Regex, Vec<String>)>,
}

impl ShellFileProcessor {
    pub fn new(command: &str, expect_file: &str, required_files: Option<(Regex, Vec<String>)>) -> Self {
        Self { command: command.to_string(), expect_file: expect_file.to_string(), required_files }
    }

    ///
    /// Format the given pattern against the file path, substituting the path-derived
    /// tokens (`{filename}`, `{file_suffix}`, `{file_stem}`, `{parent_dir}`,
    /// `{parent_dirs[i]}`, `{path}`) plus any extra named-group captures.
    ///
    fn apply_file_pattern(pattern: &str, file_path: &Path, extra: &HashMap<String, String>) -> String {
        let filename = file_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let file_stem = file_path.file_stem().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let file_suffix = file_path.extension().map(|s| format!(".{}", s.to_string_lossy())).unwrap_or_default();
        let parent_dir = file_path.parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();

        let mut rendered = pattern
            .replace("{filename}", &filename)
            .replace("{file_suffix}", &file_suffix)
            .replace("{file_stem}", &file_stem)
            .replace("{parent_dir}", &parent_dir)
            .replace("{path}", &file_path.to_string_lossy());

        for (i, ancestor) in file_path.ancestors().skip(1).enumerate() {
            rendered = rendered.replace(&format!("{{parent_dirs[{}]}}", i), &ancestor.to_string_lossy());
        }

        for (name, value) in extra {
            rendered = rendered.replace(&format!("{{{}}}", name), value);
        }

        rendered
    }
}

impl PostProcessor for ShellFileProcessor {
    fn process(&self, file_path: &Path) -> Result<PathBuf, FetchError> {
        let mut captured_groups = HashMap::new();

        if let Some((pattern, templates)) = &self.required_files {
            let captures = pattern.captures(&file_path.to_string_lossy());

            let all_present = match &captures {
                Some(captures) => templates.iter().all(|template| {
                    let rendered = substitute_groups(template, pattern, captures);
                    Path::new(&rendered).is_file()
                }),
                None => false,
            };

            if !all_present {
                log::info!("Not all required_files are present for {}", file_path.display());
                return Ok(file_path.to_path_buf());
            }

            if let Some(captures) = captures {
                for name in pattern.capture_names().flatten() {
                    if let Some(value) = captures.name(name) {
                        captured_groups.insert(name.to_string(), value.as_str().to_string());
                    }
                }
            }
        }

        let command = Self::apply_file_pattern(&self.command, file_path, &captured_groups);
        log::info!("Running {:?}", command);

        let status = Command::new("sh").arg("-c").arg(&command).status()
            .map_err(|source| FetchError::PostProcessFailed { path: file_path.to_string_lossy().into(), reason: source.to_string() })?;

        if !status.success() {
            return Err(FetchError::PostProcessFailed {
                path: file_path.to_string_lossy().into(),
                reason: format!("command {:?} exited with {}", command, status),
            });
        }

        let expected_path = Self::apply_file_pattern(&self.expect_file, file_path, &captured_groups);

        if !Path::new(&expected_path).exists() {
            return Err(FetchError::ExpectedFileMissing { path: expected_path });
        }

        log::debug!("File available {}", expected_path);
        Ok(PathBuf::from(expected_path))
    }
}

fn substitute_groups(template: &str, pattern: &Regex, captures: &regex::Captures) -> String {
    let mut rendered = template.to_string();
    for name in pattern.capture_names().flatten() {
        if let Some(value) = captures.name(name) {
            rendered = rendered.replace(&format!("{{{}}}", name), value.as_str());
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_stem_and_suffix_tokens() {
        let extra = HashMap::new();
        let result = ShellFileProcessor::apply_file_pattern(
            "{file_stem} extension {file_suffix}", Path::new("/tmp/something.txt"), &extra);
        assert_eq!(result, "something extension .txt");
    }

    #[test]
    fn applies_filename_and_parent_dir_tokens() {
        let extra = HashMap::new();
        let result = ShellFileProcessor::apply_file_pattern(
            "{filename} in {parent_dir}", Path::new("/tmp/something.txt"), &extra);
        assert_eq!(result, "something.txt in /tmp");
    }

    #[test]
    fn applies_parent_dirs_index_tokens() {
        let extra = HashMap::new();
        assert_eq!(
            ShellFileProcessor::apply_file_pattern("{parent_dirs[0]}", Path::new("/tmp/something.txt"), &extra),
            "/tmp");
        assert_eq!(
            ShellFileProcessor::apply_file_pattern("{parent_dirs[1]}", Path::new("/tmp/something.txt"), &extra),
            "/");
    }
}
