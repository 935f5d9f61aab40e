use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

///
/// `{base}/lock/{sanitizedName}.lck` - one per rule, serializing concurrent workers.
///
pub fn lock_path_for(base_directory: &Path, sanitized_name: &str) -> PathBuf {
    base_directory.join("lock").join(format!("{}.lck", sanitized_name))
}

///
/// `{base}/log/{YYYY}/{MM-DD}/{HHMM}-{sanitizedName}.log`, dated by the rule's scheduled
/// fire time in local time (matching the cron scheduler's own clock).
///
pub fn log_path_for(base_directory: &Path, scheduled_time: DateTime<Local>, sanitized_name: &str) -> PathBuf {
    base_directory
        .join("log")
        .join(scheduled_time.format("%Y").to_string())
        .join(scheduled_time.format("%m-%d").to_string())
        .join(format!("{}-{}.log", scheduled_time.format("%H%M"), sanitized_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn log_path_follows_year_month_day_hhmm_layout() {
        let when = Local.with_ymd_and_hms(2026, 3, 5, 14, 30, 0).unwrap();
        let path = log_path_for(Path::new("/base"), when, "ls8-bpf");
        assert_eq!(path, PathBuf::from("/base/log/2026/03-05/1430-ls8-bpf.log"));
    }

    #[test]
    fn lock_path_uses_sanitized_name() {
        assert_eq!(lock_path_for(Path::new("/base"), "ls8-bpf"), PathBuf::from("/base/lock/ls8-bpf.lck"));
    }
}
