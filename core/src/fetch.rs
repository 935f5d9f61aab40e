use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::reporter::ResultHandler;
use crate::transform::FilenameTransform;

///
/// Deletes the wrapped temp path on drop, if it still exists. Mirrors the Python
/// implementation's `try/finally` around the fetch attempt: whichever branch returns,
/// the half-written temp file never survives.
///
struct TempFileGuard<'a>(&'a Path);

impl<'a> Drop for TempFileGuard<'a> {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(err) = fs::remove_file(self.0) {
                log::warn!("Unable to clean up temp file {}: {}", self.0.display(), err);
            }
        }
    }
}

///
/// Atomically fetch one remote object into `target_dir`, applying an optional
/// `FilenameTransform`, staging in a temp file in the same directory, and rejecting
/// empty results.
///
/// `fetch_fn` is handed the temp path to write into and returns whether it succeeded;
/// on failure it is expected to have already reported its own error (e.g. via the
/// reporter) and this function simply stops without emitting a further event.
///
/// Returns whether `fetch_fn` itself reported success - callers use this to decide
/// whether a retry is worthwhile (a false from `fetch_fn` usually means a transient
/// network failure; every other outcome here, success or a permanent rejection like an
/// empty file, is final).
///
pub fn fetch_file<F>(
    uri: &str,
    fetch_fn: F,
    reporter: &dyn ResultHandler,
    target_name: &str,
    target_dir: &Path,
    transform: Option<&dyn FilenameTransform>,
    override_existing: bool,
) -> bool
where
    F: FnOnce(&Path) -> bool,
{
    let (target_dir, target_name) = match transform {
        Some(transform) => {
            let dir = transform.transform_dir(target_dir, target_name);
            let name = transform.transform_name(target_name);
            (dir, name)
        }
        None => (target_dir.to_path_buf(), target_name.to_string()),
    };

    let target_path = target_dir.join(&target_name);

    if target_path.exists() && !override_existing {
        log::debug!("{} already exists, skipping (override_existing=false)", target_path.display());
        return true;
    }

    let actual_target_dir = match target_path.parent() {
        Some(parent) => parent.to_path_buf(),
        None => target_dir.clone(),
    };

    if let Err(source) = fs::create_dir_all(&actual_target_dir) {
        log::error!("Unable to create directory {}: {}", actual_target_dir.display(), source);
        reporter.file_error(uri, "Cannot create directory", &source.to_string());
        return true;
    }

    let tmp_path = actual_target_dir.join(format!(".fetch-{}", random_suffix()));
    let _guard = TempFileGuard(&tmp_path);

    if !fetch_fn(&tmp_path) {
        log::debug!("fetch_fn reported failure for {}, not proceeding", uri);
        return false;
    }

    if !tmp_path.exists() {
        reporter.file_error(uri, "No file", "");
        return true;
    }

    let size = match fs::metadata(&tmp_path) {
        Ok(metadata) => metadata.len(),
        Err(source) => {
            reporter.file_error(uri, "Cannot stat fetched file", &source.to_string());
            return true;
        }
    };

    if size == 0 {
        reporter.file_error(uri, "Empty file", "");
        return true;
    }

    if let Err(source) = fs::rename(&tmp_path, &target_path) {
        reporter.file_error(uri, "Cannot rename into place", &source.to_string());
        return true;
    }

    reporter.file_complete(uri, &target_path, None);
    true
}

fn random_suffix() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::RecordingHandler;
    use std::io::Write;

    #[test]
    fn rejects_empty_fetch_result() {
        let dir = tempfile::tempdir().unwrap();
        let handler = RecordingHandler::default();

        fetch_file(
            "http://example.org/empty.txt",
            |tmp| { fs::File::create(tmp).unwrap(); true },
            &handler,
            "empty.txt",
            dir.path(),
            None,
            true,
        );

        assert_eq!(handler.errors.lock().unwrap().len(), 1);
        assert!(handler.completes.lock().unwrap().is_empty());
        assert!(!dir.path().join("empty.txt").exists());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn renames_non_empty_file_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let handler = RecordingHandler::default();

        fetch_file(
            "http://example.org/data.txt",
            |tmp| { writeln!(fs::File::create(tmp).unwrap(), "hello").unwrap(); true },
            &handler,
            "data.txt",
            dir.path(),
            None,
            true,
        );

        assert!(handler.errors.lock().unwrap().is_empty());
        assert_eq!(handler.completes.lock().unwrap().len(), 1);
        assert!(dir.path().join("data.txt").exists());
    }

    #[test]
    fn skips_existing_file_when_not_overriding() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.txt"), "existing").unwrap();
        let handler = RecordingHandler::default();

        fetch_file(
            "http://example.org/data.txt",
            |tmp| { fs::write(tmp, "new").unwrap(); true },
            &handler,
            "data.txt",
            dir.path(),
            None,
            false,
        );

        assert!(handler.errors.lock().unwrap().is_empty());
        assert!(handler.completes.lock().unwrap().is_empty());
        assert_eq!(fs::read_to_string(dir.path().join("data.txt")).unwrap(), "existing");
    }
}
