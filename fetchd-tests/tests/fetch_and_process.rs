mod common;

use std::fs;

use fetchd_core::fetch::fetch_file;
use fetchd_core::process::{PostProcessor, ShellFileProcessor};
use fetchd_core::reporter::ResultHandler;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Default)]
struct CapturingHandler {
    completed: Mutex<Vec<PathBuf>>,
}

impl ResultHandler for CapturingHandler {
    fn file_error(&self, _uri: &str, _summary: &str, _body: &str) {}

    fn file_complete(&self, _uri: &str, path: &std::path::Path, _metadata: Option<HashMap<String, String>>) {
        self.completed.lock().unwrap().push(path.to_path_buf());
    }

    fn files_complete(&self, uri: &str, paths: &[PathBuf], metadata: Option<HashMap<String, String>>) {
        for path in paths {
            self.file_complete(uri, path, metadata.clone());
        }
    }
}

/// A fetched file followed by a shell post-process step that derives a sibling ".done"
/// marker, exercising the fetch primitive and the post-processor together end to end.
#[test]
fn fetched_file_is_picked_up_and_processed_by_shell_step() {
    let base_dir = common::init_base_dir("fetch_and_process/basic");
    let handler = CapturingHandler::default();

    let fetched = fetch_file(
        "http://example.org/report.csv",
        |tmp| { fs::write(tmp, "a,b,c\n1,2,3\n").is_ok() },
        &handler,
        "report.csv",
        &base_dir,
        None,
        true,
    );

    assert!(fetched);
    let completed = handler.completed.lock().unwrap().clone();
    assert_eq!(completed.len(), 1);
    let target = &completed[0];
    assert!(target.exists());

    let processor = ShellFileProcessor::new(
        "touch {path}.done",
        "{path}.done",
        None,
    );

    let result = processor.process(target).expect("post-process should succeed");
    assert_eq!(result, PathBuf::from(format!("{}.done", target.display())));
    assert!(result.exists());
}

#[test]
fn post_process_fails_when_expected_output_never_appears() {
    let base_dir = common::init_base_dir("fetch_and_process/missing_output");
    let file_path = base_dir.join("input.dat");
    fs::write(&file_path, "data").unwrap();

    let processor = ShellFileProcessor::new("true", "{path}.never-created", None);
    assert!(processor.process(&file_path).is_err());
}
