use std::path::{Path, PathBuf};

///
/// Set up a fresh `{base}/{lock,log}` tree under the crate's target tmpdir and return the
/// base directory. Mirrors what `Config::load` expects to already exist on disk.
///
pub fn init_base_dir(folder: &str) -> PathBuf {
    dotenv::dotenv().ok();
    let _ = env_logger::builder().is_test(true).try_init();

    let base_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join(folder);
    let _ = fs_extra::dir::remove(&base_dir);
    std::fs::create_dir_all(&base_dir).expect("cannot create base dir");
    base_dir
}

pub fn write_config(base_dir: &Path, rules_yaml: &str) -> PathBuf {
    let path = base_dir.join("config.yaml");
    let contents = format!("directory: {}\n{}", base_dir.display(), rules_yaml);
    std::fs::write(&path, contents).expect("cannot write config");
    path
}
