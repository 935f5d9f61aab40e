use env_logger::Builder;
use fetchd_core::config::Config;

///
/// Builds (but does not `init()`) a logger configured from the config's `log` map
/// (logger-name -> level string), defaulting every module not named there to `Info`.
/// Mirrors the original's `_set_logging_levels` being applied once at startup from the
/// same document the rules come from.
///
pub fn builder_for(config: &Config) -> Builder {
    let mut builder = Builder::from_default_env();
    builder.filter_level(log::LevelFilter::Info);

    for (module, level) in config.log_levels() {
        match level.parse::<log::LevelFilter>() {
            Ok(level) => {
                builder.filter_module(module, level);
            }
            Err(_) => {
                eprintln!("ignoring invalid log level '{}' configured for '{}'", level, module);
            }
        }
    }

    builder
}
