use chrono::{DateTime, Local};
use clap::{App, Arg};

///
/// The Worker entry point: never part of the operator-facing surface (no help text beyond
/// what clap emits for free) and only ever invoked by the Supervisor, which spawns this
/// sibling binary (resolved off its own `current_exe()`) rather than forking.
///
fn main() {
    let options = App::new("fetch-worker")
        .arg(Arg::with_name("config_path").required(true).takes_value(true))
        .arg(Arg::with_name("rule_name").required(true).takes_value(true))
        .arg(Arg::with_name("scheduled_time").required(true).takes_value(true))
        .get_matches();

    dotenv::dotenv().ok();

    let config_path = options.value_of("config_path").expect("no config specified");
    let rule_name = options.value_of("rule_name").expect("no rule specified");
    let scheduled_time: DateTime<Local> = options.value_of("scheduled_time").expect("no scheduled time")
        .parse::<DateTime<chrono::FixedOffset>>()
        .expect("scheduled_time must be RFC 3339")
        .with_timezone(&Local);

    match fetchd::worker::run(std::path::Path::new(config_path), rule_name, scheduled_time) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("fetch-worker failed: {:#}", err);
            std::process::exit(2);
        }
    }
}
