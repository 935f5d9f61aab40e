use anyhow::Result;
use clap::{App, Arg};

pub fn main() -> Result<()> {
    let options = App::new("fetch-service")
        .version("1.0")
        .about("Runs the fetchd scheduling daemon: triggers rules on their cron schedule and fetches ancillary files into a destination tree.")
        .arg(Arg::with_name("config_path")
            .help("The full path to the YAML config file describing the base directory and rules")
            .required(true)
            .takes_value(true))
        .get_matches();

    dotenv::dotenv().ok();

    let config_path = options.value_of("config_path").expect("no config specified");
    let exit_code = fetchd::supervisor::run(std::path::Path::new(config_path))?;
    std::process::exit(exit_code);
}
