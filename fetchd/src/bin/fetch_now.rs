use anyhow::Result;
use clap::{App, Arg};

pub fn main() -> Result<()> {
    let options = App::new("fetch-now")
        .version("1.0")
        .about("Triggers one or more fetchd rules immediately and waits for them to finish, without starting the scheduler loop.")
        .arg(Arg::with_name("config_path")
            .help("The full path to the YAML config file describing the base directory and rules")
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("rule_name")
            .help("One or more rule names (from the config's 'rules' map) to trigger")
            .required(true)
            .multiple(true))
        .get_matches();

    dotenv::dotenv().ok();

    let config_path = options.value_of("config_path").expect("no config specified");
    let rule_names: Vec<String> = options.values_of("rule_name").expect("no rules specified")
        .map(String::from)
        .collect();

    let exit_code = fetchd::supervisor::run_now(std::path::Path::new(config_path), &rule_names)?;
    std::process::exit(exit_code);
}
