mod common;

use chrono::Local;
use fetchd_core::config::Config;
use fetchd::schedule::Schedule;

#[test]
fn builds_a_schedule_from_every_loaded_rule() {
    let base_dir = common::init_base_dir("scheduling/build");
    let path = common::write_config(&base_dir, r#"
rules:
  hourly:
    schedule: "0 0 * * * *"
    source:
      kind: empty
  minutely:
    schedule: "0 * * * * *"
    source:
      kind: empty
"#);

    let config = Config::load(&path).expect("config should load");
    let mut schedule = Schedule::new();
    let now = Local::now();

    for rule in config.rules() {
        schedule.add(rule.clone(), now).expect("cron pattern should evaluate");
    }

    assert!(!schedule.is_empty());
    let first = schedule.pop().expect("schedule has at least one entry");
    assert_eq!(first.rule.name(), "minutely");
}
