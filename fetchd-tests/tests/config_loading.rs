mod common;

use fetchd_core::config::Config;

#[test]
fn loads_multiple_rules_in_name_order_regardless_of_yaml_order() {
    let base_dir = common::init_base_dir("config_loading/name_order");
    let path = common::write_config(&base_dir, r#"
rules:
  "Zebra Crossing":
    schedule: "0 0 * * * *"
    source:
      kind: empty
  "Apple Tree":
    schedule: "0 0 * * * *"
    source:
      kind: empty
"#);

    let config = Config::load(&path).expect("config should load");
    let names: Vec<&str> = config.rules().iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["Apple Tree", "Zebra Crossing"]);
    assert_eq!(config.rules()[0].sanitized_name(), "apple-tree");
    assert_eq!(config.rules()[1].sanitized_name(), "zebra-crossing");
}

#[test]
fn rejects_unknown_top_level_fields() {
    let base_dir = common::init_base_dir("config_loading/unknown_fields");
    let path = common::write_config(&base_dir, "banana: true\n");

    assert!(Config::load(&path).is_err());
}

#[test]
fn rejects_rule_with_unknown_field() {
    let base_dir = common::init_base_dir("config_loading/unknown_rule_fields");
    let path = common::write_config(&base_dir, r#"
rules:
  broken:
    schedule: "0 0 * * * *"
    source:
      kind: empty
    not_a_real_field: 1
"#);

    assert!(Config::load(&path).is_err());
}

#[test]
fn loads_shell_process_with_input_files_gate() {
    let base_dir = common::init_base_dir("config_loading/process");
    let path = common::write_config(&base_dir, r#"
rules:
  "with process":
    schedule: "0 0 * * * *"
    source:
      kind: empty
    process:
      command: "echo {filename}"
      expect_file: "{path}"
      input_files:
        pattern: "(?P<stem>.+)\\.dat"
        templates:
          - "{parent_dir}/{stem}.idx"
"#);

    let config = Config::load(&path).expect("config should load");
    let rule = config.rule("with process").expect("rule present");
    assert!(rule.build_processor().expect("processor builds").is_some());
}
