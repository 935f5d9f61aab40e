use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use fetchd_core::config::{Config, Rule};
use fetchd_core::reporter::EmailNotifier;

use crate::paths::log_path_for;
use crate::schedule::Schedule;
use crate::signals::SignalFlags;

const IDLE_SLEEP: Duration = Duration::from_secs(500);

struct WorkerHandle {
    child: Child,
    name: String,
    rule_name: String,
    log_path: PathBuf,
}

///
/// The long-lived parent process: peeks the schedule, spawns a `fetch-worker` child when a
/// rule is due, reaps finished children, and reacts to SIGHUP (reload) / SIGINT|SIGTERM
/// (graceful shutdown).
///
pub fn run(config_path: &Path) -> Result<i32> {
    let config = Config::load(config_path).with_context(|| format!("loading {}", config_path.display()))?;
    let _ = crate::logging::builder_for(&config).try_init();
    ensure_base_dirs(&config)?;

    let mut schedule = build_schedule(&config)?;
    let mut live: Vec<WorkerHandle> = Vec::new();
    let signals = SignalFlags::install()?;
    let email = email_notifier(&config);

    log::info!("fetchd supervisor started with {} rule(s)", config.rules().len());

    loop {
        reap_finished(&mut live, email.as_ref());

        if signals.exiting() {
            break;
        }

        if signals.take_reload() {
            match Config::load(config_path) {
                Ok(reloaded) => {
                    log::info!("config reloaded, rebuilding schedule");
                    schedule = build_schedule(&reloaded)?;
                }
                Err(err) => {
                    // A bad reload must never replace the live config/schedule.
                    log::error!("SIGHUP reload rejected, keeping previous config: {}", err);
                }
            }
        }

        if schedule.is_empty() {
            std::thread::sleep(IDLE_SLEEP);
            continue;
        }

        let now = Local::now();
        let due = schedule.peek().map(|entry| entry.next_fire() <= now).unwrap_or(false);

        if due {
            let entry = schedule.pop().expect("just peeked");
            let rule = entry.rule;
            let scheduled_time = entry.next_fire();

            match spawn_worker(&config, config_path, &rule, scheduled_time) {
                Ok(handle) => live.push(handle),
                Err(err) => log::error!("failed to spawn worker for '{}': {}", rule.name(), err),
            }

            if let Err(err) = schedule.add(rule, now) {
                log::error!("failed to reschedule rule after trigger: {}", err);
            }
        } else {
            let wait = (schedule.peek().unwrap().next_fire() - now).to_std().unwrap_or(Duration::from_millis(100)) + Duration::from_millis(100);
            std::thread::sleep(wait.min(IDLE_SLEEP));
        }
    }

    log::info!("shutting down, waiting for {} outstanding worker(s)", live.len());
    for mut handle in live {
        let _ = handle.child.wait();
    }

    Ok(0)
}

///
/// Trigger exactly the named rules once, wait for all of them, and return. Used by
/// `fetch-now`. Fails fast, listing the rules that do exist, if any name is unknown.
///
pub fn run_now(config_path: &Path, rule_names: &[String]) -> Result<i32> {
    let config = Config::load(config_path).with_context(|| format!("loading {}", config_path.display()))?;
    let _ = crate::logging::builder_for(&config).try_init();
    ensure_base_dirs(&config)?;

    let unknown: Vec<&String> = rule_names.iter().filter(|name| config.rule(name).is_none()).collect();
    if !unknown.is_empty() {
        let available: Vec<&str> = config.rules().iter().map(Rule::name).collect();
        bail!("unknown rule(s) {:?}; available rules: {:?}", unknown, available);
    }

    let email = email_notifier(&config);
    let now = Local::now();
    let mut live = Vec::new();

    for name in rule_names {
        let rule = config.rule(name).expect("checked above").clone();
        match spawn_worker(&config, config_path, &rule, now) {
            Ok(handle) => live.push(handle),
            Err(err) => log::error!("failed to spawn worker for '{}': {}", name, err),
        }
    }

    let mut exit_code = 0;
    for mut handle in live {
        let status = handle.child.wait().context("waiting for worker")?;
        if !report_and_classify(&handle, &status, email.as_ref()) {
            exit_code = 1;
        }
    }

    Ok(exit_code)
}

fn build_schedule(config: &Config) -> Result<Schedule> {
    let mut schedule = Schedule::new();
    let now = Local::now();
    for rule in config.rules() {
        let next = schedule.add(rule.clone(), now)
            .with_context(|| format!("evaluating cron pattern for rule '{}'", rule.name()))?;
        log::debug!("rule '{}' next fires at {}", rule.name(), next);
    }
    Ok(schedule)
}

fn ensure_base_dirs(config: &Config) -> Result<()> {
    std::fs::create_dir_all(config.base_directory().join("lock")).context("creating lock/ directory")?;
    std::fs::create_dir_all(config.base_directory().join("log")).context("creating log/ directory")?;
    Ok(())
}

fn email_notifier(config: &Config) -> Option<EmailNotifier> {
    (!config.notify_emails().is_empty())
        .then(|| EmailNotifier::new(config.notify_emails().to_vec(), config.smtp_relay()))
}

fn worker_binary_path() -> Result<PathBuf> {
    let current = std::env::current_exe().context("resolving current executable")?;
    Ok(current.with_file_name("fetch-worker"))
}

fn spawn_worker(config: &Config, config_path: &Path, rule: &Rule, scheduled_time: chrono::DateTime<Local>) -> Result<WorkerHandle> {
    let worker_bin = worker_binary_path()?;
    let name = format!("fetch-{}-{}", scheduled_time.format("%H%M"), rule.sanitized_name());
    let log_path = log_path_for(config.base_directory(), scheduled_time, rule.sanitized_name());

    let child = Command::new(&worker_bin)
        .arg(config_path)
        .arg(rule.name())
        .arg(scheduled_time.to_rfc3339())
        .spawn()
        .with_context(|| format!("spawning {}", worker_bin.display()))?;

    log::info!("spawned worker pid {} for rule '{}'", child.id(), rule.name());

    Ok(WorkerHandle { child, name, rule_name: rule.name().to_string(), log_path })
}

fn reap_finished(live: &mut Vec<WorkerHandle>, email: Option<&EmailNotifier>) {
    let mut i = 0;
    while i < live.len() {
        match live[i].child.try_wait() {
            Ok(Some(status)) => {
                let handle = live.remove(i);
                report_and_classify(&handle, &status, email);
            }
            Ok(None) => i += 1,
            Err(err) => {
                log::warn!("failed to poll worker '{}': {}", live[i].rule_name, err);
                i += 1;
            }
        }
    }
}

/// Returns `true` if the worker's exit was a success (or a benign lock-out).
fn report_and_classify(handle: &WorkerHandle, status: &std::process::ExitStatus, email: Option<&EmailNotifier>) -> bool {
    if status.success() {
        log::debug!("worker '{}' (pid {}) exited 0", handle.name, handle.child.id());
        return true;
    }

    if let Some(signal) = status.signal() {
        // Signal-killed workers are assumed operator-initiated; don't email about them.
        log::warn!("worker '{}' (pid {}) was killed by signal {}", handle.name, handle.child.id(), signal);
        return false;
    }

    let exit_code = status.code().unwrap_or(-1);
    log::error!("worker '{}' (pid {}) exited with code {}", handle.name, handle.child.id(), exit_code);

    if let Some(email) = email {
        let log_contents = std::fs::read_to_string(&handle.log_path).unwrap_or_default();
        email.notify_process_failure(&handle.name, exit_code, &log_contents);
    }

    false
}

