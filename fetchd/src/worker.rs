use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use fetchd_core::config::Config;
use fetchd_core::error::{FetchError, LockError};
use fetchd_core::reporter::{EmailNotifier, FanoutReporter, MessageBus, NoopBus, WebhookBus};
use fs2::FileExt;

use crate::paths::{lock_path_for, log_path_for};
use crate::reporter_tag::TaggingReporter;

///
/// The body of `fetch-worker`: runs exactly one rule's `Source::trigger` to completion (or
/// a lock-contended no-op) in its own process, and returns the process exit code - 0 on
/// success or lock-out, 1 if the initial listing/feed failed, >1 for anything else.
///
/// Never panics on an expected failure path; every `Result::Err` here is converted into a
/// non-zero exit by the caller in `fetch-worker`'s `main()`.
///
pub fn run(config_path: &Path, rule_name: &str, scheduled_time: DateTime<Local>) -> Result<i32> {
    reset_default_signal_handlers();

    let config = Config::load(config_path).context("loading config in worker")?;
    let rule = config.rule(rule_name)
        .with_context(|| format!("rule '{}' vanished from config between spawn and worker start", rule_name))?;

    let process_name = format!("fetch-{}-{}", scheduled_time.format("%H%M"), rule.sanitized_name());
    setproctitle::set_title(&process_name);

    let lock_path = lock_path_for(config.base_directory(), rule.sanitized_name());
    let lock_file = match acquire_lock(&lock_path) {
        Ok(file) => file,
        Err(LockError::Contended { .. }) => {
            log::info!("{} is still locked by a previous run, exiting without side effects", rule.sanitized_name());
            return Ok(0);
        }
        Err(err) => bail!(err),
    };

    let log_path = log_path_for(config.base_directory(), scheduled_time, rule.sanitized_name());
    redirect_logging(&log_path, &config)?;

    log::info!("{} starting (scheduled for {})", process_name, scheduled_time.to_rfc3339());

    let bus: Box<dyn MessageBus> = match config.messaging() {
        Some(messaging) => Box::new(WebhookBus::new(&messaging.webhook_url)),
        None => Box::new(NoopBus),
    };

    let email = (!config.notify_emails().is_empty())
        .then(|| EmailNotifier::new(config.notify_emails().to_vec(), config.smtp_relay()));

    let processor = rule.build_processor().context("building post-processor")?;

    let fanout = FanoutReporter {
        rule_name: rule.name().to_string(),
        sanitized_name: rule.sanitized_name().to_string(),
        post_processor: processor.as_deref(),
        bus: bus.as_ref(),
        email: email.as_ref(),
    };

    let reporter = TaggingReporter {
        inner: &fanout,
        cron_pattern: rule.cron_pattern().to_string(),
        trigger_name: rule.name().to_string(),
        trigger_time: scheduled_time.with_timezone(&Utc),
    };

    let result = rule.source().trigger(&reporter);
    drop(lock_file); // released on drop, but made explicit: nothing below needs the lock.

    match result {
        Ok(()) => {
            log::info!("{} finished successfully", process_name);
            Ok(0)
        }
        Err(FetchError::Remote { uri, reason }) => {
            log::error!("{} initial remote fetch failed for {}: {}", process_name, uri, reason);
            eprintln!("remote fetch failed for {}: {}", uri, reason);
            Ok(1)
        }
        Err(other) => {
            log::error!("{} failed: {}", process_name, other);
            bail!(other);
        }
    }
}

fn acquire_lock(lock_path: &Path) -> Result<fs::File, LockError> {
    let to_io_err = |source: std::io::Error| LockError::Io { path: lock_path.to_string_lossy().into(), source };

    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(to_io_err)?;
    }

    let file = OpenOptions::new().create(true).write(true).open(lock_path).map_err(to_io_err)?;
    // 0222: world-writable, matching the on-disk layout contract. The lock itself is
    // advisory (flock), not permission-based - this just matches what the original leaves
    // behind for operators inspecting the lock directory.
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(lock_path, fs::Permissions::from_mode(0o222));
    }

    file.try_lock_exclusive()
        .map_err(|_| LockError::Contended { path: lock_path.to_string_lossy().into() })?;

    Ok(file)
}

fn redirect_logging(log_path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new().create(true).append(true).open(log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    redirect_stdio_to(file)?;

    crate::logging::builder_for(config)
        .target(env_logger::Target::Stderr)
        .init();

    Ok(())
}

#[cfg(unix)]
fn redirect_stdio_to(file: fs::File) -> Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    unsafe {
        if libc::dup2(fd, libc::STDOUT_FILENO) < 0 || libc::dup2(fd, libc::STDERR_FILENO) < 0 {
            bail!("dup2 onto stdout/stderr failed: {}", std::io::Error::last_os_error());
        }
    }
    // `file` (and its fd) can now be dropped; STDOUT_FILENO/STDERR_FILENO hold their own
    // reference to the underlying open file description.
    let _ = std::io::stdout().flush();
    Ok(())
}

#[cfg(unix)]
fn reset_default_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        libc::signal(libc::SIGTERM, libc::SIG_DFL);
        libc::signal(libc::SIGHUP, libc::SIG_DFL);
    }
}

