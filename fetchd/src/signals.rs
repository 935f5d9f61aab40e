use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

///
/// Shared flags the Supervisor's control loop polls once per iteration. A background
/// thread (spawned by `install`) is the only thing that ever sets them - the signal
/// handler itself does nothing but relay which signal arrived, keeping all the actual
/// reload/shutdown logic on the control loop's own thread.
///
#[derive(Clone, Default)]
pub struct SignalFlags {
    pub reload: Arc<AtomicBool>,
    pub exiting: Arc<AtomicBool>,
}

impl SignalFlags {
    pub fn install() -> Result<Self> {
        let flags = SignalFlags::default();
        let mut signals = Signals::new([SIGHUP, SIGINT, SIGTERM])
            .context("registering SIGHUP/SIGINT/SIGTERM handlers")?;

        let reload = flags.reload.clone();
        let exiting = flags.exiting.clone();

        std::thread::spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGHUP => reload.store(true, Ordering::SeqCst),
                    SIGINT | SIGTERM => exiting.store(true, Ordering::SeqCst),
                    _ => unreachable!(),
                }
            }
        });

        Ok(flags)
    }

    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    pub fn exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }
}
