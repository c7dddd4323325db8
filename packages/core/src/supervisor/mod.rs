//! PID 1 process supervision
//!
//! A container's first process inherits init duties: signals sent to the
//! container arrive at PID 1 with no default handlers, and orphaned
//! processes are re-parented to it. This module runs a single managed
//! child, relays termination signals to it, reaps every zombie it adopts and
//! reports the child's exit status so it can become the container's.
//!
//! Signals are blocked on the supervising thread and collected with
//! `sigtimedwait`, so the caller must not start other threads that expect
//! to receive them. Linux only.

#[cfg(target_os = "linux")]
mod reaper;
#[cfg(target_os = "linux")]
mod signals;

#[cfg(target_os = "linux")]
pub use reaper::{Reaped, exit_code, reap_zombies, termination_signal};
#[cfg(target_os = "linux")]
pub use signals::{FORWARDED_SIGNALS, SignalMask, signal_name};

use std::ffi::OsString;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Default interval between reaping sweeps
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Exit code when the command cannot be found
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Exit code when the command exists but cannot be executed
pub const EXIT_COMMAND_NOT_EXECUTABLE: i32 = 126;

/// Supervisor errors
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("no command given to supervise")]
    EmptyCommand,

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("signal setup failed: {0}")]
    Signal(#[source] io::Error),

    #[error("failed to register as child subreaper: {0}")]
    Subreaper(#[source] io::Error),

    #[error("waiting for children failed: {0}")]
    Wait(#[source] io::Error),

    #[error("process supervision is only supported on Linux")]
    Unsupported,
}

impl SupervisorError {
    /// Process exit code to report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                EXIT_COMMAND_NOT_FOUND
            }
            SupervisorError::Spawn { .. } => EXIT_COMMAND_NOT_EXECUTABLE,
            _ => 1,
        }
    }
}

/// What to supervise and how
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Program and arguments
    pub command: Vec<OsString>,
    /// Adopt orphans even when not running as PID 1
    pub subreaper: bool,
    /// Start the child in its own process group and signal the whole group
    pub process_group: bool,
    /// Upper bound on the delay between a child exiting and being reaped
    pub poll_interval: Duration,
}

impl SupervisorOptions {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            subreaper: false,
            process_group: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// How the managed child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    pub pid: i32,
    /// Exit code to propagate (`128 + signo` for signal deaths)
    pub code: i32,
    /// Terminating signal, if the child died by signal
    pub signal: Option<i32>,
    /// Adopted processes reaped while supervising
    pub reaped_orphans: usize,
}

#[cfg(target_os = "linux")]
pub use linux::Supervisor;

/// Spawn the command and supervise it until it exits
#[cfg(target_os = "linux")]
pub fn run(options: &SupervisorOptions) -> Result<ChildExit, SupervisorError> {
    Supervisor::spawn(options)?.wait()
}

/// Spawn the command and supervise it until it exits
#[cfg(not(target_os = "linux"))]
pub fn run(_options: &SupervisorOptions) -> Result<ChildExit, SupervisorError> {
    Err(SupervisorError::Unsupported)
}

#[cfg(target_os = "linux")]
mod linux {
    use super::reaper::{exit_code, reap_zombies, termination_signal};
    use super::signals::{FORWARDED_SIGNALS, SignalMask, signal_name};
    use super::{ChildExit, SupervisorError, SupervisorOptions};
    use libc::{c_int, pid_t};
    use std::io;
    use std::os::unix::process::CommandExt;
    use std::process::Command;
    use std::ptr;
    use std::time::Duration;
    use tracing::{debug, info, warn};

    /// A running managed child
    ///
    /// Created with [`Supervisor::spawn`]; dropping it restores the thread's
    /// signal mask but leaves the child running.
    pub struct Supervisor {
        mask: SignalMask,
        child_pid: pid_t,
        process_group: bool,
        poll_interval: Duration,
        reaped_orphans: usize,
    }

    impl Supervisor {
        /// Block forwarded signals on this thread and start the child
        pub fn spawn(options: &SupervisorOptions) -> Result<Self, SupervisorError> {
            let (program, args) = options
                .command
                .split_first()
                .ok_or(SupervisorError::EmptyCommand)?;

            let mut blocked = FORWARDED_SIGNALS.to_vec();
            blocked.push(libc::SIGCHLD);
            let mask = SignalMask::block(&blocked).map_err(SupervisorError::Signal)?;

            if options.subreaper {
                become_subreaper().map_err(SupervisorError::Subreaper)?;
            }

            let mut command = Command::new(program);
            command.args(args);
            if options.process_group {
                command.process_group(0);
            }

            // The child must start with the mask we had before blocking
            let previous = mask.previous();
            unsafe {
                command.pre_exec(move || {
                    let rc = libc::pthread_sigmask(libc::SIG_SETMASK, &previous, ptr::null_mut());
                    if rc != 0 {
                        return Err(io::Error::from_raw_os_error(rc));
                    }
                    Ok(())
                });
            }

            let child = command.spawn().map_err(|source| SupervisorError::Spawn {
                program: program.to_string_lossy().into_owned(),
                source,
            })?;
            let child_pid = child.id() as pid_t;
            info!("spawned {} (pid {})", program.to_string_lossy(), child_pid);

            Ok(Self {
                mask,
                child_pid,
                process_group: options.process_group,
                poll_interval: options.poll_interval,
                reaped_orphans: 0,
            })
        }

        /// Relay `sig` to the child (or its process group)
        ///
        /// A child that is already gone is not an error.
        pub fn forward_signal(&self, sig: c_int) -> Result<(), SupervisorError> {
            let target = if self.process_group {
                -self.child_pid
            } else {
                self.child_pid
            };

            let rc = unsafe { libc::kill(target, sig) };
            if rc == 0 {
                debug!("forwarded {} to {}", signal_name(sig), target);
                return Ok(());
            }

            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ESRCH) {
                debug!(
                    "{} not delivered, process {} already exited",
                    signal_name(sig),
                    target
                );
                return Ok(());
            }
            Err(SupervisorError::Signal(err))
        }

        /// Relay signals and reap children until the managed child exits
        pub fn wait(mut self) -> Result<ChildExit, SupervisorError> {
            loop {
                match self
                    .mask
                    .wait(self.poll_interval)
                    .map_err(SupervisorError::Wait)?
                {
                    None | Some(libc::SIGCHLD) => {}
                    Some(sig) => self.forward_signal(sig)?,
                }

                if let Some(exit) = self.reap()? {
                    return Ok(exit);
                }
            }
        }

        fn reap(&mut self) -> Result<Option<ChildExit>, SupervisorError> {
            let mut child_status = None;
            for reaped in reap_zombies().map_err(SupervisorError::Wait)? {
                if reaped.pid == self.child_pid {
                    child_status = Some(reaped.status);
                } else {
                    self.reaped_orphans += 1;
                    debug!(
                        "reaped orphan {} (exit code {})",
                        reaped.pid,
                        exit_code(reaped.status)
                    );
                }
            }

            let Some(status) = child_status else {
                return Ok(None);
            };

            let exit = ChildExit {
                pid: self.child_pid,
                code: exit_code(status),
                signal: termination_signal(status),
                reaped_orphans: self.reaped_orphans,
            };
            match exit.signal {
                Some(sig) => warn!(
                    "child {} killed by {} (exit code {})",
                    exit.pid,
                    signal_name(sig),
                    exit.code
                ),
                None => info!("child {} exited with code {}", exit.pid, exit.code),
            }
            Ok(Some(exit))
        }
    }

    fn become_subreaper() -> io::Result<()> {
        let rc = unsafe { libc::prctl(libc::PR_SET_CHILD_SUBREAPER, 1 as libc::c_ulong) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
