//! Signal masking for the supervisor thread

use libc::c_int;
use std::io;
use std::mem;
use std::ptr;
use std::time::Duration;

/// Signals relayed to the managed child
///
/// Synchronous fault signals (SEGV, BUS, FPE, ILL, ...) are never forwarded
/// since they describe the supervisor itself, not a request to the child.
pub const FORWARDED_SIGNALS: &[c_int] = &[
    libc::SIGHUP,
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTERM,
    libc::SIGUSR1,
    libc::SIGUSR2,
    libc::SIGWINCH,
    libc::SIGALRM,
    libc::SIGCONT,
];

/// Human readable signal name for logs
pub fn signal_name(sig: c_int) -> &'static str {
    match sig {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGKILL => "SIGKILL",
        libc::SIGTERM => "SIGTERM",
        libc::SIGUSR1 => "SIGUSR1",
        libc::SIGUSR2 => "SIGUSR2",
        libc::SIGWINCH => "SIGWINCH",
        libc::SIGALRM => "SIGALRM",
        libc::SIGCONT => "SIGCONT",
        libc::SIGCHLD => "SIGCHLD",
        libc::SIGPIPE => "SIGPIPE",
        _ => "signal",
    }
}

/// A set of signals blocked on the calling thread
///
/// The previous mask is restored on drop. Blocked signals stay pending until
/// collected with [`SignalMask::wait`].
pub struct SignalMask {
    set: libc::sigset_t,
    previous: libc::sigset_t,
}

impl SignalMask {
    /// Block `signals` on the current thread
    pub fn block(signals: &[c_int]) -> io::Result<Self> {
        // SAFETY: sigset_t is plain data; sigemptyset initializes it.
        let mut set: libc::sigset_t = unsafe { mem::zeroed() };
        let mut previous: libc::sigset_t = unsafe { mem::zeroed() };

        unsafe {
            if libc::sigemptyset(&mut set) != 0 {
                return Err(io::Error::last_os_error());
            }
            for &sig in signals {
                if libc::sigaddset(&mut set, sig) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }
        }

        let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut previous) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }

        Ok(Self { set, previous })
    }

    /// Mask that was active before blocking
    pub fn previous(&self) -> libc::sigset_t {
        self.previous
    }

    /// Wait up to `timeout` for one of the blocked signals
    ///
    /// Returns `None` on timeout or interruption.
    pub fn wait(&self, timeout: Duration) -> io::Result<Option<c_int>> {
        let mut ts: libc::timespec = unsafe { mem::zeroed() };
        ts.tv_sec = timeout.as_secs() as _;
        ts.tv_nsec = timeout.subsec_nanos() as _;
        let mut info: libc::siginfo_t = unsafe { mem::zeroed() };

        let sig = unsafe { libc::sigtimedwait(&self.set, &mut info, &ts) };
        if sig >= 0 {
            return Ok(Some(sig));
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EAGAIN) | Some(libc::EINTR) => Ok(None),
            _ => Err(err),
        }
    }
}

impl Drop for SignalMask {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous, ptr::null_mut());
        }
    }
}
