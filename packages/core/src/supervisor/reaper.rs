//! Zombie reaping and wait status decoding

use libc::{c_int, pid_t};
use std::io;

/// A child collected by [`reap_zombies`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaped {
    pub pid: pid_t,
    pub status: c_int,
}

/// Collect every exited child without blocking
///
/// Returns once no more zombies are waiting (or no children remain).
pub fn reap_zombies() -> io::Result<Vec<Reaped>> {
    let mut reaped = Vec::new();
    loop {
        let mut status: c_int = 0;
        let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) };
        match pid {
            0 => break,
            -1 => {
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    Some(libc::ECHILD) => break,
                    Some(libc::EINTR) => continue,
                    _ => return Err(err),
                }
            }
            pid => reaped.push(Reaped { pid, status }),
        }
    }
    Ok(reaped)
}

/// Shell-style exit code for a wait status
///
/// A normal exit yields its status; death by signal yields `128 + signo`
/// (so SIGKILL is 137).
pub fn exit_code(status: c_int) -> i32 {
    if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else if libc::WIFSIGNALED(status) {
        128 + libc::WTERMSIG(status)
    } else {
        1
    }
}

/// Signal that terminated the process, if any
pub fn termination_signal(status: c_int) -> Option<i32> {
    if libc::WIFSIGNALED(status) {
        Some(libc::WTERMSIG(status))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Raw wait statuses as encoded by Linux
    const EXITED_0: c_int = 0;
    const EXITED_3: c_int = 3 << 8;
    const KILLED: c_int = libc::SIGKILL;
    const TERMINATED: c_int = libc::SIGTERM;

    #[test]
    fn exit_code_for_normal_exit() {
        assert_eq!(exit_code(EXITED_0), 0);
        assert_eq!(exit_code(EXITED_3), 3);
        assert_eq!(termination_signal(EXITED_3), None);
    }

    #[test]
    fn exit_code_for_signal_death() {
        assert_eq!(exit_code(KILLED), 137);
        assert_eq!(exit_code(TERMINATED), 143);
        assert_eq!(termination_signal(KILLED), Some(libc::SIGKILL));
    }
}
