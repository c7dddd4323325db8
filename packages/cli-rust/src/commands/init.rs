//! Init command implementation
//!
//! `drone-riot-conv init -- CMD ARGS...` runs CMD as the only child of a
//! minimal PID 1: signals are relayed, adopted zombies are reaped and the
//! child's exit status becomes ours.

use clap::Args;
use drone_riot_conv_core::supervisor::{self, SupervisorOptions};
use std::ffi::OsString;
use tracing::{debug, error};

/// Arguments for the init command
#[derive(Args)]
pub struct InitArgs {
    /// Register as child subreaper (needed when not running as PID 1)
    #[arg(short = 's', long)]
    pub subreaper: bool,

    /// Run the child in its own process group and signal the whole group
    #[arg(short = 'g', long)]
    pub process_group: bool,

    /// Command to supervise
    #[arg(
        value_name = "CMD",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<OsString>,
}

impl InitArgs {
    fn options(&self) -> SupervisorOptions {
        SupervisorOptions {
            subreaper: self.subreaper,
            process_group: self.process_group,
            ..SupervisorOptions::new(self.command.iter().cloned())
        }
    }
}

/// Supervise the command and return the exit code to propagate
pub fn cmd_init(args: &InitArgs) -> i32 {
    match supervisor::run(&args.options()) {
        Ok(exit) => {
            debug!(
                "child {} exited with {} ({} orphans reaped)",
                exit.pid, exit.code, exit.reaped_orphans
            );
            exit.code
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn args(command: &[&str]) -> InitArgs {
        InitArgs {
            subreaper: true,
            process_group: false,
            command: command.iter().map(OsString::from).collect(),
        }
    }

    #[test]
    fn options_carry_flags_and_command() {
        let options = args(&["sh", "-c", "exit 0"]).options();
        assert!(options.subreaper);
        assert!(!options.process_group);
        assert_eq!(options.command.len(), 3);
        assert_eq!(options.poll_interval, supervisor::DEFAULT_POLL_INTERVAL);
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn missing_command_exits_127() {
        assert_eq!(cmd_init(&args(&["/nonexistent/drone-riot-conv-test"])), 127);
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn child_exit_code_is_returned() {
        assert_eq!(cmd_init(&args(&["sh", "-c", "exit 7"])), 7);
    }
}
