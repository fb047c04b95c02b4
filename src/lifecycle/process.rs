//! Process primitives behind the listener launcher.
//!
//! `ProcessOps` is the seam between the launcher's bookkeeping and the
//! operating system, so the fork branches can be exercised without forking.

use std::io;
use std::time::Duration;

use rand::rngs::StdRng;

use crate::challenge::{Registry, SigningKey};
use crate::config::ListenerConfig;
use crate::lifecycle::control::ControlChannel;

/// Which side of a fork the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fork {
    Parent { child: u32 },
    Child,
}

/// Everything the listener process needs, moved into it at fork.
#[derive(Debug)]
pub struct ListenerJob {
    pub port: u16,
    pub key: SigningKey,
    pub registry: Registry,
    pub listener: ListenerConfig,
    pub handshake_timeout: Duration,
    pub control: ControlChannel,
    pub rng: StdRng,
    pub parent_pid: u32,
}

pub trait ProcessOps {
    fn fork(&mut self) -> io::Result<Fork>;

    fn pid(&self) -> u32;

    /// Run the listener in the current (child) process.
    ///
    /// The system implementation never returns.
    fn run_listener(&mut self, job: ListenerJob);

    /// Collect the child's exit status without blocking.
    ///
    /// Returns true once there is nothing left to wait for: the child was
    /// reaped now, or it is not (or no longer) a child of this process.
    fn reap(&mut self, child: u32) -> bool;
}

/// Real fork/waitpid.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcess;

impl ProcessOps for SystemProcess {
    fn fork(&mut self) -> io::Result<Fork> {
        // SAFETY: other parent threads are not duplicated and may hold locks
        // at the moment of the fork. This relies on the child only allocating
        // and building a fresh single-threaded runtime before it exits.
        let pid = unsafe { libc::fork() };
        match pid {
            -1 => Err(io::Error::last_os_error()),
            0 => Ok(Fork::Child),
            child => Ok(Fork::Parent {
                child: child as u32,
            }),
        }
    }

    fn pid(&self) -> u32 {
        std::process::id()
    }

    fn run_listener(&mut self, job: ListenerJob) {
        crate::net::handler::run_child(job)
    }

    fn reap(&mut self, child: u32) -> bool {
        let mut status = 0;
        // SAFETY: WNOHANG never blocks; ECHILD for an unknown pid is harmless
        let reaped = unsafe { libc::waitpid(child as libc::pid_t, &mut status, libc::WNOHANG) };
        match reaped {
            0 => false,
            -1 => {
                let error = io::Error::last_os_error();
                if error.raw_os_error() == Some(libc::ECHILD) {
                    tracing::debug!(child_pid = child, "No such child; already reaped");
                    return true;
                }
                tracing::debug!(child_pid = child, error = %error, "waitpid failed");
                false
            }
            _ => {
                if libc::WIFEXITED(status) {
                    tracing::debug!(
                        child_pid = child,
                        exit_code = libc::WEXITSTATUS(status),
                        "Listener process reaped"
                    );
                } else {
                    tracing::debug!(child_pid = child, status, "Listener process reaped");
                }
                true
            }
        }
    }
}
