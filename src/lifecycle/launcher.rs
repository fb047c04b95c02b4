//! Starting and stopping the listener process.
//!
//! # Responsibilities
//! - Fork the listener and hand it the registry, key and its channel end
//! - Reseed the RNG on both sides of the fork
//! - Block, bounded, until the listener reports its startup outcome
//! - Request teardown and reap the child afterwards
//!
//! # Design Decisions
//! - At most one listener runs at a time. Starting again first stops the
//!   previous listener and reaps it, so the new one can bind the port
//! - Reaping polls for a bounded time; a child that outlives it is kept and
//!   retried on the next start or teardown

use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::challenge::{Registry, SigningKey};
use crate::config::{ListenerConfig, ResponderConfig, TimeoutConfig};
use crate::lifecycle::control::{
    ControlChannel, ControlError, ControlMessage, OutcomeFlags, StartupOutcome,
};
use crate::lifecycle::process::{Fork, ListenerJob, ProcessOps, SystemProcess};
use crate::observability::metrics;

/// How long `finish_teardown` waits for a confirmation that has not arrived yet.
const TEARDOWN_CONFIRM_WAIT: Duration = Duration::from_millis(50);

/// Upper bound on waiting for a listener process to exit.
const REAP_WAIT: Duration = Duration::from_secs(1);

const REAP_POLL: Duration = Duration::from_millis(10);

/// Starts the validation listener on behalf of the authenticator.
pub trait ListenerLauncher {
    /// Start a listener for `port` serving `registry`. True once it reported ready.
    ///
    /// A listener still running from an earlier call is stopped first.
    fn start_listener(&mut self, port: u16, key: &SigningKey, registry: &Registry) -> bool;

    /// Ask the running listener to shut down.
    fn request_teardown(&mut self);

    /// Collect the teardown confirmation and reap the listener, if any.
    fn finish_teardown(&mut self);
}

/// What the parent observed for the most recent listener start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartReport {
    pub port: u16,
    pub child_pid: u32,
    pub outcome: StartupOutcome,
}

/// Runs the listener in a forked child process.
pub struct ForkLauncher<P: ProcessOps = SystemProcess> {
    ops: P,
    listener: ListenerConfig,
    timeouts: TimeoutConfig,
    child_pid: Option<u32>,
    control: Option<ControlChannel>,
    flags: OutcomeFlags,
    rng: StdRng,
    last_start: Option<StartReport>,
    unreaped: Vec<u32>,
}

impl ForkLauncher<SystemProcess> {
    pub fn new(config: &ResponderConfig) -> Self {
        Self::with_ops(SystemProcess, config)
    }
}

impl<P: ProcessOps> ForkLauncher<P> {
    pub fn with_ops(ops: P, config: &ResponderConfig) -> Self {
        Self {
            ops,
            listener: config.listener.clone(),
            timeouts: config.timeouts.clone(),
            child_pid: None,
            control: None,
            flags: OutcomeFlags::default(),
            rng: StdRng::from_entropy(),
            last_start: None,
            unreaped: Vec::new(),
        }
    }

    /// Replace the RNG, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Pid of the running listener; the process's own pid on the child side.
    pub fn child_pid(&self) -> Option<u32> {
        self.child_pid
    }

    pub fn flags(&self) -> OutcomeFlags {
        self.flags
    }

    /// Generator handed to the next listener; reseeded at every fork.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn last_start(&self) -> Option<StartReport> {
        self.last_start
    }

    /// Listener processes that exited too slowly to be reaped yet.
    pub fn unreaped(&self) -> &[u32] {
        &self.unreaped
    }

    /// Both processes inherit the same generator state at fork.
    fn reseed(&mut self) {
        self.rng = StdRng::from_entropy();
    }

    fn await_child_outcome(&mut self, port: u16) -> bool {
        self.flags.clear();
        let (Some(control), Some(child_pid)) = (self.control.as_mut(), self.child_pid) else {
            return false;
        };

        let outcome = control.await_startup(&mut self.flags, self.timeouts.startup());
        metrics::record_listener_start(outcome.as_str());
        self.last_start = Some(StartReport {
            port,
            child_pid,
            outcome,
        });

        match outcome {
            StartupOutcome::Ready => {
                tracing::info!(port, child_pid, "Validation listener ready");
            }
            StartupOutcome::InUse => {
                tracing::warn!(port, "Validation port already in use");
            }
            StartupOutcome::CannotBind => {
                tracing::warn!(port, "Not permitted to bind validation port");
            }
            StartupOutcome::TimedOut => {
                tracing::warn!(
                    port,
                    timeout_secs = self.timeouts.startup_secs,
                    "Listener did not report startup in time"
                );
            }
            StartupOutcome::Exited => {
                tracing::warn!(port, child_pid, "Listener exited without reporting");
            }
        }

        if !outcome.is_ready() {
            // A listener that is still alive sees the channel close and exits.
            self.control = None;
            self.collect_child();
        }

        outcome.is_ready()
    }

    /// Stop a listener left running by an earlier start.
    fn retire_listener(&mut self) {
        let Some(pid) = self.child_pid else {
            return;
        };

        tracing::info!(child_pid = pid, "Stopping previous listener before restart");
        self.request_teardown();
        self.await_teardown(self.timeouts.teardown_grace());
        self.collect_child();
    }

    /// Wait up to `wait` for the listener to confirm teardown or hang up.
    fn await_teardown(&mut self, wait: Duration) {
        let Some(mut control) = self.control.take() else {
            return;
        };

        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(child_pid = ?self.child_pid, "Teardown not yet confirmed");
                return;
            }

            match control.recv_timeout(remaining) {
                Ok(Some(ControlMessage::TeardownComplete)) => {
                    tracing::debug!(child_pid = ?self.child_pid, "Listener confirmed teardown");
                    return;
                }
                Ok(Some(other)) => {
                    tracing::debug!(message = ?other, "Unexpected message during teardown");
                }
                Ok(None) => {
                    tracing::debug!(child_pid = ?self.child_pid, "Teardown not yet confirmed");
                    return;
                }
                Err(ControlError::Closed) => {
                    tracing::debug!(child_pid = ?self.child_pid, "Listener hung up during teardown");
                    return;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Control channel failed during teardown");
                    return;
                }
            }
        }
    }

    /// Reap the current listener, polling for a bounded time.
    fn collect_child(&mut self) {
        self.reap_stragglers();

        let Some(pid) = self.child_pid.take() else {
            return;
        };

        let deadline = Instant::now() + REAP_WAIT;
        while !self.ops.reap(pid) {
            if Instant::now() >= deadline {
                tracing::warn!(child_pid = pid, "Listener process has not exited; will retry");
                self.unreaped.push(pid);
                return;
            }
            thread::sleep(REAP_POLL);
        }
    }

    fn reap_stragglers(&mut self) {
        let ops = &mut self.ops;
        self.unreaped.retain(|&pid| !ops.reap(pid));
    }
}

impl<P: ProcessOps> ListenerLauncher for ForkLauncher<P> {
    fn start_listener(&mut self, port: u16, key: &SigningKey, registry: &Registry) -> bool {
        self.retire_listener();
        self.flags.clear();

        let (parent_end, child_end) = match ControlChannel::pair() {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create control channel");
                return false;
            }
        };
        let parent_pid = self.ops.pid();

        match self.ops.fork() {
            Err(e) => {
                tracing::error!(error = %e, "Failed to fork listener process");
                false
            }
            Ok(Fork::Parent { child }) => {
                self.child_pid = Some(child);
                self.reseed();
                drop(child_end);
                self.control = Some(parent_end);

                tracing::debug!(port, child_pid = child, "Forked listener process");
                self.await_child_outcome(port)
            }
            Ok(Fork::Child) => {
                self.child_pid = Some(self.ops.pid());
                self.reseed();
                drop(parent_end);

                let job = ListenerJob {
                    port,
                    key: key.clone(),
                    registry: registry.clone(),
                    listener: self.listener.clone(),
                    handshake_timeout: self.timeouts.handshake(),
                    control: child_end,
                    rng: self.rng.clone(),
                    parent_pid,
                };
                self.ops.run_listener(job);
                false
            }
        }
    }

    fn request_teardown(&mut self) {
        let Some(pid) = self.child_pid else {
            tracing::warn!("No listener process to tear down");
            return;
        };

        match self.control.as_mut() {
            Some(control) => match control.send(ControlMessage::Teardown) {
                Ok(()) => tracing::info!(child_pid = pid, "Requested listener teardown"),
                Err(e) => {
                    tracing::warn!(child_pid = pid, error = %e, "Listener already gone")
                }
            },
            None => tracing::warn!(child_pid = pid, "No control channel to listener"),
        }
    }

    fn finish_teardown(&mut self) {
        self.await_teardown(TEARDOWN_CONFIRM_WAIT);
        self.collect_child();
    }
}
