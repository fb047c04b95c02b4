//! Parent ↔ listener control protocol.
//!
//! # Responsibilities
//! - Carry one-byte control messages over a Unix socket pair
//! - Let the parent wait, bounded, for the listener's startup outcome
//! - Let the listener wait for a teardown request inside its event loop
//!
//! # Design Decisions
//! - One distinct message per outcome; nothing is inferred from protocol phase
//! - Outcome flags are plain fields set by the receive loop, never from a
//!   signal handler
//! - A closed channel means the peer process is gone

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Messages exchanged between the parent and the listener process.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Listener is bound and accepting.
    Ready = 0x01,
    /// Validation port is already in use.
    InUse = 0x02,
    /// Not permitted to bind the validation port.
    CannotBind = 0x03,
    /// Listener released its sockets and is exiting.
    TeardownComplete = 0x04,
    /// Parent asks the listener to shut down.
    Teardown = 0x10,
}

impl TryFrom<u8> for ControlMessage {
    type Error = ControlError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(ControlMessage::Ready),
            0x02 => Ok(ControlMessage::InUse),
            0x03 => Ok(ControlMessage::CannotBind),
            0x04 => Ok(ControlMessage::TeardownComplete),
            0x10 => Ok(ControlMessage::Teardown),
            other => Err(ControlError::UnknownMessage(other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control channel closed by peer")]
    Closed,

    #[error("unknown control message 0x{0:02x}")]
    UnknownMessage(u8),

    #[error("control channel I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Startup outcome flags, reset before each listener start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeFlags {
    pub ready: bool,
    pub in_use: bool,
    pub cannot_bind: bool,
}

impl OutcomeFlags {
    /// Set the flag for a startup message. Returns false for anything else.
    pub fn record(&mut self, message: ControlMessage) -> bool {
        match message {
            ControlMessage::Ready => self.ready = true,
            ControlMessage::InUse => self.in_use = true,
            ControlMessage::CannotBind => self.cannot_bind = true,
            ControlMessage::TeardownComplete | ControlMessage::Teardown => return false,
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        self.ready || self.in_use || self.cannot_bind
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// How the wait for the listener ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    Ready,
    InUse,
    CannotBind,
    /// No outcome arrived within the startup window.
    TimedOut,
    /// Listener went away without reporting.
    Exited,
}

impl StartupOutcome {
    pub fn is_ready(self) -> bool {
        self == StartupOutcome::Ready
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StartupOutcome::Ready => "ready",
            StartupOutcome::InUse => "in_use",
            StartupOutcome::CannotBind => "cannot_bind",
            StartupOutcome::TimedOut => "timeout",
            StartupOutcome::Exited => "exited",
        }
    }
}

/// Blocking end of the control channel, used by the parent.
#[derive(Debug)]
pub struct ControlChannel {
    stream: StdUnixStream,
}

impl ControlChannel {
    /// Create a connected pair: (parent end, listener end).
    pub fn pair() -> io::Result<(ControlChannel, ControlChannel)> {
        let (parent, child) = StdUnixStream::pair()?;
        Ok((ControlChannel { stream: parent }, ControlChannel { stream: child }))
    }

    pub fn send(&mut self, message: ControlMessage) -> Result<(), ControlError> {
        self.stream.write_all(&[message as u8])?;
        Ok(())
    }

    /// Wait up to `timeout` for one message. `Ok(None)` means the wait expired.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<ControlMessage>, ControlError> {
        // A zero read timeout means "block forever" to the OS.
        let timeout = timeout.max(Duration::from_millis(1));
        self.stream.set_read_timeout(Some(timeout))?;

        let mut byte = [0u8; 1];
        loop {
            return match self.stream.read(&mut byte) {
                Ok(0) => Err(ControlError::Closed),
                Ok(_) => ControlMessage::try_from(byte[0]).map(Some),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    Ok(None)
                }
                Err(e) => Err(ControlError::Io(e)),
            };
        }
    }

    /// Wait for the listener's startup outcome, bounded by `timeout`.
    pub fn await_startup(&mut self, flags: &mut OutcomeFlags, timeout: Duration) -> StartupOutcome {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return StartupOutcome::TimedOut;
            }

            match self.recv_timeout(remaining) {
                Ok(Some(message)) => {
                    if !flags.record(message) {
                        tracing::debug!(?message, "Ignoring non-startup control message");
                        continue;
                    }
                }
                Ok(None) => return StartupOutcome::TimedOut,
                Err(ControlError::Closed) => return StartupOutcome::Exited,
                Err(e) => {
                    tracing::warn!(error = %e, "Control channel failed during startup");
                    return StartupOutcome::Exited;
                }
            }

            if flags.ready {
                return StartupOutcome::Ready;
            }
            if flags.in_use {
                return StartupOutcome::InUse;
            }
            if flags.cannot_bind {
                return StartupOutcome::CannotBind;
            }
        }
    }

    /// Switch to the async end used inside the listener's runtime.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn into_async(self) -> io::Result<AsyncControlChannel> {
        self.stream.set_nonblocking(true)?;
        Ok(AsyncControlChannel {
            stream: UnixStream::from_std(self.stream)?,
        })
    }
}

/// Async end of the control channel, used by the listener process.
#[derive(Debug)]
pub struct AsyncControlChannel {
    stream: UnixStream,
}

impl AsyncControlChannel {
    pub async fn send(&mut self, message: ControlMessage) -> Result<(), ControlError> {
        self.stream.write_all(&[message as u8]).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ControlMessage, ControlError> {
        match self.stream.read_u8().await {
            Ok(byte) => ControlMessage::try_from(byte),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ControlError::Closed),
            Err(e) => Err(ControlError::Io(e)),
        }
    }

    /// Resolve once teardown is requested or the parent disappears.
    ///
    /// Returns true for an explicit request, false if the channel closed.
    /// Single-byte reads make this safe to poll from `select!` repeatedly.
    pub async fn teardown_requested(&mut self) -> bool {
        loop {
            match self.recv().await {
                Ok(ControlMessage::Teardown) => return true,
                Ok(other) => {
                    tracing::debug!(message = ?other, "Ignoring unexpected control message");
                }
                Err(ControlError::UnknownMessage(byte)) => {
                    tracing::warn!(byte, "Ignoring unknown control message");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Control channel lost; treating as teardown");
                    return false;
                }
            }
        }
    }
}
