//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (launcher.rs):
//!     control pair → fork (process.rs) → parent waits on control.rs
//!                                      → child runs the listener
//!
//! Stop (launcher.rs, shutdown.rs):
//!     Teardown message → child releases sockets → TeardownComplete → exit
//!     parent waits the grace period → reaps the child (bounded poll)
//!
//! Restart (launcher.rs):
//!     running listener? → Stop as above → Start
//! ```
//!
//! # Design Decisions
//! - Startup wait is bounded; the caller only ever sees a boolean
//! - Every outcome has its own control message
//! - The child owns the validation port for its whole life

pub mod control;
pub mod launcher;
pub mod process;
pub mod shutdown;

pub use control::{ControlChannel, ControlMessage, OutcomeFlags, StartupOutcome};
pub use launcher::{ForkLauncher, ListenerLauncher, StartReport};
pub use process::{Fork, ListenerJob, ProcessOps, SystemProcess};
pub use shutdown::TeardownHandles;
