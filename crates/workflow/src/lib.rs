//! The poll loop: the scheduling half of Optic.
//!
//! One cycle fetches mentions newer than the stored checkpoint, hands each to
//! the [`MentionProcessor`](optic_agent::MentionProcessor), advances the
//! checkpoint once the whole batch was attempted, and picks the next sleep:
//!
//! - nominal interval after a completed or empty cycle
//! - until the reset time after a rate-limit signal
//! - fixed backoff after a transient fetch failure
//!
//! Fatal fetch failures stop the loop.

pub mod clock;
pub mod poll_loop;

pub use clock::{Clock, FixedClock, SystemClock};
pub use poll_loop::{CycleOutcome, CycleReport, LoopState, PollLoop};
