//! Mention processing: the per-mention half of Optic.
//!
//! For every mention in a batch the processor:
//!
//! 1. **Resolves** the author's username and the first attached photo
//! 2. **Downloads** the image
//! 3. **Extracts** the question by stripping the bot's own handle
//! 4. **Asks** the inference provider, drawing a credential from the pool
//! 5. **Replies** with `@user Answer: ...`
//!
//! Every failure becomes a [`ProcessingError`](optic_core::error::ProcessingError)
//! so one bad mention never stops the batch.

pub mod processor;
pub mod reply;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use processor::{MentionProcessor, Posted};
pub use reply::{compose_reply, extract_query};
