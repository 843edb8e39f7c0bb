//! Sending pending entries to the destination.
//!
//! A batch is sent strictly in order, one entry at a time:
//!
//! 1. The entry is rendered and truncated to the destination's limit.
//! 2. The send is retried per [`RetryPolicy`]: flood control waits the
//!    requested time plus padding, timeouts back off exponentially,
//!    anything else gives up at once.
//! 3. Only an acknowledged send marks the version delivered.
//! 4. The first entry that cannot be sent ends the batch; later entries
//!    wait for the next pass so they never overtake it.
//! 5. Consecutive sends are paced by a fixed delay that cancellation cuts
//!    short.

mod dispatcher;
mod format;
mod retry;

pub use dispatcher::{DeliveryFailure, DispatchConfig, DispatchReport, Dispatcher};
pub use format::{escape_markdown, truncate_message, MessageFormatter, ELLIPSIS, TELEGRAM_MAX_LEN};
pub use retry::{RetryDecision, RetryPolicy};
