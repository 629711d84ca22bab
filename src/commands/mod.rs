// ABOUTME: Command module aggregator for the tranche CLI.
// ABOUTME: Re-exports rollout and rollback command handlers.

mod rollback;
mod rollout;

pub use rollback::{RollbackArgs, rollback};
pub use rollout::rollout;
