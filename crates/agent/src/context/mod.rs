//! Token-budgeted prompt construction.
//!
//! | Step | Module |
//! |------|--------|
//! | Estimate a string or message list | [`token`] |
//! | Shrink one fragment to a budget | [`truncate`] |
//! | Pack prioritized sections into one budget | [`optimizer`] |

pub mod optimizer;
pub mod token;
pub mod truncate;

pub use optimizer::{TextSection, optimize};
pub use token::{ModelProfile, estimate_message_tokens, estimate_messages_tokens, estimate_tokens};
pub use truncate::truncate_to_tokens;
