//! Kassa Exchange Engine
//!
//! The engine contains the core logic of a conversational crypto order-intake service: a chat user
//! is walked through a captcha, an asset choice, amount entry (quoted at a live rate plus
//! commission), a payment-instrument choice and wallet validation, and finally submits an order
//! which a single fixed operator approves or rejects.
//!
//! The library is divided into three main sections:
//! 1. Database types and backend traits ([`mod@db_types`], [`mod@traits`]). SQLite is the provided
//!    backend ([`SqliteDatabase`]); any store that implements the traits in [`mod@traits`] can be
//!    swapped in. You should never need to access the database directly — use the public APIs.
//! 2. Pure algorithms: the pricing engine ([`mod@pricing`]) and the captcha challenge
//!    ([`mod@captcha`]). These perform no I/O at all.
//! 3. The conversational surface: the funnel state machine ([`mod@funnel`]), the operator approval
//!    workflow ([`mod@approval`]) and the admin API ([`mod@admin`]). These emit *effects* (prompts
//!    to deliver, operator briefs) rather than talking to any chat transport themselves.
pub mod admin;
pub mod approval;
pub mod authz;
pub mod captcha;
pub mod db_types;
pub mod funnel;
pub mod pricing;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "test_utils")]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use admin::AdminApi;
pub use approval::ApprovalApi;
pub use authz::AuthPolicy;
pub use funnel::ConversationStateMachine;
