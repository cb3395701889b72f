//! The conversation funnel.
//!
//! A buyer moves through a fixed sequence of stages, from the captcha gate to payment
//! confirmation. The draft order is a stage-tagged structure: each stage variant carries exactly
//! the fields collected so far, so a half-built order can never be submitted. Stage state is held
//! in memory per chat and is deliberately lost on restart; everything durable lives in the
//! database.
//!
//! The state machine never talks to the chat transport. Each call returns a list of
//! [`FunnelEffect`]s (prompts to deliver and, on submission, an operator brief) for the caller to
//! act on.
mod effects;
mod errors;
mod stage;
mod state_machine;

pub use effects::{FunnelEffect, OperatorBrief, Prompt};
pub use errors::FunnelError;
pub use stage::ConversationStage;
pub use state_machine::{Contact, ConversationStateMachine, Selection, UserInput};
