//! Chat core for a hosted Bedrock agent: the invocation client, the
//! conversation controller that drives it, and text rendering helpers.

pub mod agent;
pub mod conversation;
pub mod render;
