//! # agentdash
//!
//! Headless client core for an agent management dashboard. The crate owns the
//! dashboard's state (metadata-driven forms, connector/action/prompt/filter
//! list editors, the agent form orchestrator, realtime chat and status sync,
//! and the toast queue) and talks to the agent backend over REST and
//! Server-Sent Events.
//!
//! Front ends draw the typed control descriptions produced by [`forms`] and
//! [`editor`]; the `agentdash` binary is one such front end.

pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod editor;
pub mod forms;
pub mod infra;
pub mod logging;
pub mod realtime;
pub mod toast;
