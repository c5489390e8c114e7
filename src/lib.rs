//! Aggregates public status pages (Atlassian Statuspage, incident.io, Instatus)
//! into one normalized view, records availability history, and announces
//! status transitions over SSE, webhooks and hook scripts.

pub mod catalog;
pub mod catchers;
pub mod checker;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod history;
pub mod hooks;
pub mod http;
pub mod models;
pub mod notifications;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod routes;
pub mod sse;
pub mod transitions;
