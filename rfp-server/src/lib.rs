//! RFP pipeline backend.
//!
//! Five stage agents (sales, technical, pricing, generation, communication)
//! run in sequence over a shared workflow state, persisting to SQLite and
//! calling an OpenAI-compatible model host. Runs can also be delegated to an
//! external n8n-compatible workflow host.

pub mod api;
pub mod app_state;
pub mod catalog;
pub mod config;
pub mod db;
pub mod delegate;
pub mod model_gateway;
pub mod orchestrator;
pub mod stages;
pub mod structured;
