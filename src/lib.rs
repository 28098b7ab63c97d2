//! LED Display Quiz API Library
//!
//! Backend for the LED display lead-qualification quiz: sector-aware
//! questions, scoring and lead classification, lead-capture forms, AI
//! insights, the gated buyer's guide, and CRM sync.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Quiz domain logic.
//! - `integrations`: External service clients (HubSpot, Gemini).
//! - `config`: Configuration management.
//! - `crm`: CRM event queue, dispatcher and HubSpot client.
//! - `entry`: Landing URL sector detection.
//! - `errors`: Error handling types.
//! - `forms`: Lead-capture form validation.
//! - `funnel`: Session workflow behind the handlers.
//! - `guide`: Buyer's guide navigation, profile gate and summary.
//! - `handlers`: HTTP request handlers.
//! - `insights`: AI insight generation.
//! - `models`: Core data models.
//! - `questions`: The question bank.
//! - `quiz`: Quiz state machine.
//! - `scoring`: Scoring and lead classification.
//! - `session`: Per-visitor session store.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and the binary
pub mod config;
pub mod crm;
pub mod entry;
pub mod errors;
pub mod forms;
pub mod funnel;
pub mod guide;
pub mod handlers;
pub mod insights;
pub mod models;
pub mod questions;
pub mod quiz;
pub mod scoring;
pub mod session;
