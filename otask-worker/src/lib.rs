//! # OTask Worker Library
//!
//! This library provides the email delivery worker for OTask: it drains the
//! `email_outbox` table and hands each row to an SMTP mailer.
//!
//! ## Modules
//!
//! - `config`: Configuration management
//! - `mailer`: SMTP delivery backend (lettre)
//! - `orchestrator`: Poll loop and job dispatch
//! - `queue`: Outbox reader (claim, mark sent/failed)

pub mod config;
pub mod mailer;
pub mod orchestrator;
pub mod queue;
