//! Offer admission and visibility engine for the NIJobs marketplace.
//!
//! Companies publish time-bounded job offers; administrators moderate companies and
//! offers. This crate decides whether a company may keep another offer active during a
//! window and keeps offer visibility consistent with direct actions and company
//! moderation events.

pub mod config;
pub mod error;
pub mod offers;
pub mod telemetry;
