//! Splitfact - collective invoicing settlement engine
//!
//! Freelancer collectives issue invoices jointly; a single incoming payment
//! settles the invoice and is fanned out into per-member payouts. This
//! library provides the settlement ingestor, the payout distribution engine,
//! sub-invoice generation, and the underlying ledger store.

pub mod billing;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod payments;
pub mod payouts;
pub mod settlement;
pub mod shares;
