//! Coinwatch Telegram Bot
//!
//! A Telegram bot that reports cryptocurrency prices and watches a price
//! until it crosses a user-chosen threshold, then notifies the user once
//! and stops.
//!
//! ## Architecture
//!
//! ```text
//! getUpdates → Bot (conversation controller) → SessionStore
//!                     │                            ↑
//!                     ▼                            │
//!                 Tracker ── per-chat polling task ┘
//!                     │
//!        PriceSource (CoinMarketCap) → Notifier (Telegram)
//! ```
//!
//! The tracking engine lives in [`tracker`] and [`session`]; everything
//! else is request/response glue around the Telegram Bot API.

pub mod bot;
pub mod config;
pub mod error;
pub mod feed;
pub mod notify;
pub mod session;
pub mod telegram;
pub mod tracker;
pub mod types;
