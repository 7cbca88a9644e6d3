//! emberbot - a small IRC utility bot.
//!
//! Connects to configured servers, joins channels, and answers prefixed
//! commands through pluggable handlers. All outbound traffic funnels
//! through a rate-limited single-writer queue so the bot never trips
//! server flood protection.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod flood;
pub mod sendq;
pub mod session;
pub mod state;
pub mod throttle;
