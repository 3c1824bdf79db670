//! Tokobot: a Telegram bot that generates AI-first business ideas from text
//! commands and voice notes, and collects consultation requests into a CRM.

pub mod ai;
pub mod bot;
pub mod config;
pub mod crm;
pub mod dashboard;
pub mod deadline;
pub mod speech;
pub mod store;
pub mod telegram_log;
