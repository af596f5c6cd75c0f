pub mod classify;
pub mod config;
pub mod contacts;
pub mod history;
pub mod monitor;
pub mod validate;
