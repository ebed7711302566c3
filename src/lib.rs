pub mod catalog;
pub mod channel;
pub mod cli;
pub mod config;
pub mod core;
pub mod diagnose;
pub mod engine;
pub mod exit;
pub mod logs;
pub mod parser;
pub mod recommend;
pub mod rules;
pub mod ui;
