pub mod api;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
