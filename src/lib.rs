pub mod actions;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod provenance;
pub mod schema;
pub mod types;
