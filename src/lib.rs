/// Quillpad - blog backend
///
/// Accounts, posts, comments, likes and follows over SQLite, with
/// cookie-carried JWT sessions.

pub mod account;
pub mod api;
pub mod auth;
pub mod avatar;
pub mod cascade;
pub mod config;
pub mod content;
pub mod context;
pub mod credentials;
pub mod db;
pub mod error;
pub mod mailer;
pub mod server;
pub mod session;
pub mod social;
