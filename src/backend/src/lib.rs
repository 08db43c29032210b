pub mod api;
pub mod config;
pub mod firebase;
pub mod realtime;
pub mod shell;
