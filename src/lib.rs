pub mod api;
pub mod app;
pub mod config;
pub mod credentials;
pub mod handler;
pub mod logging;
pub mod poller;
pub mod status;
pub mod transcript;
pub mod tui;
pub mod ui;
