pub mod app;
pub mod check;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod notify;
pub mod output;
pub mod reload;
pub mod runtime;
pub mod serve;
