#![forbid(unsafe_code)]

pub mod app;
pub mod browser;
pub mod cli;
pub mod details;
pub mod driver;
pub mod error;
pub mod extraction;
pub mod formats;
pub mod links;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod record_log;
pub mod scroll;
pub mod settings;
pub mod structural;
pub mod wait;
