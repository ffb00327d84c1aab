//! Terminal front end for the tandem language-learning client.

pub mod config;
pub mod ui;
