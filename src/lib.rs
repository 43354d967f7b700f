pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod fs_util;
pub mod output;
pub mod partition;
pub mod resolver;
pub mod store;
pub mod transform;
