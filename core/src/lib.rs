pub mod action;
pub mod compare;
pub mod config;
pub mod judge;
pub mod runner;
pub mod storage;
pub mod str_interp;
pub mod style;

pub use crate::config::Config;
