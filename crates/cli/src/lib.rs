#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod print;
pub mod signals;
