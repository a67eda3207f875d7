pub mod config;
pub mod next;
pub mod simulate;
