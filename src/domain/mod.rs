pub mod cooldown;
pub mod models;
pub mod schedule;
pub mod selector;
