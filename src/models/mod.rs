// src/models/mod.rs

pub mod achievement;
pub mod progress;
pub mod user;
