// src/handlers/mod.rs

pub mod health;
pub mod leaderboard;
pub mod progress;
pub mod users;
