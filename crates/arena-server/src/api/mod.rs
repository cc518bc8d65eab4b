//! API handlers

pub mod admin;
pub mod quiz;
pub mod tournaments;
pub mod users;
pub mod wallet;
