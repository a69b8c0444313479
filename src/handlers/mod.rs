// src/handlers/mod.rs

pub mod quiz;
pub mod report;
pub mod session;
