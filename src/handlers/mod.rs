// src/handlers/mod.rs

pub mod bundle;
pub mod student;
