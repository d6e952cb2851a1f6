// src/models/mod.rs

pub mod batch;
pub mod course;
pub mod exam;
pub mod submission;
pub mod user;
