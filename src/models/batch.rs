// src/models/batch.rs

use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'batches' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Batch {
    pub id: i64,
    pub name: String,
    pub course_id: Option<i64>,
}

/// A student as listed on a batch roster.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct RosterEntry {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// A batch together with its students in enrollment order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRoster {
    pub id: i64,
    pub name: String,
    pub students: Vec<RosterEntry>,
}
