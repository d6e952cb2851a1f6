// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Display name, also used in bundle file names.
    pub name: String,

    /// Unique email address.
    pub email: String,

    /// User role: 'student', 'teacher' or 'admin'.
    pub role: String,
}
