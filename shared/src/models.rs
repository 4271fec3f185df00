//! Catalog records: tables, vendors, menu items
//!
//! These are read-mostly reference data seeded by migrations; the
//! ordering flow never mutates them except for the vendor/menu
//! availability flags.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DiningTable {
    pub id: i64,
    pub number: i64,
    pub capacity: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Vendor {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub stall_number: String,
    pub is_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct MenuItem {
    pub id: i64,
    pub vendor_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub price: f64,
    /// Preparation time in minutes
    pub preparation_time: i64,
    pub is_available: bool,
}
