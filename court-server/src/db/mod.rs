//! Database access layer

pub mod carts;
pub mod catalog;
pub mod orders;
