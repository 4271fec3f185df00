//! Shared test fixtures: in-memory database plus a small catalog
#![allow(dead_code)]

use court_server::error::ServiceError;
use court_server::orders::{NewOrderInput, NewOrderItemInput};
use court_server::AppState;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub const PAD_THAI: i64 = 1;
pub const GREEN_CURRY: i64 = 2;
pub const CHEESEBURGER: i64 = 3;
pub const MILKSHAKE: i64 = 4;
pub const SOLD_OUT: i64 = 5;
pub const CLOSED_VENDOR_ITEM: i64 = 6;

pub const THAI_VENDOR: i64 = 1;
pub const BURGER_VENDOR: i64 = 2;

/// Fresh in-memory state. A single pooled connection, since every
/// `sqlite::memory:` connection is its own empty database.
pub async fn test_state() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    seed(&pool).await;
    AppState::with_pool(pool, "test-secret", 15)
}

async fn seed(pool: &SqlitePool) {
    for number in 1..=5 {
        sqlx::query("INSERT INTO dining_tables (number, capacity) VALUES (?, 4)")
            .bind(number)
            .execute(pool)
            .await
            .unwrap();
    }
    // Closed-off table
    sqlx::query("INSERT INTO dining_tables (number, capacity, is_active) VALUES (9, 2, 0)")
        .execute(pool)
        .await
        .unwrap();

    sqlx::query(
        "INSERT INTO vendors (id, name, stall_number, is_open) VALUES
            (1, 'Thai Corner', 'A1', 1),
            (2, 'Burger Barn', 'B2', 1),
            (3, 'Shuttered Stall', 'C3', 0)",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO menu_items (id, vendor_id, name, price, preparation_time, is_available) VALUES
            (1, 1, 'Pad Thai', 12.90, 12, 1),
            (2, 1, 'Green Curry', 9.50, 18, 1),
            (3, 2, 'Cheeseburger', 8.00, 10, 1),
            (4, 2, 'Milkshake', 4.25, 5, 1),
            (5, 1, 'Sold Out Special', 6.00, 10, 0),
            (6, 3, 'Dumplings', 7.00, 15, 1)",
    )
    .execute(pool)
    .await
    .unwrap();
}

/// Business error code of a failed service call
pub fn app_code(err: ServiceError) -> shared::error::ErrorCode {
    match err {
        ServiceError::App(e) => e.code,
        ServiceError::Db(e) => panic!("expected business error, got db error: {e}"),
    }
}

/// Order input for `quantity` Pad Thai at the given table
pub fn pad_thai_order(table_number: i64, quantity: i64) -> NewOrderInput {
    NewOrderInput {
        table_number,
        customer_name: "Mei".to_string(),
        customer_phone: String::new(),
        notes: String::new(),
        items: vec![NewOrderItemInput {
            menu_item_id: PAD_THAI,
            quantity,
            unit_price: None,
            special_instructions: "no peanuts".to_string(),
        }],
    }
}

/// Two-vendor order: one Pad Thai, one Cheeseburger
pub fn mixed_order(table_number: i64) -> NewOrderInput {
    NewOrderInput {
        table_number,
        customer_name: String::new(),
        customer_phone: String::new(),
        notes: String::new(),
        items: vec![
            NewOrderItemInput {
                menu_item_id: PAD_THAI,
                quantity: 1,
                unit_price: None,
                special_instructions: String::new(),
            },
            NewOrderItemInput {
                menu_item_id: CHEESEBURGER,
                quantity: 2,
                unit_price: None,
                special_instructions: String::new(),
            },
        ],
    }
}
