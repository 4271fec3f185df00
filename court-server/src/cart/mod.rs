//! Session carts and checkout
//!
//! A cart belongs to one opaque session key. Lines are keyed by menu
//! item, so re-adding increments instead of duplicating. Checkout is
//! atomic: the order insert and the cart teardown commit together or
//! not at all.

use serde::Serialize;
use shared::error::{ErrorCode, OrderError};
use shared::order::OrderView;
use shared::util::now_millis;
use sqlx::SqlitePool;

use crate::db::{carts as db, catalog};
use crate::error::ServiceResult;
use crate::orders::{money, NewOrderInput, NewOrderItemInput, OrderService};

/// Serialized cart snapshot
#[derive(Debug, Serialize)]
pub struct CartView {
    pub session_key: String,
    pub table_number: Option<i64>,
    pub items: Vec<CartLineView>,
    pub total_amount: f64,
    pub item_count: i64,
}

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub id: i64,
    pub menu_item_id: i64,
    pub name: String,
    pub vendor_id: i64,
    pub vendor_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub subtotal: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub special_instructions: String,
    /// False when the item or its vendor went unavailable after adding
    pub available: bool,
}

/// Customer details collected at checkout
#[derive(Debug, Clone, Default)]
pub struct CheckoutInput {
    pub customer_name: String,
    pub customer_phone: String,
    pub notes: String,
    pub table_number: Option<i64>,
}

#[derive(Clone)]
pub struct CartService {
    pool: SqlitePool,
    orders: OrderService,
}

impl CartService {
    pub fn new(pool: SqlitePool, orders: OrderService) -> Self {
        Self { pool, orders }
    }

    /// Add a menu item (or increment its existing line)
    pub async fn add_item(
        &self,
        session_key: &str,
        table_number: Option<i64>,
        menu_item_id: i64,
        quantity: i64,
        special_instructions: &str,
    ) -> ServiceResult<CartView> {
        money::validate_quantity(quantity)?;

        let menu_item = catalog::find_menu_item(&self.pool, menu_item_id)
            .await?
            .ok_or_else(|| OrderError::item_unavailable(menu_item_id))?;
        if !menu_item.is_available {
            return Err(OrderError::item_unavailable(menu_item_id).into());
        }
        let vendor = catalog::find_vendor(&self.pool, menu_item.vendor_id)
            .await?
            .ok_or_else(|| OrderError::item_unavailable(menu_item_id))?;
        if !vendor.is_open {
            return Err(OrderError::item_unavailable(menu_item_id).into());
        }

        let now = now_millis();
        let cart = db::get_or_create(&self.pool, session_key, table_number, now).await?;
        // Snapshot the price at add time; later catalog edits must not
        // reprice what the guest already agreed to.
        db::upsert_item(
            &self.pool,
            cart.id,
            menu_item_id,
            quantity,
            menu_item.price,
            special_instructions,
        )
        .await?;
        db::touch(&self.pool, cart.id, now).await?;

        self.view(session_key).await
    }

    /// Set a line's quantity; dropping a line goes through `remove_item`
    pub async fn update_item(
        &self,
        session_key: &str,
        item_id: i64,
        quantity: i64,
    ) -> ServiceResult<CartView> {
        money::validate_quantity(quantity)?;
        let cart = self.require_cart(session_key).await?;

        if !db::set_item_quantity(&self.pool, cart.id, item_id, quantity).await? {
            return Err(line_not_found(item_id).into());
        }

        db::touch(&self.pool, cart.id, now_millis()).await?;
        self.view(session_key).await
    }

    pub async fn remove_item(&self, session_key: &str, item_id: i64) -> ServiceResult<CartView> {
        let cart = self.require_cart(session_key).await?;
        if !db::remove_item(&self.pool, cart.id, item_id).await? {
            return Err(line_not_found(item_id).into());
        }
        db::touch(&self.pool, cart.id, now_millis()).await?;
        self.view(session_key).await
    }

    /// Snapshot of the session's cart; an unknown session is an empty cart
    pub async fn view(&self, session_key: &str) -> ServiceResult<CartView> {
        let Some(cart) = db::find_by_session(&self.pool, session_key).await? else {
            return Ok(CartView {
                session_key: session_key.to_string(),
                table_number: None,
                items: Vec::new(),
                total_amount: 0.0,
                item_count: 0,
            });
        };

        let lines = db::lines(&self.pool, cart.id).await?;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let subtotal = money::line_subtotal(line.unit_price, line.quantity)?;
            items.push(CartLineView {
                id: line.id,
                menu_item_id: line.menu_item_id,
                name: line.name,
                vendor_id: line.vendor_id,
                vendor_name: line.vendor_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal,
                special_instructions: line.special_instructions,
                available: line.is_available && line.vendor_open,
            });
        }

        let total_amount = money::order_total(items.iter().map(|i| i.subtotal))?;
        let item_count = items.iter().map(|i| i.quantity).sum();

        Ok(CartView {
            session_key: session_key.to_string(),
            table_number: cart.table_number,
            items,
            total_amount,
            item_count,
        })
    }

    /// Turn the cart into an order and tear the cart down, atomically
    pub async fn checkout(
        &self,
        session_key: &str,
        input: CheckoutInput,
    ) -> ServiceResult<OrderView> {
        let Some(cart) = db::find_by_session(&self.pool, session_key).await? else {
            return Err(OrderError::new(ErrorCode::EmptyCart).into());
        };
        let lines = db::lines(&self.pool, cart.id).await?;
        if lines.is_empty() {
            return Err(OrderError::new(ErrorCode::EmptyCart).into());
        }

        let table_number = input
            .table_number
            .or(cart.table_number)
            .ok_or_else(|| OrderError::validation("table_number is required for checkout"))?;

        let order_input = NewOrderInput {
            table_number,
            customer_name: input.customer_name,
            customer_phone: input.customer_phone,
            notes: input.notes,
            items: lines
                .iter()
                .map(|l| NewOrderItemInput {
                    menu_item_id: l.menu_item_id,
                    quantity: l.quantity,
                    unit_price: Some(l.unit_price),
                    special_instructions: l.special_instructions.clone(),
                })
                .collect(),
        };

        // Availability checks and line pricing happen before the transaction
        let now = now_millis();
        let prepared = self.orders.prepare(&order_input).await?;

        let mut tx = self.pool.begin().await?;
        self.orders.insert_prepared(&mut tx, &prepared, now).await?;
        db::clear(&mut tx, cart.id).await?;
        tx.commit().await?;

        self.orders.announce_created(&prepared.id).await
    }

    async fn require_cart(&self, session_key: &str) -> ServiceResult<db::CartRow> {
        db::find_by_session(&self.pool, session_key)
            .await?
            .ok_or_else(|| {
                OrderError::with_message(ErrorCode::CartItemNotFound, "cart is empty").into()
            })
    }
}

fn line_not_found(item_id: i64) -> OrderError {
    OrderError::with_message(
        ErrorCode::CartItemNotFound,
        format!("cart item {item_id} not found"),
    )
}
