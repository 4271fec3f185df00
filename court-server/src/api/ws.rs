//! Realtime gateway — one WebSocket endpoint per audience
//!
//! - `GET /ws/table/{table_number}` — customers, no auth
//! - `GET /ws/vendor/{vendor_id}?token=<JWT>` — vendor prep screen
//! - `GET /ws/cashier?token=<JWT>` — payment counter
//! - `GET /ws/kitchen` — shared kitchen/expo display
//!
//! Auth for staff sockets rides the `?token=` query parameter because
//! browsers cannot set headers on the WS handshake. Every session gets
//! an initial `order_list` snapshot, then live frames from its topic;
//! a lagged subscriber is resubscribed and re-snapshotted instead of
//! replaying missed frames.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::error::{ErrorCode, OrderError};
use shared::message::{ClientMessage, ServerMessage};
use shared::order::{OrderStatus, OrderView};
use tokio::sync::broadcast;
use tokio::time::Duration;

use crate::auth::{self, StaffIdentity};
use crate::db::catalog;
use crate::error::{ServiceError, ServiceResult};
use crate::live::Topic;
use crate::orders::OrderService;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

/// Which audience a socket belongs to, with its verified identity
#[derive(Clone)]
enum WsScope {
    Table(i64),
    Vendor { identity: StaffIdentity, vendor_id: i64 },
    Cashier { identity: StaffIdentity },
    Kitchen,
}

impl WsScope {
    fn topic(&self) -> Topic {
        match self {
            WsScope::Table(n) => Topic::Table(*n),
            WsScope::Vendor { vendor_id, .. } => Topic::Vendor(*vendor_id),
            WsScope::Cashier { .. } => Topic::Cashier,
            WsScope::Kitchen => Topic::Kitchen,
        }
    }

    fn describe(&self) -> String {
        match self {
            WsScope::Table(n) => format!("table:{n}"),
            WsScope::Vendor { vendor_id, .. } => format!("vendor:{vendor_id}"),
            WsScope::Cashier { .. } => "cashier".to_string(),
            WsScope::Kitchen => "kitchen".to_string(),
        }
    }
}

pub async fn table_ws(
    State(state): State<AppState>,
    Path(table_number): Path<i64>,
    ws: WebSocketUpgrade,
) -> ServiceResult<impl IntoResponse> {
    let table = catalog::find_table_by_number(&state.pool, table_number)
        .await?
        .ok_or_else(|| OrderError::table_unavailable(table_number))?;
    if !table.is_active {
        return Err(OrderError::table_unavailable(table_number).into());
    }
    Ok(ws.on_upgrade(move |socket| ws_session(socket, state, WsScope::Table(table_number))))
}

pub async fn vendor_ws(
    State(state): State<AppState>,
    Path(vendor_id): Path<i64>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> ServiceResult<impl IntoResponse> {
    let identity = auth::verify_token(&query.token, &state.jwt_secret)?;
    if !identity.can_act_for_vendor(vendor_id) {
        return Err(OrderError::permission_denied("not bound to this vendor").into());
    }
    Ok(ws.on_upgrade(move |socket| {
        ws_session(socket, state, WsScope::Vendor { identity, vendor_id })
    }))
}

pub async fn cashier_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> ServiceResult<impl IntoResponse> {
    let identity = auth::verify_token(&query.token, &state.jwt_secret)?;
    if !identity.can_operate_cashier() {
        return Err(OrderError::permission_denied("cashier role required").into());
    }
    Ok(ws.on_upgrade(move |socket| ws_session(socket, state, WsScope::Cashier { identity })))
}

pub async fn kitchen_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_session(socket, state, WsScope::Kitchen))
}

async fn ws_session(socket: WebSocket, state: AppState, scope: WsScope) {
    let (mut sink, mut stream) = socket.split();
    let orders = state.order_service();
    let label = scope.describe();

    tracing::info!(scope = %label, "WS connected");

    let mut rx = state.hub.subscribe(scope.topic());

    // Initial snapshot
    match snapshot(&orders, &scope).await {
        Ok(list) => {
            if send_message(&mut sink, &ServerMessage::OrderList { orders: list })
                .await
                .is_err()
            {
                return;
            }
        }
        Err(e) => {
            let err: OrderError = e.into();
            let _ = send_message(
                &mut sink,
                &ServerMessage::Error {
                    code: err.code.into(),
                    message: err.message,
                },
            )
            .await;
            return;
        }
    }

    let mut ping_interval = tokio::time::interval(Duration::from_secs(30));
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let msg = ServerMessage::from_event(&event);
                        if send_message(&mut sink, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(scope = %label, lagged = n, "WS subscriber lagged, resending snapshot");
                        // Fresh receiver first so no event published during
                        // the snapshot read is lost
                        rx = state.hub.subscribe(scope.topic());
                        let Ok(list) = snapshot(&orders, &scope).await else { break };
                        if send_message(&mut sink, &ServerMessage::OrderList { orders: list })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(cmd) => handle_client_message(&orders, &scope, cmd).await,
                            Err(_) => Some(ServerMessage::Error {
                                code: ErrorCode::InvalidRequest.into(),
                                message: "unparseable frame".to_string(),
                            }),
                        };
                        if let Some(reply) = reply {
                            if send_message(&mut sink, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::info!(scope = %label, "WS disconnected");
}

/// The active-order list a freshly connected (or lagged) socket gets
async fn snapshot(orders: &OrderService, scope: &WsScope) -> ServiceResult<Vec<OrderView>> {
    match scope {
        WsScope::Table(n) => orders.active_for_table(*n).await,
        WsScope::Vendor { vendor_id, .. } => orders.active_for_vendor(*vendor_id).await,
        WsScope::Cashier { .. } => orders.payable().await,
        WsScope::Kitchen => orders.all_open().await,
    }
}

async fn handle_client_message(
    orders: &OrderService,
    scope: &WsScope,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    let result = dispatch(orders, scope, msg).await;
    match result {
        Ok(reply) => reply,
        Err(e) => {
            let err: OrderError = e.into();
            Some(ServerMessage::Error {
                code: err.code.into(),
                message: err.message,
            })
        }
    }
}

async fn dispatch(
    orders: &OrderService,
    scope: &WsScope,
    msg: ClientMessage,
) -> ServiceResult<Option<ServerMessage>> {
    match msg {
        ClientMessage::Ping => Ok(Some(ServerMessage::Pong)),

        ClientMessage::GetOrders => {
            let list = snapshot(orders, scope).await?;
            Ok(Some(ServerMessage::OrderList { orders: list }))
        }

        ClientMessage::UpdateOrderStatus { order_id, status } => {
            let identity = staff_identity(scope)?;
            if status == OrderStatus::Paid {
                return Err(OrderError::permission_denied(
                    "use mark_paid to settle payment",
                )
                .into());
            }
            // Cancellation voids money owed; vendor screens never get it
            if status == OrderStatus::Cancelled && !identity.can_operate_cashier() {
                return Err(OrderError::permission_denied(
                    "cancellation requires the cashier",
                )
                .into());
            }
            if let WsScope::Vendor { vendor_id, .. } = scope {
                require_vendor_in_order(orders, &order_id, *vendor_id).await?;
            }
            // Success comes back through the topic broadcast
            orders
                .transition(&order_id, status, &identity.audit_tag())
                .await?;
            Ok(None)
        }

        ClientMessage::UpdateItemStatus { item_id, .. } => {
            let identity = staff_identity(scope)?;
            let acting_vendor = match scope {
                WsScope::Vendor { vendor_id, .. } => Some(*vendor_id),
                _ if identity.can_operate_cashier() => None,
                _ => return Err(OrderError::permission_denied("staff role required").into()),
            };
            let order_id = orders.order_for_item(item_id).await?;
            orders.update_item(&order_id, item_id, acting_vendor).await?;
            Ok(None)
        }

        ClientMessage::MarkPaid {
            order_id,
            payment_method,
            payment_amount,
        } => {
            let identity = staff_identity(scope)?;
            if !identity.can_operate_cashier() {
                return Err(OrderError::permission_denied("cashier role required").into());
            }
            orders
                .mark_paid(
                    &order_id,
                    &payment_method,
                    payment_amount,
                    &identity.audit_tag(),
                )
                .await?;
            Ok(None)
        }
    }
}

fn staff_identity(scope: &WsScope) -> Result<&StaffIdentity, ServiceError> {
    match scope {
        WsScope::Vendor { identity, .. } | WsScope::Cashier { identity } => Ok(identity),
        WsScope::Table(_) | WsScope::Kitchen => {
            Err(OrderError::not_authenticated().into())
        }
    }
}

/// A vendor socket may only drive orders that carry its items
async fn require_vendor_in_order(
    orders: &OrderService,
    order_id: &str,
    vendor_id: i64,
) -> ServiceResult<()> {
    let view = orders.get(order_id).await?;
    if !view.vendor_ids().contains(&vendor_id) {
        return Err(OrderError::permission_denied("order has no items from this vendor").into());
    }
    Ok(())
}

async fn send_message<S>(sink: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::orders::{NewOrderInput, NewOrderItemInput};
    use sqlx::sqlite::SqlitePoolOptions;

    const PAD_THAI: i64 = 1;
    const CHEESEBURGER: i64 = 2;
    const THAI_VENDOR: i64 = 1;
    const BURGER_VENDOR: i64 = 2;

    async fn test_state() -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO dining_tables (number, capacity) VALUES (1, 4), (2, 4)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO vendors (id, name, stall_number) VALUES
                (1, 'Thai Corner', 'A1'),
                (2, 'Burger Barn', 'B2')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO menu_items (id, vendor_id, name, price, preparation_time) VALUES
                (1, 1, 'Pad Thai', 12.90, 12),
                (2, 2, 'Cheeseburger', 8.00, 10)",
        )
        .execute(&pool)
        .await
        .unwrap();
        AppState::with_pool(pool, "test-secret", 15)
    }

    fn vendor_scope(vendor_id: i64) -> WsScope {
        WsScope::Vendor {
            identity: StaffIdentity {
                subject: "prep".into(),
                role: Role::Vendor,
                vendor_id: Some(vendor_id),
            },
            vendor_id,
        }
    }

    fn cashier_scope() -> WsScope {
        WsScope::Cashier {
            identity: StaffIdentity {
                subject: "bob".into(),
                role: Role::Cashier,
                vendor_id: None,
            },
        }
    }

    async fn seed_order(orders: &OrderService, table: i64, menu_item_id: i64) -> OrderView {
        orders
            .create(NewOrderInput {
                table_number: table,
                customer_name: String::new(),
                customer_phone: String::new(),
                notes: String::new(),
                items: vec![NewOrderItemInput {
                    menu_item_id,
                    quantity: 1,
                    unit_price: None,
                    special_instructions: String::new(),
                }],
            })
            .await
            .unwrap()
    }

    fn code(err: ServiceError) -> ErrorCode {
        match err {
            ServiceError::App(e) => e.code,
            ServiceError::Db(e) => panic!("expected business error, got db error: {e}"),
        }
    }

    #[tokio::test]
    async fn vendor_socket_cannot_cancel() {
        let state = test_state().await;
        let orders = state.order_service();
        let order = seed_order(&orders, 1, PAD_THAI).await;

        let err = dispatch(
            &orders,
            &vendor_scope(THAI_VENDOR),
            ClientMessage::UpdateOrderStatus {
                order_id: order.id.clone(),
                status: OrderStatus::Cancelled,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(code(err), ErrorCode::PermissionDenied);
        assert_eq!(
            orders.get(&order.id).await.unwrap().status,
            OrderStatus::Pending
        );

        // The cashier counter can void the order
        let reply = dispatch(
            &orders,
            &cashier_scope(),
            ClientMessage::UpdateOrderStatus {
                order_id: order.id.clone(),
                status: OrderStatus::Cancelled,
            },
        )
        .await
        .unwrap();
        assert_eq!(reply, None);
        assert_eq!(
            orders.get(&order.id).await.unwrap().status,
            OrderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn settlement_never_rides_update_order_status() {
        let state = test_state().await;
        let orders = state.order_service();
        let order = seed_order(&orders, 1, PAD_THAI).await;

        for scope in [vendor_scope(THAI_VENDOR), cashier_scope()] {
            let err = dispatch(
                &orders,
                &scope,
                ClientMessage::UpdateOrderStatus {
                    order_id: order.id.clone(),
                    status: OrderStatus::Paid,
                },
            )
            .await
            .unwrap_err();
            assert_eq!(code(err), ErrorCode::PermissionDenied);
        }
    }

    #[tokio::test]
    async fn vendor_only_drives_orders_with_its_items() {
        let state = test_state().await;
        let orders = state.order_service();
        let order = seed_order(&orders, 1, PAD_THAI).await;

        let err = dispatch(
            &orders,
            &vendor_scope(BURGER_VENDOR),
            ClientMessage::UpdateOrderStatus {
                order_id: order.id.clone(),
                status: OrderStatus::Confirmed,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(code(err), ErrorCode::PermissionDenied);

        let reply = dispatch(
            &orders,
            &vendor_scope(THAI_VENDOR),
            ClientMessage::UpdateOrderStatus {
                order_id: order.id.clone(),
                status: OrderStatus::Confirmed,
            },
        )
        .await
        .unwrap();
        assert_eq!(reply, None);
        assert_eq!(
            orders.get(&order.id).await.unwrap().status,
            OrderStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn unauthenticated_scopes_cannot_mutate() {
        let state = test_state().await;
        let orders = state.order_service();
        let order = seed_order(&orders, 1, PAD_THAI).await;

        for scope in [WsScope::Table(1), WsScope::Kitchen] {
            let err = dispatch(
                &orders,
                &scope,
                ClientMessage::UpdateOrderStatus {
                    order_id: order.id.clone(),
                    status: OrderStatus::Confirmed,
                },
            )
            .await
            .unwrap_err();
            assert_eq!(code(err), ErrorCode::NotAuthenticated);

            let err = dispatch(
                &orders,
                &scope,
                ClientMessage::MarkPaid {
                    order_id: order.id.clone(),
                    payment_method: "cash".into(),
                    payment_amount: None,
                },
            )
            .await
            .unwrap_err();
            assert_eq!(code(err), ErrorCode::NotAuthenticated);
        }
        assert_eq!(
            orders.get(&order.id).await.unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn mark_paid_requires_the_cashier_role() {
        let state = test_state().await;
        let orders = state.order_service();
        let order = seed_order(&orders, 1, PAD_THAI).await;
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
        ] {
            orders.transition(&order.id, status, "vendor:prep").await.unwrap();
        }

        let err = dispatch(
            &orders,
            &vendor_scope(THAI_VENDOR),
            ClientMessage::MarkPaid {
                order_id: order.id.clone(),
                payment_method: "cash".into(),
                payment_amount: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(code(err), ErrorCode::PermissionDenied);

        let reply = dispatch(
            &orders,
            &cashier_scope(),
            ClientMessage::MarkPaid {
                order_id: order.id.clone(),
                payment_method: "cash".into(),
                payment_amount: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(reply, None);
        assert_eq!(
            orders.get(&order.id).await.unwrap().status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn get_orders_returns_the_scoped_snapshot() {
        let state = test_state().await;
        let orders = state.order_service();
        let thai = seed_order(&orders, 1, PAD_THAI).await;
        let burger = seed_order(&orders, 2, CHEESEBURGER).await;

        let reply = dispatch(&orders, &WsScope::Table(1), ClientMessage::GetOrders)
            .await
            .unwrap();
        let Some(ServerMessage::OrderList { orders: list }) = reply else {
            panic!("expected order_list");
        };
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, thai.id);

        let reply = dispatch(
            &orders,
            &vendor_scope(BURGER_VENDOR),
            ClientMessage::GetOrders,
        )
        .await
        .unwrap();
        let Some(ServerMessage::OrderList { orders: list }) = reply else {
            panic!("expected order_list");
        };
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, burger.id);

        // Nothing is payable yet, so the cashier snapshot is empty
        let reply = dispatch(&orders, &cashier_scope(), ClientMessage::GetOrders)
            .await
            .unwrap();
        let Some(ServerMessage::OrderList { orders: list }) = reply else {
            panic!("expected order_list");
        };
        assert!(list.is_empty());

        let reply = dispatch(&orders, &WsScope::Kitchen, ClientMessage::GetOrders)
            .await
            .unwrap();
        let Some(ServerMessage::OrderList { orders: list }) = reply else {
            panic!("expected order_list");
        };
        assert_eq!(list.len(), 2);

        let reply = dispatch(&orders, &WsScope::Kitchen, ClientMessage::Ping)
            .await
            .unwrap();
        assert_eq!(reply, Some(ServerMessage::Pong));
    }

    #[tokio::test]
    async fn item_ticks_resolve_the_parent_order() {
        let state = test_state().await;
        let orders = state.order_service();
        let order = seed_order(&orders, 1, PAD_THAI).await;
        let item_id = order.items[0].id;

        let reply = dispatch(
            &orders,
            &vendor_scope(THAI_VENDOR),
            ClientMessage::UpdateItemStatus {
                item_id,
                status: OrderStatus::Ready,
            },
        )
        .await
        .unwrap();
        assert_eq!(reply, None);

        // Another vendor's socket cannot tick the line
        let err = dispatch(
            &orders,
            &vendor_scope(BURGER_VENDOR),
            ClientMessage::UpdateItemStatus {
                item_id,
                status: OrderStatus::Ready,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(code(err), ErrorCode::PermissionDenied);

        let err = dispatch(
            &orders,
            &vendor_scope(THAI_VENDOR),
            ClientMessage::UpdateItemStatus {
                item_id: 9999,
                status: OrderStatus::Ready,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(code(err), ErrorCode::OrderNotFound);
    }
}
