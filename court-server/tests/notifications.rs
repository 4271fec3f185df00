//! Event fan-out across the notification topics

mod common;

use common::*;
use court_server::live::Topic;
use shared::error::ErrorCode;
use shared::message::EventKind;
use shared::order::OrderStatus;
use tokio::sync::broadcast::error::TryRecvError;

#[tokio::test]
async fn creation_reaches_table_vendors_and_kitchen() {
    let state = test_state().await;
    let orders = state.order_service();

    let mut table_rx = state.hub.subscribe(Topic::Table(5));
    let mut thai_rx = state.hub.subscribe(Topic::Vendor(THAI_VENDOR));
    let mut burger_rx = state.hub.subscribe(Topic::Vendor(BURGER_VENDOR));
    let mut kitchen_rx = state.hub.subscribe(Topic::Kitchen);
    let mut cashier_rx = state.hub.subscribe(Topic::Cashier);

    let order = orders.create(mixed_order(5)).await.unwrap();

    for rx in [&mut table_rx, &mut thai_rx, &mut burger_rx, &mut kitchen_rx] {
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::OrderCreated);
        assert_eq!(event.order.id, order.id);
        assert_eq!(event.order.items.len(), 2);
    }

    // Nothing for the cashier until the order is payable
    assert!(matches!(cashier_rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn single_vendor_orders_stay_off_other_vendor_topics() {
    let state = test_state().await;
    let orders = state.order_service();

    let mut thai_rx = state.hub.subscribe(Topic::Vendor(THAI_VENDOR));
    let mut burger_rx = state.hub.subscribe(Topic::Vendor(BURGER_VENDOR));

    orders.create(pad_thai_order(1, 1)).await.unwrap();

    assert!(thai_rx.recv().await.is_ok());
    assert!(matches!(burger_rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn entering_ready_signals_the_cashier() {
    let state = test_state().await;
    let orders = state.order_service();
    let id = orders.create(pad_thai_order(2, 1)).await.unwrap().id;

    let mut cashier_rx = state.hub.subscribe(Topic::Cashier);
    let mut table_rx = state.hub.subscribe(Topic::Table(2));

    orders
        .transition(&id, OrderStatus::Confirmed, "vendor:thai")
        .await
        .unwrap();
    orders
        .transition(&id, OrderStatus::Preparing, "vendor:thai")
        .await
        .unwrap();
    // Two status changes so far, none for the cashier
    assert!(matches!(cashier_rx.try_recv(), Err(TryRecvError::Empty)));

    orders
        .transition(&id, OrderStatus::Ready, "vendor:thai")
        .await
        .unwrap();

    // The cashier hears the ready status change, then the dedicated
    // awaiting-payment signal
    let event = cashier_rx.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::OrderStatusChanged);
    assert_eq!(event.order.status, OrderStatus::Ready);
    let event = cashier_rx.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::OrderReadyForPayment);
    assert_eq!(event.order.status, OrderStatus::Ready);

    // The table sees plain status changes, including ready
    let mut last = None;
    while let Ok(event) = table_rx.try_recv() {
        last = Some(event);
    }
    let last = last.unwrap();
    assert_eq!(last.kind, EventKind::OrderStatusChanged);
    assert_eq!(last.order.status, OrderStatus::Ready);
}

#[tokio::test]
async fn settlement_emits_a_cashier_only_signal() {
    let state = test_state().await;
    let orders = state.order_service();
    let id = orders.create(pad_thai_order(2, 1)).await.unwrap().id;
    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
    ] {
        orders.transition(&id, status, "vendor:thai").await.unwrap();
    }

    let mut cashier_rx = state.hub.subscribe(Topic::Cashier);
    let mut table_rx = state.hub.subscribe(Topic::Table(2));

    orders.mark_paid(&id, "cash", None, "cashier:bob").await.unwrap();

    let event = cashier_rx.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::OrderPaymentSettled);
    assert_eq!(event.order.status, OrderStatus::Paid);

    // The table hears the paid status change, not the settlement signal
    let event = table_rx.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::OrderStatusChanged);
    assert_eq!(event.order.status, OrderStatus::Paid);
    assert!(matches!(table_rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn item_updates_are_vendor_scoped() {
    let state = test_state().await;
    let orders = state.order_service();
    let order = orders.create(mixed_order(3)).await.unwrap();
    let thai_item = order
        .items
        .iter()
        .find(|i| i.vendor_id == THAI_VENDOR)
        .unwrap();

    let mut kitchen_rx = state.hub.subscribe(Topic::Kitchen);

    // The burger stall cannot tick the Thai line
    let err = orders
        .update_item(&order.id, thai_item.id, Some(BURGER_VENDOR))
        .await
        .unwrap_err();
    assert_eq!(app_code(err), ErrorCode::PermissionDenied);
    assert!(matches!(
        kitchen_rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));

    orders
        .update_item(&order.id, thai_item.id, Some(THAI_VENDOR))
        .await
        .unwrap();
    let event = kitchen_rx.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::ItemUpdated);
}

#[tokio::test]
async fn events_carry_the_full_snapshot() {
    let state = test_state().await;
    let orders = state.order_service();
    let id = orders.create(pad_thai_order(1, 2)).await.unwrap().id;

    let mut table_rx = state.hub.subscribe(Topic::Table(1));
    orders
        .transition(&id, OrderStatus::Confirmed, "vendor:thai")
        .await
        .unwrap();

    let event = table_rx.recv().await.unwrap();
    let view = event.order;
    assert_eq!(view.status, OrderStatus::Confirmed);
    assert!(view.confirmed_at.is_some());
    assert!(view.estimated_ready_time.is_some());
    assert_eq!(view.total_amount, 25.80);
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items_total(), view.total_amount);
}
