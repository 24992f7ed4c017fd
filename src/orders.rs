use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::types::{Order, OrderItem};

pub const STATUS_DELIVERED: i64 = 8000;
pub const STATUS_CANCELLED: i64 = 8010;
pub const STATUS_COMPLETED: i64 = 9000;
pub const STATUS_CANCELLED_ALT: i64 = 9999;

const TERMINAL_STATUS_IDS: [i64; 4] = [
    STATUS_DELIVERED,
    STATUS_CANCELLED,
    STATUS_COMPLETED,
    STATUS_CANCELLED_ALT,
];
const TERMINAL_KEYWORDS: [&str; 4] = ["delivered", "completed", "cancelled", "dispatched"];

/// True when either the numeric id or the status text says the job is
/// finished. The two fields are not always updated together upstream.
pub fn is_terminal(status_id: Option<i64>, status: &str) -> bool {
    if status_id.is_some_and(|id| TERMINAL_STATUS_IDS.contains(&id)) {
        return true;
    }
    let status = status.to_ascii_lowercase();
    TERMINAL_KEYWORDS.iter().any(|k| status.contains(k))
}

/// Keeps orders a customer can still act on. Orders with line items are
/// filtered per item, each surviving item becoming its own record under the
/// parent's PJ code. Records without a PJ code are dropped.
pub fn filter_active_orders(orders: &[Order]) -> Vec<Order> {
    orders
        .iter()
        .filter(|order| order.alt_id().is_some())
        .flat_map(|order| {
            if order.items.is_empty() {
                if is_terminal(order.status_id, &order.status) {
                    vec![]
                } else {
                    vec![order.clone()]
                }
            } else {
                order
                    .items
                    .iter()
                    .map(|item| item_as_order(order, item))
                    .filter(|o| !is_terminal(o.status_id, &o.status))
                    .collect()
            }
        })
        .collect()
}

fn item_as_order(parent: &Order, item: &OrderItem) -> Order {
    Order {
        order_id: parent.order_id.clone(),
        alt_id: parent.alt_id().map(str::to_string),
        status: item
            .status
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| parent.status.clone()),
        status_id: item.status_id.or(parent.status_id),
        order_date: parent.order_date.clone(),
        estimated_delivery: item
            .estimated_delivery
            .clone()
            .or_else(|| parent.estimated_delivery.clone()),
        promised_date: item
            .promised_date
            .clone()
            .or_else(|| parent.promised_date.clone()),
        product_name: item
            .product_name
            .clone()
            .or_else(|| parent.product_name.clone()),
        quantity: item.quantity.or(parent.quantity),
        items: vec![],
    }
}

/// Most recent first; orders without a parseable date go last.
pub fn sort_by_order_date_desc(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        let a = a.order_date.as_deref().and_then(parse_order_date);
        let b = b.order_date.as_deref().and_then(parse_order_date);
        match (a, b) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

/// Calendar date of an upstream timestamp. Time of day is dropped.
pub fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// `9876543210` -> `98XXXXXX10`, for logs.
pub fn mask_phone(phone: &str) -> String {
    let chars = phone.chars().collect::<Vec<_>>();
    if chars.len() <= 4 {
        return "X".repeat(chars.len());
    }
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < 2 || i >= chars.len() - 2 { *c } else { 'X' })
        .collect()
}
