//! WhatsApp-safe rendering of order lists.
//!
//! Plain text with `*bold*` markers only. The caller owns the page cursor;
//! this module never interprets "next"/"previous" commands itself.

use chrono::{Local, NaiveDate};

use crate::{
    orders::{parse_order_date, STATUS_CANCELLED, STATUS_CANCELLED_ALT, STATUS_DELIVERED},
    types::{Order, PageResult},
};

pub const PAGE_SIZE: usize = 3;

/// Rendered reply plus the page it shows, when the list is paginated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOrders {
    pub text: String,
    pub page: Option<PageResult>,
}

#[derive(Debug, Clone)]
pub struct StatusFormatter {
    support_phone: String,
    today: Option<NaiveDate>,
}

impl StatusFormatter {
    pub fn new(support_phone: impl Into<String>) -> Self {
        Self {
            support_phone: support_phone.into(),
            today: None,
        }
    }

    /// Pins "today" instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn format_orders_for_whatsapp(&self, orders: &[Order], phone: &str, page: usize) -> String {
        self.render(orders, phone, page).text
    }

    pub fn render(&self, orders: &[Order], phone: &str, page: usize) -> RenderedOrders {
        match orders.len() {
            0 => RenderedOrders {
                text: self.no_orders_message(phone),
                page: None,
            },
            1 => RenderedOrders {
                text: self.format_single_order(&orders[0]),
                page: None,
            },
            n if n <= PAGE_SIZE => {
                let listing = self.format_orders_page(orders, 0, n);
                RenderedOrders {
                    text: format!("{}\n\n{}", summarize(orders), listing.text),
                    page: Some(listing),
                }
            }
            _ => {
                let listing = self.format_orders_page(orders, page, PAGE_SIZE);
                RenderedOrders {
                    text: format!("{}\n\n{}", summarize(orders), listing.text),
                    page: Some(listing),
                }
            }
        }
    }

    pub fn no_orders_message(&self, phone: &str) -> String {
        format!(
            "🔍 Sorry, we couldn't find any orders linked to *{phone}*.\n\n\
             This could be because:\n\
             • The order was placed with a different phone number\n\
             • The order is more than 6 months old\n\
             • The number was mistyped\n\n\
             Please share the number used while ordering, or call us at {} and we'll help you out.",
            self.support_phone
        )
    }

    pub fn format_single_order(&self, order: &Order) -> String {
        let today = self.today();
        let delayed = is_delayed(order, today);

        let mut lines = vec![format!("📦 *Order {}*", order.order_id)];
        if let Some(alt_id) = order.alt_id() {
            lines.push(format!("🔖 Ref: {alt_id}"));
        }
        if let Some(product) = order.product_name.as_deref().filter(|p| !p.trim().is_empty()) {
            match order.quantity {
                Some(qty) => lines.push(format!("🖨️ {product} × {qty}")),
                None => lines.push(format!("🖨️ {product}")),
            }
        }
        if !order.status.trim().is_empty() {
            lines.push(format!("📋 Status: {}", order.status.trim()));
        }
        if let Some(ordered) = order.order_date.as_deref().and_then(parse_order_date) {
            lines.push(format!("🗓️ Ordered: {}", format_date(ordered, today)));
        }
        if let Some(due) = order.due_date().and_then(parse_order_date) {
            lines.push(format!("🚚 Expected: {}", format_date(due, today)));
        }
        if delayed {
            lines.push("⚠️ Running behind schedule".to_string());
        }

        format!("{}\n\n{}", lines.join("\n"), closing_line(order, delayed, &self.support_phone))
    }

    /// One page of a numbered order list. `page` past the end is clamped to
    /// the last page.
    pub fn format_orders_page(&self, orders: &[Order], page: usize, page_size: usize) -> PageResult {
        let page_size = page_size.max(1);
        let total = orders.len();
        if total == 0 {
            return PageResult {
                text: String::new(),
                has_more: false,
                has_prev: false,
                current_page: 0,
                total_pages: 0,
            };
        }
        let total_pages = total.div_ceil(page_size);
        let current_page = page.min(total_pages - 1);
        let start = current_page * page_size;
        let end = (start + page_size).min(total);
        let today = self.today();

        let mut text = if total_pages > 1 {
            format!(
                "*Orders {}-{} of {}* (page {} of {})\n",
                start + 1,
                end,
                total,
                current_page + 1,
                total_pages
            )
        } else {
            "*Your orders*\n".to_string()
        };

        for (offset, order) in orders[start..end].iter().enumerate() {
            text.push('\n');
            text.push_str(&format_list_entry(start + offset + 1, order, today));
        }

        let has_more = end < total;
        let has_prev = current_page > 0;

        text.push_str(&format!(
            "\n\nReply with the order number ({}-{}) to see full details.",
            start + 1,
            end
        ));
        if has_more {
            let remaining = (total - end).min(page_size);
            let noun = if remaining == 1 { "order" } else { "orders" };
            text.push_str(&format!("\n👉 Type *Next* to see {remaining} more {noun}"));
        }
        if has_prev {
            text.push_str("\n👈 Type *Previous* to go back");
        }

        PageResult {
            text,
            has_more,
            has_prev,
            current_page,
            total_pages,
        }
    }
}

fn format_list_entry(number: usize, order: &Order, today: NaiveDate) -> String {
    let mut header = format!("{number}. *{}*", order.display_id());
    if let Some(product) = order.product_name.as_deref().filter(|p| !p.trim().is_empty()) {
        header.push_str(&format!(" - {product}"));
    }
    let status = if order.status.trim().is_empty() {
        "Processing"
    } else {
        order.status.trim()
    };
    let mut due_line = match order.due_date().and_then(parse_order_date) {
        Some(due) => format!("   Due: {}", format_date(due, today)),
        None => "   Due: to be confirmed".to_string(),
    };
    if is_delayed(order, today) {
        due_line.push_str(" ⚠️ Delayed");
    }
    format!("{header}\n   {status}\n{due_line}")
}

fn closing_line(order: &Order, delayed: bool, support_phone: &str) -> String {
    if delayed {
        return format!(
            "😔 We're sorry, this order is running late. Our production team is prioritising it. \
             For anything urgent, call us at {support_phone}."
        );
    }
    match order.status_id.unwrap_or(0) {
        id if id < 7000 => "✅ Everything is on track!".to_string(),
        id if id < STATUS_DELIVERED => "🚚 On the way! Your order has left our facility.".to_string(),
        STATUS_DELIVERED => "🎉 Delivered successfully!".to_string(),
        STATUS_CANCELLED | STATUS_CANCELLED_ALT => match cancellation_reason(&order.status) {
            Some(reason) => format!("❌ This order was cancelled.\nReason: {reason}"),
            None => "❌ This order was cancelled.".to_string(),
        },
        _ => "✅ This order is completed.".to_string(),
    }
}

/// Pulls the "…Error…"/"…Issue…" fragment out of a status such as
/// `"Cancelled - Payment Issue"`.
fn cancellation_reason(status: &str) -> Option<String> {
    let lower = status.to_ascii_lowercase();
    if !lower.contains("error") && !lower.contains("issue") {
        return None;
    }
    status
        .split(['-', ':', '|', '(', ')'])
        .map(str::trim)
        .find(|part| {
            let part = part.to_ascii_lowercase();
            part.contains("error") || part.contains("issue")
        })
        .map(str::to_string)
}

/// Short category breakdown used above multi-order listings.
pub fn summarize(orders: &[Order]) -> String {
    let mut production = 0;
    let mut ready = 0;
    let mut shipping = 0;
    let mut delivered = 0;
    let mut cancelled = 0;

    for order in orders {
        match order.status_id.unwrap_or(0) {
            STATUS_CANCELLED | STATUS_CANCELLED_ALT => cancelled += 1,
            id if id >= STATUS_DELIVERED => delivered += 1,
            id if id >= 7000 => shipping += 1,
            id if id >= 5000 => ready += 1,
            _ => production += 1,
        }
    }

    let mut lines = vec![format!("You have *{} orders*:", orders.len())];
    for (count, label) in [
        (production, "in production 🏭"),
        (ready, "ready for dispatch 📦"),
        (shipping, "on the way 🚚"),
        (delivered, "delivered ✅"),
        (cancelled, "cancelled ❌"),
    ] {
        if count > 0 {
            lines.push(format!("• {count} {label}"));
        }
    }
    lines.join("\n")
}

/// An order is late when its due date has passed and neither the status text
/// nor the status id says it was delivered.
pub fn is_delayed(order: &Order, today: NaiveDate) -> bool {
    let Some(due) = order.due_date().and_then(parse_order_date) else {
        return false;
    };
    due < today
        && !order.status.trim().eq_ignore_ascii_case("delivered")
        && order.status_id != Some(STATUS_DELIVERED)
}

/// "Today", "Tomorrow", a weekday name within the coming week, else "Dec 27".
pub fn format_date(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        2..=7 => date.format("%A").to_string(),
        _ => date.format("%b %-d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn formatter() -> StatusFormatter {
        StatusFormatter::new("+91 90000 00000").with_today(today())
    }

    fn active(n: usize) -> Vec<Order> {
        (0..n)
            .map(|i| Order {
                order_id: format!("WEBKA/51208{i}"),
                alt_id: Some(format!("PJ10000{i}")),
                status: "In Production".into(),
                status_id: Some(4000),
                estimated_delivery: Some((today() + Duration::days(3)).to_string()),
                ..Order::default()
            })
            .collect()
    }

    fn entry_count(text: &str) -> usize {
        text.lines()
            .filter(|l| {
                let digits = l.chars().take_while(|c| c.is_ascii_digit()).count();
                digits > 0 && l[digits..].starts_with(". ")
            })
            .count()
    }

    #[test]
    fn relative_dates() {
        let t = today();
        assert_eq!(format_date(t, t), "Today");
        assert_eq!(format_date(t + Duration::days(1), t), "Tomorrow");
        assert_eq!(format_date(t + Duration::days(3), t), "Thursday");
        assert_eq!(format_date(t + Duration::days(7), t), "Monday");
        assert_eq!(format_date(t + Duration::days(10), t), "Oct 29");
        assert_eq!(format_date(t - Duration::days(2), t), "Oct 17");
    }

    #[test]
    fn delay_requires_all_three_conditions() {
        let mut order = Order {
            status: "Printing".into(),
            status_id: Some(4000),
            estimated_delivery: Some("2026-10-18".into()),
            ..Order::default()
        };
        assert!(is_delayed(&order, today()));

        order.status = "Delivered".into();
        assert!(!is_delayed(&order, today()));

        order.status = "Printing".into();
        order.status_id = Some(8000);
        assert!(!is_delayed(&order, today()));

        order.status_id = Some(4000);
        order.estimated_delivery = Some("2026-10-19".into());
        assert!(!is_delayed(&order, today()));

        order.estimated_delivery = None;
        assert!(!is_delayed(&order, today()));
    }

    #[test]
    fn promised_date_stands_in_for_estimated_delivery() {
        let order = Order {
            status: "Printing".into(),
            promised_date: Some("2026-10-01".into()),
            ..Order::default()
        };
        assert!(is_delayed(&order, today()));
    }

    #[test]
    fn no_orders_message_is_stable() {
        let f = formatter();
        let first = f.format_orders_for_whatsapp(&[], "9940117071", 0);
        let second = f.format_orders_for_whatsapp(&[], "9940117071", 4);
        assert_eq!(first, second);
        assert!(first.contains("couldn't find any orders"));
        assert!(first.contains("9940117071"));
        assert!(first.contains("+91 90000 00000"));
    }

    #[test]
    fn single_order_has_details_and_no_pagination() {
        let mut order = active(1).remove(0);
        order.order_date = Some("2026-10-12".into());
        order.estimated_delivery = Some("2026-10-20".into());
        let text = formatter().format_orders_for_whatsapp(&[order], "9940117071", 0);
        assert!(text.contains("*Order WEBKA/512080*"));
        assert!(text.contains("Ref: PJ100000"));
        assert!(text.contains("Ordered: Oct 12"));
        assert!(text.contains("Expected: Tomorrow"));
        assert!(text.contains("Everything is on track"));
        assert!(!text.contains("Next"));
        assert!(!text.contains("Previous"));
    }

    #[test]
    fn single_order_closing_lines_follow_status_id() {
        let f = formatter();
        let with = |status: &str, id: i64| Order {
            order_id: "WEBKA/1".into(),
            status: status.into(),
            status_id: Some(id),
            ..Order::default()
        };
        assert!(f
            .format_single_order(&with("Out for delivery", 7010))
            .contains("On the way"));
        assert!(f
            .format_single_order(&with("Delivered", 8000))
            .contains("Delivered successfully"));
        let cancelled = f.format_single_order(&with("Cancelled - Payment Issue", 8010));
        assert!(cancelled.contains("cancelled"));
        assert!(cancelled.contains("Reason: Payment Issue"));
        assert!(!f
            .format_single_order(&with("Cancelled", 8010))
            .contains("Reason"));
    }

    #[test]
    fn delay_overrides_status_line() {
        let order = Order {
            order_id: "WEBKA/1".into(),
            status: "Out for delivery".into(),
            status_id: Some(7010),
            estimated_delivery: Some("2026-10-10".into()),
            ..Order::default()
        };
        let text = formatter().format_single_order(&order);
        assert!(text.contains("running late"));
        assert!(!text.contains("On the way"));
    }

    #[test]
    fn small_lists_show_everything_on_one_page() {
        let orders = active(3);
        let rendered = formatter().render(&orders, "9940117071", 0);
        assert!(rendered.text.starts_with("You have *3 orders*"));
        assert!(rendered.text.contains("• 3 in production"));
        assert_eq!(entry_count(&rendered.text), 3);
        assert!(!rendered.text.contains("Next"));
        let page = rendered.page.unwrap();
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_more && !page.has_prev);
    }

    #[test]
    fn page_shape_holds_for_every_valid_page() {
        let f = formatter();
        for n in 1..=11 {
            let orders = active(n);
            let total_pages = n.div_ceil(PAGE_SIZE);
            for page in 0..total_pages {
                let result = f.format_orders_page(&orders, page, PAGE_SIZE);
                assert_eq!(result.current_page, page);
                assert_eq!(result.total_pages, total_pages);
                assert_eq!(entry_count(&result.text), PAGE_SIZE.min(n - page * PAGE_SIZE));
            }
        }
    }

    #[test]
    fn last_page_of_five() {
        let orders = active(5);
        let result = formatter().format_orders_page(&orders, 1, PAGE_SIZE);
        assert!(!result.has_more);
        assert!(result.has_prev);
        assert!(result.text.contains("4. *PJ100003*"));
        assert!(result.text.contains("5. *PJ100004*"));
        assert!(!result.text.contains("3. *PJ100002*"));
        assert!(result.text.contains("Previous"));
        assert!(!result.text.contains("Next"));
    }

    #[test]
    fn first_page_announces_remaining_orders() {
        let orders = active(5);
        let result = formatter().format_orders_page(&orders, 0, PAGE_SIZE);
        assert!(result.has_more);
        assert!(!result.has_prev);
        assert!(result.text.contains("Type *Next* to see 2 more orders"));
    }

    #[test]
    fn out_of_range_page_is_clamped() {
        let orders = active(4);
        let result = formatter().format_orders_page(&orders, 9, PAGE_SIZE);
        assert_eq!(result.current_page, 1);
        assert_eq!(entry_count(&result.text), 1);
    }

    #[test]
    fn empty_list_has_no_pages() {
        let result = formatter().format_orders_page(&[], 2, PAGE_SIZE);
        assert_eq!(result.total_pages, 0);
        assert_eq!(result.current_page, 0);
        assert!(!result.has_more && !result.has_prev);
        assert!(!result.text.contains("Reply with the order number"));
    }

    #[test]
    fn summary_buckets_by_status_id() {
        let ids = [None, Some(4000), Some(5500), Some(7200), Some(8000), Some(9000), Some(8010), Some(9999)];
        let orders = ids
            .iter()
            .map(|id| Order {
                status_id: *id,
                ..Order::default()
            })
            .collect::<Vec<_>>();
        let summary = summarize(&orders);
        assert!(summary.contains("• 2 in production"));
        assert!(summary.contains("• 1 ready for dispatch"));
        assert!(summary.contains("• 1 on the way"));
        assert!(summary.contains("• 2 delivered"));
        assert!(summary.contains("• 2 cancelled"));
    }

    #[test]
    fn delayed_entries_are_marked_in_lists() {
        let mut orders = active(4);
        orders[0].estimated_delivery = Some("2026-10-01".into());
        let result = formatter().format_orders_page(&orders, 0, PAGE_SIZE);
        assert!(result.text.contains("Due: Oct 1 ⚠️ Delayed"));
    }
}
