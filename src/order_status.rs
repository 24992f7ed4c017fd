use std::sync::Arc;

use tracing::info;

use crate::{
    error::OrderError,
    formatter::{RenderedOrders, StatusFormatter},
    orders::{filter_active_orders, mask_phone, sort_by_order_date_desc},
    pia_client::OrderSource,
    types::{Order, PageResult},
};

#[derive(Debug, Clone)]
pub struct OrderStatusReply {
    pub text: String,
    /// Active orders, in display order.
    pub orders: Vec<Order>,
    pub page: Option<PageResult>,
}

pub struct OrderStatusService {
    source: Arc<dyn OrderSource>,
    formatter: StatusFormatter,
}

impl OrderStatusService {
    pub fn new(source: Arc<dyn OrderSource>, formatter: StatusFormatter) -> Self {
        Self { source, formatter }
    }

    /// Active orders for `phone`, most recent first.
    pub async fn active_orders(&self, phone: &str) -> Result<Vec<Order>, OrderError> {
        let lookup = self.source.orders_by_mobile(phone).await?;
        let mut active = filter_active_orders(&lookup.orders);
        sort_by_order_date_desc(&mut active);
        info!(
            phone = %mask_phone(phone),
            fetched = lookup.orders.len(),
            active = active.len(),
            upstream = lookup.message.as_deref(),
            "order lookup complete"
        );
        Ok(active)
    }

    pub async fn lookup(&self, phone: &str, page: usize) -> Result<OrderStatusReply, OrderError> {
        let orders = self.active_orders(phone).await?;
        let RenderedOrders { text, page } = self.formatter.render(&orders, phone, page);
        Ok(OrderStatusReply { text, orders, page })
    }

    /// Renders an already fetched list, e.g. when paging through a session's
    /// stored orders.
    pub fn render(&self, orders: &[Order], phone: &str, page: usize) -> RenderedOrders {
        self.formatter.render(orders, phone, page)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::pia_client::OrderLookup;

    struct FixedSource(Result<OrderLookup, OrderError>);

    #[async_trait]
    impl OrderSource for FixedSource {
        async fn orders_by_mobile(&self, _phone: &str) -> Result<OrderLookup, OrderError> {
            self.0.clone()
        }
    }

    fn service(result: Result<OrderLookup, OrderError>) -> OrderStatusService {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        OrderStatusService::new(
            Arc::new(FixedSource(result)),
            StatusFormatter::new("+91 90000 00000").with_today(today),
        )
    }

    fn order(alt: &str, status_id: i64, date: &str) -> Order {
        Order {
            order_id: format!("WEBKA/{alt}"),
            alt_id: Some(alt.to_string()),
            status: "Printing".into(),
            status_id: Some(status_id),
            order_date: Some(date.to_string()),
            ..Order::default()
        }
    }

    #[tokio::test]
    async fn empty_lookup_renders_not_found_message() {
        let reply = service(Ok(OrderLookup::empty(Some("No data".into()))))
            .lookup("9940117071", 0)
            .await
            .unwrap();
        assert!(reply.text.contains("couldn't find any orders"));
        assert!(reply.text.contains("9940117071"));
        assert!(reply.orders.is_empty());
        assert!(reply.page.is_none());
    }

    #[tokio::test]
    async fn terminal_orders_are_hidden_and_rest_sorted() {
        let orders = vec![
            order("PJ1", 4000, "2026-10-01"),
            order("PJ2", 8000, "2026-10-10"),
            order("PJ3", 5000, "2026-10-15"),
        ];
        let reply = service(Ok(OrderLookup {
            count: orders.len(),
            orders,
            message: None,
        }))
        .lookup("9940117071", 0)
        .await
        .unwrap();
        let ids = reply.orders.iter().map(|o| o.display_id()).collect::<Vec<_>>();
        assert_eq!(ids, ["PJ3", "PJ1"]);
        assert!(reply.text.contains("You have *2 orders*"));
    }

    #[tokio::test]
    async fn upstream_errors_pass_through() {
        let err = service(Err(OrderError::Timeout))
            .lookup("9940117071", 0)
            .await
            .unwrap_err();
        assert_eq!(err, OrderError::Timeout);
    }
}
