use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    config::Config, conversation_log::ConversationLogger, llm::LlmClient,
    order_status::OrderStatusService, session_store::SessionStore, whatsapp::WhatsAppSender,
};

/// One print job as reported by the order API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default, deserialize_with = "lenient_string")]
    pub order_id: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub alt_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub status_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub order_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub estimated_delivery: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub promised_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub item_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub status_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub estimated_delivery: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub promised_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub quantity: Option<i64>,
}

impl Order {
    /// Customer-facing PJ code, if the upstream record carries a usable one.
    pub fn alt_id(&self) -> Option<&str> {
        self.alt_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn due_date(&self) -> Option<&str> {
        self.estimated_delivery
            .as_deref()
            .or(self.promised_date.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Label used in lists: the PJ code, else the order id.
    pub fn display_id(&self) -> &str {
        self.alt_id().unwrap_or(self.order_id.as_str())
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatTurn>,
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub current_orders: Vec<Order>,
    pub order_page: usize,
    pub last_activity: DateTime<Utc>,
    pub requirements: Vec<String>,
    pub product_interest: Option<String>,
}

impl Session {
    pub fn new(id: &str, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            messages: vec![],
            metadata: SessionMetadata {
                current_orders: vec![],
                order_page: 0,
                last_activity: now,
                requirements: vec![],
                product_interest: None,
            },
        }
    }
}

/// One rendered slice of an order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub text: String,
    pub has_more: bool,
    pub has_prev: bool,
    pub current_page: usize,
    pub total_pages: usize,
}

pub struct AppState {
    pub config: Config,
    pub sessions: Arc<dyn SessionStore>,
    pub order_status: OrderStatusService,
    pub llm: LlmClient,
    pub conversation_log: ConversationLogger,
    pub whatsapp: WhatsAppSender,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub order_page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusBody {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSpaceInbound {
    #[serde(default, alias = "from", alias = "waId")]
    pub phone: String,
    #[serde(default, alias = "text", alias = "body")]
    pub message: String,
    #[serde(default)]
    pub name: Option<String>,
}
