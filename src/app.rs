use std::{sync::Arc, time::Instant};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::{
    config::Config,
    conversation_log::{ConversationEntry, ConversationLogger},
    error::{ApiError, LlmError, OrderError},
    formatter::StatusFormatter,
    llm::LlmClient,
    order_status::OrderStatusService,
    orders::mask_phone,
    phone::extract_phone,
    pia_client::{OrderSource, PiaClient},
    prompting::{render_system_prompt, SystemPromptContext},
    session_store::{spawn_session_sweeper, InMemorySessionStore},
    types::{
        AppState, BotSpaceInbound, ChatBody, ChatTurn, Order, OrderStatusBody, PageResult, Session,
        SessionMetadata,
    },
    whatsapp::{verify_webhook_signature, whatsapp_session_id, WhatsAppSender},
};

/// Turns kept per session. Only the last exchange is replayed to the model.
const MAX_HISTORY_TURNS: usize = 20;
const MAX_REQUIREMENTS: usize = 10;

/// Keyword to catalogue product, first match wins.
const PRODUCT_KEYWORDS: &[(&str, &str)] = &[
    ("visiting card", "visiting cards"),
    ("business card", "visiting cards"),
    ("flyer", "flyers"),
    ("leaflet", "flyers"),
    ("poster", "posters"),
    ("banner", "banners"),
    ("brochure", "brochures"),
    ("sticker", "stickers"),
    ("letterhead", "letterheads"),
    ("invitation", "invitation cards"),
    ("calendar", "calendars"),
    ("t-shirt", "t-shirts"),
    ("mug", "mugs"),
];

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// One customer message, whichever channel it arrived on.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub session_id: String,
    pub user_id: String,
    pub channel: &'static str,
    pub question: String,
    pub order_page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub has_more: bool,
    pub has_prev: bool,
    pub current_page: usize,
    pub total_pages: usize,
}

impl From<&PageResult> for Pagination {
    fn from(page: &PageResult) -> Self {
        Self {
            has_more: page.has_more,
            has_prev: page.has_prev,
            current_page: page.current_page,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub order_status: bool,
    pub orders_count: usize,
    pub pagination: Option<Pagination>,
    pub order_error: Option<&'static str>,
}

pub fn build_state(config: Config) -> AppState {
    let source = Arc::new(PiaClient::new(&config.pia));
    build_state_with_source(config, source)
}

pub fn build_state_with_source(config: Config, source: Arc<dyn OrderSource>) -> AppState {
    let formatter = StatusFormatter::new(config.support_phone.clone());
    AppState {
        sessions: Arc::new(InMemorySessionStore::new()),
        order_status: OrderStatusService::new(source, formatter),
        llm: LlmClient::new(config.llm.clone()),
        conversation_log: ConversationLogger::new(
            config.conversation_log_url.clone(),
            config.outbound_timeout,
        ),
        whatsapp: WhatsAppSender::new(&config.botspace, config.outbound_timeout),
        config,
    }
}

/// Routes a customer message to the order flow when it carries a phone
/// number, otherwise to the LLM. Holds the session lock for the whole
/// exchange so concurrent messages on one session apply in order.
pub async fn handle_customer_message(state: &Arc<AppState>, inbound: InboundMessage) -> ChatOutcome {
    let handle = state
        .sessions
        .touch(&inbound.session_id, &inbound.user_id)
        .await;
    let mut session = handle.lock().await;

    let outcome = match extract_phone(&inbound.question) {
        Ok(phone) => order_reply(state, &mut session, &phone, inbound.order_page).await,
        Err(err) => {
            debug!(session_id = %inbound.session_id, reason = %err, "no phone in message, using llm");
            note_customer_interest(&mut session.metadata, &inbound.question);
            llm_reply(state, &session, &inbound.question).await
        }
    };

    push_turn(&mut session, "user", &inbound.question);
    push_turn(&mut session, "assistant", &outcome.response);
    let user_id = session.user_id.clone();
    drop(session);

    state.conversation_log.log(ConversationEntry {
        timestamp: Utc::now(),
        session_id: inbound.session_id,
        user_id,
        channel: inbound.channel.to_string(),
        question: inbound.question,
        response: outcome.response.clone(),
        order_status: outcome.order_status,
        orders_count: outcome.orders_count,
    });

    outcome
}

async fn order_reply(
    state: &Arc<AppState>,
    session: &mut Session,
    phone: &str,
    requested_page: Option<usize>,
) -> ChatOutcome {
    let orders = match state.order_status.active_orders(phone).await {
        Ok(orders) => orders,
        Err(err) => {
            if err != OrderError::TokenExpired {
                warn!(session_id = %session.id, phone = %mask_phone(phone), kind = err.kind(), "order lookup failed");
            }
            return ChatOutcome {
                response: err.customer_message(&state.config.support_phone),
                order_status: true,
                orders_count: 0,
                pagination: None,
                order_error: Some(err.kind()),
            };
        }
    };

    // A different order list invalidates the stored cursor.
    let stored_page = if same_orders(&session.metadata.current_orders, &orders) {
        session.metadata.order_page
    } else {
        0
    };
    let page = requested_page.unwrap_or(stored_page);
    let rendered = state.order_status.render(&orders, phone, page);

    session.metadata.order_page = rendered.page.as_ref().map_or(0, |p| p.current_page);
    let orders_count = orders.len();
    session.metadata.current_orders = orders;

    ChatOutcome {
        response: rendered.text,
        order_status: true,
        orders_count,
        pagination: rendered.page.as_ref().map(Pagination::from),
        order_error: None,
    }
}

fn same_orders(a: &[Order], b: &[Order]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.order_id == y.order_id && x.display_id() == y.display_id())
}

async fn llm_reply(state: &Arc<AppState>, session: &Session, question: &str) -> ChatOutcome {
    let system = render_system_prompt(&SystemPromptContext {
        company_name: &state.config.company_name,
        support_phone: &state.config.support_phone,
        product_interest: session.metadata.product_interest.as_deref(),
        requirements: &session.metadata.requirements,
    });

    let response = match state.llm.complete(&system, &session.messages, question).await {
        Ok(text) => text,
        Err(err) => {
            match err {
                LlmError::NotConfigured => debug!("llm disabled, sending fallback reply"),
                _ => warn!(session_id = %session.id, error = %err, "llm reply failed"),
            }
            fallback_reply(&state.config.support_phone)
        }
    };

    ChatOutcome {
        response,
        order_status: false,
        orders_count: 0,
        pagination: None,
        order_error: None,
    }
}

fn fallback_reply(support_phone: &str) -> String {
    format!(
        "Thanks for reaching out! I'm having trouble answering right now. \
         To check an order, just send the 10-digit mobile number you ordered with. \
         For anything else, call us at {support_phone}."
    )
}

/// Remembers which product the customer asks about. Messages naming a
/// product together with a number (quantity, size) are kept as requirements.
fn note_customer_interest(metadata: &mut SessionMetadata, question: &str) {
    let lower = question.to_lowercase();
    let Some((_, product)) = PRODUCT_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
    else {
        return;
    };
    metadata.product_interest = Some(product.to_string());

    if !question.chars().any(|c| c.is_ascii_digit()) {
        return;
    }
    let requirement = question.trim().to_string();
    if metadata.requirements.contains(&requirement) {
        return;
    }
    metadata.requirements.push(requirement);
    if metadata.requirements.len() > MAX_REQUIREMENTS {
        metadata.requirements.remove(0);
    }
}

fn push_turn(session: &mut Session, role: &str, content: &str) {
    session.messages.push(ChatTurn {
        role: role.to_string(),
        content: content.to_string(),
    });
    if session.messages.len() > MAX_HISTORY_TURNS {
        let excess = session.messages.len() - MAX_HISTORY_TURNS;
        session.messages.drain(..excess);
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true, "now": now_iso() }))
}

async fn order_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "existing-order-status",
        "timestamp": now_iso(),
    }))
}

async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> Result<impl IntoResponse, ApiError> {
    let question = body.question.trim().to_string();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question is required".to_string()));
    }

    let session_id = body
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let user_id = body
        .user_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("web-{}", Uuid::new_v4()));

    let outcome = handle_customer_message(
        &state,
        InboundMessage {
            session_id: session_id.clone(),
            user_id: user_id.clone(),
            channel: "web",
            question,
            order_page: body.order_page,
        },
    )
    .await;

    let mut payload = json!({
        "success": true,
        "response": outcome.response,
        "userId": user_id,
        "sessionId": session_id,
        "timestamp": now_iso(),
    });
    if outcome.order_status {
        payload["orderStatus"] = json!(true);
        payload["ordersCount"] = json!(outcome.orders_count);
        if let Some(pagination) = outcome.pagination {
            payload["pagination"] = json!(pagination);
        }
        if let Some(kind) = outcome.order_error {
            payload["error"] = json!(kind);
        }
    }
    Ok(Json(payload))
}

async fn post_existing_order_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OrderStatusBody>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();
    let support_phone = &state.config.support_phone;

    let phone = [body.phone.as_deref(), body.message.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|text| extract_phone(text).ok())
        .ok_or_else(|| ApiError::InvalidPhone {
            message: format!(
                "Please share the 10-digit mobile number you used while placing the order \
                 (for example 9876543210). Need help? Call us at {support_phone}."
            ),
        })?;

    let reply = state
        .order_status
        .lookup(&phone, 0)
        .await
        .map_err(|source| ApiError::Upstream {
            message: source.customer_message(support_phone),
            source,
        })?;

    info!(
        phone = %mask_phone(&phone),
        active = reply.orders.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "order status served"
    );

    Ok(Json(json!({
        "success": true,
        "message": reply.text,
        "metadata": {
            "phone": phone,
            "activeOrderCount": reply.orders.len(),
            "responseTime": started.elapsed().as_millis() as u64,
            "timestamp": now_iso(),
        }
    })))
}

async fn botspace_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get("x-botspace-signature")
        .and_then(|v| v.to_str().ok());
    if !verify_webhook_signature(&state.config.botspace.webhook_secret, signature, &body) {
        return Err(ApiError::Unauthorized("invalid webhook signature".to_string()));
    }

    let inbound = serde_json::from_slice::<BotSpaceInbound>(&body)
        .map_err(|err| ApiError::BadRequest(format!("invalid webhook payload: {err}")))?;
    let text = inbound.message.trim().to_string();
    let Some(session_id) = whatsapp_session_id(&inbound.phone).filter(|_| !text.is_empty()) else {
        return Ok((
            StatusCode::OK,
            Json(json!({ "received": true, "processed": 0 })),
        ));
    };
    if let Some(name) = inbound.name.as_deref() {
        debug!(session_id = %session_id, name, "whatsapp message received");
    }

    let to = inbound.phone.clone();
    let state_clone = state.clone();
    tokio::spawn(async move {
        let outcome = handle_customer_message(
            &state_clone,
            InboundMessage {
                user_id: session_id.clone(),
                session_id,
                channel: "whatsapp",
                question: text,
                order_page: None,
            },
        )
        .await;
        if !state_clone.whatsapp.is_configured() {
            debug!("outbound whatsapp not configured, reply dropped");
            return;
        }
        if let Err(err) = state_clone.whatsapp.send_text(&to, &outcome.response).await {
            warn!(error = %err, "whatsapp reply could not be delivered");
        }
    });

    Ok((
        StatusCode::OK,
        Json(json!({ "received": true, "processed": 1 })),
    ))
}

async fn get_session(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let Some(handle) = state.sessions.get(&session_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "session not found" })),
        )
            .into_response();
    };
    let session = handle.lock().await;
    Json(json!({
        "sessionId": session.id,
        "userId": session.user_id,
        "createdAt": session.created_at,
        "lastActivity": session.metadata.last_activity,
        "orderPage": session.metadata.order_page,
        "currentOrdersCount": session.metadata.current_orders.len(),
        "productInterest": session.metadata.product_interest,
        "requirements": session.metadata.requirements,
        "messageCount": session.messages.len(),
    }))
    .into_response()
}

async fn delete_session(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let deleted = state.sessions.delete(&session_id).await;
    Json(json!({ "success": true, "deleted": deleted }))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(post_chat))
        .route("/api/existing-order/health", get(order_health))
        .route("/api/existing-order/status", post(post_existing_order_status))
        .route("/webhook/botspace", post(botspace_webhook))
        .route(
            "/api/session/{session_id}",
            get(get_session).delete(delete_session),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("print_support_bot=info,tower_http=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub async fn run() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env();
    let addr = config.bind_addr();
    let state = Arc::new(build_state(config));

    spawn_session_sweeper(
        state.sessions.clone(),
        state.config.session_ttl,
        state.config.session_sweep_every,
    );
    if !state.llm.is_configured() {
        warn!("OPENAI_API_KEY not set; non-order questions get a canned reply");
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind TCP listener");

    info!("order status bot running at http://{addr}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failure");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_mentions_set_interest_and_requirements() {
        let mut session = Session::new("s-1", "u-1");
        note_customer_interest(&mut session.metadata, "Hi there");
        assert_eq!(session.metadata.product_interest, None);

        note_customer_interest(&mut session.metadata, "Do you print Business Cards?");
        assert_eq!(session.metadata.product_interest.as_deref(), Some("visiting cards"));
        assert!(session.metadata.requirements.is_empty());

        note_customer_interest(&mut session.metadata, "I need 500 flyers in A5");
        note_customer_interest(&mut session.metadata, "I need 500 flyers in A5");
        assert_eq!(session.metadata.product_interest.as_deref(), Some("flyers"));
        assert_eq!(session.metadata.requirements, ["I need 500 flyers in A5"]);
    }

    #[test]
    fn requirements_are_bounded() {
        let mut session = Session::new("s-1", "u-1");
        for qty in 0..15 {
            note_customer_interest(&mut session.metadata, &format!("{qty} posters please"));
        }
        assert_eq!(session.metadata.requirements.len(), MAX_REQUIREMENTS);
        assert_eq!(session.metadata.requirements[0], "5 posters please");
    }

    #[test]
    fn history_keeps_the_most_recent_turns() {
        let mut session = Session::new("s-1", "u-1");
        for i in 0..25 {
            push_turn(&mut session, "user", &i.to_string());
        }
        assert_eq!(session.messages.len(), MAX_HISTORY_TURNS);
        assert_eq!(session.messages[0].content, "5");
    }
}
