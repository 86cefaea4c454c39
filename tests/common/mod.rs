#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

use axum_retail_api::{
    db::{DbPool, OrmConn, create_orm_conn, create_pool, run_migrations},
    error::{AppError, AppResult},
    gateway::{GatewaySession, NewGatewaySession, PaymentGateway},
    middleware::auth::AuthUser,
    models::Notification,
    notifier::NotificationBus,
    state::AppState,
};

static HANDLES: OnceCell<(DbPool, OrmConn)> = OnceCell::const_new();

/// Connect to the test database, or return None (with a notice) when the
/// environment provides no database to run against. The connection handles
/// are shared across the binary; the bus and gateway are fresh per test so
/// parallel tests stay isolated.
pub async fn try_setup_state() -> anyhow::Result<Option<(AppState, Arc<StubGateway>)>> {
    let url = match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let (pool, orm) = HANDLES
        .get_or_try_init(|| async {
            let pool = create_pool(&url).await?;
            let orm = create_orm_conn(&url).await?;
            run_migrations(&orm).await?;
            Ok::<_, anyhow::Error>((pool, orm))
        })
        .await?
        .clone();

    let gateway = Arc::new(StubGateway::default());
    let state = AppState {
        pool,
        orm,
        bus: NotificationBus::new(),
        gateway: gateway.clone(),
    };
    Ok(Some((state, gateway)))
}

/// Every test seeds its own rows with unique keys, so parallel tests never
/// step on each other and no truncation is needed.
pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, role) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("{id}@example.com"))
        .bind(role)
        .execute(&state.pool)
        .await?;
    Ok(AuthUser {
        user_id: id,
        role: role.into(),
    })
}

/// Seed a product with one variant and return the variant id.
pub async fn seed_variant(state: &AppState, name: &str, base_price: i64) -> anyhow::Result<Uuid> {
    let product_id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, name, description, base_price) VALUES ($1, $2, $3, $4)")
        .bind(product_id)
        .bind(format!("{name} {product_id}"))
        .bind(Some("test product"))
        .bind(base_price)
        .execute(&state.pool)
        .await?;

    let variant_id = Uuid::new_v4();
    sqlx::query("INSERT INTO product_variants (id, product_id, sku) VALUES ($1, $2, $3)")
        .bind(variant_id)
        .bind(product_id)
        .bind(format!("SKU-{variant_id}"))
        .execute(&state.pool)
        .await?;

    Ok(variant_id)
}

pub async fn cart_row_count(state: &AppState, user: &AuthUser) -> anyhow::Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(count.0)
}

pub async fn notifications_for(
    state: &AppState,
    user_id: Uuid,
    message_prefix: &str,
) -> anyhow::Result<Vec<Notification>> {
    let rows: Vec<Notification> = sqlx::query_as(
        "SELECT * FROM notifications WHERE user_id = $1 AND message LIKE $2 ORDER BY created_at",
    )
    .bind(user_id)
    .bind(format!("{message_prefix}%"))
    .fetch_all(&state.pool)
    .await?;
    Ok(rows)
}

/// In-memory stand-in for the payment provider. Sessions are created open
/// and settle only when a test says so.
#[derive(Default)]
pub struct StubGateway {
    sessions: Mutex<HashMap<String, GatewaySession>>,
    last_session: Mutex<Option<String>>,
    counter: AtomicU64,
    pub fail_create: AtomicBool,
}

impl StubGateway {
    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub async fn last_session_id(&self) -> Option<String> {
        self.last_session.lock().await.clone()
    }

    pub async fn session(&self, session_id: &str) -> Option<GatewaySession> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    pub async fn settle(&self, session_id: &str) {
        if let Some(session) = self.sessions.lock().await.get_mut(session_id) {
            session.status = "settled".into();
            session.transaction_ref = Some(format!("txn-{session_id}"));
        }
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_session(&self, new: NewGatewaySession) -> AppResult<GatewaySession> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(AppError::Gateway("provider unavailable".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("sess-{n}");
        let session = GatewaySession {
            id: id.clone(),
            redirect_url: format!("https://pay.example/{id}"),
            status: "open".into(),
            transaction_ref: None,
            metadata: Some(serde_json::to_value(&new.metadata).expect("metadata serializes")),
        };
        self.sessions.lock().await.insert(id.clone(), session.clone());
        *self.last_session.lock().await = Some(id);
        Ok(session)
    }

    async fn fetch_session(&self, session_id: &str) -> AppResult<GatewaySession> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::Gateway("unknown session".into()))
    }
}
