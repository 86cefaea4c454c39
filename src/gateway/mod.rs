//! Client for the external payment provider.
//!
//! Checkout creates a redirect session carrying `{order_id, payment_id,
//! user_id}` as opaque metadata; the provider round-trips that metadata
//! unchanged, so a later stateless confirmation call can recover the full
//! context from the session alone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

/// Reconciliation context embedded in a gateway session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub order_id: Uuid,
    pub payment_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewGatewaySession {
    pub amount: i64,
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySession {
    pub id: String,
    pub redirect_url: String,
    pub status: String,
    pub transaction_ref: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl GatewaySession {
    pub fn is_settled(&self) -> bool {
        self.status == "settled"
    }

    /// Read back the reconciliation metadata the session was created with.
    pub fn metadata(&self) -> AppResult<SessionMetadata> {
        let raw = self
            .metadata
            .clone()
            .ok_or_else(|| AppError::BadRequest("session metadata missing".to_string()))?;
        serde_json::from_value(raw)
            .map_err(|_| AppError::BadRequest("session metadata missing".to_string()))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, new: NewGatewaySession) -> AppResult<GatewaySession>;
    async fn fetch_session(&self, session_id: &str) -> AppResult<GatewaySession>;
}

/// Production implementation speaking HTTP to the provider.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    currency: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.gateway_base_url.trim_end_matches('/').to_string(),
            api_key: config.gateway_api_key.clone(),
            currency: config.gateway_currency.clone(),
        }
    }

    async fn parse_session(response: reqwest::Response) -> AppResult<GatewaySession> {
        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "provider returned {}",
                response.status()
            )));
        }
        response
            .json::<GatewaySession>()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_session(&self, new: NewGatewaySession) -> AppResult<GatewaySession> {
        let body = serde_json::json!({
            "amount": new.amount,
            "currency": self.currency,
            "metadata": new.metadata,
        });
        let response = self
            .client
            .post(format!("{}/v1/checkout-sessions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;
        Self::parse_session(response).await
    }

    async fn fetch_session(&self, session_id: &str) -> AppResult<GatewaySession> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout-sessions/{session_id}",
                self.base_url
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;
        Self::parse_session(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(metadata: Option<serde_json::Value>) -> GatewaySession {
        GatewaySession {
            id: "cs_test".into(),
            redirect_url: "https://pay.example/cs_test".into(),
            status: "settled".into(),
            transaction_ref: Some("txn_1".into()),
            metadata,
        }
    }

    #[test]
    fn metadata_round_trips_through_the_session() {
        let meta = SessionMetadata {
            order_id: Uuid::new_v4(),
            payment_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };
        let raw = serde_json::to_value(&meta).unwrap();
        let parsed = session(Some(raw)).metadata().unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn missing_metadata_is_a_validation_error() {
        let err = session(None).metadata().unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn partial_metadata_is_a_validation_error() {
        let raw = serde_json::json!({ "order_id": Uuid::new_v4() });
        let err = session(Some(raw)).metadata().unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn only_settled_sessions_settle() {
        let mut s = session(None);
        assert!(s.is_settled());
        s.status = "open".into();
        assert!(!s.is_settled());
    }
}
