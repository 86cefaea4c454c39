use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub gateway_base_url: String,
    pub gateway_api_key: String,
    pub gateway_currency: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let gateway_base_url = env::var("PAYMENT_GATEWAY_URL")
            .unwrap_or_else(|_| "http://localhost:9400".to_string());
        let gateway_api_key = env::var("PAYMENT_GATEWAY_API_KEY").unwrap_or_default();
        let gateway_currency =
            env::var("PAYMENT_GATEWAY_CURRENCY").unwrap_or_else(|_| "usd".to_string());
        Ok(Self {
            port,
            database_url,
            host,
            gateway_base_url,
            gateway_api_key,
            gateway_currency,
        })
    }
}
