use anyhow::{Context, Result};
use axum::http::{header, request::Parts, HeaderValue, Method};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub cors: CorsPolicy,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .context("DATABASE_URL is required")?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("PORT must be a valid port number")?;

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DB_MAX_CONNECTIONS must be a positive integer")?;

        let cors = CorsPolicy::from_origins(&env::var("FRONTEND_ORIGINS").unwrap_or_default());

        Ok(Self {
            database_url,
            port,
            db_max_connections,
            cors,
        })
    }
}

/// Which browser origins may call the API.
///
/// Local development origins are always accepted. With an explicit list every other origin
/// must match exactly; without one everything is accepted.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed: Option<Vec<String>>,
}

impl CorsPolicy {
    pub fn allow_all() -> Self {
        Self { allowed: None }
    }

    /// Parse a comma-separated `FRONTEND_ORIGINS` value. Blank entries are ignored.
    pub fn from_origins(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::allow_all();
        }
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            allowed: Some(origins),
        }
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        if origin.starts_with("http://localhost") || origin.starts_with("http://127.0.0.1") {
            return true;
        }
        match &self.allowed {
            Some(list) => list.iter().any(|allowed| allowed == origin),
            None => true,
        }
    }

    pub fn into_layer(self) -> CorsLayer {
        let policy = Arc::new(self);
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _parts: &Parts| {
                    origin
                        .to_str()
                        .map(|o| policy.origin_allowed(o))
                        .unwrap_or(false)
                },
            ))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::ORIGIN,
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::AUTHORIZATION,
            ])
            .expose_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(Duration::from_secs(12 * 60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localhost_always_allowed() {
        let policy = CorsPolicy::from_origins("https://terminal.example.com");
        assert!(policy.origin_allowed("http://localhost:3000"));
        assert!(policy.origin_allowed("http://127.0.0.1:3001"));
    }

    #[test]
    fn test_explicit_list_is_exact() {
        let policy = CorsPolicy::from_origins(" https://a.example.com ,,https://b.example.com");
        assert!(policy.origin_allowed("https://a.example.com"));
        assert!(policy.origin_allowed("https://b.example.com"));
        assert!(!policy.origin_allowed("https://a.example.com.evil.net"));
        assert!(!policy.origin_allowed("http://100.126.6.58:3000"));
    }

    #[test]
    fn test_no_list_allows_everything() {
        let policy = CorsPolicy::from_origins("");
        assert!(policy.origin_allowed("http://100.126.6.58:3000"));
    }
}
