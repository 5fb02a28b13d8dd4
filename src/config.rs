use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Which `UserRepository` backs the running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreKind,
    pub database_url: String,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("STORE").as_deref() {
            Ok("memory") => StoreKind::Memory,
            _ => StoreKind::Postgres,
        };
        let database_url = match store {
            StoreKind::Postgres => std::env::var("DATABASE_URL")?,
            StoreKind::Memory => std::env::var("DATABASE_URL").unwrap_or_default(),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "chirp".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "chirp-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };
        Ok(Self {
            store,
            database_url,
            jwt,
        })
    }

    /// In-memory configuration with a fixed signing secret, for tests and demos.
    pub fn in_memory(secret: &str) -> Self {
        Self {
            store: StoreKind::Memory,
            database_url: String::new(),
            jwt: JwtConfig {
                secret: secret.into(),
                issuer: "chirp".into(),
                audience: "chirp-users".into(),
                ttl_minutes: 5,
            },
        }
    }
}
