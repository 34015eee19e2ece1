use std::env;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Which payment gateway implementation to wire up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Razorpay,
    Mock,
}

impl GatewayKind {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "razorpay" => Ok(GatewayKind::Razorpay),
            "mock" => Ok(GatewayKind::Mock),
            _ => Err(format!(
                "Invalid PAYMENT_GATEWAY: {}. Must be one of: [\"razorpay\", \"mock\"]",
                s
            )),
        }
    }
}

/// Payment gateway configuration
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub gateway: GatewayKind,
    pub key_id: String,
    /// Shared secret used for order/refund API auth and client callback signatures
    pub key_secret: String,
    /// Secret used to sign webhook bodies
    pub webhook_secret: String,
    pub api_base_url: String,
    pub currency: String,
    pub timeout_secs: u64,
}

/// Bearer token configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_ttl_secs: i64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub payment: PaymentConfig,
    pub auth: AuthConfig,
    pub log_level: String,
    pub http_port: u16,
    pub ws_port: Option<u16>,
    pub environment: String,
    /// Whether a refund also rolls back the enrollment and frees its seat
    pub refund_releases_seat: bool,
    pub audit_log_dir: String,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env_parse::<u32>("DATABASE_MAX_CONNECTIONS").unwrap_or(10);
        let acquire_timeout_secs = env_parse::<u64>("DATABASE_ACQUIRE_TIMEOUT_SECS").unwrap_or(30);
        let idle_timeout_secs = env_parse::<u64>("DATABASE_IDLE_TIMEOUT_SECS").unwrap_or(600); // 10 minutes
        let max_lifetime_secs = env_parse::<u64>("DATABASE_MAX_LIFETIME_SECS").unwrap_or(1800); // 30 minutes
        let test_before_acquire = env_parse::<bool>("DATABASE_TEST_BEFORE_ACQUIRE").unwrap_or(true);

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/eventhub".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl PaymentConfig {
    /// Create payment config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let gateway = GatewayKind::from_str(
            &env::var("PAYMENT_GATEWAY").unwrap_or_else(|_| "razorpay".to_string()),
        )?;

        let key_id = env::var("PAYMENT_KEY_ID").unwrap_or_default();
        let key_secret = env::var("PAYMENT_KEY_SECRET").unwrap_or_default();
        let webhook_secret = env::var("PAYMENT_WEBHOOK_SECRET").unwrap_or_default();

        let api_base_url = env::var("PAYMENT_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.razorpay.com".to_string());

        let currency = env::var("PAYMENT_CURRENCY")
            .unwrap_or_else(|_| "INR".to_string())
            .to_uppercase();

        let timeout_secs = env_parse::<u64>("PAYMENT_TIMEOUT_SECS").unwrap_or(10);

        if gateway == GatewayKind::Razorpay && key_id.is_empty() {
            return Err("PAYMENT_KEY_ID is required when PAYMENT_GATEWAY=razorpay".to_string());
        }

        // Both signature paths are meaningless with an empty key
        if key_secret.is_empty() {
            return Err("PAYMENT_KEY_SECRET environment variable is required".to_string());
        }

        if webhook_secret.is_empty() {
            return Err("PAYMENT_WEBHOOK_SECRET environment variable is required".to_string());
        }

        if currency.len() != 3 {
            return Err(format!("Invalid PAYMENT_CURRENCY: {}", currency));
        }

        if timeout_secs == 0 {
            return Err("PAYMENT_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            gateway,
            key_id,
            key_secret,
            webhook_secret,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            currency,
            timeout_secs,
        })
    }

    /// Get gateway call timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayKind::Mock,
            key_id: "rzp_test_key".to_string(),
            key_secret: "test_key_secret".to_string(),
            webhook_secret: "test_webhook_secret".to_string(),
            api_base_url: "https://api.razorpay.com".to_string(),
            currency: "INR".to_string(),
            timeout_secs: 10,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, String> {
        let token_secret = env::var("AUTH_TOKEN_SECRET")
            .map_err(|_| "AUTH_TOKEN_SECRET environment variable is required")?;

        if token_secret.len() < 16 {
            return Err("AUTH_TOKEN_SECRET must be at least 16 characters".to_string());
        }

        let token_ttl_secs = env_parse::<i64>("AUTH_TOKEN_TTL_SECS").unwrap_or(86_400);
        if token_ttl_secs <= 0 {
            return Err("AUTH_TOKEN_TTL_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            token_secret,
            token_ttl_secs,
        })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: "development_token_secret".to_string(),
            token_ttl_secs: 86_400,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let payment = PaymentConfig::from_env()?;
        let auth = AuthConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        let http_port = env_parse::<u16>("HTTP_PORT").unwrap_or(8080);

        let ws_port = env_parse::<u16>("WS_PORT");

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string());

        let refund_releases_seat = env_parse::<bool>("REFUND_RELEASES_SEAT").unwrap_or(true);

        let audit_log_dir = env::var("AUDIT_LOG_DIR").unwrap_or_else(|_| "./logs".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        if ws_port == Some(http_port) {
            return Err("WS_PORT must differ from HTTP_PORT".to_string());
        }

        if environment.to_lowercase() == "production" && payment.gateway == GatewayKind::Mock {
            return Err("PAYMENT_GATEWAY=mock is not allowed in production".to_string());
        }

        Ok(Self {
            database,
            payment,
            auth,
            log_level: log_level.to_lowercase(),
            http_port,
            ws_port,
            environment: environment.to_lowercase(),
            refund_releases_seat,
            audit_log_dir,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            payment: PaymentConfig::default(),
            auth: AuthConfig::default(),
            log_level: "info".to_string(),
            http_port: 8080,
            ws_port: None,
            environment: "development".to_string(),
            refund_releases_seat: true,
            audit_log_dir: "./logs".to_string(),
        }
    }
}
