use std::{env, sync::Arc};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// This struct holds all the necessary configuration parameters
/// required to initialize and run the server: database connection details,
/// JWT configuration, server host and port, number of worker threads,
/// CORS settings, logging preferences, the payment webhook secret
/// and the schedule of the periodic sweepers.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// Configuration for JWT (JSON Web Token) authentication.
    pub jwt_config: JwtConfig,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// Stripe webhook secret
    pub stripe_webhook_secret: String,
    /// Periodic sweeper settings.
    pub sweepers: SweeperConfig,
}

#[derive(Clone, Debug)]
/// Configuration for JSON Web Token (JWT) authentication.
///
/// This struct contains the secret key used to verify JWTs and
/// the expiration time in hours for issued tokens.
pub struct JwtConfig {
    /// The secret key used to sign and verify JWTs.
    pub secret: String,
    /// The expiration time for JWTs in hours.
    pub expiration_hours: i64,
}

#[derive(Clone, Debug)]
/// How often each sweeper runs and how long idle sessions are kept.
pub struct SweeperConfig {
    /// Whether the in-process scheduler is started at all.
    pub enabled: bool,
    pub cooling_interval_secs: u64,
    pub monthly_interval_secs: u64,
    pub stale_interval_secs: u64,
    pub trial_interval_secs: u64,
    /// Open sessions without activity for this many days are deleted.
    pub session_retention_days: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        SweeperConfig {
            enabled: true,
            cooling_interval_secs: 60 * 60,
            monthly_interval_secs: 24 * 60 * 60,
            stale_interval_secs: 24 * 60 * 60,
            trial_interval_secs: 60 * 60,
            session_retention_days: 30,
        }
    }
}

impl JwtConfig {
    /// Creates a new `JwtConfig` instance from environment variables.
    ///
    /// Reads the JWT configuration from environment variables:
    /// - `JWT_SECRET`: Required. The secret key for JWT verification.
    /// - `JWT_EXPIRATION_HOURS`: Optional. Defaults to 24 hours if not provided.
    ///
    /// # Panics
    ///
    /// This function will panic if:
    /// - `JWT_SECRET` environment variable is not set
    /// - `JWT_EXPIRATION_HOURS` is set but cannot be parsed as a valid number
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        JwtConfig {
            secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a valid number"),
        }
    }
}

impl SweeperConfig {
    /// Reads sweeper settings, falling back to the defaults for anything
    /// missing or unparsable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = SweeperConfig::default();

        SweeperConfig {
            enabled: env::var("SWEEPERS_ENABLED")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(defaults.enabled),
            cooling_interval_secs: env_or("COOLING_SWEEP_INTERVAL_SECS", defaults.cooling_interval_secs),
            monthly_interval_secs: env_or("MONTHLY_SWEEP_INTERVAL_SECS", defaults.monthly_interval_secs),
            stale_interval_secs: env_or("STALE_SWEEP_INTERVAL_SECS", defaults.stale_interval_secs),
            trial_interval_secs: env_or("TRIAL_SWEEP_INTERVAL_SECS", defaults.trial_interval_secs),
            session_retention_days: env_or("SESSION_RETENTION_DAYS", defaults.session_retention_days),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `ENVIRONMENT`: `development` or `production`
    /// - `DATABASE_URL`: Connection string for the database
    /// - `JWT_SECRET`: Secret key for JWT verification (via `JwtConfig::from_env()`)
    ///
    /// Optional (with defaults):
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 8080)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Allowed CORS origin (default: "http://localhost:3000")
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `STRIPE_WEBHOOK_SECRET`: Secret used to verify webhook signatures (default: empty)
    /// - Sweeper settings (see `SweeperConfig::from_env`)
    ///
    /// # Panics
    ///
    /// This function will panic if required environment variables are missing.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").expect("ENVIRONMENT must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_config: JwtConfig::from_env(),
            server_host: env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env_or("PORT", 8080),
            num_workers: env_or("WORKERS", 4),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            sweepers: SweeperConfig::from_env(),
        })
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
