//! Application state

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::cart::CartService;
use crate::config::Config;
use crate::live::NotificationHub;
use crate::orders::OrderService;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection pool
    pub pool: SqlitePool,
    /// In-process pub/sub fabric for order events
    pub hub: NotificationHub,
    /// JWT secret for staff authentication
    pub jwt_secret: String,
    /// Fallback preparation time (minutes)
    pub default_prep_minutes: i64,
}

impl AppState {
    /// Create a new AppState, connecting and migrating the database
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self::with_pool(
            pool,
            &config.jwt_secret,
            config.default_prep_minutes,
        ))
    }

    /// Assemble state around an existing pool (used by integration tests)
    pub fn with_pool(pool: SqlitePool, jwt_secret: &str, default_prep_minutes: i64) -> Self {
        Self {
            pool,
            hub: NotificationHub::new(),
            jwt_secret: jwt_secret.to_string(),
            default_prep_minutes,
        }
    }

    pub fn order_service(&self) -> OrderService {
        OrderService::new(self.pool.clone(), self.hub.clone(), self.default_prep_minutes)
    }

    pub fn cart_service(&self) -> CartService {
        CartService::new(self.pool.clone(), self.order_service())
    }
}
