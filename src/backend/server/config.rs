/**
 * Server Configuration
 *
 * Opens the optional MongoDB store named by the configuration.
 *
 * # Error Handling
 *
 * A missing or unusable URI is logged but never prevents startup; the
 * server then runs with real-time updates disabled. Unreachable servers are
 * not detected here: the supervisor finds out on its first connect.
 */

use crate::backend::store::MongoStore;
use crate::shared::LiveConfig;

/// Store configuration result
///
/// `None` when no store is configured or its URI is unusable.
pub type StoreConfig = Option<MongoStore>;

/// Connect to the store named by `config.mongodb_uri`
pub async fn load_store(config: &LiveConfig) -> StoreConfig {
    let Some(uri) = config.mongodb_uri.as_deref() else {
        tracing::warn!("[Startup] MONGODB_URI not set. Real-time updates will be disabled.");
        return None;
    };

    tracing::info!("[Startup] Connecting to database {}...", config.database);
    match MongoStore::connect(uri, &config.database).await {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::error!("[Startup] Invalid MongoDB configuration: {}", e);
            tracing::warn!("[Startup] Real-time updates will be disabled.");
            None
        }
    }
}
