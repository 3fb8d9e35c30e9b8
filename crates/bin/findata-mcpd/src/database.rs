use findata_core::store::StoreResult;
use findata_core::store::surreal::SurrealRecordStore;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::config::FindataConfig;

/// Connects to the configured store, selects the namespace and database, and
/// defines the indexes the operations rely on.
pub async fn connect(config: &FindataConfig) -> StoreResult<SurrealRecordStore<Any>> {
    let db = any::connect(config.db_endpoint.as_str()).await?;

    if let (Some(username), Some(password)) =
        (config.db_username.as_ref(), config.db_password.as_ref())
    {
        db.signin(Root {
            username: username.as_str(),
            password: password.as_str(),
        })
        .await?;
    }

    db.use_ns(config.db_namespace.as_str())
        .use_db(config.db_name.as_str())
        .await?;

    let store = SurrealRecordStore::new(db);
    store.ensure_schema().await?;
    info!(
        endpoint = %config.db_endpoint,
        namespace = %config.db_namespace,
        database = %config.db_name,
        "store ready"
    );
    Ok(store)
}
