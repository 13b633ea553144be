//! Asset metadata storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{Asset, AssetCatalog, AssetId, MetadataStore},
};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};
use std::path::PathBuf;
use tracing::debug;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        id TEXT PRIMARY KEY,
        file_path TEXT NOT NULL,
        byte_size INTEGER NOT NULL,
        mime_type TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        public_url TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS asset_meta (
        asset_id TEXT NOT NULL,
        field TEXT NOT NULL,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (asset_id, field)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_asset_meta_field_value ON asset_meta (field, value)",
    r#"
    CREATE TABLE IF NOT EXISTS options (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
];

/// SQLite-backed asset catalog and metadata store
///
/// Holds three tables:
/// - `assets`: the host's video records, written by the host via [`register_asset`]
/// - `asset_meta`: one row per (asset, field), single-field upserts
/// - `options`: global key/value options
///
/// [`register_asset`]: SqliteMetadataStore::register_asset
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Open (or create) the store at the given database path
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(BridgeError::Io)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to connect to DB: {}", e)))?;

        Self::migrate(&pool).await?;
        debug!(path = ?db_path, "Initialized metadata store");

        Ok(Self { pool })
    }

    /// Create an in-memory store (for testing)
    ///
    /// Limited to one connection: every new `sqlite::memory:` connection
    /// would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to connect to DB: {}", e)))?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|e| BridgeError::Store(format!("Failed to create schema: {}", e)))?;
        }
        Ok(())
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    fn limit(limit: usize) -> i64 {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }

    fn ids(rows: Vec<SqliteRow>) -> Vec<AssetId> {
        rows.into_iter()
            .map(|row| AssetId::new(row.get::<String, _>(0)))
            .collect()
    }

    /// Insert or replace a host asset record
    pub async fn register_asset(&self, asset: &Asset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO assets (id, file_path, byte_size, mime_type, title, description, public_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                file_path = excluded.file_path,
                byte_size = excluded.byte_size,
                mime_type = excluded.mime_type,
                title = excluded.title,
                description = excluded.description,
                public_url = excluded.public_url,
                created_at = excluded.created_at
            "#,
        )
        .bind(asset.id.as_str())
        .bind(asset.file_path.to_string_lossy().into_owned())
        .bind(i64::try_from(asset.byte_size).unwrap_or(i64::MAX))
        .bind(&asset.mime_type)
        .bind(&asset.title)
        .bind(&asset.description)
        .bind(asset.public_url.as_deref())
        .bind(asset.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Store(format!("Failed to register asset: {}", e)))?;

        debug!(asset_id = %asset.id, "Registered asset");
        Ok(())
    }

    /// Remove a host asset record; its metadata rows are left for the sync
    /// core to clean up.
    pub async fn remove_asset(&self, asset_id: &AssetId) -> Result<()> {
        sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(asset_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to remove asset: {}", e)))?;
        Ok(())
    }

    fn row_to_asset(row: &SqliteRow) -> Result<Asset> {
        let created_millis: i64 = row.get("created_at");
        let created_at = DateTime::<Utc>::from_timestamp_millis(created_millis).ok_or_else(|| {
            BridgeError::Store(format!("Invalid created_at value: {}", created_millis))
        })?;
        let byte_size: i64 = row.get("byte_size");

        Ok(Asset {
            id: AssetId::new(row.get::<String, _>("id")),
            file_path: PathBuf::from(row.get::<String, _>("file_path")),
            byte_size: u64::try_from(byte_size).unwrap_or(0),
            mime_type: row.get("mime_type"),
            title: row.get("title"),
            description: row.get("description"),
            public_url: row.get("public_url"),
            created_at,
        })
    }
}

#[async_trait]
impl AssetCatalog for SqliteMetadataStore {
    async fn get_asset(&self, asset_id: &AssetId) -> Result<Option<Asset>> {
        let row = sqlx::query(
            "SELECT id, file_path, byte_size, mime_type, title, description, public_url, created_at \
             FROM assets WHERE id = ?",
        )
        .bind(asset_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BridgeError::Store(format!("Failed to load asset: {}", e)))?;

        row.as_ref().map(Self::row_to_asset).transpose()
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get(&self, asset_id: &AssetId, field: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM asset_meta WHERE asset_id = ? AND field = ?")
            .bind(asset_id.as_str())
            .bind(field)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to get metadata: {}", e)))?;

        Ok(row.map(|row| row.get(0)))
    }

    async fn set(&self, asset_id: &AssetId, field: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO asset_meta (asset_id, field, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(asset_id, field) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(asset_id.as_str())
        .bind(field)
        .bind(value)
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Store(format!("Failed to set metadata: {}", e)))?;

        debug!(asset_id = %asset_id, field, "Stored metadata field");
        Ok(())
    }

    async fn delete(&self, asset_id: &AssetId, field: &str) -> Result<()> {
        sqlx::query("DELETE FROM asset_meta WHERE asset_id = ? AND field = ?")
            .bind(asset_id.as_str())
            .bind(field)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to delete metadata: {}", e)))?;
        Ok(())
    }

    async fn list_by_value(
        &self,
        field: &str,
        values: &[&str],
        limit: usize,
    ) -> Result<Vec<AssetId>> {
        if values.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "SELECT m.asset_id FROM asset_meta m \
             LEFT JOIN assets a ON a.id = m.asset_id \
             WHERE m.field = ? AND m.value IN ({}) \
             ORDER BY a.created_at, m.asset_id LIMIT ?",
            placeholders
        );

        let mut query = sqlx::query(&sql).bind(field);
        for value in values {
            query = query.bind(*value);
        }

        let rows = query
            .bind(Self::limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to list assets: {}", e)))?;

        Ok(Self::ids(rows))
    }

    async fn list_missing(&self, field: &str, limit: usize) -> Result<Vec<AssetId>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id FROM assets a
            LEFT JOIN asset_meta m ON m.asset_id = a.id AND m.field = ?
            WHERE a.mime_type LIKE 'video/%' AND (m.value IS NULL OR m.value = '')
            ORDER BY a.created_at, a.id
            LIMIT ?
            "#,
        )
        .bind(field)
        .bind(Self::limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::Store(format!("Failed to list assets: {}", e)))?;

        Ok(Self::ids(rows))
    }

    async fn list_with(&self, field: &str, limit: usize) -> Result<Vec<AssetId>> {
        let rows = sqlx::query(
            "SELECT asset_id FROM asset_meta WHERE field = ? AND value != '' \
             ORDER BY asset_id LIMIT ?",
        )
        .bind(field)
        .bind(Self::limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::Store(format!("Failed to list assets: {}", e)))?;

        Ok(Self::ids(rows))
    }

    async fn delete_everywhere(&self, field: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM asset_meta WHERE field = ?")
            .bind(field)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to clear field: {}", e)))?;

        debug!(field, rows = result.rows_affected(), "Cleared metadata field");
        Ok(result.rows_affected())
    }

    async fn get_option(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM options WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to get option: {}", e)))?;

        Ok(row.map(|row| row.get(0)))
    }

    async fn set_option(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO options (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Store(format!("Failed to set option: {}", e)))?;
        Ok(())
    }

    async fn delete_option(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM options WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to delete option: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn asset(id: &str, mime_type: &str, age_minutes: i64) -> Asset {
        Asset {
            id: AssetId::new(id),
            file_path: PathBuf::from(format!("/media/{}.mp4", id)),
            byte_size: 2048,
            mime_type: mime_type.to_string(),
            title: format!("Asset {}", id),
            description: String::new(),
            public_url: None,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[tokio::test]
    async fn test_field_operations() {
        let store = SqliteMetadataStore::in_memory().await.unwrap();
        let id = AssetId::new("1");

        store.set(&id, "status", "queued").await.unwrap();
        assert_eq!(store.get(&id, "status").await.unwrap(), Some("queued".to_string()));

        store.set(&id, "status", "uploading").await.unwrap();
        assert_eq!(
            store.get(&id, "status").await.unwrap(),
            Some("uploading".to_string())
        );

        store.delete(&id, "status").await.unwrap();
        assert_eq!(store.get(&id, "status").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_asset_round_trip() {
        let store = SqliteMetadataStore::in_memory().await.unwrap();
        let original = asset("9", "video/mp4", 5);

        store.register_asset(&original).await.unwrap();
        let loaded = store.get_asset(&original.id).await.unwrap().unwrap();

        assert_eq!(loaded.file_path, original.file_path);
        assert_eq!(loaded.byte_size, 2048);
        assert_eq!(
            loaded.created_at.timestamp_millis(),
            original.created_at.timestamp_millis()
        );

        store.remove_asset(&original.id).await.unwrap();
        assert!(store.get_asset(&original.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_value_orders_by_asset_age() {
        let store = SqliteMetadataStore::in_memory().await.unwrap();
        store.register_asset(&asset("new", "video/mp4", 1)).await.unwrap();
        store.register_asset(&asset("old", "video/mp4", 60)).await.unwrap();
        store.register_asset(&asset("done", "video/mp4", 30)).await.unwrap();

        store.set(&AssetId::new("new"), "status", "uploading").await.unwrap();
        store.set(&AssetId::new("old"), "status", "queued").await.unwrap();
        store.set(&AssetId::new("done"), "status", "ready").await.unwrap();

        let active = store
            .list_by_value("status", &["queued", "uploading", "processing"], 10)
            .await
            .unwrap();
        assert_eq!(active, vec![AssetId::new("old"), AssetId::new("new")]);

        let limited = store
            .list_by_value("status", &["queued", "uploading"], 1)
            .await
            .unwrap();
        assert_eq!(limited, vec![AssetId::new("old")]);
    }

    #[tokio::test]
    async fn test_list_missing_skips_non_video_and_synced() {
        let store = SqliteMetadataStore::in_memory().await.unwrap();
        store.register_asset(&asset("a", "video/mp4", 10)).await.unwrap();
        store.register_asset(&asset("b", "video/webm", 5)).await.unwrap();
        store.register_asset(&asset("c", "image/png", 3)).await.unwrap();
        store.register_asset(&asset("d", "video/mp4", 1)).await.unwrap();

        store.set(&AssetId::new("a"), "remote_uri", "/videos/1").await.unwrap();
        store.set(&AssetId::new("b"), "remote_uri", "").await.unwrap();

        let missing = store.list_missing("remote_uri", 10).await.unwrap();
        assert_eq!(missing, vec![AssetId::new("b"), AssetId::new("d")]);

        let with_remote = store.list_with("remote_uri", 10).await.unwrap();
        assert_eq!(with_remote, vec![AssetId::new("a")]);
    }

    #[tokio::test]
    async fn test_delete_everywhere() {
        let store = SqliteMetadataStore::in_memory().await.unwrap();
        store.set(&AssetId::new("1"), "status", "ready").await.unwrap();
        store.set(&AssetId::new("2"), "status", "error").await.unwrap();
        store.set(&AssetId::new("2"), "last_error", "boom").await.unwrap();

        assert_eq!(store.delete_everywhere("status").await.unwrap(), 2);
        assert!(store.list_with("status", 10).await.unwrap().is_empty());
        assert_eq!(
            store.get(&AssetId::new("2"), "last_error").await.unwrap(),
            Some("boom".to_string())
        );
    }

    #[tokio::test]
    async fn test_options() {
        let store = SqliteMetadataStore::in_memory().await.unwrap();

        assert_eq!(store.get_option("container_uri").await.unwrap(), None);
        store
            .set_option("container_uri", "/users/1/projects/2")
            .await
            .unwrap();
        assert_eq!(
            store.get_option("container_uri").await.unwrap(),
            Some("/users/1/projects/2".to_string())
        );
        store.delete_option("container_uri").await.unwrap();
        assert_eq!(store.get_option("container_uri").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_backed_store_creates_database() {
        let dir = std::env::temp_dir().join(format!("media-sync-store-{}", std::process::id()));
        let path = dir.join("nested").join("sync.db");

        let store = SqliteMetadataStore::new(path.clone()).await.unwrap();
        store.set_option("probe", "1").await.unwrap();
        assert!(path.exists());

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
