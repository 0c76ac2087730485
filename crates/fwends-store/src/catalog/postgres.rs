//! PostgreSQL pack catalog.
//!
//! All functions bind ids as `BIGINT`. Slot identifiers are compared under
//! the `"C"` collation (see the migration), so `ORDER BY role_id, string_id`
//! yields byte order and the digest computed here matches [`PackHasher`]
//! over the same pairs anywhere else.

use async_trait::async_trait;
use fwends_core::{
    PackDigest, PackHasher, PackId, PackTitle, ResourceClass, ResourceId, RoleId, SlotKey,
    StringId, ValidationError,
};
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::{PgConnection, Transaction};

use super::{PackCatalog, PackContents, PackSummary, SlotEntry, SlotScope};
use crate::error::{StoreError, StoreResult};

const SERIALIZABLE: &str = "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE";
const REPEATABLE_READ: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ";

/// Connection settings for [`init_pool`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long to wait for a free connection.
    pub acquire_timeout: std::time::Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 2,
            acquire_timeout: std::time::Duration::from_secs(5),
        }
    }
}

/// Connect to PostgreSQL and run the embedded migrations.
pub async fn init_pool(url: &str, settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Catalog backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Wrap an existing pool. Migrations must already be applied.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self, isolation: &'static str) -> StoreResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(isolation).execute(&mut *tx).await?;
        Ok(tx)
    }
}

/// Recompute and store the digest of one pack inside the caller's
/// transaction.
async fn update_digest(conn: &mut PgConnection, pack: PackId) -> StoreResult<PackDigest> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT DISTINCT role_id, string_id FROM pack_resources
         WHERE pack_id = $1 ORDER BY role_id, string_id",
    )
    .bind(pack.get())
    .fetch_all(&mut *conn)
    .await?;

    let mut hasher = PackHasher::new();
    for (role, string) in &rows {
        hasher.push(role, string);
    }
    let digest = hasher.finish();

    sqlx::query("UPDATE packs SET hash = $2 WHERE pack_id = $1")
        .bind(pack.get())
        .bind(&digest.as_bytes()[..])
        .execute(&mut *conn)
        .await?;

    Ok(digest)
}

#[async_trait]
impl PackCatalog for PgCatalog {
    async fn create_pack(&self, id: PackId, title: &PackTitle) -> StoreResult<()> {
        sqlx::query("INSERT INTO packs (pack_id, title, hash) VALUES ($1, $2, $3)")
            .bind(id.get())
            .bind(title.as_str())
            .bind(&PackDigest::EMPTY.as_bytes()[..])
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rename_pack(&self, id: PackId, title: &PackTitle) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE packs SET title = $2 WHERE pack_id = $1")
            .bind(id.get())
            .bind(title.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_packs(&self) -> StoreResult<Vec<PackSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT
                packs.pack_id,
                packs.title,
                packs.hash,
                COUNT(DISTINCT pack_resources.role_id) AS role_count,
                COUNT(DISTINCT pack_resources.role_id || '/' || pack_resources.string_id) AS string_count
             FROM packs
                LEFT OUTER JOIN pack_resources ON pack_resources.pack_id = packs.pack_id
             GROUP BY packs.pack_id
             ORDER BY packs.pack_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.into_summary().map_err(StoreError::from))
            .collect()
    }

    async fn load_pack(&self, id: PackId) -> StoreResult<Option<PackContents>> {
        let mut tx = self.begin(REPEATABLE_READ).await?;

        let head = sqlx::query_as::<_, (String, Vec<u8>)>(
            "SELECT title, hash FROM packs WHERE pack_id = $1",
        )
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await?;
        let Some((title, hash)) = head else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, SlotRow>(
            "SELECT role_id, string_id, resource_class, resource_id
             FROM pack_resources WHERE pack_id = $1
             ORDER BY role_id, string_id, resource_class",
        )
        .bind(id.get())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let slots = rows
            .into_iter()
            .map(SlotRow::into_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(PackContents {
            title,
            hash: PackDigest::from_bytes(&hash)?,
            slots,
        }))
    }

    async fn pack_exists(&self, id: PackId) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM packs WHERE pack_id = $1)")
                .bind(id.get())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn slot_resource(&self, key: &SlotKey) -> StoreResult<Option<ResourceId>> {
        let raw: Option<i64> = sqlx::query_scalar(
            "SELECT resource_id FROM pack_resources
             WHERE pack_id = $1 AND role_id = $2 AND string_id = $3 AND resource_class = $4",
        )
        .bind(key.pack.get())
        .bind(key.role.as_str())
        .bind(key.string.as_str())
        .bind(key.class.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(raw.map(ResourceId::new).transpose()?)
    }

    async fn record_resource(&self, id: ResourceId) -> StoreResult<()> {
        sqlx::query("INSERT INTO resources (resource_id) VALUES ($1)")
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn swap_slot(&self, key: &SlotKey, resource: ResourceId) -> StoreResult<Option<ResourceId>> {
        let mut tx = self.begin(SERIALIZABLE).await?;

        // No row at all means the pack is gone; a row with NULL means the
        // pack exists but the slot is empty.
        let joined = sqlx::query_as::<_, (Option<i64>,)>(
            "SELECT pack_resources.resource_id
             FROM packs
                LEFT OUTER JOIN pack_resources
                ON pack_resources.pack_id = packs.pack_id
                AND pack_resources.role_id = $2
                AND pack_resources.string_id = $3
                AND pack_resources.resource_class = $4
             WHERE packs.pack_id = $1",
        )
        .bind(key.pack.get())
        .bind(key.role.as_str())
        .bind(key.string.as_str())
        .bind(key.class.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let previous = match joined {
            None => return Err(StoreError::PackNotFound(key.pack)),
            Some((previous,)) => previous,
        };

        let pair_present = match previous {
            Some(_) => true,
            None => {
                sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM pack_resources
                     WHERE pack_id = $1 AND role_id = $2 AND string_id = $3)",
                )
                .bind(key.pack.get())
                .bind(key.role.as_str())
                .bind(key.string.as_str())
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let statement = if previous.is_some() {
            sqlx::query(
                "UPDATE pack_resources SET resource_id = $5
                 WHERE pack_id = $1 AND role_id = $2 AND string_id = $3 AND resource_class = $4",
            )
        } else {
            sqlx::query(
                "INSERT INTO pack_resources (pack_id, role_id, string_id, resource_class, resource_id)
                 VALUES ($1, $2, $3, $4, $5)",
            )
        };
        let result = statement
            .bind(key.pack.get())
            .bind(key.role.as_str())
            .bind(key.string.as_str())
            .bind(key.class.as_str())
            .bind(resource.get())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() != 1 {
            return Err(StoreError::Inconsistent(format!(
                "slot {key}: expected 1 row affected, got {}",
                result.rows_affected()
            )));
        }

        if !pair_present {
            update_digest(&mut tx, key.pack).await?;
        }

        tx.commit().await?;
        Ok(previous.map(ResourceId::new).transpose()?)
    }

    async fn remove_slots(&self, pack: PackId, scope: &SlotScope) -> StoreResult<Vec<SlotEntry>> {
        let mut tx = self.begin(SERIALIZABLE).await?;

        let query = match scope {
            SlotScope::Pack => sqlx::query_as::<_, SlotRow>(
                "DELETE FROM pack_resources WHERE pack_id = $1
                 RETURNING role_id, string_id, resource_class, resource_id",
            )
            .bind(pack.get()),
            SlotScope::Role(role) => sqlx::query_as::<_, SlotRow>(
                "DELETE FROM pack_resources WHERE pack_id = $1 AND role_id = $2
                 RETURNING role_id, string_id, resource_class, resource_id",
            )
            .bind(pack.get())
            .bind(role.as_str()),
            SlotScope::Pair(role, string) => sqlx::query_as::<_, SlotRow>(
                "DELETE FROM pack_resources WHERE pack_id = $1 AND role_id = $2 AND string_id = $3
                 RETURNING role_id, string_id, resource_class, resource_id",
            )
            .bind(pack.get())
            .bind(role.as_str())
            .bind(string.as_str()),
        };
        let rows = query.fetch_all(&mut *tx).await?;

        match scope {
            SlotScope::Pack => {
                let result = sqlx::query("DELETE FROM packs WHERE pack_id = $1")
                    .bind(pack.get())
                    .execute(&mut *tx)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::PackNotFound(pack));
                }
            }
            _ if rows.is_empty() => return Err(StoreError::NoResources),
            _ => {
                update_digest(&mut tx, pack).await?;
            }
        }

        tx.commit().await?;

        rows.into_iter()
            .map(|row| row.into_entry().map_err(StoreError::from))
            .collect()
    }

    async fn mark_pruned(&self, id: ResourceId) -> StoreResult<bool> {
        let mut tx = self.begin(SERIALIZABLE).await?;

        let result = sqlx::query("DELETE FROM resources WHERE resource_id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await?;
        let moved = result.rows_affected() == 1;
        if moved {
            sqlx::query(
                "INSERT INTO pruned_resources (resource_id) VALUES ($1)
                 ON CONFLICT (resource_id) DO NOTHING",
            )
            .bind(id.get())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(moved)
    }

    async fn forget_pruned(&self, id: ResourceId) -> StoreResult<()> {
        sqlx::query("DELETE FROM pruned_resources WHERE resource_id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn pruned_backlog(&self) -> StoreResult<Vec<ResourceId>> {
        let raw: Vec<i64> =
            sqlx::query_scalar("SELECT resource_id FROM pruned_resources ORDER BY resource_id")
                .fetch_all(&self.pool)
                .await?;
        raw.into_iter()
            .map(|id| ResourceId::new(id).map_err(StoreError::from))
            .collect()
    }

    async fn is_admin(&self, email: &str) -> StoreResult<bool> {
        let admin: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM admins WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(admin)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct SlotRow {
    role_id: String,
    string_id: String,
    resource_class: String,
    resource_id: i64,
}

impl SlotRow {
    fn into_entry(self) -> Result<SlotEntry, ValidationError> {
        Ok(SlotEntry {
            role: RoleId::new(self.role_id)?,
            string: StringId::new(self.string_id)?,
            class: self.resource_class.parse::<ResourceClass>()?,
            resource: ResourceId::new(self.resource_id)?,
        })
    }
}

/// Internal row type for the pack listing.
#[derive(sqlx::FromRow)]
struct SummaryRow {
    pack_id: i64,
    title: String,
    hash: Vec<u8>,
    role_count: i64,
    string_count: i64,
}

impl SummaryRow {
    fn into_summary(self) -> Result<PackSummary, ValidationError> {
        Ok(PackSummary {
            id: PackId::new(self.pack_id)?,
            title: self.title,
            hash: PackDigest::from_bytes(&self.hash)?,
            role_count: self.role_count,
            string_count: self.string_count,
        })
    }
}
