//! Postgres-backed item store.
//!
//! ## Unit of work
//!
//! `within_item` runs inside one database transaction:
//!
//! 1. `SET LOCAL lock_timeout` so a blocked caller fails instead of waiting forever
//! 2. `SELECT ... FOR UPDATE` on the item row (serialises writers per item)
//! 3. Run the closure against the locked snapshot
//! 4. `UPDATE` the counters and `INSERT` the staged transaction rows
//! 5. Commit; any error before this point rolls everything back
//!
//! Readers that need the item and its rows together (`item_detail`) take
//! `FOR SHARE` on the item row inside one transaction, which waits out any
//! unit of work in flight and blocks new ones until both reads are done.
//! Bulk status/category/supplier updates run under the same `lock_timeout`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database | `55P03` | `Unavailable` | Lock wait timed out |
//! | Database | `40001`, `40P01` | `Unavailable` | Serialization failure / deadlock |
//! | Database | `57014` | `Unavailable` | Statement cancelled |
//! | Database | `23505` | `Conflict` | Duplicate SKU |
//! | Database | `23514` | `Invalid` | Check constraint (negative counters) |
//! | Database | Any other | `Backend` | Other database errors |
//! | PoolTimedOut, PoolClosed, Io, Tls | N/A | `Unavailable` | Connectivity |
//! | RowNotFound | N/A | `NotFound` | |
//! | Decode, ColumnDecode | N/A | `Corrupt` | Unreadable row |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, warn};
use uuid::Uuid;

use stockroom_core::{ItemId, TransactionId, UserId};
use stockroom_inventory::{
    InventoryItem, ItemPatch, ItemStatus, NewItem, NewStockTransaction, StockLevels,
    StockOperation, StockTransaction, TransactionType,
};

use crate::audit::{AuditAction, AuditEntry};
use crate::ledger::LedgerError;

use super::query::{ItemDetail, ItemPage, ItemQuery};
use super::r#trait::{ItemStore, StoreError};
use super::work::{ItemWork, ItemWorkFn};

const SCHEMA: &str = include_str!("../../migrations/0001_inventory.sql");

const ITEM_COLUMNS: &str = "id, sku, name, category, unit, stock, issued, low_stock_threshold, \
     location, supplier, notes, status, created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "id, item_id, type, qty, stock_after, issued_after, note, actor_id, created_at";

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Postgres item store. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresItemStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresItemStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        lock_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(lock_timeout.max(Duration::from_secs(1)))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, lock_timeout))
    }

    /// Create tables, indexes and the append-only trigger if missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn set_lock_timeout(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<(), StoreError> {
        // SET does not accept bind parameters; the value is a formatted integer.
        let sql = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&sql)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;
        Ok(())
    }

    async fn lock_item(
        tx: &mut Transaction<'_, Postgres>,
        id: ItemId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    /// Set one text column on every listed item, bounded by `lock_timeout`.
    /// `column` comes from a closed set of call sites, never from caller text.
    async fn set_column(
        &self,
        operation: &str,
        column: &'static str,
        ids: &[ItemId],
        value: Option<&str>,
    ) -> Result<usize, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let mut tx = self.begin(operation).await?;
        self.set_lock_timeout(&mut tx).await?;
        let sql = format!(
            "UPDATE inventory_items SET {column} = $1, updated_at = NOW() WHERE id = ANY($2)"
        );
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(result.rows_affected() as usize)
    }

    async fn distinct(&self, operation: &str, column: &'static str) -> Result<Vec<String>, StoreError> {
        let sql = format!(
            "SELECT DISTINCT {column} AS value FROM inventory_items \
             WHERE {column} IS NOT NULL AND {column} <> '' ORDER BY {column}"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter()
            .map(|row| {
                row.try_get("value")
                    .map_err(|e| StoreError::Corrupt(format!("failed to read {column}: {e}")))
            })
            .collect()
    }
}

async fn fetch_transactions<'e, E>(
    executor: E,
    id: ItemId,
    limit: usize,
) -> Result<Vec<StockTransaction>, StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions WHERE item_id = $1 \
         ORDER BY created_at DESC, id DESC LIMIT $2"
    );
    let rows = sqlx::query(&sql)
        .bind(id.as_uuid())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(executor)
        .await
        .map_err(|e| map_sqlx_error("transactions", e))?;
    rows.iter().map(transaction_from_row).collect()
}

async fn insert_transactions(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[StockTransaction],
) -> Result<(), StoreError> {
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO stock_transactions (
                id, item_id, type, qty, stock_after, issued_after, note, actor_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(row.id.as_uuid())
        .bind(row.item_id.as_uuid())
        .bind(row.kind.as_str())
        .bind(row.qty)
        .bind(row.stock_after)
        .bind(row.issued_after)
        .bind(row.note.as_deref())
        .bind(row.actor.as_uuid())
        .bind(row.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;
    }
    Ok(())
}

/// Escape LIKE metacharacters and wrap for a substring match.
fn like_pattern(q: &str) -> String {
    let mut out = String::with_capacity(q.len() + 2);
    out.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

const LIST_FILTER: &str = r#"
    WHERE ($1::text IS NULL
           OR name ILIKE $1 OR sku ILIKE $1 OR category ILIKE $1 OR location ILIKE $1)
      AND ($2::text IS NULL OR category = $2)
      AND ($3::text IS NULL OR status = $3)
      AND (NOT $4 OR stock < low_stock_threshold)
"#;

#[async_trait]
impl ItemStore for PostgresItemStore {
    #[instrument(skip(self, new), fields(sku = %new.sku), err)]
    async fn create_item(&self, new: NewItem, actor: UserId) -> Result<InventoryItem, StoreError> {
        let now = Utc::now();
        let item = InventoryItem::create(ItemId::new(), new, now);

        let mut tx = self.begin("create_item").await?;
        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, sku, name, category, unit, stock, issued, low_stock_threshold,
                location, supplier, notes, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.category.as_deref())
        .bind(&item.unit)
        .bind(item.stock())
        .bind(item.issued())
        .bind(item.low_stock_threshold)
        .bind(item.location.as_deref())
        .bind(item.supplier.as_deref())
        .bind(item.notes.as_deref())
        .bind(item.status.as_str())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_item", e))?;

        if item.stock() > 0 {
            let op = StockOperation::Receive { qty: item.stock() };
            let row = NewStockTransaction::for_operation(
                item.id,
                &op,
                item.levels(),
                Some("initial stock".to_string()),
                actor,
            )
            .commit(TransactionId::new(), now);
            insert_transactions(&mut tx, &[row]).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_create_item", e))?;
        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self, query), err)]
    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, StoreError> {
        let query = query.clone().normalized();
        let pattern = query.q.as_deref().map(like_pattern);
        let status = query.status.map(|s| s.as_str());

        let count_sql = format!("SELECT COUNT(*) AS total FROM inventory_items {LIST_FILTER}");
        let total: i64 = sqlx::query(&count_sql)
            .bind(pattern.as_deref())
            .bind(query.category.as_deref())
            .bind(status)
            .bind(query.low_stock_only)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_items", e))?
            .try_get("total")
            .map_err(|e| StoreError::Corrupt(format!("failed to read item count: {e}")))?;

        // Column and direction come from closed enums, never from caller text.
        let dir = query.sort_dir.keyword();
        let list_sql = format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items {LIST_FILTER} \
             ORDER BY {col} {dir}, id {dir} LIMIT $5 OFFSET $6",
            col = query.sort_by.column(),
        );
        let rows = sqlx::query(&list_sql)
            .bind(pattern.as_deref())
            .bind(query.category.as_deref())
            .bind(status)
            .bind(query.low_stock_only)
            .bind(i64::from(query.limit))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;

        Ok(ItemPage {
            total: u64::try_from(total).unwrap_or_default(),
            page: query.page,
            limit: query.limit,
            rows: rows.iter().map(item_from_row).collect::<Result<_, _>>()?,
        })
    }

    #[instrument(skip(self, patch), fields(item_id = %id), err)]
    async fn update_item(&self, id: ItemId, patch: &ItemPatch) -> Result<InventoryItem, StoreError> {
        let mut tx = self.begin("update_item").await?;
        self.set_lock_timeout(&mut tx).await?;
        let mut item = Self::lock_item(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound)?;

        patch.apply_to(&mut item, Utc::now());

        sqlx::query(
            r#"
            UPDATE inventory_items
            SET sku = $2, name = $3, category = $4, unit = $5, low_stock_threshold = $6,
                location = $7, supplier = $8, notes = $9, status = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.category.as_deref())
        .bind(&item.unit)
        .bind(item.low_stock_threshold)
        .bind(item.location.as_deref())
        .bind(item.supplier.as_deref())
        .bind(item.notes.as_deref())
        .bind(item.status.as_str())
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_update_item", e))?;
        Ok(item)
    }

    #[instrument(skip(self, ids), fields(count = ids.len(), status = status.as_str()), err)]
    async fn set_status(&self, ids: &[ItemId], status: ItemStatus) -> Result<usize, StoreError> {
        self.set_column("set_status", "status", ids, Some(status.as_str()))
            .await
    }

    #[instrument(skip(self, ids, category), fields(count = ids.len()), err)]
    async fn set_category(&self, ids: &[ItemId], category: Option<String>) -> Result<usize, StoreError> {
        self.set_column("set_category", "category", ids, category.as_deref())
            .await
    }

    #[instrument(skip(self, ids, supplier), fields(count = ids.len()), err)]
    async fn set_supplier(&self, ids: &[ItemId], supplier: Option<String>) -> Result<usize, StoreError> {
        self.set_column("set_supplier", "supplier", ids, supplier.as_deref())
            .await
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn transactions(&self, id: ItemId, limit: usize) -> Result<Vec<StockTransaction>, StoreError> {
        fetch_transactions(&self.pool, id, limit).await
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn item_detail(&self, id: ItemId, limit: usize) -> Result<Option<ItemDetail>, StoreError> {
        let mut tx = self.begin("item_detail").await?;
        self.set_lock_timeout(&mut tx).await?;

        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 FOR SHARE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("item_detail", e))?;
        let Some(item) = row.as_ref().map(item_from_row).transpose()? else {
            rollback(tx).await;
            return Ok(None);
        };
        let transactions = fetch_transactions(&mut *tx, id, limit).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_item_detail", e))?;
        Ok(Some(ItemDetail { item, transactions }))
    }

    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        self.distinct("categories", "category").await
    }

    async fn suppliers(&self) -> Result<Vec<String>, StoreError> {
        self.distinct("suppliers", "supplier").await
    }

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, action, entity, entity_id, actor_id, meta, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.action.as_str())
        .bind(&entry.entity)
        .bind(entry.entity_id.map(|id| *id.as_uuid()))
        .bind(entry.actor.map(|id| *id.as_uuid()))
        .bind(&entry.meta)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_audit", e))?;
        Ok(())
    }

    async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, action, entity, entity_id, actor_id, meta, created_at
            FROM audit_log
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("audit_log", e))?;
        rows.iter().map(audit_from_row).collect()
    }

    #[instrument(skip(self, work), fields(item_id = %id))]
    async fn within_item(&self, id: ItemId, work: ItemWorkFn) -> Result<InventoryItem, LedgerError> {
        let mut tx = self.begin("within_item").await?;
        self.set_lock_timeout(&mut tx).await?;

        let Some(item) = Self::lock_item(&mut tx, id).await? else {
            rollback(tx).await;
            return Err(LedgerError::NotFound(id));
        };

        let mut staged = ItemWork::new(item);
        if let Err(err) = work(&mut staged) {
            rollback(tx).await;
            return Err(err);
        }
        let commit = staged.into_commit(Utc::now())?;

        if commit.levels_changed {
            let levels = commit.item.levels();
            sqlx::query(
                "UPDATE inventory_items SET stock = $2, issued = $3, updated_at = $4 WHERE id = $1",
            )
            .bind(id.as_uuid())
            .bind(levels.stock)
            .bind(levels.issued)
            .bind(commit.item.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_levels", e))?;
        }
        insert_transactions(&mut tx, &commit.transactions).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_within_item", e))?;
        Ok(commit.item)
    }
}

async fn rollback(tx: Transaction<'_, Postgres>) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "rollback failed; connection will be discarded");
    }
}

fn corrupt(what: &str, err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(format!("failed to read {what}: {err}"))
}

fn item_from_row(row: &PgRow) -> Result<InventoryItem, StoreError> {
    let get = |e| corrupt("inventory item row", e);
    let id: Uuid = row.try_get("id").map_err(get)?;
    let status: String = row.try_get("status").map_err(get)?;
    let status = ItemStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown item status '{status}'")))?;
    let stock: i64 = row.try_get("stock").map_err(get)?;
    let issued: i64 = row.try_get("issued").map_err(get)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(get)?;

    let new = NewItem {
        sku: row.try_get("sku").map_err(get)?,
        name: row.try_get("name").map_err(get)?,
        category: row.try_get("category").map_err(get)?,
        unit: Some(row.try_get("unit").map_err(get)?),
        stock,
        low_stock_threshold: row.try_get("low_stock_threshold").map_err(get)?,
        location: row.try_get("location").map_err(get)?,
        supplier: row.try_get("supplier").map_err(get)?,
        notes: row.try_get("notes").map_err(get)?,
        status,
    };
    let mut item = InventoryItem::create(ItemId::from_uuid(id), new, created_at)
        .with_levels(StockLevels::new(stock, issued));
    item.updated_at = row.try_get("updated_at").map_err(get)?;
    Ok(item)
}

fn transaction_from_row(row: &PgRow) -> Result<StockTransaction, StoreError> {
    let get = |e| corrupt("stock transaction row", e);
    let kind: String = row.try_get("type").map_err(get)?;
    let kind = TransactionType::parse(&kind)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown transaction type '{kind}'")))?;
    Ok(StockTransaction {
        id: TransactionId::from_uuid(row.try_get("id").map_err(get)?),
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(get)?),
        kind,
        qty: row.try_get("qty").map_err(get)?,
        stock_after: row.try_get("stock_after").map_err(get)?,
        issued_after: row.try_get("issued_after").map_err(get)?,
        note: row.try_get("note").map_err(get)?,
        actor: UserId::from_uuid(row.try_get("actor_id").map_err(get)?),
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

fn audit_from_row(row: &PgRow) -> Result<AuditEntry, StoreError> {
    let get = |e| corrupt("audit row", e);
    let action: String = row.try_get("action").map_err(get)?;
    let action = AuditAction::parse(&action)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown audit action '{action}'")))?;
    let entity_id: Option<Uuid> = row.try_get("entity_id").map_err(get)?;
    let actor: Option<Uuid> = row.try_get("actor_id").map_err(get)?;
    Ok(AuditEntry {
        id: row.try_get("id").map_err(get)?,
        action,
        entity: row.try_get("entity").map_err(get)?,
        entity_id: entity_id.map(ItemId::from_uuid),
        actor: actor.map(UserId::from_uuid),
        meta: row.try_get("meta").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // lock_not_available, serialization_failure, deadlock_detected, query_canceled
                Some("55P03" | "40001" | "40P01" | "57014") => StoreError::Unavailable(msg),
                // unique_violation
                Some("23505") => StoreError::Conflict(msg),
                // check_violation
                Some("23514") => StoreError::Invalid(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Decode(e) => StoreError::Corrupt(format!("decode error in {operation}: {e}")),
        err @ sqlx::Error::ColumnDecode { .. } => {
            StoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
