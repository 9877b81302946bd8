//! Image record catalog backed by SQLite.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, instrument, warn};
use viewer_common::record::base_name;
use viewer_common::{BoundingBox, ImageRecord, RecordKind, ViewerError, ViewerResult};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_path TEXT NOT NULL UNIQUE,
        preview_path TEXT,
        display_name TEXT,
        min_lon REAL,
        min_lat REAL,
        max_lon REAL,
        max_lat REAL,
        kind TEXT NOT NULL DEFAULT 'upload',
        created_at TEXT NOT NULL
    )
"#;

const COLUMNS: &str = "id, source_path, preview_path, display_name, \
                       min_lon, min_lat, max_lon, max_lat, kind, created_at";

type ImageRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    String,
    String,
);

fn record_from_row(row: ImageRow) -> ImageRecord {
    let bounding_box = match (row.4, row.5, row.6, row.7) {
        (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => {
            Some(BoundingBox::new(min_x, min_y, max_x, max_y))
        }
        _ => None,
    };
    let kind = row.8.parse::<RecordKind>().unwrap_or_else(|e| {
        warn!(id = row.0, error = %e, "Treating record of unknown kind as an upload");
        RecordKind::Upload
    });
    let created_at = DateTime::parse_from_rfc3339(&row.9)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(id = row.0, created_at = %row.9, error = %e, "Unparsable creation time, using now");
            Utc::now()
        });
    ImageRecord {
        id: row.0,
        source_path: row.1,
        preview_path: row.2,
        display_name: row.3,
        bounding_box,
        kind,
        created_at,
    }
}

fn db_error(context: &str) -> impl Fn(sqlx::Error) -> ViewerError + '_ {
    move |e| ViewerError::DatabaseError(format!("{context}: {e}"))
}

/// Fields written once a conversion succeeds.
///
/// Applied in one statement so a record never carries bounds without a
/// preview or the other way round.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionUpdate {
    pub bounding_box: BoundingBox,
    pub preview_path: String,
    pub display_name: String,
}

/// The composite slot: one record keyed by its source path.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeUpsert {
    pub source_path: String,
    pub preview_path: String,
    pub display_name: String,
    pub bounding_box: BoundingBox,
}

/// Persistent catalog of image records.
#[derive(Clone)]
pub struct ImageCatalog {
    pool: SqlitePool,
}

impl ImageCatalog {
    /// Connect to a SQLite database URL (e.g. `sqlite://viewer.db`),
    /// creating the file and schema when missing.
    pub async fn connect(database_url: &str) -> ViewerResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_error("Invalid database URL"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_error("Connection failed"))?;

        let catalog = Self { pool };
        catalog.migrate().await?;
        info!(database_url = %database_url, "Opened image catalog");
        Ok(catalog)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> ViewerResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        // One connection: every pooled connection would get its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db_error("Connection failed"))?;

        let catalog = Self { pool };
        catalog.migrate().await?;
        Ok(catalog)
    }

    async fn migrate(&self) -> ViewerResult<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(db_error("Migration failed"))?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_images_kind ON images(kind)")
            .execute(&self.pool)
            .await
            .map_err(db_error("Migration failed"))?;
        Ok(())
    }

    /// Check the database answers.
    pub async fn ping(&self) -> ViewerResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("Ping failed"))?;
        Ok(())
    }

    /// Insert a record for a stored raster.
    ///
    /// The display name defaults to the base name of `source_path`.
    #[instrument(skip(self))]
    pub async fn create(&self, source_path: &str, kind: RecordKind) -> ViewerResult<ImageRecord> {
        let created_at = Utc::now();
        let display_name = base_name(source_path).to_string();

        let result = sqlx::query(
            r#"
            INSERT INTO images (source_path, display_name, kind, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(source_path)
        .bind(&display_name)
        .bind(kind.as_str())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error("Insert failed"))?;

        let id = result.last_insert_rowid();
        debug!(id, "Created image record");

        Ok(ImageRecord {
            id,
            source_path: source_path.to_string(),
            preview_path: None,
            display_name: Some(display_name),
            bounding_box: None,
            kind,
            created_at,
        })
    }

    pub async fn get(&self, id: i64) -> ViewerResult<Option<ImageRecord>> {
        let row: Option<ImageRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM images WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Query failed"))?;
        Ok(row.map(record_from_row))
    }

    pub async fn find_by_source(&self, source_path: &str) -> ViewerResult<Option<ImageRecord>> {
        let row: Option<ImageRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM images WHERE source_path = ?"))
                .bind(source_path)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("Query failed"))?;
        Ok(row.map(record_from_row))
    }

    /// Records whose id is in `ids`, in ascending id order. Unknown ids are
    /// skipped.
    pub async fn find_by_ids(&self, ids: &[i64]) -> ViewerResult<Vec<ImageRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {COLUMNS} FROM images WHERE id IN ({placeholders}) ORDER BY id ASC");
        let mut query = sqlx::query_as::<_, ImageRow>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Query failed"))?;
        Ok(rows.into_iter().map(record_from_row).collect())
    }

    /// Uploaded records, newest first. Composites are excluded.
    pub async fn list_gallery(&self) -> ViewerResult<Vec<ImageRecord>> {
        let rows: Vec<ImageRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM images WHERE kind = ? ORDER BY id DESC"
        ))
        .bind(RecordKind::Upload.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Query failed"))?;
        Ok(rows.into_iter().map(record_from_row).collect())
    }

    /// Number of records of a kind.
    pub async fn count(&self, kind: RecordKind) -> ViewerResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM images WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Query failed"))?;
        Ok(count.0)
    }

    /// Store the outcome of a successful conversion.
    #[instrument(skip(self, update), fields(preview = %update.preview_path))]
    pub async fn apply_conversion(&self, id: i64, update: &ConversionUpdate) -> ViewerResult<()> {
        let bbox = &update.bounding_box;
        let result = sqlx::query(
            r#"
            UPDATE images
            SET min_lon = ?, min_lat = ?, max_lon = ?, max_lat = ?,
                preview_path = ?, display_name = ?
            WHERE id = ?
            "#,
        )
        .bind(bbox.min_x)
        .bind(bbox.min_y)
        .bind(bbox.max_x)
        .bind(bbox.max_y)
        .bind(&update.preview_path)
        .bind(&update.display_name)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Update failed"))?;

        if result.rows_affected() == 0 {
            return Err(ViewerError::RecordNotFound(id));
        }
        Ok(())
    }

    /// Insert or overwrite the composite record keyed by its source path.
    #[instrument(skip(self, composite), fields(source = %composite.source_path))]
    pub async fn upsert_composite(&self, composite: &CompositeUpsert) -> ViewerResult<ImageRecord> {
        let bbox = &composite.bounding_box;
        sqlx::query(
            r#"
            INSERT INTO images (source_path, preview_path, display_name,
                                min_lon, min_lat, max_lon, max_lat, kind, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_path) DO UPDATE SET
                preview_path = excluded.preview_path,
                display_name = excluded.display_name,
                min_lon = excluded.min_lon,
                min_lat = excluded.min_lat,
                max_lon = excluded.max_lon,
                max_lat = excluded.max_lat,
                kind = excluded.kind
            "#,
        )
        .bind(&composite.source_path)
        .bind(&composite.preview_path)
        .bind(&composite.display_name)
        .bind(bbox.min_x)
        .bind(bbox.min_y)
        .bind(bbox.max_x)
        .bind(bbox.max_y)
        .bind(RecordKind::Composite.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error("Upsert failed"))?;

        self.find_by_source(&composite.source_path)
            .await?
            .ok_or_else(|| {
                ViewerError::DatabaseError(format!(
                    "Composite record {} missing after upsert",
                    composite.source_path
                ))
            })
    }

    /// Delete a record. Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> ViewerResult<bool> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Delete failed"))?;
        Ok(result.rows_affected() > 0)
    }
}
