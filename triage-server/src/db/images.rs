//! Image record queries

use std::collections::BTreeMap;

use shared::models::{ImageRecord, RelocationState};
use sqlx::PgPool;
use sqlx::types::Json;

use super::DbError;

const COLUMNS: &str = "id, original_path, thumb_small_path, thumb_large_path, raw_sidecar_path, \
     related_paths, status, relocation_state, relocation_error, reviewed, color_group, project_id, \
     rating, promoted, keywords, description, exif, inserted_at, updated_at, revision";

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: String,
    original_path: String,
    thumb_small_path: String,
    thumb_large_path: String,
    raw_sidecar_path: Option<String>,
    related_paths: Json<Vec<String>>,
    status: String,
    relocation_state: String,
    relocation_error: Option<String>,
    reviewed: bool,
    color_group: i32,
    project_id: Option<String>,
    rating: i32,
    promoted: bool,
    keywords: Json<Vec<String>>,
    description: String,
    exif: Json<BTreeMap<String, String>>,
    inserted_at: i64,
    updated_at: i64,
    revision: i64,
}

impl TryFrom<ImageRow> for ImageRecord {
    type Error = DbError;

    fn try_from(row: ImageRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| DbError::Corrupt {
            id: row.id.clone(),
            reason,
        };
        let status = row.status.parse().map_err(corrupt)?;
        let relocation_state = row.relocation_state.parse().map_err(corrupt)?;

        Ok(ImageRecord {
            id: row.id,
            original_path: row.original_path,
            thumb_small_path: row.thumb_small_path,
            thumb_large_path: row.thumb_large_path,
            raw_sidecar_path: row.raw_sidecar_path,
            related_paths: row.related_paths.0,
            status,
            relocation_state,
            relocation_error: row.relocation_error,
            reviewed: row.reviewed,
            color_group: row.color_group,
            project_id: row.project_id,
            rating: row.rating,
            promoted: row.promoted,
            keywords: row.keywords.0,
            description: row.description,
            exif: row.exif.0,
            inserted_at: row.inserted_at,
            updated_at: row.updated_at,
            revision: row.revision,
        })
    }
}

pub async fn get(pool: &PgPool, table: &str, id: &str) -> Result<Option<ImageRecord>, DbError> {
    let sql = format!("SELECT {COLUMNS} FROM {table} WHERE id = $1");
    let row: Option<ImageRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;
    row.map(ImageRecord::try_from).transpose()
}

pub async fn insert(pool: &PgPool, table: &str, record: &ImageRecord) -> Result<(), DbError> {
    let sql = format!(
        r#"
        INSERT INTO {table} ({COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
        ON CONFLICT (id) DO NOTHING
        "#
    );
    let result = sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.original_path)
        .bind(&record.thumb_small_path)
        .bind(&record.thumb_large_path)
        .bind(&record.raw_sidecar_path)
        .bind(Json(&record.related_paths))
        .bind(record.status.as_str())
        .bind(record.relocation_state.as_str())
        .bind(&record.relocation_error)
        .bind(record.reviewed)
        .bind(record.color_group)
        .bind(&record.project_id)
        .bind(record.rating)
        .bind(record.promoted)
        .bind(Json(&record.keywords))
        .bind(&record.description)
        .bind(Json(&record.exif))
        .bind(record.inserted_at)
        .bind(record.updated_at)
        .bind(record.revision)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Duplicate {
            id: record.id.clone(),
        });
    }
    Ok(())
}

/// Compare-and-swap on `revision`. `None` when the revision moved on or the
/// row is gone.
pub async fn replace_if(
    pool: &PgPool,
    table: &str,
    record: &ImageRecord,
    expected_revision: i64,
    now: i64,
) -> Result<Option<ImageRecord>, DbError> {
    let sql = format!(
        r#"
        UPDATE {table}
        SET original_path = $2, thumb_small_path = $3, thumb_large_path = $4,
            raw_sidecar_path = $5, related_paths = $6, status = $7,
            relocation_state = $8, relocation_error = $9, reviewed = $10,
            color_group = $11, project_id = $12, rating = $13, promoted = $14,
            keywords = $15, description = $16, exif = $17,
            updated_at = $18, revision = revision + 1
        WHERE id = $1 AND revision = $19
        RETURNING {COLUMNS}
        "#
    );
    let row: Option<ImageRow> = sqlx::query_as(&sql)
        .bind(&record.id)
        .bind(&record.original_path)
        .bind(&record.thumb_small_path)
        .bind(&record.thumb_large_path)
        .bind(&record.raw_sidecar_path)
        .bind(Json(&record.related_paths))
        .bind(record.status.as_str())
        .bind(record.relocation_state.as_str())
        .bind(&record.relocation_error)
        .bind(record.reviewed)
        .bind(record.color_group)
        .bind(&record.project_id)
        .bind(record.rating)
        .bind(record.promoted)
        .bind(Json(&record.keywords))
        .bind(&record.description)
        .bind(Json(&record.exif))
        .bind(now)
        .bind(expected_revision)
        .fetch_optional(pool)
        .await?;
    row.map(ImageRecord::try_from).transpose()
}

pub async fn set_relocation_state(
    pool: &PgPool,
    table: &str,
    id: &str,
    state: RelocationState,
    error: Option<&str>,
    now: i64,
) -> Result<bool, DbError> {
    let sql = format!(
        r#"
        UPDATE {table}
        SET relocation_state = $2, relocation_error = $3,
            updated_at = $4, revision = revision + 1
        WHERE id = $1
        "#
    );
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(state.as_str())
        .bind(error)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn complete_relocation(
    pool: &PgPool,
    table: &str,
    record: &ImageRecord,
    now: i64,
) -> Result<bool, DbError> {
    let sql = format!(
        r#"
        UPDATE {table}
        SET original_path = $2, thumb_small_path = $3, thumb_large_path = $4,
            raw_sidecar_path = $5, related_paths = $6, status = $7, project_id = $8,
            relocation_state = 'complete', relocation_error = NULL,
            updated_at = $9, revision = revision + 1
        WHERE id = $1
        "#
    );
    let result = sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.original_path)
        .bind(&record.thumb_small_path)
        .bind(&record.thumb_large_path)
        .bind(&record.raw_sidecar_path)
        .bind(Json(&record.related_paths))
        .bind(record.status.as_str())
        .bind(&record.project_id)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fail_relocation(
    pool: &PgPool,
    table: &str,
    record: &ImageRecord,
    error: &str,
    now: i64,
) -> Result<bool, DbError> {
    let sql = format!(
        r#"
        UPDATE {table}
        SET original_path = $2, thumb_small_path = $3, thumb_large_path = $4,
            raw_sidecar_path = $5, related_paths = $6,
            relocation_state = 'failed', relocation_error = $7,
            updated_at = $8, revision = revision + 1
        WHERE id = $1
        "#
    );
    let result = sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.original_path)
        .bind(&record.thumb_small_path)
        .bind(&record.thumb_large_path)
        .bind(&record.raw_sidecar_path)
        .bind(Json(&record.related_paths))
        .bind(error)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &PgPool, table: &str, id: &str) -> Result<bool, DbError> {
    let sql = format!("DELETE FROM {table} WHERE id = $1");
    let result = sqlx::query(&sql).bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_by_project(pool: &PgPool, table: &str, project_id: &str) -> Result<i64, DbError> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE project_id = $1");
    let row: (i64,) = sqlx::query_as(&sql).bind(project_id).fetch_one(pool).await?;
    Ok(row.0)
}
