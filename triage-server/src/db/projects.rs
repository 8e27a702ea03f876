//! Project queries

use shared::models::Project;
use sqlx::PgPool;
use sqlx::types::Json;

use super::DbError;

const COLUMNS: &str =
    "id, name, storage_prefix, image_count, keywords, archived, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    name: String,
    storage_prefix: String,
    image_count: i64,
    keywords: Json<Vec<String>>,
    archived: bool,
    created_at: i64,
    updated_at: i64,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            name: row.name,
            storage_prefix: row.storage_prefix,
            image_count: row.image_count,
            keywords: row.keywords.0,
            archived: row.archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn create(pool: &PgPool, table: &str, project: &Project) -> Result<(), DbError> {
    let sql = format!(
        r#"
        INSERT INTO {table} ({COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#
    );
    let result = sqlx::query(&sql)
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.storage_prefix)
        .bind(project.image_count)
        .bind(Json(&project.keywords))
        .bind(project.archived)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Duplicate {
            id: project.id.clone(),
        });
    }
    Ok(())
}

pub async fn get(pool: &PgPool, table: &str, id: &str) -> Result<Option<Project>, DbError> {
    let sql = format!("SELECT {COLUMNS} FROM {table} WHERE id = $1");
    let row: Option<ProjectRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.map(Project::from))
}

pub async fn list(pool: &PgPool, table: &str) -> Result<Vec<Project>, DbError> {
    let sql = format!("SELECT {COLUMNS} FROM {table} ORDER BY created_at, id");
    let rows: Vec<ProjectRow> = sqlx::query_as(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(Project::from).collect())
}

pub async fn set_image_count(
    pool: &PgPool,
    table: &str,
    id: &str,
    count: i64,
    now: i64,
) -> Result<(), DbError> {
    let sql = format!("UPDATE {table} SET image_count = $2, updated_at = $3 WHERE id = $1");
    sqlx::query(&sql)
        .bind(id)
        .bind(count)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn adjust_image_count(
    pool: &PgPool,
    table: &str,
    id: &str,
    delta: i64,
    now: i64,
) -> Result<(), DbError> {
    let sql = format!(
        "UPDATE {table} SET image_count = GREATEST(image_count + $2, 0), updated_at = $3 WHERE id = $1"
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}
