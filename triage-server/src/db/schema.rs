//! Table bootstrap
//!
//! Table names come from configuration and are validated as plain
//! identifiers before they reach any statement.

use sqlx::PgPool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Table names used by every query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub images: String,
    pub projects: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            images: "images".to_string(),
            projects: "projects".to_string(),
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes (PostgreSQL NAMEDATALEN)
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= 63
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Create tables and indexes if they do not exist yet
pub async fn ensure_tables(pool: &PgPool, tables: &Tables) -> Result<(), BoxError> {
    let images = &tables.images;
    let projects = &tables.projects;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {images} (
            id                TEXT PRIMARY KEY,
            original_path     TEXT NOT NULL,
            thumb_small_path  TEXT NOT NULL,
            thumb_large_path  TEXT NOT NULL,
            raw_sidecar_path  TEXT,
            related_paths     JSONB NOT NULL DEFAULT '[]',
            status            TEXT NOT NULL,
            relocation_state  TEXT NOT NULL DEFAULT 'none',
            relocation_error  TEXT,
            reviewed          BOOLEAN NOT NULL DEFAULT FALSE,
            color_group       INTEGER NOT NULL DEFAULT 0,
            project_id        TEXT,
            rating            INTEGER NOT NULL DEFAULT 0,
            promoted          BOOLEAN NOT NULL DEFAULT FALSE,
            keywords          JSONB NOT NULL DEFAULT '[]',
            description       TEXT NOT NULL DEFAULT '',
            exif              JSONB NOT NULL DEFAULT '{{}}',
            inserted_at       BIGINT NOT NULL,
            updated_at        BIGINT NOT NULL,
            revision          BIGINT NOT NULL DEFAULT 0
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{images}_project_id ON {images} (project_id)"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {projects} (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            storage_prefix  TEXT NOT NULL,
            image_count     BIGINT NOT NULL DEFAULT 0,
            keywords        JSONB NOT NULL DEFAULT '[]',
            archived        BOOLEAN NOT NULL DEFAULT FALSE,
            created_at      BIGINT NOT NULL,
            updated_at      BIGINT NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    tracing::info!(images = %images, projects = %projects, "Metadata tables ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifier() {
        assert!(is_plain_identifier("images"));
        assert!(is_plain_identifier("_photos_v2"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("2images"));
        assert!(!is_plain_identifier("images; DROP TABLE x"));
        assert!(!is_plain_identifier("public.images"));
        assert!(!is_plain_identifier(&"a".repeat(64)));
    }
}
