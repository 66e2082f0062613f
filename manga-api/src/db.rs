//! Database Connection Pool and Postgres Catalog
//!
//! This module provides connection pooling via deadpool-postgres and
//! [`PgCatalog`], the production implementation of the four catalog
//! repository traits. The schema lives in `sql/schema.sql`; cascades
//! (manga -> chapters -> pages, manga -> genre links) are foreign keys with
//! `ON DELETE CASCADE`.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use manga_core::{
    Chapter, ChapterUpdate, EntityId, EntityKind, Manga, MangaError, MangaFilter, MangaResult,
    MangaUpdate, NewChapter, NewManga, NewPage, NewUser, Page, PageUpdate, StorageError, User,
};
use manga_storage::{ChapterRepository, MangaRepository, PageRepository, UserRepository};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::FromSql;
use tokio_postgres::{NoTls, Row};

const SCHEMA: &str = include_str!("../sql/schema.sql");

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// Database connection configuration.
#[derive(Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// How long to wait for a pooled connection
    pub timeout: Duration,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "manga".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// `MANGA_DB_HOST`, `MANGA_DB_PORT`, `MANGA_DB_NAME`, `MANGA_DB_USER`,
    /// `MANGA_DB_PASSWORD`, `MANGA_DB_POOL_SIZE`, `MANGA_DB_TIMEOUT` (seconds).
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("MANGA_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("MANGA_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("MANGA_DB_NAME").unwrap_or_else(|_| "manga".to_string()),
            user: std::env::var("MANGA_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("MANGA_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("MANGA_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("MANGA_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> MangaResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_config);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
            MangaError::from(StorageError::ConnectionFailed {
                reason: format!("Failed to create pool: {}", e),
            })
        })
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn db_error(err: tokio_postgres::Error) -> MangaError {
    tracing::error!("Database error: {:?}", err);
    MangaError::from(StorageError::QueryFailed {
        reason: err.to_string(),
    })
}

fn pool_error(err: deadpool_postgres::PoolError) -> MangaError {
    tracing::error!("Connection pool error: {:?}", err);
    MangaError::from(StorageError::ConnectionFailed {
        reason: err.to_string(),
    })
}

/// A foreign key violation means the referenced parent is gone.
fn parent_error(err: tokio_postgres::Error, parent: EntityKind, parent_id: EntityId) -> MangaError {
    if err.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) {
        return MangaError::not_found(parent, parent_id);
    }
    db_error(err)
}

fn user_write_error(err: tokio_postgres::Error, username: &str, email: &str) -> MangaError {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        let constraint = err
            .as_db_error()
            .and_then(|db| db.constraint())
            .unwrap_or_default();
        let (field, value) = if constraint.contains("email") {
            ("email", email)
        } else {
            ("username", username)
        };
        return MangaError::Conflict {
            entity: EntityKind::User,
            field: field.to_string(),
            value: value.to_string(),
        };
    }
    db_error(err)
}

fn col<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> MangaResult<T> {
    row.try_get(name).map_err(db_error)
}

fn parse_col<T>(row: &Row, name: &str) -> MangaResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = col(row, name)?;
    raw.parse().map_err(|e: T::Err| {
        MangaError::from(StorageError::QueryFailed {
            reason: format!("column {}: {}", name, e),
        })
    })
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const MANGA_SELECT: &str = "SELECT m.id, m.title, m.description, m.cover_image, m.status, \
     m.author, m.artist, m.created_at, m.updated_at, \
     ARRAY(SELECT g.name FROM genres g JOIN manga_genres mg ON g.id = mg.genre_id \
           WHERE mg.manga_id = m.id ORDER BY g.name) AS genres \
     FROM manga m";

const CHAPTER_COLUMNS: &str = "id, manga_id, number, title, created_at, updated_at";
const PAGE_COLUMNS: &str = "id, chapter_id, number, image_path, created_at, updated_at";
const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

const LINK_GENRE: &str = "WITH g AS ( \
       INSERT INTO genres (name) VALUES ($2) \
       ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
       RETURNING id) \
     INSERT INTO manga_genres (manga_id, genre_id) SELECT $1, id FROM g \
     ON CONFLICT DO NOTHING";

fn manga_from_row(row: &Row) -> MangaResult<Manga> {
    Ok(Manga {
        id: col(row, "id")?,
        title: col(row, "title")?,
        description: col(row, "description")?,
        cover_image: col(row, "cover_image")?,
        status: parse_col(row, "status")?,
        author: col(row, "author")?,
        artist: col(row, "artist")?,
        genres: col(row, "genres")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn chapter_from_row(row: &Row) -> MangaResult<Chapter> {
    Ok(Chapter {
        id: col(row, "id")?,
        manga_id: col(row, "manga_id")?,
        number: col(row, "number")?,
        title: col(row, "title")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn page_from_row(row: &Row) -> MangaResult<Page> {
    Ok(Page {
        id: col(row, "id")?,
        chapter_id: col(row, "chapter_id")?,
        number: col(row, "number")?,
        image_path: col(row, "image_path")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn user_from_row(row: &Row) -> MangaResult<User> {
    Ok(User {
        id: col(row, "id")?,
        username: col(row, "username")?,
        email: col(row, "email")?,
        password_hash: col(row, "password_hash")?,
        role: parse_col(row, "role")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

/// Escape LIKE metacharacters so a title filter matches literally.
fn like_pattern(title: &str) -> String {
    let escaped = title
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn normalized_genres(mut genres: Vec<String>) -> Vec<String> {
    genres.retain(|g| !g.trim().is_empty());
    genres.sort();
    genres.dedup();
    genres
}

// ============================================================================
// POSTGRES CATALOG
// ============================================================================

/// Authoritative catalog backed by PostgreSQL.
#[derive(Clone)]
pub struct PgCatalog {
    pool: Pool,
}

impl PgCatalog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> MangaResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn client(&self) -> MangaResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_error)
    }

    /// Create any missing tables and indexes.
    pub async fn apply_schema(&self) -> MangaResult<()> {
        let client = self.client().await?;
        client.batch_execute(SCHEMA).await.map_err(db_error)?;
        tracing::info!("Database schema applied");
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> MangaResult<()> {
        let client = self.client().await?;
        client.query_one("SELECT 1", &[]).await.map_err(db_error)?;
        Ok(())
    }

    async fn ensure_manga(&self, client: &deadpool_postgres::Object, id: EntityId) -> MangaResult<()> {
        let row = client
            .query_opt("SELECT 1 FROM manga WHERE id = $1", &[&id])
            .await
            .map_err(db_error)?;
        match row {
            Some(_) => Ok(()),
            None => Err(MangaError::not_found(EntityKind::Manga, id)),
        }
    }

    async fn user_where(&self, column: &str, value: &str) -> MangaResult<User> {
        let client = self.client().await?;
        let query = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        let row = client
            .query_opt(query.as_str(), &[&value])
            .await
            .map_err(db_error)?;
        match row {
            Some(row) => user_from_row(&row),
            None => Err(MangaError::not_found(EntityKind::User, 0)),
        }
    }
}

impl std::fmt::Debug for PgCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCatalog")
            .field("pool_size", &self.pool_size())
            .finish()
    }
}

#[async_trait]
impl MangaRepository for PgCatalog {
    async fn create(&self, input: NewManga) -> MangaResult<Manga> {
        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(db_error)?;

        let row = tx
            .query_one(
                "INSERT INTO manga (title, description, cover_image, status, author, artist) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
                &[
                    &input.title,
                    &input.description,
                    &input.cover_image,
                    &input.status.as_db_str(),
                    &input.author,
                    &input.artist,
                ],
            )
            .await
            .map_err(db_error)?;
        let id: EntityId = col(&row, "id")?;

        for genre in normalized_genres(input.genres) {
            tx.execute(LINK_GENRE, &[&id, &genre]).await.map_err(db_error)?;
        }

        let query = format!("{} WHERE m.id = $1", MANGA_SELECT);
        let row = tx.query_one(query.as_str(), &[&id]).await.map_err(db_error)?;
        let manga = manga_from_row(&row)?;
        tx.commit().await.map_err(db_error)?;
        Ok(manga)
    }

    async fn get(&self, id: EntityId) -> MangaResult<Manga> {
        let client = self.client().await?;
        let query = format!("{} WHERE m.id = $1", MANGA_SELECT);
        let row = client
            .query_opt(query.as_str(), &[&id])
            .await
            .map_err(db_error)?;
        match row {
            Some(row) => manga_from_row(&row),
            None => Err(MangaError::not_found(EntityKind::Manga, id)),
        }
    }

    async fn list(&self, filter: &MangaFilter) -> MangaResult<Vec<Manga>> {
        let filter = filter.clone().normalized();
        let title: Option<String> = filter
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(like_pattern);
        let status: Option<&str> = filter.status.as_ref().map(|s| s.as_db_str());

        let query = format!(
            "{} WHERE ($1::text IS NULL OR m.title ILIKE $1) \
               AND ($2::text IS NULL OR m.status = $2) \
               AND (cardinality($3::text[]) = 0 OR EXISTS ( \
                    SELECT 1 FROM manga_genres mg JOIN genres g ON g.id = mg.genre_id \
                    WHERE mg.manga_id = m.id AND g.name = ANY($3))) \
             ORDER BY m.updated_at DESC, m.id DESC \
             LIMIT $4 OFFSET $5",
            MANGA_SELECT
        );

        let client = self.client().await?;
        let rows = client
            .query(
                query.as_str(),
                &[&title, &status, &filter.genres, &filter.limit, &filter.offset],
            )
            .await
            .map_err(db_error)?;
        rows.iter().map(manga_from_row).collect()
    }

    async fn update(&self, id: EntityId, update: MangaUpdate) -> MangaResult<Manga> {
        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(db_error)?;

        let query = format!("{} WHERE m.id = $1 FOR UPDATE OF m", MANGA_SELECT);
        let row = tx
            .query_opt(query.as_str(), &[&id])
            .await
            .map_err(db_error)?
            .ok_or_else(|| MangaError::not_found(EntityKind::Manga, id))?;
        let mut manga = manga_from_row(&row)?;

        let relink = update.genres.is_some();
        update.apply(&mut manga);

        let row = tx
            .query_one(
                "UPDATE manga SET title = $1, description = $2, cover_image = $3, status = $4, \
                 author = $5, artist = $6, updated_at = NOW() WHERE id = $7 RETURNING updated_at",
                &[
                    &manga.title,
                    &manga.description,
                    &manga.cover_image,
                    &manga.status.as_db_str(),
                    &manga.author,
                    &manga.artist,
                    &id,
                ],
            )
            .await
            .map_err(db_error)?;
        manga.updated_at = col(&row, "updated_at")?;

        if relink {
            tx.execute("DELETE FROM manga_genres WHERE manga_id = $1", &[&id])
                .await
                .map_err(db_error)?;
            for genre in &manga.genres {
                tx.execute(LINK_GENRE, &[&id, genre]).await.map_err(db_error)?;
            }
        }

        tx.commit().await.map_err(db_error)?;
        Ok(manga)
    }

    async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let client = self.client().await?;
        let removed = client
            .execute("DELETE FROM manga WHERE id = $1", &[&id])
            .await
            .map_err(db_error)?;
        if removed == 0 {
            return Err(MangaError::not_found(EntityKind::Manga, id));
        }
        Ok(())
    }

    async fn add_genre(&self, id: EntityId, genre: &str) -> MangaResult<()> {
        let client = self.client().await?;
        client
            .execute(LINK_GENRE, &[&id, &genre])
            .await
            .map_err(|e| parent_error(e, EntityKind::Manga, id))?;
        Ok(())
    }

    async fn remove_genre(&self, id: EntityId, genre: &str) -> MangaResult<()> {
        let client = self.client().await?;
        self.ensure_manga(&client, id).await?;
        client
            .execute(
                "DELETE FROM manga_genres WHERE manga_id = $1 \
                 AND genre_id IN (SELECT id FROM genres WHERE name = $2)",
                &[&id, &genre],
            )
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn genres(&self, id: EntityId) -> MangaResult<Vec<String>> {
        let client = self.client().await?;
        self.ensure_manga(&client, id).await?;
        let rows = client
            .query(
                "SELECT g.name FROM genres g JOIN manga_genres mg ON g.id = mg.genre_id \
                 WHERE mg.manga_id = $1 ORDER BY g.name",
                &[&id],
            )
            .await
            .map_err(db_error)?;
        rows.iter().map(|row| col(row, "name")).collect()
    }
}

#[async_trait]
impl ChapterRepository for PgCatalog {
    async fn create(&self, input: NewChapter) -> MangaResult<Chapter> {
        let client = self.client().await?;
        let query = format!(
            "INSERT INTO chapters (manga_id, number, title) VALUES ($1, $2, $3) RETURNING {}",
            CHAPTER_COLUMNS
        );
        let row = client
            .query_one(query.as_str(), &[&input.manga_id, &input.number, &input.title])
            .await
            .map_err(|e| parent_error(e, EntityKind::Manga, input.manga_id))?;
        chapter_from_row(&row)
    }

    async fn get(&self, id: EntityId) -> MangaResult<Chapter> {
        let client = self.client().await?;
        let query = format!("SELECT {} FROM chapters WHERE id = $1", CHAPTER_COLUMNS);
        let row = client
            .query_opt(query.as_str(), &[&id])
            .await
            .map_err(db_error)?;
        match row {
            Some(row) => chapter_from_row(&row),
            None => Err(MangaError::not_found(EntityKind::Chapter, id)),
        }
    }

    async fn list_by_manga(&self, manga_id: EntityId) -> MangaResult<Vec<Chapter>> {
        let client = self.client().await?;
        let query = format!(
            "SELECT {} FROM chapters WHERE manga_id = $1 ORDER BY number, id",
            CHAPTER_COLUMNS
        );
        let rows = client
            .query(query.as_str(), &[&manga_id])
            .await
            .map_err(db_error)?;
        rows.iter().map(chapter_from_row).collect()
    }

    async fn update(&self, id: EntityId, update: ChapterUpdate) -> MangaResult<Chapter> {
        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(db_error)?;

        let query = format!("SELECT {} FROM chapters WHERE id = $1 FOR UPDATE", CHAPTER_COLUMNS);
        let row = tx
            .query_opt(query.as_str(), &[&id])
            .await
            .map_err(db_error)?
            .ok_or_else(|| MangaError::not_found(EntityKind::Chapter, id))?;
        let mut chapter = chapter_from_row(&row)?;
        update.apply(&mut chapter);

        let query = format!(
            "UPDATE chapters SET number = $1, title = $2, updated_at = NOW() \
             WHERE id = $3 RETURNING {}",
            CHAPTER_COLUMNS
        );
        let row = tx
            .query_one(query.as_str(), &[&chapter.number, &chapter.title, &id])
            .await
            .map_err(db_error)?;
        let chapter = chapter_from_row(&row)?;
        tx.commit().await.map_err(db_error)?;
        Ok(chapter)
    }

    async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let client = self.client().await?;
        let removed = client
            .execute("DELETE FROM chapters WHERE id = $1", &[&id])
            .await
            .map_err(db_error)?;
        if removed == 0 {
            return Err(MangaError::not_found(EntityKind::Chapter, id));
        }
        Ok(())
    }

    async fn delete_by_manga(&self, manga_id: EntityId) -> MangaResult<u64> {
        let client = self.client().await?;
        client
            .execute("DELETE FROM chapters WHERE manga_id = $1", &[&manga_id])
            .await
            .map_err(db_error)
    }
}

#[async_trait]
impl PageRepository for PgCatalog {
    async fn create(&self, input: NewPage) -> MangaResult<Page> {
        let client = self.client().await?;
        let query = format!(
            "INSERT INTO pages (chapter_id, number, image_path) VALUES ($1, $2, $3) RETURNING {}",
            PAGE_COLUMNS
        );
        let row = client
            .query_one(
                query.as_str(),
                &[&input.chapter_id, &input.number, &input.image_path],
            )
            .await
            .map_err(|e| parent_error(e, EntityKind::Chapter, input.chapter_id))?;
        page_from_row(&row)
    }

    async fn get(&self, id: EntityId) -> MangaResult<Page> {
        let client = self.client().await?;
        let query = format!("SELECT {} FROM pages WHERE id = $1", PAGE_COLUMNS);
        let row = client
            .query_opt(query.as_str(), &[&id])
            .await
            .map_err(db_error)?;
        match row {
            Some(row) => page_from_row(&row),
            None => Err(MangaError::not_found(EntityKind::Page, id)),
        }
    }

    async fn list_by_chapter(&self, chapter_id: EntityId) -> MangaResult<Vec<Page>> {
        let client = self.client().await?;
        let query = format!(
            "SELECT {} FROM pages WHERE chapter_id = $1 ORDER BY number, id",
            PAGE_COLUMNS
        );
        let rows = client
            .query(query.as_str(), &[&chapter_id])
            .await
            .map_err(db_error)?;
        rows.iter().map(page_from_row).collect()
    }

    async fn update(&self, id: EntityId, update: PageUpdate) -> MangaResult<Page> {
        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(db_error)?;

        let query = format!("SELECT {} FROM pages WHERE id = $1 FOR UPDATE", PAGE_COLUMNS);
        let row = tx
            .query_opt(query.as_str(), &[&id])
            .await
            .map_err(db_error)?
            .ok_or_else(|| MangaError::not_found(EntityKind::Page, id))?;
        let mut page = page_from_row(&row)?;
        update.apply(&mut page);

        let query = format!(
            "UPDATE pages SET chapter_id = $1, number = $2, image_path = $3, updated_at = NOW() \
             WHERE id = $4 RETURNING {}",
            PAGE_COLUMNS
        );
        let row = tx
            .query_one(
                query.as_str(),
                &[&page.chapter_id, &page.number, &page.image_path, &id],
            )
            .await
            .map_err(|e| parent_error(e, EntityKind::Chapter, page.chapter_id))?;
        let page = page_from_row(&row)?;
        tx.commit().await.map_err(db_error)?;
        Ok(page)
    }

    async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let client = self.client().await?;
        let removed = client
            .execute("DELETE FROM pages WHERE id = $1", &[&id])
            .await
            .map_err(db_error)?;
        if removed == 0 {
            return Err(MangaError::not_found(EntityKind::Page, id));
        }
        Ok(())
    }

    async fn delete_by_chapter(&self, chapter_id: EntityId) -> MangaResult<u64> {
        let client = self.client().await?;
        client
            .execute("DELETE FROM pages WHERE chapter_id = $1", &[&chapter_id])
            .await
            .map_err(db_error)
    }
}

#[async_trait]
impl UserRepository for PgCatalog {
    async fn create(&self, input: NewUser) -> MangaResult<User> {
        let client = self.client().await?;
        let query = format!(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        let row = client
            .query_one(
                query.as_str(),
                &[
                    &input.username,
                    &input.email,
                    &input.password_hash,
                    &input.role.as_db_str(),
                ],
            )
            .await
            .map_err(|e| user_write_error(e, &input.username, &input.email))?;
        user_from_row(&row)
    }

    async fn get(&self, id: EntityId) -> MangaResult<User> {
        let client = self.client().await?;
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = client
            .query_opt(query.as_str(), &[&id])
            .await
            .map_err(db_error)?;
        match row {
            Some(row) => user_from_row(&row),
            None => Err(MangaError::not_found(EntityKind::User, id)),
        }
    }

    async fn get_by_username(&self, username: &str) -> MangaResult<User> {
        self.user_where("username", username).await
    }

    async fn get_by_email(&self, email: &str) -> MangaResult<User> {
        self.user_where("email", email).await
    }

    async fn update(&self, user: &User) -> MangaResult<User> {
        let client = self.client().await?;
        let query = format!(
            "UPDATE users SET username = $1, email = $2, password_hash = $3, role = $4, \
             updated_at = NOW() WHERE id = $5 RETURNING {}",
            USER_COLUMNS
        );
        let row = client
            .query_opt(
                query.as_str(),
                &[
                    &user.username,
                    &user.email,
                    &user.password_hash,
                    &user.role.as_db_str(),
                    &user.id,
                ],
            )
            .await
            .map_err(|e| user_write_error(e, &user.username, &user.email))?;
        match row {
            Some(row) => user_from_row(&row),
            None => Err(MangaError::not_found(EntityKind::User, user.id)),
        }
    }

    async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let client = self.client().await?;
        let removed = client
            .execute("DELETE FROM users WHERE id = $1", &[&id])
            .await
            .map_err(db_error)?;
        if removed == 0 {
            return Err(MangaError::not_found(EntityKind::User, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("one"), "%one%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn test_normalized_genres() {
        let genres = normalized_genres(vec![
            "drama".to_string(),
            "action".to_string(),
            " ".to_string(),
            "drama".to_string(),
        ]);
        assert_eq!(genres, vec!["action".to_string(), "drama".to_string()]);
    }

    #[test]
    fn test_db_config_debug_redacts_password() {
        let config = DbConfig {
            password: "hunter2".to_string(),
            ..DbConfig::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_schema_declares_every_table() {
        for table in ["manga", "genres", "manga_genres", "chapters", "pages", "users"] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {} ", table)),
                "missing table {}",
                table
            );
        }
    }
}
