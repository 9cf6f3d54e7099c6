//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quran_companion_core::domain::{
    Bookmark, ChatMessage, ChatRecord, ChatRole, ReadingStats, User, UserCredentials, VerseKey,
};
use quran_companion_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Postgres SQLSTATE for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(code: Option<&str>) -> bool {
    code == Some(UNIQUE_VIOLATION)
}

/// A concurrent signup for the same email loses on the unique index.
fn user_insert_error(e: sqlx::Error, email: &str) -> PortError {
    let unique = is_unique_violation(e.as_database_error().and_then(|db| db.code()).as_deref());
    if unique {
        PortError::Conflict(format!("{} is already registered", email))
    } else {
        unexpected(e)
    }
}

fn verse_from_row(surah: i32, ayah: i32) -> PortResult<VerseKey> {
    let surah = u16::try_from(surah).map_err(|e| PortError::Unexpected(e.to_string()))?;
    let ayah = u16::try_from(ayah).map_err(|e| PortError::Unexpected(e.to_string()))?;
    Ok(VerseKey::new(surah, ayah))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ChatRecordRow {
    id: Uuid,
    user_id: Uuid,
    surah: i32,
    ayah: i32,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}
impl ChatRecordRow {
    fn to_domain(self) -> PortResult<ChatRecord> {
        let role = ChatRole::parse(&self.role)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown chat role '{}'", self.role)))?;
        Ok(ChatRecord {
            id: self.id,
            user_id: self.user_id,
            verse: verse_from_row(self.surah, self.ayah)?,
            message: ChatMessage {
                role,
                content: self.content,
            },
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct BookmarkRecord {
    user_id: Uuid,
    surah: i32,
    ayah: i32,
    note: Option<String>,
    created_at: DateTime<Utc>,
}
impl BookmarkRecord {
    fn to_domain(self) -> PortResult<Bookmark> {
        Ok(Bookmark {
            user_id: self.user_id,
            verse: verse_from_row(self.surah, self.ayah)?,
            note: self.note,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct StatsRecord {
    user_id: Uuid,
    ayahs_read: i64,
    last_surah: Option<i32>,
    last_ayah: Option<i32>,
    updated_at: DateTime<Utc>,
}
impl StatsRecord {
    fn to_domain(self) -> PortResult<ReadingStats> {
        let last_read = match (self.last_surah, self.last_ayah) {
            (Some(surah), Some(ayah)) => Some(verse_from_row(surah, ayah)?),
            _ => None,
        };
        Ok(ReadingStats {
            user_id: self.user_id,
            ayahs_read: u64::try_from(self.ayahs_read).unwrap_or(0),
            last_read,
            updated_at: self.updated_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| user_insert_error(e, email))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Uuid = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })?;
        Ok(user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn save_chat_message(
        &self,
        user_id: Uuid,
        verse: VerseKey,
        message: &ChatMessage,
    ) -> PortResult<ChatRecord> {
        let row = sqlx::query_as::<_, ChatRecordRow>(
            "INSERT INTO ayah_conversations (id, user_id, surah, ayah, role, content) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, user_id, surah, ayah, role, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(i32::from(verse.surah))
        .bind(i32::from(verse.ayah))
        .bind(message.role.as_str())
        .bind(message.content.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        row.to_domain()
    }

    async fn get_chat_history(&self, user_id: Uuid, verse: VerseKey) -> PortResult<Vec<ChatRecord>> {
        let rows = sqlx::query_as::<_, ChatRecordRow>(
            "SELECT id, user_id, surah, ayah, role, content, created_at FROM ayah_conversations \
             WHERE user_id = $1 AND surah = $2 AND ayah = $3 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .bind(i32::from(verse.surah))
        .bind(i32::from(verse.ayah))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter().map(ChatRecordRow::to_domain).collect()
    }

    async fn clear_chat_history(&self, user_id: Uuid, verse: VerseKey) -> PortResult<()> {
        sqlx::query("DELETE FROM ayah_conversations WHERE user_id = $1 AND surah = $2 AND ayah = $3")
            .bind(user_id)
            .bind(i32::from(verse.surah))
            .bind(i32::from(verse.ayah))
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn upsert_bookmark(
        &self,
        user_id: Uuid,
        verse: VerseKey,
        note: Option<&str>,
    ) -> PortResult<Bookmark> {
        let record = sqlx::query_as::<_, BookmarkRecord>(
            "INSERT INTO bookmarks (user_id, surah, ayah, note) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, surah, ayah) DO UPDATE SET note = EXCLUDED.note \
             RETURNING user_id, surah, ayah, note, created_at",
        )
        .bind(user_id)
        .bind(i32::from(verse.surah))
        .bind(i32::from(verse.ayah))
        .bind(note)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn remove_bookmark(&self, user_id: Uuid, verse: VerseKey) -> PortResult<()> {
        sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND surah = $2 AND ayah = $3")
            .bind(user_id)
            .bind(i32::from(verse.surah))
            .bind(i32::from(verse.ayah))
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_bookmarks(&self, user_id: Uuid) -> PortResult<Vec<Bookmark>> {
        let records = sqlx::query_as::<_, BookmarkRecord>(
            "SELECT user_id, surah, ayah, note, created_at FROM bookmarks \
             WHERE user_id = $1 ORDER BY surah ASC, ayah ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(BookmarkRecord::to_domain).collect()
    }

    async fn record_ayah_read(&self, user_id: Uuid, verse: VerseKey) -> PortResult<ReadingStats> {
        let record = sqlx::query_as::<_, StatsRecord>(
            "INSERT INTO reading_stats (user_id, ayahs_read, last_surah, last_ayah) VALUES ($1, 1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 ayahs_read = reading_stats.ayahs_read + 1, \
                 last_surah = EXCLUDED.last_surah, \
                 last_ayah = EXCLUDED.last_ayah, \
                 updated_at = NOW() \
             RETURNING user_id, ayahs_read, last_surah, last_ayah, updated_at",
        )
        .bind(user_id)
        .bind(i32::from(verse.surah))
        .bind(i32::from(verse.ayah))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_reading_stats(&self, user_id: Uuid) -> PortResult<ReadingStats> {
        let record = sqlx::query_as::<_, StatsRecord>(
            "SELECT user_id, ayahs_read, last_surah, last_ayah, updated_at FROM reading_stats WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match record {
            Some(record) => record.to_domain(),
            None => Ok(ReadingStats {
                user_id,
                ayahs_read: 0,
                last_read: None,
                updated_at: Utc::now(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unique_violations_are_conflicts() {
        assert!(is_unique_violation(Some("23505")));
        assert!(!is_unique_violation(Some("23503")));
        assert!(!is_unique_violation(None));
    }

    #[test]
    fn other_insert_failures_stay_unexpected() {
        let err = user_insert_error(sqlx::Error::PoolTimedOut, "a@b.com");
        assert!(matches!(err, PortError::Unexpected(_)));
    }

    #[test]
    fn stored_verses_must_fit_the_address_range() {
        assert_eq!(verse_from_row(2, 255).unwrap(), VerseKey::new(2, 255));
        assert!(verse_from_row(-1, 1).is_err());
        assert!(verse_from_row(1, 70_000).is_err());
    }
}
