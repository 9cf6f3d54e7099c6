//! In-memory port fakes shared by the service's unit tests.

use crate::web::state::AppState;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use quran_companion_core::domain::{
    AyahText, Bookmark, ChatMessage, ChatRecord, ConnectionQuality, ReadingStats, SurahInfo,
    User, UserCredentials, VerseKey, WordGloss,
};
use quran_companion_core::ports::{
    ByteStream, ChatCompletionService, ConnectivityProbe, ContentService, DatabaseService,
    PortError, PortResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn test_app_state(
    db: Arc<InMemoryDb>,
    chat: Arc<ScriptedChat>,
) -> Arc<AppState> {
    Arc::new(AppState {
        db,
        chat_adapter: chat,
        content_adapter: Arc::new(StaticContent),
        probe: Arc::new(FixedProbe(ConnectionQuality::Good)),
    })
}

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
pub struct InMemoryDb {
    users: Mutex<HashMap<String, UserCredentials>>,
    sessions: Mutex<HashMap<String, (Uuid, DateTime<Utc>)>>,
    chats: Mutex<Vec<ChatRecord>>,
    bookmarks: Mutex<HashMap<(Uuid, VerseKey), Bookmark>>,
    stats: Mutex<HashMap<Uuid, ReadingStats>>,
    stale_email_lookups: bool,
}

impl InMemoryDb {
    /// Email lookups never see existing accounts, as when two signups interleave.
    pub fn with_stale_email_lookups() -> Self {
        Self {
            stale_email_lookups: true,
            ..Self::default()
        }
    }

    pub fn chat_row_count(&self) -> usize {
        self.chats.lock().unwrap().len()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(email) {
            return Err(PortError::Conflict(format!("{} is already registered", email)));
        }
        let user_id = Uuid::new_v4();
        users.insert(
            email.to_string(),
            UserCredentials {
                user_id,
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        if self.stale_email_lookups {
            return Err(PortError::NotFound(email.to_string()));
        }
        self.users
            .lock()
            .unwrap()
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(email.to_string()))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.sessions.lock().unwrap().get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn save_chat_message(
        &self,
        user_id: Uuid,
        verse: VerseKey,
        message: &ChatMessage,
    ) -> PortResult<ChatRecord> {
        let record = ChatRecord {
            id: Uuid::new_v4(),
            user_id,
            verse,
            message: message.clone(),
            created_at: Utc::now(),
        };
        self.chats.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get_chat_history(&self, user_id: Uuid, verse: VerseKey) -> PortResult<Vec<ChatRecord>> {
        Ok(self
            .chats
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id && r.verse == verse)
            .cloned()
            .collect())
    }

    async fn clear_chat_history(&self, user_id: Uuid, verse: VerseKey) -> PortResult<()> {
        self.chats
            .lock()
            .unwrap()
            .retain(|r| !(r.user_id == user_id && r.verse == verse));
        Ok(())
    }

    async fn upsert_bookmark(
        &self,
        user_id: Uuid,
        verse: VerseKey,
        note: Option<&str>,
    ) -> PortResult<Bookmark> {
        let mut bookmarks = self.bookmarks.lock().unwrap();
        let bookmark = bookmarks
            .entry((user_id, verse))
            .and_modify(|b| b.note = note.map(str::to_string))
            .or_insert_with(|| Bookmark {
                user_id,
                verse,
                note: note.map(str::to_string),
                created_at: Utc::now(),
            });
        Ok(bookmark.clone())
    }

    async fn remove_bookmark(&self, user_id: Uuid, verse: VerseKey) -> PortResult<()> {
        self.bookmarks.lock().unwrap().remove(&(user_id, verse));
        Ok(())
    }

    async fn list_bookmarks(&self, user_id: Uuid) -> PortResult<Vec<Bookmark>> {
        let mut bookmarks: Vec<Bookmark> = self
            .bookmarks
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookmarks.sort_by_key(|b| b.verse);
        Ok(bookmarks)
    }

    async fn record_ayah_read(&self, user_id: Uuid, verse: VerseKey) -> PortResult<ReadingStats> {
        let mut stats = self.stats.lock().unwrap();
        let entry = stats.entry(user_id).or_insert_with(|| ReadingStats {
            user_id,
            ayahs_read: 0,
            last_read: None,
            updated_at: Utc::now(),
        });
        entry.ayahs_read += 1;
        entry.last_read = Some(verse);
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn get_reading_stats(&self, user_id: Uuid) -> PortResult<ReadingStats> {
        Ok(self
            .stats
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or(ReadingStats {
                user_id,
                ayahs_read: 0,
                last_read: None,
                updated_at: Utc::now(),
            }))
    }
}

//=========================================================================================
// Chat endpoint
//=========================================================================================

enum Script {
    Chunks(Vec<Result<&'static [u8], &'static str>>),
    StalledAfter(&'static [u8]),
    Unavailable,
}

/// Replays a fixed body and records every request it receives.
pub struct ScriptedChat {
    script: Script,
    requests: Mutex<Vec<(usize, String)>>,
}

impl ScriptedChat {
    pub fn chunks(chunks: Vec<Result<&'static [u8], &'static str>>) -> Self {
        Self::with_script(Script::Chunks(chunks))
    }

    pub fn stalled_after(chunk: &'static [u8]) -> Self {
        Self::with_script(Script::StalledAfter(chunk))
    }

    pub fn unavailable() -> Self {
        Self::with_script(Script::Unavailable)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(history length, context)` of each request.
    pub fn requests(&self) -> Vec<(usize, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletionService for ScriptedChat {
    async fn open_reply_stream(
        &self,
        history: &[ChatMessage],
        context: &str,
    ) -> PortResult<ByteStream> {
        self.requests
            .lock()
            .unwrap()
            .push((history.len(), context.to_string()));
        match &self.script {
            Script::Unavailable => Err(PortError::Unavailable("503".to_string())),
            Script::Chunks(chunks) => {
                let items: Vec<PortResult<Bytes>> = chunks
                    .iter()
                    .map(|chunk| match chunk {
                        Ok(bytes) => Ok(Bytes::from_static(*bytes)),
                        Err(reason) => Err(PortError::Unavailable(reason.to_string())),
                    })
                    .collect();
                Ok(Box::pin(stream::iter(items)))
            }
            Script::StalledAfter(chunk) => {
                let first = stream::iter(vec![PortResult::<Bytes>::Ok(Bytes::from_static(*chunk))]);
                Ok(Box::pin(first.chain(stream::pending())))
            }
        }
    }
}

//=========================================================================================
// Content and probe
//=========================================================================================

pub struct StaticContent;

#[async_trait]
impl ContentService for StaticContent {
    async fn fetch_surah_list(&self) -> PortResult<Vec<SurahInfo>> {
        Ok(vec![SurahInfo {
            number: 1,
            name: "الفاتحة".to_string(),
            english_name: "Al-Faatiha".to_string(),
            english_name_translation: "The Opening".to_string(),
            number_of_ayahs: 7,
            revelation_type: "Meccan".to_string(),
        }])
    }

    async fn fetch_ayah(&self, verse: VerseKey) -> PortResult<AyahText> {
        Ok(AyahText {
            verse,
            text: "بِسْمِ ٱللَّهِ ٱلرَّحْمَٰنِ ٱلرَّحِيمِ".to_string(),
            translation: format!("Translation of {}", verse),
        })
    }

    async fn fetch_word_by_word(&self, _verse: VerseKey) -> PortResult<Vec<WordGloss>> {
        let gloss = |position: u16, text: &str, transliteration: &str, translation: &str| WordGloss {
            position,
            text: text.to_string(),
            transliteration: transliteration.to_string(),
            translation: translation.to_string(),
        };
        Ok(vec![
            gloss(1, "بِسْمِ", "bis'mi", "In (the) name"),
            gloss(2, "ٱللَّهِ", "l-lahi", "(of) Allah"),
        ])
    }

    async fn fetch_tafsir(&self, verse: VerseKey) -> PortResult<String> {
        Ok(format!("Commentary on {}", verse))
    }
}

pub struct FixedProbe(pub ConnectionQuality);

#[async_trait]
impl ConnectivityProbe for FixedProbe {
    async fn probe(&self) -> ConnectionQuality {
        self.0
    }
}
