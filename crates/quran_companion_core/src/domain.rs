//! crates/quran_companion_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// The address of a single verse: surah number (1..=114) and ayah number (>= 1).
///
/// Ordering follows the canonical reading sequence: first by surah, then by
/// ayah within the same surah.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerseKey {
    pub surah: u16,
    pub ayah: u16,
}

impl VerseKey {
    pub const fn new(surah: u16, ayah: u16) -> Self {
        Self { surah, ayah }
    }
}

impl Ord for VerseKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.surah
            .cmp(&other.surah)
            .then_with(|| self.ayah.cmp(&other.ayah))
    }
}

impl PartialOrd for VerseKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.surah, self.ayah)
    }
}

/// One of the 30 canonical Quran parts, with its first and last verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JuzBoundary {
    pub juz: u8,
    pub start: VerseKey,
    pub end: VerseKey,
}

impl JuzBoundary {
    /// True when `verse` lies inside `start..=end`.
    pub fn contains(&self, verse: VerseKey) -> bool {
        verse >= self.start && verse <= self.end
    }
}

/// A point inside a surah where one Juz ends and the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JuzMarker {
    pub ayah: u16,
    pub juz_ending: u8,
    pub juz_starting: u8,
}

/// The printed page span of one surah.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurahPageRange {
    pub start: u16,
    pub end: u16,
}

impl SurahPageRange {
    pub fn is_single_page(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// A single entry in an ayah conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A chat message as persisted for a signed-in user.
#[derive(Debug, Clone)]
pub struct ChatRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub verse: VerseKey,
    pub message: ChatMessage,
    pub created_at: DateTime<Utc>,
}

/// Network quality as seen from a timed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionQuality {
    Good,
    Slow,
    Offline,
}

impl ConnectionQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionQuality::Good => "good",
            ConnectionQuality::Slow => "slow",
            ConnectionQuality::Offline => "offline",
        }
    }
}

/// Summary metadata for one surah, as served by the content provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurahInfo {
    pub number: u16,
    pub name: String,
    pub english_name: String,
    pub english_name_translation: String,
    pub number_of_ayahs: u16,
    pub revelation_type: String,
}

/// Arabic text of one ayah with its translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AyahText {
    pub verse: VerseKey,
    pub text: String,
    pub translation: String,
}

/// One word of an ayah with its gloss. Positions start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordGloss {
    pub position: u16,
    pub text: String,
    pub transliteration: String,
    pub translation: String,
}

/// A verse saved by a user.
#[derive(Debug, Clone)]
pub struct Bookmark {
    pub user_id: Uuid,
    pub verse: VerseKey,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-user reading counters.
#[derive(Debug, Clone)]
pub struct ReadingStats {
    pub user_id: Uuid,
    pub ayahs_read: u64,
    pub last_read: Option<VerseKey>,
    pub updated_at: DateTime<Utc>,
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}
