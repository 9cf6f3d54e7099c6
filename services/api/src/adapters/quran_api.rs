//! services/api/src/adapters/quran_api.rs
//!
//! This module contains the adapter for the public Quran content REST APIs.
//! It implements the `ContentService` port from the `core` crate.
//!
//! The surah list is cached on disk. A fresh cache is served directly; a stale
//! one is only used when every retry against the provider has failed.
//!
//! Per-verse lookups are not cached. Word-by-word and tafsir payloads that do not
//! decode degrade to an empty result instead of an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quran_companion_core::domain::{AyahText, SurahInfo, VerseKey, WordGloss};
use quran_companion_core::ports::{ContentService, PortError, PortResult};
use quran_companion_core::verses::SURAH_COUNT;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

//=========================================================================================
// Retry Policy
//=========================================================================================

/// Exponential backoff: attempt `n` (zero based) waits `base_delay * 2^n` before retrying.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Runs `operation` until it succeeds or `policy.max_attempts` is exhausted.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> PortResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PortResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= policy.max_attempts => return Err(e),
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Attempt {} of {} failed: {}. Retrying in {:?}",
                    attempt + 1,
                    policy.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

//=========================================================================================
// Provider and Cache Payloads
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct SurahPayload {
    number: u16,
    name: String,
    english_name: String,
    english_name_translation: String,
    number_of_ayahs: u16,
    revelation_type: String,
}

impl SurahPayload {
    fn to_domain(self) -> SurahInfo {
        SurahInfo {
            number: self.number,
            name: self.name,
            english_name: self.english_name,
            english_name_translation: self.english_name_translation,
            number_of_ayahs: self.number_of_ayahs,
            revelation_type: self.revelation_type,
        }
    }
}

#[derive(Deserialize)]
struct SurahListResponse {
    data: Vec<SurahPayload>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    saved_at: DateTime<Utc>,
    surahs: Vec<SurahPayload>,
}

/// A list is usable only when it holds every surah exactly once, in order.
fn is_complete(surahs: &[SurahPayload]) -> bool {
    surahs.len() == usize::from(SURAH_COUNT)
        && surahs
            .iter()
            .zip(1..=SURAH_COUNT)
            .all(|(surah, expected)| surah.number == expected)
}

/// Arabic script edition requested next to the translation.
const ARABIC_EDITION: &str = "quran-uthmani";

#[derive(Deserialize)]
struct EditionText {
    text: String,
    edition: EditionId,
}

#[derive(Deserialize)]
struct EditionId {
    identifier: String,
}

#[derive(Deserialize)]
struct AyahEditionsResponse {
    data: Vec<EditionText>,
}

/// Picks the Arabic text and the translation out of a multi-edition ayah payload.
/// The translation is empty when the provider left that edition out.
fn ayah_text(
    verse: VerseKey,
    payload: serde_json::Value,
    translation_edition: &str,
) -> Option<AyahText> {
    let editions = serde_json::from_value::<AyahEditionsResponse>(payload).ok()?.data;
    let text_of = |identifier: &str| {
        editions
            .iter()
            .find(|edition| edition.edition.identifier == identifier)
            .map(|edition| edition.text.clone())
    };
    Some(AyahText {
        verse,
        text: text_of(ARABIC_EDITION)?,
        translation: text_of(translation_edition).unwrap_or_default(),
    })
}

#[derive(Deserialize)]
struct WordsResponse {
    verse: WordsVerse,
}

#[derive(Deserialize)]
struct WordsVerse {
    words: Vec<WordPayload>,
}

#[derive(Deserialize)]
struct WordPayload {
    position: u16,
    text_uthmani: String,
    #[serde(default)]
    char_type_name: Option<String>,
    #[serde(default)]
    translation: Option<GlossPayload>,
    #[serde(default)]
    transliteration: Option<GlossPayload>,
}

#[derive(Deserialize)]
struct GlossPayload {
    #[serde(default)]
    text: Option<String>,
}

fn gloss_text(gloss: Option<GlossPayload>) -> String {
    gloss.and_then(|gloss| gloss.text).unwrap_or_default()
}

/// Words of a verse in reading order, without the closing ayah-number glyph.
/// A payload missing the word list or a word's position or text yields no words.
fn word_glosses(payload: serde_json::Value) -> Vec<WordGloss> {
    let Ok(response) = serde_json::from_value::<WordsResponse>(payload) else {
        return Vec::new();
    };
    let mut words: Vec<WordGloss> = response
        .verse
        .words
        .into_iter()
        .filter(|word| word.char_type_name.as_deref() != Some("end"))
        .map(|word| WordGloss {
            position: word.position,
            text: word.text_uthmani,
            transliteration: gloss_text(word.transliteration),
            translation: gloss_text(word.translation),
        })
        .collect();
    words.sort_by_key(|word| word.position);
    words
}

//=========================================================================================
// On-disk Surah List Cache
//=========================================================================================

/// A single JSON file holding the last good surah list and when it was saved.
#[derive(Debug, Clone)]
pub struct SurahListCache {
    path: PathBuf,
    ttl: Duration,
}

impl SurahListCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: dir.into().join("surah_list.json"),
            ttl,
        }
    }

    /// Reads the cache. Missing, corrupt or incomplete files count as absent.
    async fn load(&self) -> Option<CacheEntry> {
        let raw = tokio::fs::read(&self.path).await.ok()?;
        match serde_json::from_slice::<CacheEntry>(&raw) {
            Ok(entry) if is_complete(&entry.surahs) => Some(entry),
            Ok(_) => {
                warn!("Ignoring incomplete surah list cache at {}", self.path.display());
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable surah list cache at {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        match (now - entry.saved_at).to_std() {
            Ok(age) => age < self.ttl,
            // Saved "in the future" (clock skew): trust it.
            Err(_) => true,
        }
    }

    async fn store(&self, surahs: &[SurahPayload], now: DateTime<Utc>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let entry = CacheEntry {
            saved_at: now,
            surahs: surahs.to_vec(),
        };
        let raw = serde_json::to_vec(&entry)?;
        tokio::fs::write(&self.path, raw).await
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Where each kind of content comes from.
#[derive(Debug, Clone)]
pub struct ContentSources {
    /// alquran.cloud: surah list, ayah text and translation.
    pub quran_base_url: String,
    /// quran.com: word-by-word glosses and tafsir.
    pub verses_base_url: String,
    pub translation_edition: String,
    pub word_language: String,
    pub tafsir_id: u32,
}

/// An adapter that implements `ContentService` against alquran.cloud and quran.com.
#[derive(Clone)]
pub struct QuranApiAdapter {
    client: Client,
    sources: ContentSources,
    cache: SurahListCache,
    retry: RetryPolicy,
    markup: Regex,
}

impl QuranApiAdapter {
    /// Creates a new `QuranApiAdapter`.
    pub fn new(
        client: Client,
        sources: ContentSources,
        cache: SurahListCache,
        retry: RetryPolicy,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            client,
            sources,
            cache,
            retry,
            markup: Regex::new(r"<[^>]*>")?,
        })
    }

    /// GETs `url` as JSON. Transport failures and non-2xx statuses are `Unavailable`;
    /// a body that is not JSON comes back as `None`.
    async fn get_json(&self, url: &str) -> PortResult<Option<serde_json::Value>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PortError::Unavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        match response.json::<serde_json::Value>().await {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                warn!("Undecodable payload from {}: {}", url, e);
                Ok(None)
            }
        }
    }

    /// Saves a freshly fetched list to the cache and converts it. A failed
    /// write is logged; the list is still returned.
    async fn remember(&self, surahs: Vec<SurahPayload>) -> Vec<SurahInfo> {
        if let Err(e) = self.cache.store(&surahs, Utc::now()).await {
            warn!("Failed to write surah list cache: {}", e);
        }
        surahs.into_iter().map(SurahPayload::to_domain).collect()
    }

    async fn fetch_surah_list_once(&self) -> PortResult<Vec<SurahPayload>> {
        let url = format!("{}/surah", self.sources.quran_base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PortError::Unavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let body = response
            .json::<SurahListResponse>()
            .await
            .map_err(|e| PortError::Unexpected(format!("undecodable surah list: {}", e)))?;
        if !is_complete(&body.data) {
            return Err(PortError::Unexpected(format!(
                "surah list has {} entries",
                body.data.len()
            )));
        }
        Ok(body.data)
    }

    fn clean_tafsir(&self, html: &str) -> String {
        let text = self.markup.replace_all(html, " ");
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Pulls `tafsir.text` out of a provider payload, if present.
fn tafsir_text(payload: &serde_json::Value) -> Option<&str> {
    payload.get("tafsir")?.get("text")?.as_str()
}

//=========================================================================================
// `ContentService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentService for QuranApiAdapter {
    async fn fetch_surah_list(&self) -> PortResult<Vec<SurahInfo>> {
        let cached = self.cache.load().await;
        if let Some(entry) = &cached {
            if self.cache.is_fresh(entry, Utc::now()) {
                debug!("Serving surah list from fresh cache");
                return Ok(entry.surahs.iter().cloned().map(SurahPayload::to_domain).collect());
            }
        }

        match with_retry(self.retry, || self.fetch_surah_list_once()).await {
            Ok(surahs) => {
                info!("Fetched surah list from provider");
                Ok(self.remember(surahs).await)
            }
            Err(e) => match cached {
                Some(entry) => {
                    warn!("Provider unavailable ({}); serving stale surah list cache", e);
                    Ok(entry.surahs.into_iter().map(SurahPayload::to_domain).collect())
                }
                None => Err(e),
            },
        }
    }

    async fn fetch_ayah(&self, verse: VerseKey) -> PortResult<AyahText> {
        let url = format!(
            "{}/ayah/{}/editions/{},{}",
            self.sources.quran_base_url, verse, ARABIC_EDITION, self.sources.translation_edition
        );
        self.get_json(&url)
            .await?
            .and_then(|payload| ayah_text(verse, payload, &self.sources.translation_edition))
            .ok_or_else(|| PortError::Unexpected(format!("undecodable ayah payload for {}", verse)))
    }

    async fn fetch_word_by_word(&self, verse: VerseKey) -> PortResult<Vec<WordGloss>> {
        let url = format!(
            "{}/verses/by_key/{}?words=true&language={}&word_fields=text_uthmani",
            self.sources.verses_base_url, verse, self.sources.word_language
        );
        let Some(payload) = self.get_json(&url).await? else {
            return Ok(Vec::new());
        };
        let words = word_glosses(payload);
        if words.is_empty() {
            warn!("Word-by-word payload for {} has no usable words", verse);
        }
        Ok(words)
    }

    async fn fetch_tafsir(&self, verse: VerseKey) -> PortResult<String> {
        let url = format!(
            "{}/tafsirs/{}/by_ayah/{}",
            self.sources.verses_base_url, self.sources.tafsir_id, verse
        );
        let Some(payload) = self.get_json(&url).await? else {
            return Ok(String::new());
        };
        match tafsir_text(&payload) {
            Some(html) => Ok(self.clean_tafsir(html)),
            None => {
                warn!("Tafsir payload for {} has no text field", verse);
                Ok(String::new())
            }
        }
    }
}
