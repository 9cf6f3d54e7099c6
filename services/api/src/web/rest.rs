//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth::{self, AuthResponse, Credentials};
use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use quran_companion_core::{
    domain::{AyahText, Bookmark, ReadingStats, SurahInfo, VerseKey, WordGloss},
    juz::{self, JuzLookup},
    numerals::Locale,
    ports::PortError,
    surah_pages, verses,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        resolve_juz_handler,
        juz_handler,
        surah_juz_handler,
        juz_markers_handler,
        surah_pages_handler,
        list_surahs_handler,
        ayah_handler,
        word_by_word_handler,
        tafsir_handler,
        connection_handler,
        list_bookmarks_handler,
        put_bookmark_handler,
        delete_bookmark_handler,
        record_reading_handler,
        reading_stats_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
    ),
    components(schemas(
        JuzResponse,
        JuzRangeResponse,
        SurahJuzResponse,
        JuzMarkerResponse,
        PageRangeResponse,
        SurahResponse,
        AyahResponse,
        WordResponse,
        TafsirResponse,
        ConnectionResponse,
        BookmarkResponse,
        BookmarkRequest,
        VersePayload,
        StatsResponse,
        Credentials,
        AuthResponse,
    )),
    tags(
        (name = "Quran Companion API", description = "Verse lookups, reading progress and accounts for the Quran companion.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, IntoParams)]
pub struct VerseQuery {
    pub surah: u16,
    pub ayah: u16,
    /// `en` (default) or `ar`.
    pub locale: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct LocaleQuery {
    /// `en` (default) or `ar`.
    pub locale: Option<String>,
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct JuzResponse {
    pub surah: u16,
    pub ayah: u16,
    pub juz: u8,
    pub label: String,
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct JuzRangeResponse {
    pub juz: u8,
    pub label: String,
    /// First verse of the Juz.
    pub start: VersePayload,
    /// Last verse of the Juz, inclusive.
    pub end: VersePayload,
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct SurahJuzResponse {
    pub surah: u16,
    pub juz: u8,
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct JuzMarkerResponse {
    pub ayah: u16,
    pub juz_ending: u8,
    pub juz_starting: u8,
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct PageRangeResponse {
    pub start: u16,
    pub end: u16,
    pub label: String,
}

#[derive(Serialize, ToSchema)]
pub struct SurahResponse {
    pub number: u16,
    pub name: String,
    pub english_name: String,
    pub english_name_translation: String,
    pub number_of_ayahs: u16,
    pub revelation_type: String,
}

impl From<SurahInfo> for SurahResponse {
    fn from(info: SurahInfo) -> Self {
        Self {
            number: info.number,
            name: info.name,
            english_name: info.english_name,
            english_name_translation: info.english_name_translation,
            number_of_ayahs: info.number_of_ayahs,
            revelation_type: info.revelation_type,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct AyahResponse {
    pub surah: u16,
    pub ayah: u16,
    pub text: String,
    /// Empty when the provider had no translation for this verse.
    pub translation: String,
    pub juz: u8,
    pub juz_label: String,
}

impl AyahResponse {
    fn new(ayah: AyahText, juz: u8, locale: Locale) -> Self {
        Self {
            surah: ayah.verse.surah,
            ayah: ayah.verse.ayah,
            text: ayah.text,
            translation: ayah.translation,
            juz,
            juz_label: juz::juz_label(juz, locale),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct WordResponse {
    pub position: u16,
    pub text: String,
    pub transliteration: String,
    pub translation: String,
}

impl From<WordGloss> for WordResponse {
    fn from(word: WordGloss) -> Self {
        Self {
            position: word.position,
            text: word.text,
            transliteration: word.transliteration,
            translation: word.translation,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TafsirResponse {
    pub surah: u16,
    pub ayah: u16,
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct ConnectionResponse {
    /// `good`, `slow` or `offline`.
    pub quality: String,
}

#[derive(Serialize, ToSchema)]
pub struct BookmarkResponse {
    pub surah: u16,
    pub ayah: u16,
    pub note: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Bookmark> for BookmarkResponse {
    fn from(bookmark: Bookmark) -> Self {
        Self {
            surah: bookmark.verse.surah,
            ayah: bookmark.verse.ayah,
            note: bookmark.note,
            created_at: bookmark.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
pub struct BookmarkRequest {
    pub note: Option<String>,
}

#[derive(Deserialize, Serialize, ToSchema, Debug, Clone, Copy, PartialEq)]
pub struct VersePayload {
    pub surah: u16,
    pub ayah: u16,
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct StatsResponse {
    pub ayahs_read: u64,
    pub last_read: Option<VersePayload>,
}

impl From<VerseKey> for VersePayload {
    fn from(verse: VerseKey) -> Self {
        Self {
            surah: verse.surah,
            ayah: verse.ayah,
        }
    }
}

impl From<ReadingStats> for StatsResponse {
    fn from(stats: ReadingStats) -> Self {
        Self {
            ayahs_read: stats.ayahs_read,
            last_read: stats.last_read.map(VersePayload::from),
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

type HandlerError = (StatusCode, String);

fn parse_locale(tag: Option<&str>) -> Result<Locale, HandlerError> {
    match tag {
        None => Ok(Locale::default()),
        Some(tag) => Locale::from_tag(tag)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Unsupported locale '{}'", tag))),
    }
}

fn existing_verse(surah: u16, ayah: u16) -> Result<VerseKey, HandlerError> {
    let verse = VerseKey::new(surah, ayah);
    if verses::is_valid(verse) {
        Ok(verse)
    } else {
        Err((StatusCode::BAD_REQUEST, format!("Verse {} does not exist", verse)))
    }
}

fn unknown_surah(surah: u16) -> HandlerError {
    (StatusCode::NOT_FOUND, format!("Surah {} not found", surah))
}

fn port_failure(what: &str, e: PortError) -> HandlerError {
    error!("Failed to {}: {:?}", what, e);
    let status = match e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, format!("Failed to {}", what))
}

//=========================================================================================
// Verse Lookups
//=========================================================================================

/// Exact Juz of a verse.
#[utoipa::path(
    get,
    path = "/juz/resolve",
    params(VerseQuery),
    responses(
        (status = 200, description = "Juz containing the verse", body = JuzResponse),
        (status = 400, description = "The verse does not exist or the locale is unsupported")
    )
)]
pub async fn resolve_juz_handler(
    Query(query): Query<VerseQuery>,
) -> Result<Json<JuzResponse>, HandlerError> {
    let locale = parse_locale(query.locale.as_deref())?;
    let verse = existing_verse(query.surah, query.ayah)?;
    match juz::resolve_juz(verse.surah, verse.ayah) {
        JuzLookup::Found(juz) => Ok(Json(JuzResponse {
            surah: verse.surah,
            ayah: verse.ayah,
            juz,
            label: juz::juz_label(juz, locale),
        })),
        JuzLookup::NotFound => {
            error!("No Juz record contains canonical verse {}", verse);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Juz table is incomplete".to_string()))
        }
    }
}

/// First and last verse of a Juz.
#[utoipa::path(
    get,
    path = "/juz/{juz}",
    params(("juz" = u8, Path, description = "Juz number (1-30)"), LocaleQuery),
    responses(
        (status = 200, description = "Verse span of the Juz", body = JuzRangeResponse),
        (status = 400, description = "Unsupported locale"),
        (status = 404, description = "Unknown Juz")
    )
)]
pub async fn juz_handler(
    Path(number): Path<u8>,
    Query(query): Query<LocaleQuery>,
) -> Result<Json<JuzRangeResponse>, HandlerError> {
    let locale = parse_locale(query.locale.as_deref())?;
    let boundary = juz::boundary_for(number)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Juz {} not found", number)))?;
    Ok(Json(JuzRangeResponse {
        juz: boundary.juz,
        label: juz::juz_label(boundary.juz, locale),
        start: boundary.start.into(),
        end: boundary.end.into(),
    }))
}

/// Coarse Juz of a surah, taken from its opening verse.
#[utoipa::path(
    get,
    path = "/surahs/{surah}/juz",
    params(("surah" = u16, Path, description = "Surah number (1-114)")),
    responses(
        (status = 200, description = "Juz of the opening verse", body = SurahJuzResponse),
        (status = 404, description = "Unknown surah")
    )
)]
pub async fn surah_juz_handler(
    Path(surah): Path<u16>,
) -> Result<Json<SurahJuzResponse>, HandlerError> {
    let juz = juz::juz_for_surah(surah).ok_or_else(|| unknown_surah(surah))?;
    Ok(Json(SurahJuzResponse { surah, juz }))
}

/// Points inside a surah where a new Juz begins.
#[utoipa::path(
    get,
    path = "/surahs/{surah}/juz-markers",
    params(("surah" = u16, Path, description = "Surah number (1-114)")),
    responses(
        (status = 200, description = "Markers ascending by ayah", body = [JuzMarkerResponse]),
        (status = 404, description = "Unknown surah")
    )
)]
pub async fn juz_markers_handler(
    Path(surah): Path<u16>,
) -> Result<Json<Vec<JuzMarkerResponse>>, HandlerError> {
    if verses::ayah_count(surah).is_none() {
        return Err(unknown_surah(surah));
    }
    let markers = juz::find_intra_surah_boundaries(surah)
        .into_iter()
        .map(|marker| JuzMarkerResponse {
            ayah: marker.ayah,
            juz_ending: marker.juz_ending,
            juz_starting: marker.juz_starting,
        })
        .collect();
    Ok(Json(markers))
}

/// Printed page span of a surah with a localized label.
#[utoipa::path(
    get,
    path = "/surahs/{surah}/pages",
    params(("surah" = u16, Path, description = "Surah number (1-114)"), LocaleQuery),
    responses(
        (status = 200, description = "Page span", body = PageRangeResponse),
        (status = 400, description = "Unsupported locale"),
        (status = 404, description = "Unknown surah")
    )
)]
pub async fn surah_pages_handler(
    Path(surah): Path<u16>,
    Query(query): Query<LocaleQuery>,
) -> Result<Json<PageRangeResponse>, HandlerError> {
    let locale = parse_locale(query.locale.as_deref())?;
    let range = surah_pages::page_range_for_surah(surah).ok_or_else(|| unknown_surah(surah))?;
    Ok(Json(PageRangeResponse {
        start: range.start,
        end: range.end,
        label: surah_pages::format_page_range(range, locale),
    }))
}

//=========================================================================================
// Content Provider
//=========================================================================================

/// All 114 surahs with their metadata.
#[utoipa::path(
    get,
    path = "/surahs",
    responses(
        (status = 200, description = "Surah list", body = [SurahResponse]),
        (status = 503, description = "Provider unreachable and no cached copy")
    )
)]
pub async fn list_surahs_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<SurahResponse>>, HandlerError> {
    let surahs = app_state
        .content_adapter
        .fetch_surah_list()
        .await
        .map_err(|e| port_failure("load surah list", e))?;
    Ok(Json(surahs.into_iter().map(SurahResponse::from).collect()))
}

/// Arabic text and translation of one verse, with the Juz it sits in.
#[utoipa::path(
    get,
    path = "/surahs/{surah}/ayahs/{ayah}",
    params(
        ("surah" = u16, Path, description = "Surah number (1-114)"),
        ("ayah" = u16, Path, description = "Ayah number within the surah"),
        LocaleQuery
    ),
    responses(
        (status = 200, description = "Verse text", body = AyahResponse),
        (status = 400, description = "The verse does not exist or the locale is unsupported"),
        (status = 503, description = "Provider unreachable")
    )
)]
pub async fn ayah_handler(
    State(app_state): State<Arc<AppState>>,
    Path((surah, ayah)): Path<(u16, u16)>,
    Query(query): Query<LocaleQuery>,
) -> Result<Json<AyahResponse>, HandlerError> {
    let locale = parse_locale(query.locale.as_deref())?;
    let verse = existing_verse(surah, ayah)?;
    let text = app_state
        .content_adapter
        .fetch_ayah(verse)
        .await
        .map_err(|e| port_failure("load ayah", e))?;
    // The verse is known to exist, so the fallback never applies here.
    let juz = juz::resolve_juz_or_first(verse.surah, verse.ayah);
    Ok(Json(AyahResponse::new(text, juz, locale)))
}

/// Word-by-word glosses of one verse.
#[utoipa::path(
    get,
    path = "/surahs/{surah}/ayahs/{ayah}/words",
    params(
        ("surah" = u16, Path, description = "Surah number (1-114)"),
        ("ayah" = u16, Path, description = "Ayah number within the surah")
    ),
    responses(
        (status = 200, description = "Words in reading order, empty when the provider had none", body = [WordResponse]),
        (status = 400, description = "The verse does not exist"),
        (status = 503, description = "Provider unreachable")
    )
)]
pub async fn word_by_word_handler(
    State(app_state): State<Arc<AppState>>,
    Path((surah, ayah)): Path<(u16, u16)>,
) -> Result<Json<Vec<WordResponse>>, HandlerError> {
    let verse = existing_verse(surah, ayah)?;
    let words = app_state
        .content_adapter
        .fetch_word_by_word(verse)
        .await
        .map_err(|e| port_failure("load word-by-word", e))?;
    Ok(Json(words.into_iter().map(WordResponse::from).collect()))
}

/// Commentary for one verse.
#[utoipa::path(
    get,
    path = "/surahs/{surah}/ayahs/{ayah}/tafsir",
    params(
        ("surah" = u16, Path, description = "Surah number (1-114)"),
        ("ayah" = u16, Path, description = "Ayah number within the surah")
    ),
    responses(
        (status = 200, description = "Tafsir text, empty when the provider had none", body = TafsirResponse),
        (status = 400, description = "The verse does not exist"),
        (status = 503, description = "Provider unreachable")
    )
)]
pub async fn tafsir_handler(
    State(app_state): State<Arc<AppState>>,
    Path((surah, ayah)): Path<(u16, u16)>,
) -> Result<Json<TafsirResponse>, HandlerError> {
    let verse = existing_verse(surah, ayah)?;
    let text = app_state
        .content_adapter
        .fetch_tafsir(verse)
        .await
        .map_err(|e| port_failure("load tafsir", e))?;
    Ok(Json(TafsirResponse { surah, ayah, text }))
}

/// Fresh connectivity reading.
#[utoipa::path(
    get,
    path = "/connection",
    responses((status = 200, description = "Current quality", body = ConnectionResponse))
)]
pub async fn connection_handler(State(app_state): State<Arc<AppState>>) -> Json<ConnectionResponse> {
    let quality = app_state.probe.probe().await;
    Json(ConnectionResponse {
        quality: quality.as_str().to_string(),
    })
}

//=========================================================================================
// Bookmarks and Reading Stats
//=========================================================================================

/// Bookmarks of the signed-in user. Anonymous callers get an empty list.
#[utoipa::path(
    get,
    path = "/bookmarks",
    responses((status = 200, description = "Bookmarks in reading order", body = [BookmarkResponse]))
)]
pub async fn list_bookmarks_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<BookmarkResponse>>, HandlerError> {
    let Some(user_id) = user_id else {
        return Ok(Json(Vec::new()));
    };
    let bookmarks = app_state
        .db
        .list_bookmarks(user_id)
        .await
        .map_err(|e| port_failure("list bookmarks", e))?;
    Ok(Json(bookmarks.into_iter().map(BookmarkResponse::from).collect()))
}

/// Saves (or updates the note of) a bookmark.
#[utoipa::path(
    put,
    path = "/bookmarks/{surah}/{ayah}",
    params(
        ("surah" = u16, Path, description = "Surah number (1-114)"),
        ("ayah" = u16, Path, description = "Ayah number within the surah")
    ),
    request_body = BookmarkRequest,
    responses(
        (status = 200, description = "Bookmark saved", body = BookmarkResponse),
        (status = 204, description = "Anonymous caller; nothing stored"),
        (status = 400, description = "The verse does not exist")
    )
)]
pub async fn put_bookmark_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((surah, ayah)): Path<(u16, u16)>,
    body: Option<Json<BookmarkRequest>>,
) -> Result<Response, HandlerError> {
    let verse = existing_verse(surah, ayah)?;
    let Some(user_id) = user_id else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    let note = body.map(|Json(request)| request).unwrap_or_default().note;
    let bookmark = app_state
        .db
        .upsert_bookmark(user_id, verse, note.as_deref())
        .await
        .map_err(|e| port_failure("save bookmark", e))?;
    Ok(Json(BookmarkResponse::from(bookmark)).into_response())
}

/// Removes a bookmark. Removing a missing bookmark is not an error.
#[utoipa::path(
    delete,
    path = "/bookmarks/{surah}/{ayah}",
    params(
        ("surah" = u16, Path, description = "Surah number (1-114)"),
        ("ayah" = u16, Path, description = "Ayah number within the surah")
    ),
    responses((status = 204, description = "Bookmark removed"))
)]
pub async fn delete_bookmark_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path((surah, ayah)): Path<(u16, u16)>,
) -> Result<StatusCode, HandlerError> {
    if let Some(user_id) = user_id {
        app_state
            .db
            .remove_bookmark(user_id, VerseKey::new(surah, ayah))
            .await
            .map_err(|e| port_failure("remove bookmark", e))?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Counts one ayah as read and moves the "last read" marker.
#[utoipa::path(
    post,
    path = "/stats/reading",
    request_body = VersePayload,
    responses(
        (status = 200, description = "Updated counters", body = StatsResponse),
        (status = 204, description = "Anonymous caller; nothing stored"),
        (status = 400, description = "The verse does not exist")
    )
)]
pub async fn record_reading_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(payload): Json<VersePayload>,
) -> Result<Response, HandlerError> {
    let verse = existing_verse(payload.surah, payload.ayah)?;
    let Some(user_id) = user_id else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    let stats = app_state
        .db
        .record_ayah_read(user_id, verse)
        .await
        .map_err(|e| port_failure("record reading", e))?;
    Ok(Json(StatsResponse::from(stats)).into_response())
}

/// Reading counters of the signed-in user. Anonymous callers see zeroes.
#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Reading counters", body = StatsResponse))
)]
pub async fn reading_stats_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<StatsResponse>, HandlerError> {
    let Some(user_id) = user_id else {
        return Ok(Json(StatsResponse {
            ayahs_read: 0,
            last_read: None,
        }));
    };
    let stats = app_state
        .db
        .get_reading_stats(user_id)
        .await
        .map_err(|e| port_failure("load reading stats", e))?;
    Ok(Json(stats.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_app_state, InMemoryDb, ScriptedChat};
    use uuid::Uuid;

    fn app() -> Arc<AppState> {
        test_app_state(
            Arc::new(InMemoryDb::default()),
            Arc::new(ScriptedChat::chunks(vec![])),
        )
    }

    fn verse_query(surah: u16, ayah: u16, locale: Option<&str>) -> Query<VerseQuery> {
        Query(VerseQuery {
            surah,
            ayah,
            locale: locale.map(str::to_string),
        })
    }

    fn locale(tag: Option<&str>) -> Query<LocaleQuery> {
        Query(LocaleQuery {
            locale: tag.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn resolves_juz_across_a_mid_surah_boundary() {
        let Json(before) = resolve_juz_handler(verse_query(2, 141, None)).await.unwrap();
        let Json(after) = resolve_juz_handler(verse_query(2, 142, Some("ar"))).await.unwrap();
        assert_eq!(before.juz, 1);
        assert_eq!(after.juz, 2);
        assert_eq!(after.label, "الجزء ٢");
    }

    #[tokio::test]
    async fn verses_outside_the_text_are_bad_requests() {
        let err = resolve_juz_handler(verse_query(1, 8, None)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        let err = resolve_juz_handler(verse_query(115, 1, None)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        let err = resolve_juz_handler(verse_query(1, 1, Some("fr"))).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn coarse_juz_and_markers_for_al_baqarah() {
        let Json(coarse) = surah_juz_handler(Path(2)).await.unwrap();
        assert_eq!(coarse, SurahJuzResponse { surah: 2, juz: 1 });

        let Json(markers) = juz_markers_handler(Path(2)).await.unwrap();
        let starts: Vec<(u16, u8)> = markers.iter().map(|m| (m.ayah, m.juz_starting)).collect();
        assert_eq!(starts, vec![(142, 2), (253, 3)]);

        assert_eq!(surah_juz_handler(Path(0)).await.unwrap_err().0, StatusCode::NOT_FOUND);
        assert_eq!(juz_markers_handler(Path(115)).await.unwrap_err().0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn page_labels_follow_the_locale() {
        let Json(english) = surah_pages_handler(Path(2), locale(None)).await.unwrap();
        assert_eq!(english, PageRangeResponse { start: 2, end: 49, label: "Pages 2-49".to_string() });

        let Json(arabic) = surah_pages_handler(Path(1), locale(Some("ar"))).await.unwrap();
        assert_eq!(arabic.label, "صفحة ١");

        assert_eq!(
            surah_pages_handler(Path(200), locale(None)).await.unwrap_err().0,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn anonymous_callers_no_op_on_personal_data() {
        let app_state = app();
        let anonymous = Extension(CurrentUser(None));

        let response = put_bookmark_handler(State(app_state.clone()), anonymous.clone(), Path((1, 1)), None)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let Json(bookmarks) = list_bookmarks_handler(State(app_state.clone()), anonymous.clone())
            .await
            .unwrap();
        assert!(bookmarks.is_empty());

        let Json(stats) = reading_stats_handler(State(app_state), anonymous).await.unwrap();
        assert_eq!(stats, StatsResponse { ayahs_read: 0, last_read: None });
    }

    #[tokio::test]
    async fn bookmarks_upsert_and_remove() {
        let app_state = app();
        let user = Extension(CurrentUser(Some(Uuid::new_v4())));
        let note = |text: &str| Some(Json(BookmarkRequest { note: Some(text.to_string()) }));

        put_bookmark_handler(State(app_state.clone()), user.clone(), Path((2, 255)), note("first"))
            .await
            .unwrap();
        put_bookmark_handler(State(app_state.clone()), user.clone(), Path((2, 255)), note("second"))
            .await
            .unwrap();
        put_bookmark_handler(State(app_state.clone()), user.clone(), Path((1, 1)), None)
            .await
            .unwrap();

        let Json(bookmarks) = list_bookmarks_handler(State(app_state.clone()), user.clone())
            .await
            .unwrap();
        let listed: Vec<_> = bookmarks.iter().map(|b| (b.surah, b.ayah, b.note.clone())).collect();
        assert_eq!(listed, vec![(1, 1, None), (2, 255, Some("second".to_string()))]);

        let status = delete_bookmark_handler(State(app_state.clone()), user.clone(), Path((2, 255)))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let Json(bookmarks) = list_bookmarks_handler(State(app_state), user).await.unwrap();
        assert_eq!(bookmarks.len(), 1);
    }

    #[tokio::test]
    async fn reading_progress_accumulates() {
        let app_state = app();
        let user = Extension(CurrentUser(Some(Uuid::new_v4())));
        for ayah in 1..=3 {
            let payload = Json(VersePayload { surah: 1, ayah });
            record_reading_handler(State(app_state.clone()), user.clone(), payload)
                .await
                .unwrap();
        }
        let Json(stats) = reading_stats_handler(State(app_state), user).await.unwrap();
        assert_eq!(
            stats,
            StatsResponse {
                ayahs_read: 3,
                last_read: Some(VersePayload { surah: 1, ayah: 3 }),
            }
        );
    }

    #[tokio::test]
    async fn juz_span_comes_from_the_boundary_table() {
        let Json(second) = juz_handler(Path(2), locale(Some("ar"))).await.unwrap();
        assert_eq!(
            second,
            JuzRangeResponse {
                juz: 2,
                label: "الجزء ٢".to_string(),
                start: VersePayload { surah: 2, ayah: 142 },
                end: VersePayload { surah: 2, ayah: 252 },
            }
        );
        let Json(last) = juz_handler(Path(30), locale(None)).await.unwrap();
        assert_eq!(last.end, VersePayload { surah: 114, ayah: 6 });

        assert_eq!(juz_handler(Path(0), locale(None)).await.unwrap_err().0, StatusCode::NOT_FOUND);
        assert_eq!(juz_handler(Path(31), locale(None)).await.unwrap_err().0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ayah_text_carries_its_juz() {
        let Json(ayah) = ayah_handler(State(app()), Path((2, 255)), locale(None)).await.unwrap();
        assert_eq!(ayah.translation, "Translation of 2:255");
        assert_eq!(ayah.juz, 3);
        assert_eq!(ayah.juz_label, "Juz 3");

        let err = ayah_handler(State(app()), Path((1, 8)), locale(None)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn words_and_tafsir_for_a_verse() {
        let Json(words) = word_by_word_handler(State(app()), Path((1, 1))).await.unwrap();
        let positions: Vec<u16> = words.iter().map(|w| w.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(words[0].translation, "In (the) name");

        let err = word_by_word_handler(State(app()), Path((114, 7))).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let Json(tafsir) = tafsir_handler(State(app()), Path((1, 1))).await.unwrap();
        assert_eq!(tafsir.text, "Commentary on 1:1");
    }

    #[test]
    fn port_errors_map_to_statuses() {
        let status = |e| port_failure("test", e).0;
        assert_eq!(status(PortError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(PortError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status(PortError::Unavailable("x".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status(PortError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status(PortError::Unexpected("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn connection_reports_probe_quality() {
        let Json(response) = connection_handler(State(app())).await;
        assert_eq!(response.quality, "good");
    }
}
