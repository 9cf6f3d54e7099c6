pub mod chat;
pub mod connectivity;
pub mod domain;
pub mod juz;
pub mod numerals;
pub mod ports;
pub mod stream;
pub mod surah_pages;
pub mod verses;

pub use chat::{ChatError, ChatPhase, Conversation};
pub use domain::{
    AyahText, Bookmark, ChatMessage, ChatRecord, ChatRole, ConnectionQuality, JuzBoundary,
    JuzMarker, ReadingStats, SurahInfo, SurahPageRange, User, UserCredentials, VerseKey,
    WordGloss,
};
pub use juz::{find_intra_surah_boundaries, juz_for_surah, resolve_juz, JuzLookup};
pub use numerals::Locale;
pub use ports::{
    ByteStream, ChatCompletionService, ConnectivityProbe, ContentService, DatabaseService,
    PortError, PortResult,
};
pub use stream::{DeltaIngester, StreamEvent};
pub use surah_pages::{page_label, page_range_for_surah};
