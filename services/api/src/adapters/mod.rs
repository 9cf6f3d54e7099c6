pub mod chat_llm;
pub mod db;
pub mod probe;
pub mod quran_api;

pub use chat_llm::EdgeChatAdapter;
pub use db::DbAdapter;
pub use probe::HttpProbe;
pub use quran_api::{ContentSources, QuranApiAdapter, RetryPolicy, SurahListCache};
