pub mod db;
pub mod paraphrase_llm;
pub mod telegram;

pub use db::PgStore;
pub use paraphrase_llm::OpenAiParaphraseAdapter;
pub use telegram::TelegramTransport;
