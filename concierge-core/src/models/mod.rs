pub mod record;

pub use record::EmbeddingRecord;
