//! Corpus snapshot persistence in SQLite.
//!
//! One database holds exactly one corpus: a metadata row plus every chunk
//! with its embedding stored as an `f32` BLOB. Saving replaces the previous
//! snapshot in a single transaction.
use rusqlite::{Connection, Result};
use std::path::Path;
use tracing::info;

pub mod corpus;
pub mod models;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS corpus_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    model_id TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    built_at DATETIME NOT NULL,
    saved_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY,
    source_document TEXT NOT NULL,
    page INTEGER,
    char_offset INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    created_at DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_document);
"#;

/// A SQLite connection initialized with the corpus schema.
pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    /// Open a database connection at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening corpus database: {}", path.display());
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database connection (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }
}

/// Embedding as raw bytes in native (little-endian on supported targets) order.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice::<f32, u8>(vec).to_vec()
}

/// Inverse of [`serialize_vector`]. `None` if the blob is not a whole number
/// of `f32`s.
pub fn deserialize_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % size_of::<f32>() != 0 {
        return None;
    }
    // Copy into an f32 buffer; the blob itself may be unaligned
    let mut out = vec![0.0f32; bytes.len() / size_of::<f32>()];
    bytemuck::cast_slice_mut::<f32, u8>(&mut out).copy_from_slice(bytes);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_init() {
        let db = Db::open_in_memory().expect("Failed to open in-memory DB");
        let tables: usize = db
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('corpus_meta', 'chunks');",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    #[cfg(target_endian = "little")]
    fn test_serialize_vector() {
        let bytes = serialize_vector(&[1.0, 2.0, -3.5]);
        assert_eq!(bytes.len(), 12);
        // 1.0f32 = 0x3f800000
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3f]);
        // -3.5f32 = 0xc0600000
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x60, 0xc0]);
    }

    #[test]
    fn test_deserialize_vector() {
        let v = vec![0.6f32, -0.8];
        assert_eq!(deserialize_vector(&serialize_vector(&v)), Some(v));
        assert_eq!(deserialize_vector(&[0, 1, 2]), None);
    }
}
