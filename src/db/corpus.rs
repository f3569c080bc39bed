use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tracing::info;

use super::models::CorpusMeta;
use super::{Db, deserialize_vector, serialize_vector};
use crate::config::IndexConfig;
use crate::corpus::store::ChunkStore;
use crate::corpus::{ChunkLocation, SpecChunk};

fn location_columns(location: ChunkLocation) -> (Option<i64>, i64) {
    match location {
        ChunkLocation::Offset { offset } => (None, offset as i64),
        ChunkLocation::Page { page, offset } => (Some(page as i64), offset as i64),
    }
}

fn location_from_columns(page: Option<i64>, offset: i64) -> ChunkLocation {
    let offset = offset.max(0) as usize;
    match page {
        Some(page) => ChunkLocation::Page {
            page: page.max(0) as usize,
            offset,
        },
        None => ChunkLocation::Offset { offset },
    }
}

impl Db {
    /// Replace the persisted corpus with `store`.
    pub fn save_store(&mut self, store: &ChunkStore) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM chunks", [])?;
        tx.execute("DELETE FROM corpus_meta", [])?;
        tx.execute(
            "INSERT INTO corpus_meta (id, model_id, dimensions, chunk_count, built_at, saved_at) VALUES (1, ?, ?, ?, ?, ?)",
            params![
                store.model_id(),
                store.dimensions() as i64,
                store.len() as i64,
                store.built_at(),
                Utc::now()
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (id, source_document, page, char_offset, content, embedding, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?;
            for chunk in store.chunks() {
                let (page, offset) = location_columns(chunk.location);
                stmt.execute(params![
                    chunk.id as i64,
                    chunk.source_document,
                    page,
                    offset,
                    chunk.text,
                    serialize_vector(&chunk.embedding),
                    chunk.created_at
                ])?;
            }
        }

        tx.commit()?;
        info!("Saved corpus snapshot: {} chunks", store.len());
        Ok(())
    }

    /// Metadata of the persisted corpus, or `None` if nothing was saved yet.
    pub fn corpus_meta(&self) -> Result<Option<CorpusMeta>> {
        let meta = self
            .conn
            .query_row(
                "SELECT model_id, dimensions, chunk_count, built_at, saved_at FROM corpus_meta WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, DateTime<Utc>>(3)?,
                        row.get::<_, DateTime<Utc>>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((model_id, dimensions, chunk_count, built_at, saved_at)) = meta else {
            return Ok(None);
        };
        let document_count: i64 = self.conn.query_row(
            "SELECT count(DISTINCT source_document) FROM chunks",
            [],
            |row| row.get(0),
        )?;
        Ok(Some(CorpusMeta {
            model_id,
            dimensions: dimensions as usize,
            chunk_count: chunk_count as usize,
            document_count: document_count as usize,
            built_at,
            saved_at,
        }))
    }

    /// Rebuild the persisted corpus as a [`ChunkStore`].
    ///
    /// Every chunk is checked for dimension and unit norm again, and the IVF
    /// index is rebuilt if the corpus is large enough.
    pub fn load_store(&self, index: &IndexConfig, workers: usize) -> Result<Option<ChunkStore>> {
        let Some(meta) = self.corpus_meta()? else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT id, source_document, page, char_offset, content, embedding, created_at FROM chunks ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Vec<u8>>(5)?,
                row.get::<_, DateTime<Utc>>(6)?,
            ))
        })?;

        let mut chunks = Vec::with_capacity(meta.chunk_count);
        for row in rows {
            let (id, source_document, page, offset, text, blob, created_at) = row?;
            let Some(embedding) = deserialize_vector(&blob) else {
                bail!("chunk {id} has a malformed embedding blob ({} bytes)", blob.len());
            };
            chunks.push(SpecChunk {
                id: id as u64,
                source_document,
                location: location_from_columns(page, offset),
                text,
                embedding,
                created_at,
            });
        }

        if chunks.len() != meta.chunk_count {
            bail!(
                "corpus snapshot is incomplete: expected {} chunks, found {}",
                meta.chunk_count,
                chunks.len()
            );
        }

        let store = ChunkStore::from_chunks(
            chunks,
            meta.dimensions,
            meta.model_id,
            meta.built_at,
            index,
            workers,
        )
        .context("corpus snapshot failed validation")?;
        info!("Loaded corpus snapshot: {} chunks", store.len());
        Ok(Some(store))
    }
}
