use super::{Db, deserialize_vector, models::*, serialize_vector};
use rusqlite::{OptionalExtension, Result, Row, params};

pub(crate) fn map_item(row: &Row<'_>) -> Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        external_id: row.get(1)?,
        title: row.get(2)?,
        source_name: row.get(3)?,
        thumbnail: row.get(4)?,
        published_at: row.get(5)?,
    })
}

pub(crate) fn map_chunk(row: &Row<'_>) -> Result<Chunk> {
    let blob: Option<Vec<u8>> = row.get(5)?;
    Ok(Chunk {
        id: row.get(0)?,
        item_id: row.get(1)?,
        content: row.get(2)?,
        start_offset: row.get(3)?,
        end_offset: row.get(4)?,
        embedding: blob.map(|b| deserialize_vector(&b)),
    })
}

impl Db {
    /// Inserts an item or refreshes its metadata, returning its stable ID.
    pub fn upsert_item(&self, item: &NewItem<'_>) -> Result<i64> {
        self.conn.query_row(
            r#"
            INSERT INTO items (external_id, title, source_name, thumbnail, published_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                title = excluded.title,
                source_name = excluded.source_name,
                thumbnail = excluded.thumbnail,
                published_at = excluded.published_at
            RETURNING id
            "#,
            params![
                item.external_id,
                item.title,
                item.source_name,
                item.thumbnail,
                item.published_at,
            ],
            |row| row.get(0),
        )
    }

    /// Appends chunks to an item, returning the new chunk IDs in input order.
    pub fn insert_chunks(&mut self, item_id: i64, chunks: &[NewChunk<'_>]) -> Result<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (item_id, content, start_offset, end_offset, embedding) VALUES (?, ?, ?, ?, ?)",
                params![
                    item_id,
                    chunk.content,
                    chunk.start_offset,
                    chunk.end_offset,
                    chunk.embedding.map(serialize_vector),
                ],
            )?;
            ids.push(tx.last_insert_rowid());
        }

        tx.commit()?;
        Ok(ids)
    }

    /// Sets a chunk's embedding if it has none yet.
    ///
    /// Chunks are immutable after ingestion apart from this single back-fill,
    /// so an already-embedded chunk is left untouched and `false` is returned.
    pub fn backfill_embedding(&self, chunk_id: i64, embedding: &[f32]) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE chunks SET embedding = ? WHERE id = ? AND embedding IS NULL",
            params![serialize_vector(embedding), chunk_id],
        )?;
        Ok(rows > 0)
    }

    /// Returns up to `limit` chunks still waiting for an embedding.
    pub fn chunks_missing_embeddings(&self, limit: usize) -> Result<Vec<Chunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, item_id, content, start_offset, end_offset, embedding FROM chunks WHERE embedding IS NULL ORDER BY id LIMIT ?",
        )?;
        let rows = stmt.query_map(params![limit as i64], map_chunk)?;
        rows.collect()
    }

    pub fn get_item(&self, item_id: i64) -> Result<Option<Item>> {
        self.conn
            .query_row(
                "SELECT id, external_id, title, source_name, thumbnail, published_at FROM items WHERE id = ?",
                params![item_id],
                map_item,
            )
            .optional()
    }

    pub fn get_item_by_external_id(&self, external_id: &str) -> Result<Option<Item>> {
        self.conn
            .query_row(
                "SELECT id, external_id, title, source_name, thumbnail, published_at FROM items WHERE external_id = ?",
                params![external_id],
                map_item,
            )
            .optional()
    }

    pub fn list_item_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM items ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    /// Deletes an item; chunks and every edge touching them cascade.
    pub fn delete_item(&self, item_id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM items WHERE id = ?", params![item_id])?;
        Ok(rows > 0)
    }

    /// Returns every chunk of an item, in insertion order.
    pub fn chunks_for_item(&self, item_id: i64) -> Result<Vec<Chunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, item_id, content, start_offset, end_offset, embedding FROM chunks WHERE item_id = ? ORDER BY id",
        )?;
        let rows = stmt.query_map(params![item_id], map_chunk)?;
        rows.collect()
    }

    pub fn corpus_stats(&self) -> Result<CorpusStats> {
        self.conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM items),
                (SELECT COUNT(*) FROM chunks),
                (SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL),
                (SELECT COUNT(*) FROM chunk_relationships)
            "#,
            [],
            |row| {
                Ok(CorpusStats {
                    items: row.get(0)?,
                    chunks: row.get(1)?,
                    embedded_chunks: row.get(2)?,
                    relationships: row.get(3)?,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn new_item<'a>(external_id: &'a str, title: &'a str) -> NewItem<'a> {
        NewItem {
            external_id,
            title,
            source_name: Some("Channel"),
            thumbnail: None,
            published_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_items_crud() {
        let mut db = Db::open_in_memory().unwrap();

        let id = db.upsert_item(&new_item("yt:abc", "First")).unwrap();
        let item = db.get_item(id).unwrap().unwrap();
        assert_eq!(item.title, "First");
        assert_eq!(item.source_name.as_deref(), Some("Channel"));
        assert_eq!(
            item.published_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );

        // Upsert keeps the ID and refreshes metadata
        let again = db.upsert_item(&new_item("yt:abc", "Renamed")).unwrap();
        assert_eq!(again, id);
        assert_eq!(db.get_item(id).unwrap().unwrap().title, "Renamed");
        assert_eq!(
            db.get_item_by_external_id("yt:abc").unwrap().map(|i| i.id),
            Some(id)
        );

        let chunk_ids = db
            .insert_chunks(
                id,
                &[
                    NewChunk {
                        content: "hello",
                        start_offset: Some(0.0),
                        end_offset: Some(4.5),
                        embedding: Some(&[1.0, 0.0]),
                    },
                    NewChunk {
                        content: "world",
                        start_offset: Some(4.5),
                        end_offset: None,
                        embedding: None,
                    },
                ],
            )
            .unwrap();
        assert_eq!(chunk_ids.len(), 2);

        let chunks = db.chunks_for_item(id).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].embedding, Some(vec![1.0, 0.0]));
        assert_eq!(chunks[1].embedding, None);
        assert_eq!(chunks[0].end_offset, Some(4.5));

        let stats = db.corpus_stats().unwrap();
        assert_eq!(stats.items, 1);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.embedded_chunks, 1);
        assert_eq!(stats.relationships, 0);

        assert!(db.delete_item(id).unwrap());
        assert!(db.get_item(id).unwrap().is_none());
        assert_eq!(db.corpus_stats().unwrap().chunks, 0);
        assert!(!db.delete_item(id).unwrap());
    }

    #[test]
    fn test_backfill_only_once() {
        let mut db = Db::open_in_memory().unwrap();
        let id = db.upsert_item(&new_item("yt:1", "One")).unwrap();
        let chunk_ids = db
            .insert_chunks(
                id,
                &[NewChunk {
                    content: "pending",
                    start_offset: None,
                    end_offset: None,
                    embedding: None,
                }],
            )
            .unwrap();

        assert_eq!(db.chunks_missing_embeddings(10).unwrap().len(), 1);
        assert!(db.backfill_embedding(chunk_ids[0], &[0.5, 0.5]).unwrap());
        assert!(!db.backfill_embedding(chunk_ids[0], &[9.0, 9.0]).unwrap());

        let chunk = &db.chunks_for_item(id).unwrap()[0];
        assert_eq!(chunk.embedding, Some(vec![0.5, 0.5]));
        assert!(db.chunks_missing_embeddings(10).unwrap().is_empty());
    }

    #[test]
    fn test_list_item_ids_ordered() {
        let db = Db::open_in_memory().unwrap();
        let a = db.upsert_item(&new_item("a", "A")).unwrap();
        let b = db.upsert_item(&new_item("b", "B")).unwrap();
        assert_eq!(db.list_item_ids().unwrap(), vec![a, b]);
    }
}
