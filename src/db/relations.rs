use super::{Db, models::*, placeholders};
use rusqlite::types::Value;
use rusqlite::{Result, Row, params};

/// Upper bound on bound parameters per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

fn map_related_edge(row: &Row<'_>) -> Result<RelatedEdge> {
    Ok(RelatedEdge {
        source_chunk_id: row.get(0)?,
        target: RelatedChunk {
            chunk_id: row.get(1)?,
            similarity: row.get(2)?,
            content: row.get(3)?,
            start_offset: row.get(4)?,
            end_offset: row.get(5)?,
            item: RelatedItem {
                id: row.get(6)?,
                title: row.get(7)?,
                source_name: row.get(8)?,
                external_id: row.get(9)?,
            },
        },
    })
}

impl Db {
    /// Returns the IDs of every chunk owned by an item.
    pub fn chunk_ids_for_item(&self, item_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM chunks WHERE item_id = ? ORDER BY id")?;
        let rows = stmt.query_map(params![item_id], |row| row.get(0))?;
        rows.collect()
    }

    /// Inserts directed edges, ignoring any whose `(source, target)` pair is
    /// already stored. Runs in a single transaction.
    pub fn insert_relationships(&mut self, edges: &[Relationship]) -> Result<InsertOutcome> {
        let mut outcome = InsertOutcome::default();
        if edges.is_empty() {
            return Ok(outcome);
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO chunk_relationships (source_chunk_id, target_chunk_id, similarity)
                VALUES (?, ?, ?)
                "#,
            )?;

            for edge in edges {
                let rows = stmt.execute(params![
                    edge.source_chunk_id,
                    edge.target_chunk_id,
                    edge.similarity,
                ])?;
                if rows > 0 {
                    outcome.created += 1;
                } else {
                    outcome.skipped += 1;
                }
            }
        }
        tx.commit()?;

        Ok(outcome)
    }

    /// Returns all outgoing edges from the given chunks, joined with the
    /// target chunk and its item.
    pub fn relationships_from(&self, chunk_ids: &[i64]) -> Result<Vec<RelatedEdge>> {
        let mut edges = Vec::new();

        for batch in chunk_ids.chunks(LOOKUP_CHUNK) {
            let query = format!(
                r#"
                SELECT
                    r.source_chunk_id,
                    r.target_chunk_id,
                    r.similarity,
                    c.content,
                    c.start_offset,
                    c.end_offset,
                    i.id,
                    i.title,
                    i.source_name,
                    i.external_id
                FROM chunk_relationships r
                JOIN chunks c ON r.target_chunk_id = c.id
                JOIN items i ON c.item_id = i.id
                WHERE r.source_chunk_id IN ({})
                ORDER BY r.similarity DESC, r.target_chunk_id ASC
                "#,
                placeholders(batch.len())
            );

            let params: Vec<Value> = batch.iter().map(|id| Value::Integer(*id)).collect();
            let param_refs: Vec<&dyn rusqlite::ToSql> =
                params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

            let mut stmt = self.conn.prepare(&query)?;
            let rows = stmt.query_map(param_refs.as_slice(), map_related_edge)?;
            for row in rows {
                edges.push(row?);
            }
        }

        Ok(edges)
    }

    /// Returns the stored edges leaving a single chunk, without joins.
    pub fn relationships_for_chunk(&self, chunk_id: i64) -> Result<Vec<Relationship>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_chunk_id, target_chunk_id, similarity FROM chunk_relationships WHERE source_chunk_id = ? ORDER BY target_chunk_id",
        )?;
        let rows = stmt.query_map(params![chunk_id], |row| {
            Ok(Relationship {
                source_chunk_id: row.get(0)?,
                target_chunk_id: row.get(1)?,
                similarity: row.get(2)?,
            })
        })?;
        rows.collect()
    }
}
