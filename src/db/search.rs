use super::{Db, deserialize_vector, models::*, placeholders};
use rusqlite::types::Value;
use rusqlite::{Result, params};
use std::collections::HashMap;

/// Score assigned to every keyword hit; keyword mode ranks by presence only.
pub const KEYWORD_MATCH_SCORE: f64 = 1.0;

const SEARCH_RESULT_COLUMNS: &str = r#"
    c.id,
    c.content,
    c.start_offset,
    c.end_offset,
    i.id,
    i.title,
    i.source_name,
    i.external_id,
    i.thumbnail,
    i.published_at
"#;

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn map_search_row(row: &rusqlite::Row<'_>, similarity: f64) -> rusqlite::Result<SearchResult> {
    Ok(SearchResult {
        chunk_id: row.get(0)?,
        content: row.get(1)?,
        start_offset: row.get(2)?,
        end_offset: row.get(3)?,
        similarity,
        item_id: row.get(4)?,
        item_title: row.get(5)?,
        source_name: row.get(6)?,
        external_id: row.get(7)?,
        thumbnail: row.get(8)?,
        published_at: row.get(9)?,
    })
}

impl Db {
    /// Case-insensitive substring match over chunk content.
    ///
    /// Both sides are folded with `unicode_lower`, so case is ignored for
    /// every script. The query is matched as given, whitespace included.
    /// Every hit carries [`KEYWORD_MATCH_SCORE`].
    pub fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        order: KeywordOrder,
    ) -> Result<Vec<SearchResult>> {
        let order_by = match order {
            KeywordOrder::Insertion => "c.id ASC",
            KeywordOrder::RecentFirst => "i.published_at DESC NULLS FIRST, c.id ASC",
        };
        let sql = format!(
            r#"
            SELECT {SEARCH_RESULT_COLUMNS}
            FROM chunks c
            JOIN items i ON c.item_id = i.id
            WHERE unicode_lower(c.content) LIKE ? ESCAPE '\'
            ORDER BY {order_by}
            LIMIT ?
            "#
        );

        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            map_search_row(row, KEYWORD_MATCH_SCORE)
        })?;

        rows.collect()
    }

    /// Returns every chunk that carries an embedding, without its text.
    pub fn embedded_chunks(&self) -> Result<Vec<EmbeddedChunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, item_id, embedding FROM chunks WHERE embedding IS NOT NULL ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let blob: Vec<u8> = row.get(2)?;
            Ok(EmbeddedChunk {
                id: row.get(0)?,
                item_id: row.get(1)?,
                embedding: deserialize_vector(&blob),
            })
        })?;

        rows.collect()
    }

    /// Hydrates scored chunk IDs into full search results, preserving the
    /// order of `scored`. IDs that no longer exist are dropped.
    pub fn search_results_for(&self, scored: &[(i64, f64)]) -> Result<Vec<SearchResult>> {
        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            r#"
            SELECT {SEARCH_RESULT_COLUMNS}
            FROM chunks c
            JOIN items i ON c.item_id = i.id
            WHERE c.id IN ({})
            "#,
            placeholders(scored.len())
        );

        let params: Vec<Value> = scored.iter().map(|(id, _)| Value::Integer(*id)).collect();
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| map_search_row(row, 0.0))?;

        let mut by_id: HashMap<i64, SearchResult> = HashMap::new();
        for row in rows {
            let result = row?;
            by_id.insert(result.chunk_id, result);
        }

        Ok(scored
            .iter()
            .filter_map(|(id, similarity)| {
                by_id.remove(id).map(|mut r| {
                    r.similarity = *similarity;
                    r
                })
            })
            .collect())
    }
}
