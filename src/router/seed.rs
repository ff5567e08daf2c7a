use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use tracing::info;

use super::embed::Embedder;
use super::index::{IndexedEntry, VectorIndex};

/// One row of the seed corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRow {
    pub question: String,
    pub answer: String,
    pub action: String,
}

/// Load seed rows from a CSV file with a `question,answer,action` header
pub fn load_rows(path: &Path) -> Result<Vec<SeedRow>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {:?}", path))?;

    let mut records = parse_csv(&text);
    if records.is_empty() {
        bail!("seed file {:?} is empty", path);
    }

    let header = records.remove(0);
    let col = |name: &str| -> Result<usize> {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow!("seed file missing column '{}'", name))
    };
    let (q, a, act) = (col("question")?, col("answer")?, col("action")?);

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(SeedRow {
            question: record.get(q).cloned().unwrap_or_default(),
            answer: record.get(a).cloned().unwrap_or_default(),
            action: record.get(act).cloned().unwrap_or_default(),
        });
    }

    Ok(rows)
}

/// Embed the rows and write them to the index
///
/// Content is the question; answer and action land under
/// `metadata.use_cases.chatbot`. Returns the number of entries written.
pub async fn seed_index(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    space: &str,
    rows: &[SeedRow],
) -> Result<usize> {
    index.ensure_schema(embedder.dim()).await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let embedding = embedder
            .embed(&row.question)
            .with_context(|| format!("failed to embed seed question '{}'", row.question))?;

        entries.push(IndexedEntry {
            content: row.question.clone(),
            embedding,
            space: space.to_string(),
            model_name: embedder.model_name().to_string(),
            metadata: serde_json::json!({
                "use_cases": {
                    "chatbot": {
                        "answer": row.answer,
                        "action": row.action,
                    }
                }
            }),
            cache: true,
        });
    }

    let count = entries.len();
    index.upsert(entries).await?;
    info!("Seeded {} entries into space '{}'", count, space);
    Ok(count)
}

/// Load a CSV seed file and write it to the index
pub async fn seed_from_file(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    space: &str,
    path: &Path,
) -> Result<usize> {
    let rows = load_rows(path)?;
    seed_index(index, embedder, space, &rows).await
}

/// Minimal RFC-4180 style parser: quoted fields, doubled-quote escapes,
/// newlines inside quotes
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}
