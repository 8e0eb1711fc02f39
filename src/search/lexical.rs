//! Lexical (BM25) index over record text.
//!
//! Tantivy's default analyzer does exactly what the domain needs:
//! lowercase, split on word boundaries, no stemming — accented characters
//! stay significant. The index is immutable after build; a rebuild writes
//! a fresh generation directory and promotes it with an atomic rename, so
//! readers either see the prior generation or the complete new one, never
//! a partially-built index.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{INDEXED, STORED, STRING, Schema, TEXT, Value};
use tantivy::{Index, IndexReader, IndexWriter, TantivyDocument, doc};

use crate::model::CodeRecord;

const SCHEMA_VERSION: &str = "v1";
const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Clone, Copy)]
pub struct LexicalFields {
    pub record_id: tantivy::schema::Field,
    pub code: tantivy::schema::Field,
    pub chapter: tantivy::schema::Field,
    pub page: tantivy::schema::Field,
    pub label: tantivy::schema::Field,
    pub content: tantivy::schema::Field,
    /// Rendered record summary, stored only (never searched); carried to
    /// query-time consumers as structured context.
    pub summary: tantivy::schema::Field,
}

pub fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field("record_id", STRING | STORED);
    builder.add_text_field("code", STRING | STORED);
    builder.add_text_field("chapter", TEXT | STORED);
    builder.add_u64_field("page", INDEXED | STORED);
    builder.add_text_field("label", TEXT | STORED);
    builder.add_text_field("content", TEXT | STORED);
    builder.add_text_field("summary", STORED);
    builder.build()
}

pub fn fields_from_schema(schema: &Schema) -> Result<LexicalFields> {
    Ok(LexicalFields {
        record_id: schema.get_field("record_id")?,
        code: schema.get_field("code")?,
        chapter: schema.get_field("chapter")?,
        page: schema.get_field("page")?,
        label: schema.get_field("label")?,
        content: schema.get_field("content")?,
        summary: schema.get_field("summary")?,
    })
}

/// Live generation directory.
pub fn index_dir(base: &Path) -> PathBuf {
    base.join("index").join(SCHEMA_VERSION)
}

/// Staging directory a rebuild writes into before promotion.
pub fn staging_dir(base: &Path) -> PathBuf {
    base.join("index").join(format!("{SCHEMA_VERSION}.building"))
}

/// Promote the staged generation: the live directory is swapped out by
/// rename, so a concurrent reader keeps serving whichever generation it
/// already opened.
pub fn promote_staging(base: &Path) -> Result<PathBuf> {
    let live = index_dir(base);
    let staging = staging_dir(base);
    let retired = base.join("index").join(format!("{SCHEMA_VERSION}.old"));

    if retired.exists() {
        std::fs::remove_dir_all(&retired)?;
    }
    if live.exists() {
        std::fs::rename(&live, &retired)?;
    }
    std::fs::rename(&staging, &live)
        .with_context(|| format!("promote index generation {}", live.display()))?;
    let _ = std::fs::remove_dir_all(&retired);
    Ok(live)
}

/// Single-writer build handle for one index generation.
pub struct LexicalIndexWriter {
    writer: IndexWriter,
    fields: LexicalFields,
}

impl LexicalIndexWriter {
    /// Create a fresh generation in `path` (any previous content is
    /// discarded — rebuilds are wholesale, never incremental).
    pub fn create_in(path: &Path) -> Result<Self> {
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        std::fs::create_dir_all(path)?;
        let schema = build_schema();
        let index = Index::create_in_dir(path, schema.clone())?;
        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .with_context(|| "create index writer")?;
        let fields = fields_from_schema(&schema)?;
        Ok(Self { writer, fields })
    }

    pub fn add_record(&mut self, record: &CodeRecord) -> Result<()> {
        let mut d = doc! {
            self.fields.record_id => record.record_id.clone(),
            self.fields.code => record.code.clone(),
            self.fields.page => record.source_page as u64,
            self.fields.label => record.label.clone(),
            self.fields.content => record.raw_block.clone(),
            self.fields.summary => record.rendered(),
        };
        if let Some(chapter) = &record.chapter {
            d.add_text(self.fields.chapter, chapter);
        }
        self.writer.add_document(d)?;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.writer.commit()?;
        Ok(())
    }
}

/// One BM25 hit with its stored fields.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub record_id: String,
    pub code: String,
    pub label: String,
    pub chapter: Option<String>,
    pub page: u64,
    pub content: String,
    /// Rendered record summary, as stored at build time.
    pub summary: String,
    /// Raw BM25 score (unbounded; normalized downstream).
    pub score: f32,
}

impl LexicalHit {
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "label": self.label,
            "chapter": self.chapter,
            "page": self.page,
            "summary": self.summary,
        })
    }
}

/// Read-only query handle over the live generation.
pub struct LexicalSearcher {
    reader: IndexReader,
    fields: LexicalFields,
    index: Index,
}

impl LexicalSearcher {
    pub fn open(base: &Path) -> Result<Self> {
        let path = index_dir(base);
        let index = Index::open_in_dir(&path)
            .with_context(|| format!("open lexical index {}", path.display()))?;
        let fields = fields_from_schema(&index.schema())?;
        let reader = index.reader()?;
        Ok(Self {
            reader,
            fields,
            index,
        })
    }

    /// BM25 query over label and content. Deterministic for an unchanged
    /// index: equal-score hits keep tantivy's stable doc order.
    pub fn query(&self, text: &str, top_k: usize) -> Result<Vec<LexicalHit>> {
        if text.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let parser =
            QueryParser::for_index(&self.index, vec![self.fields.label, self.fields.content]);
        // Lenient parse: user queries are free medical text, not query syntax.
        let (query, _errors) = parser.parse_query_lenient(text);

        let top_docs = searcher.search(&query, &TopDocs::with_limit(top_k).order_by_score())?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let stored: TantivyDocument = searcher.doc(address)?;
            let get_str = |field| {
                stored
                    .get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            hits.push(LexicalHit {
                record_id: get_str(self.fields.record_id),
                code: get_str(self.fields.code),
                label: get_str(self.fields.label),
                chapter: stored
                    .get_first(self.fields.chapter)
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                page: stored
                    .get_first(self.fields.page)
                    .and_then(|v| v.as_u64())
                    .unwrap_or_default(),
                content: get_str(self.fields.content),
                summary: get_str(self.fields.summary),
                score,
            });
        }
        Ok(hits)
    }
}
