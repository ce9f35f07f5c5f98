use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value};
use tantivy::{doc, Index, IndexReader, TantivyDocument, Term};
use tracing::{debug, info};

use dxrag_core::traits::SparseSearch;
use dxrag_core::{Error, Passage, Result, ScoredPassage};

use crate::tantivy_utils::{build_schema, register_tokenizer, tokenize};

const WRITER_MEMORY: usize = 50_000_000;

#[derive(Clone, Copy)]
struct Fields {
	protocol_id: Field,
	source_file: Field,
	title: Field,
	chunk_index: Field,
	icd_codes: Field,
	text: Field,
}

impl Fields {
	fn from_schema(schema: &Schema) -> Result<Self> {
		let get = |name: &str| schema.get_field(name).map_err(|e| Error::IndexIntegrity(format!("sparse schema: {e}")));
		Ok(Self {
			protocol_id: get("protocol_id")?,
			source_file: get("source_file")?,
			title: get("title")?,
			chunk_index: get("chunk_index")?,
			icd_codes: get("icd_codes")?,
			text: get("text")?,
		})
	}
}

/// BM25 lexical index. Stores its own copy of every passage so hits are
/// self-contained.
pub struct SparseIndex {
	reader: IndexReader,
	fields: Fields,
}

impl SparseIndex {
	/// In-memory index over `passages`.
	pub fn build(passages: &[Passage]) -> Result<Self> {
		let index = Index::create_in_ram(build_schema());
		Self::populate(index, passages)
	}

	/// On-disk index at `index_dir`, replacing any previous one.
	pub fn create(index_dir: &Path, passages: &[Passage]) -> Result<Self> {
		if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
		std::fs::create_dir_all(index_dir)?;
		let index = Index::create_in_dir(index_dir, build_schema()).map_err(Error::operation)?;
		Self::populate(index, passages)
	}

	pub fn open(index_dir: &Path) -> Result<Self> {
		if !index_dir.exists() {
			return Err(Error::IndexIntegrity(format!("sparse index missing: {}", index_dir.display())));
		}
		let index = Index::open_in_dir(index_dir).map_err(|e| Error::IndexIntegrity(format!("sparse index unreadable: {e}")))?;
		register_tokenizer(&index);
		let this = Self::from_index(&index)?;
		info!(passages = this.len(), dir = %index_dir.display(), "sparse index loaded");
		Ok(this)
	}

	fn populate(index: Index, passages: &[Passage]) -> Result<Self> {
		register_tokenizer(&index);
		let fields = Fields::from_schema(&index.schema())?;
		// one indexing thread keeps doc order, and so score ties, reproducible
		let mut writer = index.writer_with_num_threads(1, WRITER_MEMORY).map_err(Error::operation)?;
		for p in passages {
			let mut document = doc!(
				fields.protocol_id => p.protocol_id.clone(),
				fields.source_file => p.source_file.clone(),
				fields.title => p.title.clone(),
				fields.chunk_index => p.chunk_index as u64,
				fields.text => p.text.clone(),
			);
			for code in &p.icd_codes { document.add_text(fields.icd_codes, code); }
			writer.add_document(document).map_err(Error::operation)?;
		}
		writer.commit().map_err(Error::operation)?;
		let this = Self::from_index(&index)?;
		info!(passages = passages.len(), "sparse index built");
		Ok(this)
	}

	fn from_index(index: &Index) -> Result<Self> {
		let fields = Fields::from_schema(&index.schema())?;
		let reader = index.reader().map_err(Error::operation)?;
		Ok(Self { reader, fields })
	}

	pub fn len(&self) -> usize { self.reader.searcher().num_docs() as usize }

	pub fn is_empty(&self) -> bool { self.len() == 0 }

	/// Up to `k` passages in descending BM25 order. Passages without any
	/// scoring signal are left out even when fewer than `k` remain.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>> {
		let terms = tokenize(query);
		if k == 0 || terms.is_empty() { return Ok(Vec::new()); }
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let q: Box<dyn Query> = Box::new(TermQuery::new(Term::from_field_text(self.fields.text, t), IndexRecordOption::WithFreqs));
				(Occur::Should, q)
			})
			.collect();
		let query = BooleanQuery::new(clauses);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(k)).map_err(Error::operation)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs.into_iter().filter(|(score, _)| *score > 0.0) {
			let doc: TantivyDocument = searcher.doc(addr).map_err(Error::operation)?;
			let rank = hits.len();
			hits.push(ScoredPassage::new(Arc::new(self.passage_from_doc(&doc))).with_sparse(score, rank));
		}
		debug!(hits = hits.len(), k, terms = terms.len(), "sparse search");
		Ok(hits)
	}

	fn passage_from_doc(&self, doc: &TantivyDocument) -> Passage {
		let text_of = |field: Field| doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
		Passage {
			protocol_id: text_of(self.fields.protocol_id),
			source_file: text_of(self.fields.source_file),
			title: text_of(self.fields.title),
			chunk_index: doc.get_first(self.fields.chunk_index).and_then(|v| v.as_u64()).unwrap_or(0) as usize,
			text: text_of(self.fields.text),
			icd_codes: doc.get_all(self.fields.icd_codes).filter_map(|v| v.as_str()).map(str::to_string).collect(),
		}
	}
}

impl SparseSearch for SparseIndex {
	fn search_text(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>> {
		self.search(query, k)
	}
}
