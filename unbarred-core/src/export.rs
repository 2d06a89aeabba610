//! CSV export of the documents matching a question.

use crate::config::ExportConfig;
use crate::jurisdiction::Jurisdiction;
use crate::pipeline::{PipelineError, Result};
use crate::rag::{DocumentRow, Retriever};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::{debug, info};

/// Exported columns, in order.
pub const COLUMNS: [&str; 6] = ["title", "chapter", "section", "content", "county", "filename"];

/// Runs retrieval for a question and serializes the matching rows.
#[derive(Clone)]
pub struct CsvExporter {
    retriever: Retriever,
    config: ExportConfig,
}

impl CsvExporter {
    pub fn new(retriever: Retriever, config: ExportConfig) -> Self {
        Self { retriever, config }
    }

    pub fn filename(&self) -> &str {
        &self.config.filename
    }

    /// Returns the CSV document, or `NoDocumentsForJurisdiction` when
    /// nothing matched. Unlike chat, retrieval failures are not degraded.
    pub async fn export(&self, query: &str, jurisdiction: Option<Jurisdiction>) -> Result<String> {
        let embedding = self.retriever.embed(query).await?;
        let matches = self
            .retriever
            .retrieve(
                embedding,
                self.config.match_threshold,
                self.config.match_count,
                jurisdiction.map(Jurisdiction::label),
            )
            .await?;

        let ids: Vec<String> = matches
            .iter()
            .map(|row| row.id.clone())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            debug!("No matching identifiers for export");
            return Err(PipelineError::NoDocumentsForJurisdiction);
        }

        let mut rows = self.retriever.fetch_by_ids(&ids).await?;
        if rows.is_empty() {
            debug!(ids = ids.len(), "Re-fetch returned no rows");
            return Err(PipelineError::NoDocumentsForJurisdiction);
        }
        rows.sort_by_key(|row| ids.iter().position(|id| *id == row.id).unwrap_or(usize::MAX));

        info!(rows = rows.len(), "Exporting documents as CSV");
        to_csv(&rows)
    }
}

/// Serializes rows under a bare header line, with every field quoted and
/// embedded quotes doubled.
pub fn to_csv(rows: &[DocumentRow]) -> Result<String> {
    let mut header = COLUMNS.join(",").into_bytes();
    header.push(b'\n');

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(header);

    for row in rows {
        writer
            .write_record([
                &row.title,
                &row.chapter,
                &row.section,
                &row.content,
                &row.jurisdiction,
                &row.filename,
            ])
            .map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| PipelineError::MalformedUpstreamResponse(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| PipelineError::MalformedUpstreamResponse(e.to_string()))
}

fn csv_error(err: csv::Error) -> PipelineError {
    PipelineError::MalformedUpstreamResponse(err.to_string())
}
