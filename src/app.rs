use std::collections::HashSet;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::domain::{NormalizedVariant, NotationContext, VariantRecord};
use crate::error::LoaderError;
use crate::fs_util::write_json_atomic;
use crate::graphkb::GraphStore;
use crate::normalize::normalize;
use crate::sources::{self, SourceDefinition};
use crate::upsert::{RecordResolver, UploadCounts};
use crate::variant::VariantUploader;

#[derive(Debug, Clone, Serialize)]
pub struct NormalizeResult {
    pub name: String,
    pub gene: String,
    pub gene_id: Option<String>,
    pub variants: Vec<NormalizedVariant>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub success: usize,
    pub error: usize,
    pub skip: usize,
    pub exists: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    pub id: String,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub source: String,
    pub started_at: String,
    pub finished_at: String,
    pub counts: RecordCounts,
    pub errors: Vec<RecordError>,
    pub uploads: UploadCounts,
    pub cache: CacheStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Normalizes one raw variant name against a gene. No remote calls.
pub fn normalize_name(name: &str, gene: &str, gene_id: Option<&str>) -> Result<NormalizeResult, LoaderError> {
    let context = NotationContext::new(gene, gene_id);
    let variants = normalize(name, &context)?;
    Ok(NormalizeResult {
        name: name.to_string(),
        gene: context.feature_name.clone(),
        gene_id: context.feature_id.clone(),
        variants,
    })
}

pub struct App<S: GraphStore> {
    uploader: VariantUploader<S>,
    source: &'static SourceDefinition,
}

impl<S: GraphStore> App<S> {
    pub fn new(store: S, source_name: &str, gene_source: &str) -> Result<Self, LoaderError> {
        let source =
            sources::find(source_name).ok_or_else(|| LoaderError::UnknownSource(source_name.to_string()))?;
        let uploader = VariantUploader::new(RecordResolver::new(store), source.name).with_gene_source(gene_source);
        Ok(Self { uploader, source })
    }

    pub fn resolver(&self) -> &RecordResolver<S> {
        self.uploader.resolver()
    }

    /// Uploads every record in order. Per-record failures are counted and collected;
    /// only failing to resolve the importing source itself aborts the run.
    pub fn run(&mut self, records: &[VariantRecord], sink: &dyn ProgressSink) -> Result<ImportSummary, LoaderError> {
        let started_at = Utc::now();
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Source; name={}", self.source.name),
            elapsed: None,
        });
        self.uploader.resolver_mut().add_source(self.source)?;

        let mut counts = RecordCounts::default();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (index, record) in records.iter().enumerate() {
            let status = if record.name.trim().is_empty() || !seen.insert(record.id.clone()) {
                counts.skip += 1;
                "skip"
            } else {
                let created_before = self.uploader.resolver().counts().total_created();
                match self.uploader.process_variant_record(record) {
                    Ok(_) if self.uploader.resolver().counts().total_created() == created_before => {
                        counts.exists += 1;
                        "exists"
                    }
                    Ok(_) => {
                        counts.success += 1;
                        "success"
                    }
                    Err(err) => {
                        tracing::error!(id = %record.id, name = %record.name, error = %err, "failed to load variant record");
                        counts.error += 1;
                        errors.push(RecordError {
                            id: record.id.clone(),
                            name: record.name.clone(),
                            error: err.to_string(),
                        });
                        "error"
                    }
                }
            };
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Upload; record={}/{}; id={}; status={status}",
                    index + 1,
                    records.len(),
                    record.id
                ),
                elapsed: Some(started.elapsed()),
            });
        }

        let resolver = self.uploader.resolver();
        tracing::info!(
            source = self.source.name,
            success = counts.success,
            exists = counts.exists,
            error = counts.error,
            skip = counts.skip,
            cache_hit_rate = %format!("{:.1}%", resolver.cache_stats().hit_rate()),
            "finished loading variant records"
        );
        Ok(ImportSummary {
            source: self.source.name.to_string(),
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            counts,
            errors,
            uploads: resolver.counts().clone(),
            cache: resolver.cache_stats(),
            error_log: None,
        })
    }
}

/// Path of the error log for a source: `<prefix>-<source>.json`.
pub fn error_log_path(prefix: &Utf8Path, source: &str) -> Utf8PathBuf {
    let source = source.replace([' ', '/'], "_");
    Utf8PathBuf::from(format!("{prefix}-{source}.json"))
}

/// Writes the summary's error list next to `prefix` and records where it went.
pub fn write_error_log(summary: &mut ImportSummary, prefix: &Utf8Path) -> Result<Utf8PathBuf, LoaderError> {
    let path = error_log_path(prefix, &summary.source);
    write_json_atomic(&path, &summary.errors)?;
    summary.error_log = Some(path.to_string());
    Ok(path)
}
