use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};

use crate::domain::{NormalizedVariant, VariantRecord};
use crate::error::LoaderError;
use crate::graphkb::GraphStore;
use crate::inference::{self, LinkOutcome};
use crate::normalize::normalize_record;
use crate::notation::PositionalNotation;
use crate::precedence::Precedence;
use crate::record::{self, GraphRecord, Target, source_filter};
use crate::reference::{DEFAULT_GENE_SOURCE, resolve_reference};
use crate::upsert::{AddRecord, RecordResolver};

static RSID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*(rs\d+)\s*$").unwrap());

const SNP_SOURCE: &str = "dbsnp";

/// Uploads normalized variants for one importing source and remembers, per raw
/// variant, what came of it for the rest of the run.
pub struct VariantUploader<S> {
    resolver: RecordResolver<S>,
    source_name: String,
    gene_source: String,
    processed: HashMap<String, Result<Vec<GraphRecord>, String>>,
}

impl<S: GraphStore> VariantUploader<S> {
    pub fn new(resolver: RecordResolver<S>, source_name: &str) -> Self {
        Self {
            resolver,
            source_name: source_name.to_string(),
            gene_source: DEFAULT_GENE_SOURCE.to_string(),
            processed: HashMap::new(),
        }
    }

    pub fn with_gene_source(mut self, gene_source: &str) -> Self {
        self.gene_source = gene_source.to_string();
        self
    }

    pub fn resolver(&self) -> &RecordResolver<S> {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut RecordResolver<S> {
        &mut self.resolver
    }

    /// Normalizes and uploads every variant a raw record describes. A raw variant
    /// that failed earlier in the run fails again without being re-processed.
    pub fn process_variant_record(&mut self, record: &VariantRecord) -> Result<Vec<GraphRecord>, LoaderError> {
        let key = record.cache_key();
        match self.processed.get(&key) {
            Some(Ok(uploaded)) => return Ok(uploaded.clone()),
            Some(Err(message)) => return Err(LoaderError::PreviouslyFailed(message.clone())),
            None => {}
        }

        let result = normalize_record(record).and_then(|variants| {
            variants
                .iter()
                .map(|variant| self.upload_normalized_variant(variant))
                .collect::<Result<Vec<_>, _>>()
        });
        let remembered = match &result {
            Ok(uploaded) => Ok(uploaded.clone()),
            Err(err) => Err(err.to_string()),
        };
        self.processed.insert(key, remembered);
        result
    }

    /// Uploads one descriptor and the variants it is linked to. Only the edges
    /// between them are best-effort.
    pub fn upload_normalized_variant(&mut self, variant: &NormalizedVariant) -> Result<GraphRecord, LoaderError> {
        let uploaded = match variant.kind().and_then(|kind| RSID.captures(kind)) {
            Some(caps) => self.fetch_catalogue_variant(&caps[1].to_lowercase())?,
            None => self.upload_variant(variant)?,
        };

        for (direction, related) in inference::related(variant) {
            let related_record = self.upload_normalized_variant(related)?;
            if let LinkOutcome::SelfLink = inference::link(&mut self.resolver, direction, &uploaded, &related_record) {
                tracing::debug!(variant = variant.label(), "skipped self inference");
            }
        }
        Ok(uploaded)
    }

    fn fetch_catalogue_variant(&mut self, rsid: &str) -> Result<GraphRecord, LoaderError> {
        let filters = json!({
            "AND": [
                { "sourceId": rsid },
                { "source": source_filter(SNP_SOURCE) },
            ]
        });
        self.resolver
            .get_unique_record_by(Target::CatalogueVariant, &filters, &Precedence::TERMS)
            .map_err(|err| match err {
                LoaderError::MissingRecord { .. } => {
                    LoaderError::ReferenceNotFound(format!("unable to fetch variant by rsID ({rsid})"))
                }
                other => other,
            })
    }

    fn upload_variant(&mut self, variant: &NormalizedVariant) -> Result<GraphRecord, LoaderError> {
        let (target, mut content, type_name) = match (variant.variant(), variant.kind()) {
            (Some(notation), _) => {
                let parsed = PositionalNotation::parse(notation)?;
                (
                    Target::PositionalVariant,
                    parsed.to_content(),
                    parsed.event.vocabulary_term().to_string(),
                )
            }
            (None, Some(kind)) => (Target::CategoryVariant, Map::new(), kind.to_string()),
            (None, None) => {
                return Err(LoaderError::InvalidInput(
                    "variant descriptor has neither notation nor type".to_string(),
                ));
            }
        };

        let variant_type = self.variant_type(&type_name)?;
        content.insert("type".to_string(), Value::from(record::rid(&variant_type)?));

        let reference1 = resolve_reference(&mut self.resolver, &variant.reference1, &self.gene_source)?;
        content.insert("reference1".to_string(), Value::from(record::rid(&reference1)?));
        if let Some(reference) = &variant.reference2 {
            let reference2 = resolve_reference(&mut self.resolver, reference, &self.gene_source)?;
            content.insert("reference2".to_string(), Value::from(record::rid(&reference2)?));
        }

        self.resolver
            .add_variant(AddRecord::new(target, content).exists_ok())
    }

    /// Vocabulary term of the importing source, falling back to the internal one.
    fn variant_type(&mut self, term: &str) -> Result<GraphRecord, LoaderError> {
        match self.resolver.get_vocabulary_term(term, &self.source_name) {
            Ok(record) => Ok(record),
            Err(err) => {
                tracing::debug!(term, source = %self.source_name, error = %err, "no source specific term");
                self.resolver.get_internal_vocabulary_term(term)
            }
        }
    }
}
