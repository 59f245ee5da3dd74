use serde_json::{Value, json};

use crate::cache::cache_key;
use crate::domain::Reference;
use crate::error::LoaderError;
use crate::graphkb::GraphStore;
use crate::precedence::Precedence;
use crate::record::{GraphRecord, Target, source_filter};
use crate::upsert::RecordResolver;

/// Source gene features are resolved against unless configured otherwise.
pub const DEFAULT_GENE_SOURCE: &str = "entrez gene";

/// Resolves a variant reference to its stored record. Signatures are matched by
/// name; features by sourceId when known, else by gene symbol. Nothing is created.
pub fn resolve_reference<S: GraphStore>(
    resolver: &mut RecordResolver<S>,
    reference: &Reference,
    gene_source: &str,
) -> Result<GraphRecord, LoaderError> {
    let (target, key, filters, precedence) = match reference {
        Reference::Signature { name } => (
            Target::Signature,
            cache_key(name, None),
            json!({ "name": name }),
            Precedence::TERMS,
        ),
        Reference::Feature { source_id: Some(source_id), .. } => (
            Target::Feature,
            cache_key(source_id, None),
            feature_filters("sourceId", source_id, gene_source),
            Precedence::FEATURES,
        ),
        Reference::Feature { name: Some(name), .. } => (
            Target::Feature,
            cache_key(name, None),
            json!({
                "AND": [
                    { "name": name },
                    { "biotype": "gene" },
                    { "source": source_filter(gene_source) },
                ]
            }),
            Precedence::FEATURES,
        ),
        Reference::Feature { .. } => {
            return Err(LoaderError::ReferenceNotFound(
                "feature reference has neither a name nor a sourceId".to_string(),
            ));
        }
    };

    if let Some(record) = resolver.cache().get(target, &key) {
        return Ok(record);
    }
    tracing::debug!(%target, key, "resolving reference");
    let record = resolver
        .get_unique_record_by(target, &filters, &precedence)
        .map_err(|err| match err {
            LoaderError::MissingRecord { .. } => LoaderError::ReferenceNotFound(reference.to_string()),
            other => other,
        })?;
    resolver.cache().insert(target, key, record.clone());
    Ok(record)
}

fn feature_filters(field: &str, value: &str, gene_source: &str) -> Value {
    json!({
        "AND": [
            { field: value },
            { "source": source_filter(gene_source) },
        ]
    })
}
