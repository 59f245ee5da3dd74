mod common;

use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Map, Value, json};

use common::{MockGraphKb, seeded_store};
use kb_loader::app::{App, ProgressEvent, ProgressSink, write_error_log};
use kb_loader::domain::{NormalizedVariant, Reference, VariantRecord};
use kb_loader::error::LoaderError;
use kb_loader::graphkb::GraphStore;
use kb_loader::inference::{self, Direction, LinkOutcome};
use kb_loader::record::{GraphRecord, Target};
use kb_loader::reference::{DEFAULT_GENE_SOURCE, resolve_reference};
use kb_loader::upsert::RecordResolver;
use kb_loader::variant::VariantUploader;

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

fn gene_record(id: u64, name: &str, gene: &str, entrez_id: u64) -> VariantRecord {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "feature": {"__typename": "Gene", "name": gene, "entrezId": entrez_id}
    }))
    .unwrap()
}

/// Store that refuses to create `Infers` edges.
struct EdgeRejectingStore {
    inner: MockGraphKb,
}

impl GraphStore for EdgeRejectingStore {
    fn create(&self, target: Target, content: &Map<String, Value>) -> Result<GraphRecord, LoaderError> {
        if target == Target::Infers {
            return Err(LoaderError::GraphKbStatus {
                status: 500,
                message: "edge store unavailable".to_string(),
            });
        }
        self.inner.create(target, content)
    }

    fn query(&self, target: Target, filters: &Value) -> Result<Vec<GraphRecord>, LoaderError> {
        self.inner.query(target, filters)
    }

    fn update(&self, target: Target, rid: &str, content: &Map<String, Value>) -> Result<GraphRecord, LoaderError> {
        self.inner.update(target, rid, content)
    }
}

fn braf() -> Reference {
    Reference::gene("braf", Some("673".to_string()))
}

#[test]
fn run_counts_each_record_outcome() {
    let store = seeded_store();
    let records = vec![
        gene_record(1, "V600E", "BRAF", 673),
        gene_record(1, "V600E", "BRAF", 673),
        gene_record(2, " ", "BRAF", 673),
        gene_record(3, "G12D", "NOTAGENE", 99999),
    ];
    let sink = RecordingSink::default();
    let mut app = App::new(&store, "civic", DEFAULT_GENE_SOURCE).unwrap();
    let summary = app.run(&records, &sink).unwrap();

    assert_eq!(summary.source, "civic");
    assert_eq!(summary.counts.success, 1);
    assert_eq!(summary.counts.skip, 2);
    assert_eq!(summary.counts.error, 1);
    assert_eq!(summary.counts.exists, 0);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].id, "3");
    assert_eq!(summary.uploads.created["PositionalVariant"], 1);
    assert_eq!(summary.uploads.created["Source"], 1);
    assert_eq!(sink.messages.lock().unwrap().len(), records.len() + 1);
}

#[test]
fn rerun_reports_existing_records() {
    let store = seeded_store();
    let records = vec![gene_record(1, "V600E", "BRAF", 673)];
    App::new(&store, "civic", DEFAULT_GENE_SOURCE)
        .unwrap()
        .run(&records, &RecordingSink::default())
        .unwrap();

    let mut rerun = App::new(&store, "civic", DEFAULT_GENE_SOURCE).unwrap();
    let summary = rerun.run(&records, &RecordingSink::default()).unwrap();
    assert_eq!(summary.counts.exists, 1);
    assert_eq!(summary.counts.success, 0);
    assert_eq!(store.records(Target::PositionalVariant).len(), 1);
    assert_eq!(store.records(Target::Source).len(), 4);
}

#[test]
fn unknown_source_is_rejected() {
    let store = seeded_store();
    assert!(matches!(
        App::new(&store, "nowhere", DEFAULT_GENE_SOURCE),
        Err(LoaderError::UnknownSource(_))
    ));
}

#[test]
fn positional_variant_links_to_gene_and_type() {
    let store = seeded_store();
    let mut uploader = VariantUploader::new(RecordResolver::new(&store), "civic");
    let uploaded = uploader
        .process_variant_record(&gene_record(1, "V600E", "BRAF", 673))
        .unwrap();
    assert_eq!(uploaded.len(), 1);

    let variant = &uploaded[0];
    let gene = store
        .records(Target::Feature)
        .into_iter()
        .find(|record| record.name() == Some("braf"))
        .unwrap();
    let substitution = store
        .records(Target::Vocabulary)
        .into_iter()
        .find(|record| record.source_id() == Some("substitution"))
        .unwrap();
    assert_eq!(variant.get_str("reference1"), gene.rid());
    assert_eq!(variant.get_str("type"), substitution.rid());
    assert_eq!(variant.get_str("refSeq"), Some("V"));
    assert_eq!(variant.get_str("untemplatedSeq"), Some("E"));
}

#[test]
fn protein_change_is_inferred_by_cds_change() {
    let store = seeded_store();
    let mut uploader = VariantUploader::new(RecordResolver::new(&store), "civic");
    let uploaded = uploader
        .process_variant_record(&gene_record(1, "V600E (c.1799T>A)", "BRAF", 673))
        .unwrap();
    let protein = uploaded[0].rid().unwrap();

    let variants = store.records(Target::PositionalVariant);
    assert_eq!(variants.len(), 2);
    let cds = variants
        .iter()
        .find(|record| record.rid() != Some(protein))
        .and_then(|record| record.rid())
        .unwrap();

    let edges = store.records(Target::Infers);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].get_str("out"), Some(cds));
    assert_eq!(edges[0].get_str("in"), Some(protein));
}

#[test]
fn unparsable_companion_variant_fails_the_record() {
    let store = seeded_store();
    let mut uploader = VariantUploader::new(RecordResolver::new(&store), "civic");
    assert_matches!(
        uploader.process_variant_record(&gene_record(1, "V600E (c.weird)", "BRAF", 673)),
        Err(LoaderError::Notation(_))
    );
    assert!(store.records(Target::Infers).is_empty());

    let records = vec![gene_record(2, "V600E (c.weird)", "BRAF", 673)];
    let summary = App::new(&store, "civic", DEFAULT_GENE_SOURCE)
        .unwrap()
        .run(&records, &RecordingSink::default())
        .unwrap();
    assert_eq!(summary.counts.error, 1);
    assert_eq!(summary.counts.success, 0);
}

#[test]
fn failed_edge_does_not_fail_the_variant() {
    let store = EdgeRejectingStore { inner: seeded_store() };
    let mut uploader = VariantUploader::new(RecordResolver::new(&store), "civic");
    let uploaded = uploader
        .process_variant_record(&gene_record(1, "V600E (c.1799T>A)", "BRAF", 673))
        .unwrap();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(store.inner.records(Target::PositionalVariant).len(), 2);
    assert!(store.inner.records(Target::Infers).is_empty());

    let variants = store.inner.records(Target::PositionalVariant);
    let mut resolver = RecordResolver::new(&store);
    assert_matches!(
        inference::link(&mut resolver, Direction::InferredBy, &variants[0], &variants[1]),
        LinkOutcome::Failed(_)
    );
}

#[test]
fn repeated_edges_are_reported_as_existing() {
    let store = seeded_store();
    let first = store.seed(Target::PositionalVariant, json!({"break1Repr": "p.V600"}));
    let second = store.seed(Target::PositionalVariant, json!({"break1Repr": "c.1799"}));
    let mut resolver = RecordResolver::new(&store);

    assert_matches!(
        inference::link(&mut resolver, Direction::InferredBy, &first, &second),
        LinkOutcome::Linked(_)
    );
    let mut rerun = RecordResolver::new(&store);
    assert_eq!(
        inference::link(&mut rerun, Direction::InferredBy, &first, &second),
        LinkOutcome::Exists
    );
    assert_eq!(
        inference::link(&mut rerun, Direction::Infers, &first, &first),
        LinkOutcome::SelfLink
    );
    assert_eq!(store.records(Target::Infers).len(), 1);
}

#[test]
fn rsid_resolves_catalogue_variant() {
    let store = seeded_store();
    let mut uploader = VariantUploader::new(RecordResolver::new(&store), "civic");
    let found = uploader
        .upload_normalized_variant(&NormalizedVariant::category("RS121913529", braf()))
        .unwrap();
    assert_eq!(found.source_id(), Some("rs121913529"));
    assert_eq!(store.creates(), 0);

    assert_matches!(
        uploader.upload_normalized_variant(&NormalizedVariant::category("rs1", braf())),
        Err(LoaderError::ReferenceNotFound(_))
    );
}

#[test]
fn factor_record_becomes_signature_category() {
    let store = seeded_store();
    let record: VariantRecord = serde_json::from_value(json!({
        "id": 10,
        "name": "TMB-H",
        "feature": {"__typename": "Factor", "name": "TMB"}
    }))
    .unwrap();
    let mut uploader = VariantUploader::new(RecordResolver::new(&store), "civic");
    let uploaded = uploader.process_variant_record(&record).unwrap();

    let signature = store.records(Target::Signature).remove(0);
    assert_eq!(uploaded[0].get_str("reference1"), signature.rid());
    assert_eq!(store.records(Target::CategoryVariant).len(), 1);
}

#[test]
fn fusion_record_uses_both_partners() {
    let store = seeded_store();
    let record: VariantRecord = serde_json::from_value(json!({
        "id": 11,
        "name": "EML4::ALK",
        "feature": {
            "__typename": "Fusion",
            "fivePrimeGene": {"name": "EML4", "entrezId": 27436},
            "threePrimeGene": {"name": "ALK", "entrezId": 238}
        }
    }))
    .unwrap();
    let mut uploader = VariantUploader::new(RecordResolver::new(&store), "civic");
    let uploaded = uploader.process_variant_record(&record).unwrap();

    let feature_rid = |name: &str| {
        store
            .records(Target::Feature)
            .into_iter()
            .find(|record| record.name() == Some(name))
            .and_then(|record| record.rid().map(str::to_string))
    };
    assert_eq!(uploaded[0].get_str("reference1").map(str::to_string), feature_rid("eml4"));
    assert_eq!(uploaded[0].get_str("reference2").map(str::to_string), feature_rid("alk"));
}

#[test]
fn failed_variants_are_not_retried() {
    let store = seeded_store();
    let mut uploader = VariantUploader::new(RecordResolver::new(&store), "civic");
    let unknown = gene_record(1, "G12D", "NOTAGENE", 99999);

    assert_matches!(
        uploader.process_variant_record(&unknown),
        Err(LoaderError::ReferenceNotFound(_))
    );
    let queries = store.queries();
    assert_matches!(
        uploader.process_variant_record(&gene_record(2, "G12D", "NOTAGENE", 99999)),
        Err(LoaderError::PreviouslyFailed(_))
    );
    assert_eq!(store.queries(), queries);

    let region: VariantRecord = serde_json::from_value(json!({
        "id": 3,
        "name": "x",
        "feature": {"__typename": "Region"}
    }))
    .unwrap();
    assert_matches!(
        uploader.process_variant_record(&region),
        Err(LoaderError::NotImplemented(_))
    );
    assert_matches!(
        uploader.process_variant_record(&region),
        Err(LoaderError::PreviouslyFailed(_))
    );
}

#[test]
fn references_are_cached_per_run() {
    let store = seeded_store();
    let mut resolver = RecordResolver::new(&store);
    let first = resolve_reference(&mut resolver, &braf(), DEFAULT_GENE_SOURCE).unwrap();
    let queries = store.queries();
    let second = resolve_reference(&mut resolver, &braf(), DEFAULT_GENE_SOURCE).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.queries(), queries);
    assert_eq!(resolver.cache_stats().hits, 1);
}

#[test]
fn gene_symbol_lookup_without_id() {
    let store = seeded_store();
    let mut resolver = RecordResolver::new(&store);
    let kras = resolve_reference(&mut resolver, &Reference::named("kras"), DEFAULT_GENE_SOURCE).unwrap();
    assert_eq!(kras.source_id(), Some("3845"));

    assert_matches!(
        resolve_reference(&mut resolver, &Reference::named("nras"), DEFAULT_GENE_SOURCE),
        Err(LoaderError::ReferenceNotFound(_))
    );
}

#[test]
fn error_log_is_written_next_to_prefix() {
    let store = seeded_store();
    let records = vec![gene_record(3, "G12D", "NOTAGENE", 99999)];
    let mut summary = App::new(&store, "entrez gene", DEFAULT_GENE_SOURCE)
        .unwrap()
        .run(&records, &RecordingSink::default())
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let prefix = Utf8PathBuf::from_path_buf(dir.path().join("logs").join("errors")).unwrap();
    let path = write_error_log(&mut summary, &prefix).unwrap();

    assert!(path.as_str().ends_with("errors-entrez_gene.json"));
    assert_eq!(summary.error_log.as_deref(), Some(path.as_str()));
    let written: Value = serde_json::from_str(&fs::read_to_string(path.as_std_path()).unwrap()).unwrap();
    assert_eq!(written[0]["id"], "3");
    assert_eq!(written[0]["name"], "G12D");
}
