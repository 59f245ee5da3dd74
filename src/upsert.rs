//! Idempotent create-or-adopt of remote records.
//!
//! Every write goes through [`RecordResolver::add_record`]: a uniqueness conflict on
//! create is resolved by fetching the existing record, so re-running an import over
//! the same input never duplicates records.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::cache::{CacheStats, ReferenceCache, cache_key};
use crate::error::LoaderError;
use crate::graphkb::GraphStore;
use crate::precedence::{Precedence, select_preferred};
use crate::record::{self, GraphRecord, Target, query_filters, simplify, source_filter};
use crate::sources::{INTERNAL_SOURCE_NAME, SourceDefinition};

static INHIBITOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\binhibitor\b").unwrap());
static INHIBITORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\binhibitors\b").unwrap());
static COMBINATION_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\+\s*").unwrap());

/// Fields a variant lookup pins to null unless the content sets them.
const VARIANT_NULL_FIELDS: &[&str] = &["germline", "reference2", "zygosity"];
const POSITIONAL_NULL_FIELDS: &[&str] = &[
    "assembly",
    "break1Repr",
    "break2Repr",
    "refSeq",
    "truncation",
    "untemplatedSeq",
];
/// Position objects are matched through their repr fields instead.
const BREAK_POSITION_FIELDS: &[&str] = &["break1Start", "break1End", "break2Start", "break2End"];

/// One call to [`RecordResolver::add_record`].
#[derive(Debug, Clone)]
pub struct AddRecord {
    pub target: Target,
    pub content: Map<String, Value>,
    pub exists_ok: bool,
    pub fetch_conditions: Option<Value>,
    pub fetch_existing: bool,
    pub fetch_first: bool,
    pub precedence: Precedence,
    pub upsert: bool,
    pub upsert_check_exclude: Vec<String>,
}

impl AddRecord {
    pub fn new(target: Target, content: Map<String, Value>) -> Self {
        Self {
            target,
            content,
            exists_ok: false,
            fetch_conditions: None,
            fetch_existing: true,
            fetch_first: false,
            precedence: Precedence::TERMS,
            upsert: false,
            upsert_check_exclude: Vec::new(),
        }
    }

    pub fn exists_ok(mut self) -> Self {
        self.exists_ok = true;
        self
    }

    pub fn fetch_conditions(mut self, filters: Value) -> Self {
        self.fetch_conditions = Some(filters);
        self
    }

    /// On conflict, report that the record exists instead of fetching it.
    pub fn without_fetch(mut self) -> Self {
        self.fetch_existing = false;
        self
    }

    pub fn fetch_first(mut self) -> Self {
        self.fetch_first = true;
        self
    }

    pub fn precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Update a fetched record whose fields differ from the content, ignoring `exclude`.
    pub fn upsert(mut self, exclude: &[&str]) -> Self {
        self.upsert = true;
        self.upsert_check_exclude = exclude.iter().map(|field| field.to_string()).collect();
        self
    }

    fn filters(&self) -> Value {
        self.fetch_conditions
            .clone()
            .unwrap_or_else(|| query_filters(&self.content))
    }

    fn memo_key(&self) -> String {
        format!("{}|{}", self.target, Value::Object(self.content.clone()))
    }
}

/// Records created and updated in this run, by target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadCounts {
    pub created: BTreeMap<String, usize>,
    pub updated: BTreeMap<String, usize>,
}

impl UploadCounts {
    pub fn total_created(&self) -> usize {
        self.created.values().sum()
    }
}

pub struct RecordResolver<S> {
    store: S,
    cache: ReferenceCache,
    resolved: HashMap<String, GraphRecord>,
    counts: UploadCounts,
}

impl<S: GraphStore> RecordResolver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: ReferenceCache::new(),
            resolved: HashMap::new(),
            counts: UploadCounts::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&mut self) -> &mut ReferenceCache {
        &mut self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn counts(&self) -> &UploadCounts {
        &self.counts
    }

    /// Creates the record, or adopts the existing one when the store reports a
    /// conflict and `exists_ok` is set. `Ok(None)` means the record exists and the
    /// request asked not to fetch it.
    pub fn add_record(&mut self, request: AddRecord) -> Result<Option<GraphRecord>, LoaderError> {
        let memo_key = request.memo_key();
        let adoptable = request.exists_ok || request.upsert;
        if adoptable {
            if let Some(record) = self.resolved.get(&memo_key) {
                tracing::debug!(target = %request.target, "record already resolved in this run");
                return Ok(Some(record.clone()));
            }
        }

        let filters = request.filters();
        if request.fetch_first {
            match self.get_unique_record_by(request.target, &filters, &request.precedence) {
                Ok(existing) => {
                    let record = self.maybe_update(&request, existing)?;
                    return Ok(Some(self.remember(adoptable, memo_key, record)));
                }
                Err(err) => {
                    tracing::debug!(target = %request.target, error = %err, "fetch before create missed");
                }
            }
        }

        match self.store.create(request.target, &request.content) {
            Ok(record) => {
                *self
                    .counts
                    .created
                    .entry(request.target.to_string())
                    .or_default() += 1;
                tracing::info!(target = %request.target, rid = record.rid().unwrap_or("?"), "created record");
                Ok(Some(self.remember(adoptable, memo_key, record)))
            }
            Err(LoaderError::Conflict { .. }) if adoptable => {
                if !request.fetch_existing && !request.upsert {
                    return Ok(None);
                }
                let existing = self.get_unique_record_by(request.target, &filters, &request.precedence)?;
                let record = self.maybe_update(&request, existing)?;
                Ok(Some(self.remember(adoptable, memo_key, record)))
            }
            Err(err) => Err(err),
        }
    }

    fn remember(&mut self, adoptable: bool, memo_key: String, record: GraphRecord) -> GraphRecord {
        if adoptable {
            self.resolved.insert(memo_key, record.clone());
        }
        record
    }

    fn maybe_update(&mut self, request: &AddRecord, existing: GraphRecord) -> Result<GraphRecord, LoaderError> {
        if !request.upsert || !should_update(&existing, &request.content, &request.upsert_check_exclude) {
            return Ok(existing);
        }
        let rid = record::rid(&existing)?.to_string();
        let updated = self.store.update(request.target, &rid, &request.content)?;
        *self
            .counts
            .updated
            .entry(request.target.to_string())
            .or_default() += 1;
        Ok(updated)
    }

    /// The single preferred record matching `filters`.
    pub fn get_unique_record_by(
        &self,
        target: Target,
        filters: &Value,
        precedence: &Precedence,
    ) -> Result<GraphRecord, LoaderError> {
        let candidates = self.store.query(target, filters)?;
        select_preferred(candidates, precedence, target, filters)
    }

    /// Vocabulary term by sourceId within the named source.
    pub fn get_vocabulary_term(&mut self, term: &str, source_name: &str) -> Result<GraphRecord, LoaderError> {
        let key = cache_key(&format!("{source_name}:{term}"), None);
        if let Some(record) = self.cache.get(Target::Vocabulary, &key) {
            return Ok(record);
        }
        let filters = json!({
            "AND": [
                { "sourceId": term },
                { "source": source_filter(source_name) },
            ]
        });
        let record = self.get_unique_record_by(Target::Vocabulary, &filters, &Precedence::VOCABULARY)?;
        self.cache.insert(Target::Vocabulary, key, record.clone());
        Ok(record)
    }

    pub fn get_internal_vocabulary_term(&mut self, term: &str) -> Result<GraphRecord, LoaderError> {
        self.get_vocabulary_term(term, INTERNAL_SOURCE_NAME)
    }

    /// Fetches or creates the `Source` record of a provider, keyed on its name.
    pub fn add_source(&mut self, definition: &SourceDefinition) -> Result<GraphRecord, LoaderError> {
        let key = cache_key(definition.name, None);
        if let Some(record) = self.cache.get(Target::Source, &key) {
            return Ok(record);
        }
        let request = AddRecord::new(Target::Source, definition.to_content())
            .exists_ok()
            .fetch_first()
            .fetch_conditions(json!({ "name": definition.name }));
        let record = self
            .add_record(request)?
            .ok_or_else(|| missing(Target::Source, &json!({ "name": definition.name })))?;
        self.cache.insert(Target::Source, key, record.clone());
        Ok(record)
    }

    /// Adds a variant, matching existing records on every content field except the
    /// break position objects, with unset optional fields pinned to null.
    pub fn add_variant(&mut self, request: AddRecord) -> Result<GraphRecord, LoaderError> {
        let mut conditions = Map::new();
        let nullable = VARIANT_NULL_FIELDS.iter().chain(
            POSITIONAL_NULL_FIELDS
                .iter()
                .filter(|_| request.target == Target::PositionalVariant),
        );
        for field in nullable {
            conditions.insert(field.to_string(), Value::Null);
        }
        for (key, value) in &request.content {
            if !BREAK_POSITION_FIELDS.contains(&key.as_str()) {
                conditions.insert(key.clone(), value.clone());
            }
        }
        let filters = query_filters(&conditions);
        let target = request.target;
        self.add_record(request.fetch_conditions(filters.clone()))?
            .ok_or_else(|| missing(target, &filters))
    }

    /// Therapy by sourceId or name, retrying with the inhibitor/inhibitors plural swapped.
    pub fn get_therapy(&self, term: &str, source_rid: Option<&str>) -> Result<GraphRecord, LoaderError> {
        let first = self.get_unique_record_by(Target::Therapy, &therapy_filters(term, source_rid), &Precedence::DRUGS);
        let err = match first {
            Ok(record) => return Ok(record),
            Err(err) => err,
        };
        let alternate = if INHIBITOR.is_match(term) {
            INHIBITOR.replace(term, "inhibitors").into_owned()
        } else if INHIBITORS.is_match(term) {
            INHIBITORS.replace(term, "inhibitor").into_owned()
        } else {
            return Err(err);
        };
        self.get_unique_record_by(
            Target::Therapy,
            &therapy_filters(&alternate, source_rid),
            &Precedence::DRUGS,
        )
    }

    /// Resolves `a + b` therapy names to a combination therapy, creating it when needed.
    /// An exact match on the whole name wins over splitting.
    pub fn add_therapy_combination(
        &mut self,
        source: &GraphRecord,
        therapy_name: &str,
    ) -> Result<GraphRecord, LoaderError> {
        let err = match self.get_therapy(therapy_name, None) {
            Ok(record) => return Ok(record),
            Err(err) => err,
        };
        if !therapy_name.contains('+') {
            return Err(err);
        }

        let mut elements = Vec::new();
        for part in COMBINATION_SEPARATOR.split(therapy_name.trim()) {
            elements.push(self.get_therapy(part, None)?);
        }
        let mut source_ids: Vec<&str> = elements.iter().filter_map(GraphRecord::source_id).collect();
        let mut names: Vec<&str> = elements.iter().filter_map(GraphRecord::name).collect();
        source_ids.sort_unstable();
        names.sort_unstable();

        let mut content = Map::new();
        content.insert("name".to_string(), Value::from(names.join(" + ")));
        content.insert("source".to_string(), Value::from(record::rid(source)?));
        content.insert("sourceId".to_string(), Value::from(source_ids.join(" + ")));
        let request = AddRecord::new(Target::Therapy, content).exists_ok();
        let filters = request.filters();
        self.add_record(request)
            .inspect_err(|err| tracing::error!(therapy = therapy_name, error = %err, "failed to create combination therapy"))?
            .ok_or_else(|| missing(Target::Therapy, &filters))
    }
}

fn therapy_filters(term: &str, source_rid: Option<&str>) -> Value {
    let by_term = json!({ "OR": [{ "sourceId": term }, { "name": term }] });
    match source_rid {
        Some(source) => json!({ "AND": [{ "source": source }, by_term] }),
        None => by_term,
    }
}

fn missing(target: Target, filters: &Value) -> LoaderError {
    LoaderError::MissingRecord {
        target: target.to_string(),
        filters: filters.to_string(),
    }
}

/// True when any content field (links compared by rid) differs from the stored record.
pub fn should_update(existing: &GraphRecord, content: &Map<String, Value>, exclude: &[String]) -> bool {
    let original = simplify(&Value::Object(existing.fields().clone()), false);
    let updated = simplify(&Value::Object(content.clone()), false);
    let (Value::Object(original), Value::Object(updated)) = (original, updated) else {
        return false;
    };
    updated.iter().any(|(key, value)| {
        if exclude.iter().any(|excluded| excluded == key) {
            return false;
        }
        let changed = original.get(key).unwrap_or(&Value::Null) != value;
        if changed {
            tracing::info!(
                rid = existing.rid().unwrap_or("?"),
                field = key.as_str(),
                "record should be updated"
            );
        }
        changed
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> GraphRecord {
        GraphRecord::from_value(value).unwrap()
    }

    fn content(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn unchanged_linked_content_needs_no_update() {
        let existing = record(json!({"@rid": "#4:1", "name": "x", "source": {"@rid": "#2:0", "name": "civic"}}));
        assert!(!should_update(&existing, &content(json!({"name": "x", "source": "#2:0"})), &[]));
    }

    #[test]
    fn changed_field_needs_update_unless_excluded() {
        let existing = record(json!({"@rid": "#4:1", "name": "x", "description": "old"}));
        let new = content(json!({"name": "x", "description": "new"}));
        assert!(should_update(&existing, &new, &[]));
        assert!(!should_update(&existing, &new, &["description".to_string()]));
    }

    #[test]
    fn therapy_filters_scope_to_source() {
        assert_eq!(
            therapy_filters("imatinib", Some("#9:1")),
            json!({"AND": [{"source": "#9:1"}, {"OR": [{"sourceId": "imatinib"}, {"name": "imatinib"}]}]})
        );
    }

    #[test]
    fn memo_key_separates_targets() {
        let a = AddRecord::new(Target::Feature, content(json!({"name": "x"})));
        let b = AddRecord::new(Target::Disease, content(json!({"name": "x"})));
        assert_ne!(a.memo_key(), b.memo_key());
    }
}
