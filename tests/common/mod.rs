#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::{Map, Value, json};

use kb_loader::error::LoaderError;
use kb_loader::graphkb::GraphStore;
use kb_loader::record::{GraphRecord, Target};

#[derive(Default)]
struct State {
    records: Vec<(Target, GraphRecord)>,
    next_id: usize,
    creates: usize,
    queries: usize,
    updates: usize,
}

/// In-memory graph store: unique keys per target, equality/AND/OR filters and
/// nested `{target, filters}` link subqueries.
#[derive(Default)]
pub struct MockGraphKb {
    state: Mutex<State>,
}

impl MockGraphKb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record directly, without counting a create call.
    pub fn seed(&self, target: Target, fields: Value) -> GraphRecord {
        let mut state = self.state.lock().unwrap();
        insert(&mut state, target, fields.as_object().cloned().unwrap())
    }

    pub fn creates(&self) -> usize {
        self.state.lock().unwrap().creates
    }

    pub fn queries(&self) -> usize {
        self.state.lock().unwrap().queries
    }

    pub fn updates(&self) -> usize {
        self.state.lock().unwrap().updates
    }

    pub fn records(&self, target: Target) -> Vec<GraphRecord> {
        let state = self.state.lock().unwrap();
        state
            .records
            .iter()
            .filter(|(t, _)| *t == target)
            .map(|(_, record)| record.clone())
            .collect()
    }
}

fn insert(state: &mut State, target: Target, mut fields: Map<String, Value>) -> GraphRecord {
    state.next_id += 1;
    fields.insert(
        "@rid".to_string(),
        Value::from(format!("#{}:{}", target as usize, state.next_id)),
    );
    let record = GraphRecord::new(fields);
    state.records.push((target, record.clone()));
    record
}

fn unique_fields(target: Target, content: &Map<String, Value>) -> Vec<String> {
    match target {
        Target::Source => vec!["name".to_string()],
        Target::Infers => vec!["out".to_string(), "in".to_string()],
        _ => content
            .keys()
            .filter(|key| !key.ends_with("Start") && !key.ends_with("End"))
            .cloned()
            .collect(),
    }
}

fn link_rid(value: &Value) -> Option<&str> {
    match value {
        Value::String(rid) => Some(rid),
        Value::Object(fields) => fields.get("@rid").and_then(Value::as_str),
        _ => None,
    }
}

fn field_equals(record: &GraphRecord, key: &str, expected: &Value) -> bool {
    match (record.get(key), expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (Some(actual), Value::String(expected)) => link_rid(actual) == Some(expected.as_str()),
        (Some(actual), expected) => actual == expected,
        (None, _) => false,
    }
}

fn matches(records: &[(Target, GraphRecord)], record: &GraphRecord, filter: &Value) -> bool {
    let Some(conditions) = filter.as_object() else {
        return false;
    };
    conditions.iter().all(|(key, value)| match (key.as_str(), value) {
        ("AND", Value::Array(items)) => items.iter().all(|item| matches(records, record, item)),
        ("OR", Value::Array(items)) => items.iter().any(|item| matches(records, record, item)),
        (_, Value::Object(sub)) if sub.contains_key("target") => {
            let linked = record.get(key).and_then(link_rid);
            let target: Target = sub["target"].as_str().unwrap().parse().unwrap();
            let rids: HashSet<&str> = records
                .iter()
                .filter(|(t, candidate)| *t == target && matches(records, candidate, &sub["filters"]))
                .filter_map(|(_, candidate)| candidate.rid())
                .collect();
            linked.is_some_and(|rid| rids.contains(rid))
        }
        (_, expected) => field_equals(record, key, expected),
    })
}

impl GraphStore for MockGraphKb {
    fn create(&self, target: Target, content: &Map<String, Value>) -> Result<GraphRecord, LoaderError> {
        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        let keys = unique_fields(target, content);
        let conflict = state.records.iter().any(|(t, record)| {
            *t == target
                && keys.iter().all(|key| {
                    field_equals(record, key, content.get(key).unwrap_or(&Value::Null))
                })
        });
        if conflict {
            return Err(LoaderError::Conflict {
                target: target.to_string(),
                message: "duplicate record".to_string(),
            });
        }
        Ok(insert(&mut state, target, content.clone()))
    }

    fn query(&self, target: Target, filters: &Value) -> Result<Vec<GraphRecord>, LoaderError> {
        let mut state = self.state.lock().unwrap();
        state.queries += 1;
        Ok(state
            .records
            .iter()
            .filter(|(t, record)| *t == target && matches(&state.records, record, filters))
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn update(
        &self,
        target: Target,
        rid: &str,
        content: &Map<String, Value>,
    ) -> Result<GraphRecord, LoaderError> {
        let mut state = self.state.lock().unwrap();
        state.updates += 1;
        let (_, record) = state
            .records
            .iter_mut()
            .find(|(t, record)| *t == target && record.rid() == Some(rid))
            .ok_or_else(|| LoaderError::GraphKbStatus {
                status: 404,
                message: format!("no record {rid}"),
            })?;
        let mut fields = record.fields().clone();
        for (key, value) in content {
            fields.insert(key.clone(), value.clone());
        }
        *record = GraphRecord::new(fields);
        Ok(record.clone())
    }
}

/// A store holding the sources, genes and vocabulary a typical variant upload needs.
pub fn seeded_store() -> MockGraphKb {
    let store = MockGraphKb::new();
    let bcgsc = store.seed(Target::Source, json!({"name": "bcgsc"}));
    let entrez = store.seed(Target::Source, json!({"name": "entrez gene"}));
    let dbsnp = store.seed(Target::Source, json!({"name": "dbsnp"}));
    let bcgsc = bcgsc.rid().unwrap().to_string();
    let entrez = entrez.rid().unwrap().to_string();

    for term in [
        "substitution",
        "nonsense mutation",
        "deletion",
        "indel",
        "mutation",
        "fusion",
        "amplification",
        "splicing alteration",
        "high signature",
    ] {
        store.seed(
            Target::Vocabulary,
            json!({"sourceId": term, "name": term, "source": bcgsc}),
        );
    }
    for (name, id) in [("braf", "673"), ("kras", "3845"), ("alk", "238"), ("eml4", "27436")] {
        store.seed(
            Target::Feature,
            json!({"name": name, "sourceId": id, "biotype": "gene", "source": entrez}),
        );
    }
    store.seed(
        Target::Signature,
        json!({"name": "high mutation burden", "sourceId": "high mutation burden"}),
    );
    store.seed(
        Target::CatalogueVariant,
        json!({"sourceId": "rs121913529", "source": dbsnp.rid().unwrap()}),
    );
    store
}
