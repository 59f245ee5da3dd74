use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::LoaderError;

/// Entity types of the remote graph schema the loader writes to or reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Target {
    Source,
    Feature,
    Vocabulary,
    Signature,
    Therapy,
    Disease,
    PositionalVariant,
    CategoryVariant,
    CatalogueVariant,
    Infers,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Target::Source => "Source",
            Target::Feature => "Feature",
            Target::Vocabulary => "Vocabulary",
            Target::Signature => "Signature",
            Target::Therapy => "Therapy",
            Target::Disease => "Disease",
            Target::PositionalVariant => "PositionalVariant",
            Target::CategoryVariant => "CategoryVariant",
            Target::CatalogueVariant => "CatalogueVariant",
            Target::Infers => "Infers",
        }
    }

    /// REST route the entity is created under.
    pub fn route(self) -> &'static str {
        match self {
            Target::Source => "/sources",
            Target::Feature => "/features",
            Target::Vocabulary => "/vocabulary",
            Target::Signature => "/signatures",
            Target::Therapy => "/therapies",
            Target::Disease => "/diseases",
            Target::PositionalVariant => "/positionalvariants",
            Target::CategoryVariant => "/categoryvariants",
            Target::CatalogueVariant => "/cataloguevariants",
            Target::Infers => "/infers",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = LoaderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let target = match value.to_ascii_lowercase().as_str() {
            "source" => Target::Source,
            "feature" => Target::Feature,
            "vocabulary" => Target::Vocabulary,
            "signature" => Target::Signature,
            "therapy" => Target::Therapy,
            "disease" => Target::Disease,
            "positionalvariant" => Target::PositionalVariant,
            "categoryvariant" => Target::CategoryVariant,
            "cataloguevariant" => Target::CatalogueVariant,
            "infers" => Target::Infers,
            _ => return Err(LoaderError::InvalidInput(format!("unknown target {value}"))),
        };
        Ok(target)
    }
}

/// A record as returned by the remote store. Fields are kept as the store sent them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphRecord(Map<String, Value>);

impl GraphRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Result<Self, LoaderError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(LoaderError::GraphKbHttp(format!(
                "expected a record object, found {other}"
            ))),
        }
    }

    /// Stable identity used for linking edges: `@rid`, falling back to `id`.
    pub fn rid(&self) -> Option<&str> {
        self.0
            .get("@rid")
            .or_else(|| self.0.get("id"))
            .and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn source_id(&self) -> Option<&str> {
        self.get_str("sourceId")
    }

    pub fn source_id_version(&self) -> Option<&str> {
        self.get_str("sourceIdVersion")
    }

    pub fn description(&self) -> Option<&str> {
        self.get_str("description").filter(|d| !d.is_empty())
    }

    pub fn is_deprecated(&self) -> bool {
        self.0
            .get("deprecated")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn has_dependency(&self) -> bool {
        !matches!(self.0.get("dependency"), None | Some(Value::Null))
    }

    /// The linked source: an embedded record when the query expanded it, or a bare rid.
    pub fn source(&self) -> Option<SourceLink<'_>> {
        match self.0.get("source")? {
            Value::String(rid) => Some(SourceLink::Rid(rid)),
            Value::Object(fields) => Some(SourceLink::Embedded(fields)),
            _ => None,
        }
    }

    /// Short description for error messages.
    pub fn display_name(&self) -> String {
        let rid = self.rid().unwrap_or("?");
        match (self.name(), self.source_id()) {
            (Some(name), _) => format!("{rid} ({name})"),
            (None, Some(source_id)) => format!("{rid} ({source_id})"),
            _ => rid.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceLink<'a> {
    Rid(&'a str),
    Embedded(&'a Map<String, Value>),
}

impl<'a> SourceLink<'a> {
    pub fn rid(&self) -> Option<&'a str> {
        match *self {
            SourceLink::Rid(rid) => Some(rid),
            SourceLink::Embedded(fields) => fields.get("@rid").and_then(Value::as_str),
        }
    }

    fn field(&self, name: &str) -> Option<&'a Value> {
        match *self {
            SourceLink::Rid(_) => None,
            SourceLink::Embedded(fields) => fields.get(name),
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        self.field("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&'a str> {
        self.field("version").and_then(Value::as_str)
    }

    pub fn sort(&self) -> Option<i64> {
        self.field("sort").and_then(Value::as_i64)
    }
}

/// Required rid of a record about to be linked.
pub fn rid(record: &GraphRecord) -> Result<&str, LoaderError> {
    record.rid().ok_or_else(|| {
        LoaderError::GraphKbHttp(format!(
            "record has no identifier: {}",
            Value::Object(record.fields().clone())
        ))
    })
}

/// Equality filters over every field of `content`, in key order.
pub fn query_filters(content: &Map<String, Value>) -> Value {
    let conditions: Vec<Value> = content
        .iter()
        .map(|(key, value)| {
            let mut condition = Map::new();
            condition.insert(key.clone(), value.clone());
            Value::Object(condition)
        })
        .collect();
    json!({ "AND": conditions })
}

/// Filter matching a record linked to the source of the given name.
pub fn source_filter(source_name: &str) -> Value {
    json!({
        "target": Target::Source.as_str(),
        "filters": { "name": source_name },
    })
}

/// Replaces embedded records with their rid so content can be compared with
/// what the store returns.
pub fn simplify(value: &Value, nested: bool) -> Value {
    match value {
        Value::Object(fields) if nested && fields.contains_key("@rid") => {
            fields.get("@rid").cloned().unwrap_or(Value::Null)
        }
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), simplify(value, true)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|item| simplify(item, true)).collect()),
        other => other.clone(),
    }
}
