use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifies the feature or signature a variant is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum Reference {
    Feature {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(rename = "sourceId", default, skip_serializing_if = "Option::is_none")]
        source_id: Option<String>,
    },
    Signature { name: String },
}

impl Reference {
    pub fn named(name: impl Into<String>) -> Self {
        Reference::Feature {
            name: Some(name.into()),
            source_id: None,
        }
    }

    pub fn gene(name: impl Into<String>, source_id: Option<String>) -> Self {
        Reference::Feature {
            name: Some(name.into()),
            source_id,
        }
    }

    pub fn signature(name: impl Into<String>) -> Self {
        Reference::Signature { name: name.into() }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Reference::Feature { name, .. } => name.as_deref(),
            Reference::Signature { name } => Some(name),
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        match self {
            Reference::Feature { source_id, .. } => source_id.as_deref(),
            Reference::Signature { .. } => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Signature { name } => write!(f, "signature {name}"),
            Reference::Feature {
                name: Some(name),
                source_id: Some(id),
            } => write!(f, "{name} ({id})"),
            Reference::Feature {
                name: Some(name), ..
            } => f.write_str(name),
            Reference::Feature {
                source_id: Some(id),
                ..
            } => write!(f, "sourceId {id}"),
            Reference::Feature { .. } => f.write_str("<empty reference>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantNotation {
    Positional { variant: String },
    Category {
        #[serde(rename = "type")]
        kind: String,
    },
}

/// Canonical output of notation normalization. Exactly one of positional
/// notation or category term is carried, enforced by [`VariantNotation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedVariant {
    #[serde(flatten)]
    pub notation: VariantNotation,
    pub reference1: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference2: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub infers: Vec<NormalizedVariant>,
    #[serde(
        rename = "inferredBy",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub inferred_by: Vec<NormalizedVariant>,
}

impl NormalizedVariant {
    pub fn positional(variant: impl Into<String>, reference1: Reference) -> Self {
        Self {
            notation: VariantNotation::Positional {
                variant: variant.into(),
            },
            reference1,
            reference2: None,
            infers: Vec::new(),
            inferred_by: Vec::new(),
        }
    }

    pub fn category(kind: impl Into<String>, reference1: Reference) -> Self {
        Self {
            notation: VariantNotation::Category { kind: kind.into() },
            reference1,
            reference2: None,
            infers: Vec::new(),
            inferred_by: Vec::new(),
        }
    }

    pub fn with_reference2(mut self, reference2: Reference) -> Self {
        self.reference2 = Some(reference2);
        self
    }

    pub fn with_infers(mut self, variant: NormalizedVariant) -> Self {
        self.infers.push(variant);
        self
    }

    pub fn with_inferred_by(mut self, variant: NormalizedVariant) -> Self {
        self.inferred_by.push(variant);
        self
    }

    pub fn variant(&self) -> Option<&str> {
        match &self.notation {
            VariantNotation::Positional { variant } => Some(variant),
            VariantNotation::Category { .. } => None,
        }
    }

    pub fn kind(&self) -> Option<&str> {
        match &self.notation {
            VariantNotation::Category { kind } => Some(kind),
            VariantNotation::Positional { .. } => None,
        }
    }

    /// Either the positional notation or the category term.
    pub fn label(&self) -> &str {
        match &self.notation {
            VariantNotation::Positional { variant } => variant,
            VariantNotation::Category { kind } => kind,
        }
    }
}

/// Gene, feature or signature context a raw variant name is read against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotationContext {
    pub feature_name: String,
    pub feature_id: Option<String>,
}

impl NotationContext {
    pub fn new(feature_name: &str, feature_id: Option<&str>) -> Self {
        Self {
            feature_name: feature_name.trim().to_lowercase(),
            feature_id: feature_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        }
    }

    pub fn reference(&self) -> Reference {
        Reference::gene(self.feature_name.clone(), self.feature_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneFeature {
    #[serde(
        rename = "entrezId",
        default,
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub entrez_id: Option<String>,
    pub name: String,
}

impl GeneFeature {
    pub fn reference(&self) -> Reference {
        Reference::gene(self.name.trim().to_lowercase(), self.entrez_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorFeature {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionFeature {
    #[serde(rename = "fivePrimeGene", default)]
    pub five_prime_gene: Option<GeneFeature>,
    #[serde(rename = "threePrimeGene", default)]
    pub three_prime_gene: Option<GeneFeature>,
}

/// Feature kinds a source variant may hang off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum FeatureInstance {
    Gene(GeneFeature),
    Factor(FactorFeature),
    Fusion(FusionFeature),
    #[serde(other)]
    Unsupported,
}

impl FeatureInstance {
    pub fn kind(&self) -> &'static str {
        match self {
            FeatureInstance::Gene(_) => "Gene",
            FeatureInstance::Factor(_) => "Factor",
            FeatureInstance::Fusion(_) => "Fusion",
            FeatureInstance::Unsupported => "Unsupported",
        }
    }
}

/// One raw variant row handed over by a per-source reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    pub feature: FeatureInstance,
}

impl VariantRecord {
    /// Identity of the raw variant within a run: the same name on the same feature.
    pub fn cache_key(&self) -> String {
        let feature = serde_json::to_string(&self.feature).unwrap_or_default();
        format!("{feature}|{}", self.name)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl From<RawId> for String {
    fn from(value: RawId) -> Self {
        match value {
            RawId::Number(value) => value.to_string(),
            RawId::Text(value) => value,
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<RawId>::deserialize(deserializer)?;
    Ok(value.map(String::from).filter(|id| !id.is_empty()))
}
