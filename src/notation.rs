//! General positional variant notation.
//!
//! Accepts the lower-cased, HGVS-like strings emitted by the normalizer:
//!
//! - continuous: `<prefix>.<break1>[_<break2>]<event>` (`p.g1202r`, `c.330_331delcainstt`,
//!   `e.2_3del`, `p.(g12_g13)mut`, `y.p26.3_p25.3del`)
//! - two-feature: `<type>(<pos1>,<pos2>)` (`fusion(e.7,e.6)`, `translocation(q34, q11)`)
//!
//! A parsed notation converts into the break/sequence fields of a positional variant record.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::LoaderError;

const PROTEIN_POS: &str = r"[a-z*?]?\d+";
const NUCLEOTIDE_POS: &str = r"(?:\d+|\?)(?:[+-](?:\d+|\?))?";
const PLAIN_POS: &str = r"(?:\d+|\?)";
const CYTOBAND_POS: &str = r"[pq](?:\d+(?:\.\d+)?)?";

static PROTEIN_BREAKS: LazyLock<Regex> = LazyLock::new(|| breaks_regex(PROTEIN_POS));
static NUCLEOTIDE_BREAKS: LazyLock<Regex> = LazyLock::new(|| breaks_regex(NUCLEOTIDE_POS));
static PLAIN_BREAKS: LazyLock<Regex> = LazyLock::new(|| breaks_regex(PLAIN_POS));
static CYTOBAND_BREAKS: LazyLock<Regex> = LazyLock::new(|| breaks_regex(CYTOBAND_POS));

static PREFIXED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([a-z])\.(.+)$").unwrap());
static MULTI_FEATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(fusion|translocation|trans|itrans|inversion|inv|del|dup)\(\s*([^,()]+?)\s*,\s*([^,()]+?)\s*\)$")
        .unwrap()
});

static DELINS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^del([a-z*?]*)ins([a-z*?]+)$").unwrap());
static SIMPLE_EDIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(del|dup|inv)([a-z*?]*)$").unwrap());
static INSERTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ins([a-z*?]*)$").unwrap());
static NUCLEOTIDE_SUB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z?]+)>([a-z?]+)$").unwrap());
static PROTEIN_SUB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([a-z*?])$").unwrap());
static FRAMESHIFT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z*]?)fs(?:\*(\d+|\?))?$").unwrap());

static PROTEIN_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z*?])?(\d+)$").unwrap());
static NUCLEOTIDE_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+|\?)(?:([+-])(\d+|\?))?$").unwrap());
static CYTOBAND_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([pq])(?:(\d+)(?:\.(\d+))?)?$").unwrap());

fn breaks_regex(pos: &str) -> Regex {
    let single = format!(r"{pos}|\({pos}_{pos}\)");
    Regex::new(&format!(
        r"^(?P<b1>{single})(?:_(?P<b2>{single}))?(?P<tail>.*)$"
    ))
    .unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    Protein,
    Coding,
    Genomic,
    Rna,
    NonCoding,
    Exon,
    Intron,
    Cytoband,
}

impl CoordinateSystem {
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "p" => Some(CoordinateSystem::Protein),
            "c" => Some(CoordinateSystem::Coding),
            "g" => Some(CoordinateSystem::Genomic),
            "r" => Some(CoordinateSystem::Rna),
            "n" => Some(CoordinateSystem::NonCoding),
            "e" => Some(CoordinateSystem::Exon),
            "i" => Some(CoordinateSystem::Intron),
            "y" => Some(CoordinateSystem::Cytoband),
            _ => None,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            CoordinateSystem::Protein => "p",
            CoordinateSystem::Coding => "c",
            CoordinateSystem::Genomic => "g",
            CoordinateSystem::Rna => "r",
            CoordinateSystem::NonCoding => "n",
            CoordinateSystem::Exon => "e",
            CoordinateSystem::Intron => "i",
            CoordinateSystem::Cytoband => "y",
        }
    }

    fn breaks(self) -> &'static Regex {
        match self {
            CoordinateSystem::Protein => &PROTEIN_BREAKS,
            CoordinateSystem::Coding | CoordinateSystem::Rna | CoordinateSystem::NonCoding => {
                &NUCLEOTIDE_BREAKS
            }
            CoordinateSystem::Genomic | CoordinateSystem::Exon | CoordinateSystem::Intron => {
                &PLAIN_BREAKS
            }
            CoordinateSystem::Cytoband => &CYTOBAND_BREAKS,
        }
    }
}

/// A single coordinate, serialized in the remote schema's `@class` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "@class")]
pub enum Position {
    ProteinPosition {
        pos: Option<u64>,
        #[serde(rename = "refAA", skip_serializing_if = "Option::is_none")]
        ref_aa: Option<String>,
    },
    CdsPosition {
        pos: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        offset: Option<i64>,
    },
    RnaPosition {
        pos: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        offset: Option<i64>,
    },
    NonCdsPosition {
        pos: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        offset: Option<i64>,
    },
    GenomicPosition {
        pos: Option<u64>,
    },
    ExonicPosition {
        pos: Option<u64>,
    },
    IntronicPosition {
        pos: Option<u64>,
    },
    CytobandPosition {
        arm: String,
        #[serde(rename = "majorBand", skip_serializing_if = "Option::is_none")]
        major_band: Option<u32>,
        #[serde(rename = "minorBand", skip_serializing_if = "Option::is_none")]
        minor_band: Option<u32>,
    },
}

impl Position {
    fn parse(system: CoordinateSystem, text: &str) -> Result<Self, LoaderError> {
        let invalid = || LoaderError::Notation(format!("invalid {} position ({text})", system.prefix()));
        match system {
            CoordinateSystem::Protein => {
                let caps = PROTEIN_POSITION.captures(text).ok_or_else(invalid)?;
                let ref_aa = caps
                    .get(1)
                    .map(|m| m.as_str())
                    .filter(|aa| *aa != "?")
                    .map(str::to_uppercase);
                let pos = caps[2].parse().map_err(|_| invalid())?;
                Ok(Position::ProteinPosition {
                    pos: Some(pos),
                    ref_aa,
                })
            }
            CoordinateSystem::Coding | CoordinateSystem::Rna | CoordinateSystem::NonCoding => {
                let caps = NUCLEOTIDE_POSITION.captures(text).ok_or_else(invalid)?;
                let pos = parse_optional_number(&caps[1]).map_err(|_| invalid())?;
                let offset = match (caps.get(2), caps.get(3)) {
                    (Some(sign), Some(value)) => {
                        let magnitude: Option<i64> =
                            parse_optional_number(value.as_str()).map_err(|_| invalid())?;
                        magnitude.map(|m| if sign.as_str() == "-" { -m } else { m })
                    }
                    _ => None,
                };
                Ok(match system {
                    CoordinateSystem::Coding => Position::CdsPosition { pos, offset },
                    CoordinateSystem::Rna => Position::RnaPosition { pos, offset },
                    _ => Position::NonCdsPosition { pos, offset },
                })
            }
            CoordinateSystem::Genomic | CoordinateSystem::Exon | CoordinateSystem::Intron => {
                let pos = parse_optional_number(text).map_err(|_| invalid())?;
                Ok(match system {
                    CoordinateSystem::Genomic => Position::GenomicPosition { pos },
                    CoordinateSystem::Exon => Position::ExonicPosition { pos },
                    _ => Position::IntronicPosition { pos },
                })
            }
            CoordinateSystem::Cytoband => {
                let caps = CYTOBAND_POSITION.captures(text).ok_or_else(invalid)?;
                let major_band = caps
                    .get(2)
                    .map(|m| m.as_str().parse())
                    .transpose()
                    .map_err(|_| invalid())?;
                let minor_band = caps
                    .get(3)
                    .map(|m| m.as_str().parse())
                    .transpose()
                    .map_err(|_| invalid())?;
                Ok(Position::CytobandPosition {
                    arm: caps[1].to_string(),
                    major_band,
                    minor_band,
                })
            }
        }
    }
}

fn parse_optional_number<T: FromStr>(text: &str) -> Result<Option<T>, T::Err> {
    if text == "?" {
        return Ok(None);
    }
    text.parse().map(Some)
}

/// One breakpoint: a position, or an uncertain range when `end` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Break {
    pub start: Position,
    pub end: Option<Position>,
    pub repr: String,
}

impl Break {
    fn parse(system: CoordinateSystem, text: &str) -> Result<Self, LoaderError> {
        let repr_body = if system == CoordinateSystem::Protein {
            text.to_uppercase()
        } else {
            text.to_string()
        };
        let repr = format!("{}.{repr_body}", system.prefix());
        if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            let (first, second) = inner
                .split_once('_')
                .ok_or_else(|| LoaderError::Notation(format!("invalid range ({text})")))?;
            return Ok(Self {
                start: Position::parse(system, first)?,
                end: Some(Position::parse(system, second)?),
                repr,
            });
        }
        Ok(Self {
            start: Position::parse(system, text)?,
            end: None,
            repr,
        })
    }

    fn ref_aa(&self) -> Option<&str> {
        match &self.start {
            Position::ProteinPosition { ref_aa, .. } => ref_aa.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Substitution,
    Nonsense,
    Deletion,
    Duplication,
    Inversion,
    Insertion,
    Indel,
    Frameshift,
    Mutation,
    Phosphorylation,
    SpliceSite,
    Fusion,
    Translocation,
    InvertedTranslocation,
}

impl EventKind {
    /// Vocabulary term the event is recorded under.
    pub fn vocabulary_term(self) -> &'static str {
        match self {
            EventKind::Substitution => "substitution",
            EventKind::Nonsense => "nonsense mutation",
            EventKind::Deletion => "deletion",
            EventKind::Duplication => "duplication",
            EventKind::Inversion => "inversion",
            EventKind::Insertion => "insertion",
            EventKind::Indel => "indel",
            EventKind::Frameshift => "frameshift",
            EventKind::Mutation => "mutation",
            EventKind::Phosphorylation => "phosphorylation",
            EventKind::SpliceSite => "splice-site",
            EventKind::Fusion => "fusion",
            EventKind::Translocation => "translocation",
            EventKind::InvertedTranslocation => "inverted translocation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalNotation {
    pub break1: Break,
    pub break2: Option<Break>,
    pub event: EventKind,
    pub ref_seq: Option<String>,
    pub untemplated_seq: Option<String>,
    pub truncation: Option<u32>,
    /// Breaks sit on two different features (fusions, translocations).
    pub multi_feature: bool,
}

impl PositionalNotation {
    pub fn parse(input: &str) -> Result<Self, LoaderError> {
        let text = input.trim().to_lowercase();
        if let Some(caps) = MULTI_FEATURE.captures(&text) {
            return Self::parse_multi_feature(&caps[1], &caps[2], &caps[3]);
        }

        let caps = PREFIXED
            .captures(&text)
            .ok_or_else(|| LoaderError::Notation(format!("missing coordinate prefix ({input})")))?;
        let system = CoordinateSystem::from_prefix(&caps[1]).ok_or_else(|| {
            LoaderError::Notation(format!("unsupported coordinate prefix {} ({input})", &caps[1]))
        })?;
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        let parts = system
            .breaks()
            .captures(body)
            .ok_or_else(|| LoaderError::Notation(format!("invalid breakpoints ({input})")))?;
        let break1 = Break::parse(system, &parts["b1"])?;
        let break2 = parts
            .name("b2")
            .map(|b2| Break::parse(system, b2.as_str()))
            .transpose()?;
        let tail = parts.name("tail").map(|m| m.as_str()).unwrap_or_default();

        let edit = parse_edit(system, tail, break1.ref_aa())
            .ok_or_else(|| LoaderError::Notation(format!("unrecognized event ({input})")))?;

        Ok(Self {
            break1,
            break2,
            event: edit.event,
            ref_seq: edit.ref_seq,
            untemplated_seq: edit.untemplated_seq,
            truncation: edit.truncation,
            multi_feature: false,
        })
    }

    fn parse_multi_feature(kind: &str, first: &str, second: &str) -> Result<Self, LoaderError> {
        let event = match kind {
            "fusion" => EventKind::Fusion,
            "translocation" | "trans" => EventKind::Translocation,
            "itrans" => EventKind::InvertedTranslocation,
            "inversion" | "inv" => EventKind::Inversion,
            "del" => EventKind::Deletion,
            _ => EventKind::Duplication,
        };
        Ok(Self {
            break1: feature_break(first)?,
            break2: Some(feature_break(second)?),
            event,
            ref_seq: None,
            untemplated_seq: None,
            truncation: None,
            multi_feature: true,
        })
    }

    /// Break and sequence fields of the positional variant record. The event type
    /// is resolved separately against the vocabulary.
    pub fn to_content(&self) -> Map<String, Value> {
        let mut content = Map::new();
        insert_break(&mut content, "break1", &self.break1);
        if let Some(break2) = &self.break2 {
            insert_break(&mut content, "break2", break2);
        }
        if let Some(ref_seq) = &self.ref_seq {
            content.insert("refSeq".to_string(), Value::from(ref_seq.to_uppercase()));
        }
        if let Some(untemplated) = &self.untemplated_seq {
            content.insert(
                "untemplatedSeq".to_string(),
                Value::from(untemplated.to_uppercase()),
            );
            if !untemplated.contains('?') {
                content.insert(
                    "untemplatedSeqSize".to_string(),
                    Value::from(untemplated.chars().count()),
                );
            }
        }
        if let Some(truncation) = self.truncation {
            content.insert("truncation".to_string(), Value::from(truncation));
        }
        content
    }
}

impl FromStr for PositionalNotation {
    type Err = LoaderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

fn insert_break(content: &mut Map<String, Value>, name: &str, value: &Break) {
    if let Ok(start) = serde_json::to_value(&value.start) {
        content.insert(format!("{name}Start"), start);
    }
    if let Some(Ok(end)) = value.end.as_ref().map(serde_json::to_value) {
        content.insert(format!("{name}End"), end);
    }
    content.insert(format!("{name}Repr"), Value::from(value.repr.clone()));
}

fn feature_break(text: &str) -> Result<Break, LoaderError> {
    if let Some(caps) = PREFIXED.captures(text) {
        let system = CoordinateSystem::from_prefix(&caps[1])
            .ok_or_else(|| LoaderError::Notation(format!("unsupported coordinate prefix ({text})")))?;
        return Break::parse(system, &caps[2]);
    }
    Break::parse(CoordinateSystem::Cytoband, text)
}

struct Edit {
    event: EventKind,
    ref_seq: Option<String>,
    untemplated_seq: Option<String>,
    truncation: Option<u32>,
}

impl Edit {
    fn new(event: EventKind) -> Self {
        Self {
            event,
            ref_seq: None,
            untemplated_seq: None,
            truncation: None,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_edit(system: CoordinateSystem, tail: &str, ref_aa: Option<&str>) -> Option<Edit> {
    let protein = system == CoordinateSystem::Protein;
    match tail {
        "" => return None,
        "mut" => return Some(Edit::new(EventKind::Mutation)),
        "phos" if protein => return Some(Edit::new(EventKind::Phosphorylation)),
        "spl" => return Some(Edit::new(EventKind::SpliceSite)),
        "fs" if !protein => return Some(Edit::new(EventKind::Frameshift)),
        _ => {}
    }

    if let Some(caps) = DELINS.captures(tail) {
        return Some(Edit {
            ref_seq: non_empty(&caps[1]),
            untemplated_seq: non_empty(&caps[2]),
            ..Edit::new(EventKind::Indel)
        });
    }
    if let Some(caps) = SIMPLE_EDIT.captures(tail) {
        let event = match &caps[1] {
            "del" => EventKind::Deletion,
            "dup" => EventKind::Duplication,
            _ => EventKind::Inversion,
        };
        return Some(Edit {
            ref_seq: non_empty(&caps[2]),
            ..Edit::new(event)
        });
    }
    if let Some(caps) = INSERTION.captures(tail) {
        return Some(Edit {
            untemplated_seq: non_empty(&caps[1]),
            ..Edit::new(EventKind::Insertion)
        });
    }

    if protein {
        if let Some(caps) = FRAMESHIFT.captures(tail) {
            let truncation = caps.get(2).and_then(|m| m.as_str().parse().ok());
            return Some(Edit {
                ref_seq: ref_aa.map(str::to_string),
                untemplated_seq: non_empty(&caps[1]),
                truncation,
                ..Edit::new(EventKind::Frameshift)
            });
        }
        if let Some(caps) = PROTEIN_SUB.captures(tail) {
            let alt = &caps[1];
            let event = if alt == "*" {
                EventKind::Nonsense
            } else {
                EventKind::Substitution
            };
            return Some(Edit {
                ref_seq: ref_aa.map(str::to_string),
                untemplated_seq: Some(alt.to_string()),
                ..Edit::new(event)
            });
        }
        return None;
    }

    let caps = NUCLEOTIDE_SUB.captures(tail)?;
    let (reference, alternate) = (&caps[1], &caps[2]);
    let event = if reference.len() == 1 && alternate.len() == 1 {
        EventKind::Substitution
    } else {
        EventKind::Indel
    };
    Some(Edit {
        ref_seq: non_empty(reference),
        untemplated_seq: non_empty(alternate),
        ..Edit::new(event)
    })
}
