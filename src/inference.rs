//! Directed `Infers` edges between an uploaded variant and the variants it implies
//! or is implied by. Edges are best-effort: failures are logged, never raised.

use serde_json::{Map, Value};

use crate::domain::NormalizedVariant;
use crate::error::LoaderError;
use crate::graphkb::GraphStore;
use crate::record::{self, GraphRecord, Target};
use crate::upsert::{AddRecord, RecordResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The uploaded variant infers the related one.
    Infers,
    /// The related variant infers the uploaded one.
    InferredBy,
}

/// Related descriptors of `variant`, `infers` entries first.
pub fn related(variant: &NormalizedVariant) -> impl Iterator<Item = (Direction, &NormalizedVariant)> {
    variant
        .infers
        .iter()
        .map(|child| (Direction::Infers, child))
        .chain(variant.inferred_by.iter().map(|child| (Direction::InferredBy, child)))
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    Linked(GraphRecord),
    Exists,
    SelfLink,
    Failed(String),
}

/// Creates the edge between `variant` and `related` in the given direction.
pub fn link<S: GraphStore>(
    resolver: &mut RecordResolver<S>,
    direction: Direction,
    variant: &GraphRecord,
    related: &GraphRecord,
) -> LinkOutcome {
    match try_link(resolver, direction, variant, related) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(
                variant = variant.rid().unwrap_or("?"),
                related = related.rid().unwrap_or("?"),
                error = %err,
                "failed to link inferred variant"
            );
            LinkOutcome::Failed(err.to_string())
        }
    }
}

fn try_link<S: GraphStore>(
    resolver: &mut RecordResolver<S>,
    direction: Direction,
    variant: &GraphRecord,
    related: &GraphRecord,
) -> Result<LinkOutcome, LoaderError> {
    let variant_rid = record::rid(variant)?;
    let related_rid = record::rid(related)?;
    if variant_rid == related_rid {
        return Ok(LinkOutcome::SelfLink);
    }
    let (out, into) = match direction {
        Direction::Infers => (variant_rid, related_rid),
        Direction::InferredBy => (related_rid, variant_rid),
    };
    let mut content = Map::new();
    content.insert("out".to_string(), Value::from(out));
    content.insert("in".to_string(), Value::from(into));

    let request = AddRecord::new(Target::Infers, content).exists_ok().without_fetch();
    Ok(match resolver.add_record(request)? {
        Some(edge) => LinkOutcome::Linked(edge),
        None => LinkOutcome::Exists,
    })
}
