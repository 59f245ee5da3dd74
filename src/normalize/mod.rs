//! Variant-name normalization.
//!
//! Free-text variant names from external sources are turned into one or more
//! [`NormalizedVariant`] descriptors. Names pass through the exception table,
//! compound splitting and then an ordered list of [`rules::RULES`]; the first rule
//! that recognizes the name decides. Names no rule recognizes are handled by
//! [`fallback`], which never fails.

mod exceptions;
mod rules;

pub use exceptions::{apply_exceptions, rewrite_legacy_cds};
pub use rules::{RULES, Rule};

use crate::domain::{
    FactorFeature, FeatureInstance, FusionFeature, NormalizedVariant, NotationContext, Reference,
    VariantRecord,
};
use crate::error::LoaderError;
use crate::notation::PositionalNotation;

const CONJUNCTION: &str = " and ";

/// Gene names that refer to the same gene under different historical spellings.
const GENE_ALIASES: &[&[&str]] = &[&["abl1", "abl"]];

/// Signature names for factor features, keyed by the lower-cased factor name.
const FACTOR_SIGNATURES: &[(&str, &str)] = &[
    ("tmb", "high mutation burden"),
    ("tumor mutational burden", "high mutation burden"),
    ("tumour mutational burden", "high mutation burden"),
    ("msi", "microsatellite instability"),
    ("msi-h", "microsatellite instability"),
];

const SIGNATURE_TYPE: &str = "high signature";

/// Case-insensitive gene name equality that tolerates known aliases.
pub fn compare_gene_names(first: &str, second: &str) -> bool {
    let first = first.trim().to_lowercase();
    let second = second.trim().to_lowercase();
    if first == second {
        return true;
    }
    GENE_ALIASES
        .iter()
        .any(|group| group.contains(&first.as_str()) && group.contains(&second.as_str()))
}

pub fn normalize(raw_name: &str, context: &NotationContext) -> Result<Vec<NormalizedVariant>, LoaderError> {
    let name = apply_exceptions(raw_name)
        .replace(" + ", CONJUNCTION)
        .replace("; ", CONJUNCTION)
        .to_lowercase();
    let name = name.trim();

    if name.is_empty() {
        return Err(LoaderError::InvalidInput(format!(
            "empty variant name ({raw_name:?})"
        )));
    }
    if name.contains(" / ") {
        return Err(LoaderError::AmbiguousNotation(format!(
            "/ has ambiguous meaning, cannot process variant ({raw_name})"
        )));
    }
    if name.contains(CONJUNCTION) {
        let mut variants = Vec::new();
        for piece in name.split(CONJUNCTION).map(str::trim).filter(|p| !p.is_empty()) {
            variants.extend(normalize(piece, context)?);
        }
        return Ok(variants);
    }

    for rule in RULES {
        if let Some(result) = (rule.apply)(name, context) {
            tracing::debug!(rule = rule.name, name, "variant name matched");
            return result;
        }
    }
    Ok(vec![fallback(name, context)])
}

/// Last-resort interpretation: the name as positional notation, then with a
/// protein prefix, then as a category term carried verbatim.
pub fn fallback(name: &str, context: &NotationContext) -> NormalizedVariant {
    if PositionalNotation::parse(name).is_ok() {
        return NormalizedVariant::positional(name, context.reference());
    }
    let protein = format!("p.{name}");
    if PositionalNotation::parse(&protein).is_ok() {
        return NormalizedVariant::positional(protein, context.reference());
    }
    NormalizedVariant::category(name, context.reference())
}

/// Normalizes a source variant row according to the kind of feature it is attached to.
pub fn normalize_record(record: &VariantRecord) -> Result<Vec<NormalizedVariant>, LoaderError> {
    match &record.feature {
        FeatureInstance::Gene(gene) => {
            let context = NotationContext::new(&gene.name, gene.entrez_id.as_deref());
            normalize(&record.name, &context)
        }
        FeatureInstance::Factor(factor) => normalize_factor(factor).map(|variant| vec![variant]),
        FeatureInstance::Fusion(fusion) => normalize_fusion(fusion).map(|variant| vec![variant]),
        FeatureInstance::Unsupported => Err(LoaderError::NotImplemented(format!(
            "unable to process variant's feature of unsupported type ({})",
            record.name
        ))),
    }
}

fn normalize_factor(factor: &FactorFeature) -> Result<NormalizedVariant, LoaderError> {
    let key = factor.name.trim().to_lowercase();
    let signature = FACTOR_SIGNATURES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, signature)| *signature)
        .ok_or_else(|| {
            LoaderError::NotImplemented(format!(
                "unable to process variant's feature of type Factor ({})",
                factor.name
            ))
        })?;
    Ok(NormalizedVariant::category(
        SIGNATURE_TYPE,
        Reference::signature(signature),
    ))
}

fn normalize_fusion(fusion: &FusionFeature) -> Result<NormalizedVariant, LoaderError> {
    let five_prime = fusion.five_prime_gene.as_ref().map(|gene| gene.reference());
    let three_prime = fusion.three_prime_gene.as_ref().map(|gene| gene.reference());
    match (five_prime, three_prime) {
        (Some(first), Some(second)) => {
            Ok(NormalizedVariant::category("fusion", first).with_reference2(second))
        }
        (Some(only), None) | (None, Some(only)) => Ok(NormalizedVariant::category("fusion", only)),
        (None, None) => Err(LoaderError::NotImplemented(
            "fusion feature without any partner gene".to_string(),
        )),
    }
}
