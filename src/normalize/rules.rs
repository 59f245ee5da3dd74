use std::sync::LazyLock;

use regex::Regex;

use super::{compare_gene_names, normalize, rewrite_legacy_cds};
use crate::domain::{NormalizedVariant, NotationContext, Reference};
use crate::error::LoaderError;

pub type RuleResult = Option<Result<Vec<NormalizedVariant>, LoaderError>>;

/// A named recognizer. `apply` returns `None` when the name is not its shape,
/// letting the next rule try.
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str, &NotationContext) -> RuleResult,
}

/// Rules in priority order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "category-term",
        apply: category_term,
    },
    Rule {
        name: "translocation",
        apply: translocation,
    },
    Rule {
        name: "protein-with-cds",
        apply: protein_with_cds,
    },
    Rule {
        name: "exon-intron-range",
        apply: exon_intron_range,
    },
    Rule {
        name: "two-partner-fusion",
        apply: two_partner_fusion,
    },
    Rule {
        name: "gene-fusion",
        apply: gene_fusion,
    },
    Rule {
        name: "cds-substitution",
        apply: cds_substitution,
    },
    Rule {
        name: "semantic-category",
        apply: semantic_category,
    },
    Rule {
        name: "splicing-alteration",
        apply: splicing_alteration,
    },
    Rule {
        name: "residue-modification",
        apply: residue_modification,
    },
    Rule {
        name: "fusion-with-mutation",
        apply: fusion_with_mutation,
    },
    Rule {
        name: "gene-mutations",
        apply: gene_mutations,
    },
];

const CATEGORY_TERMS: &[&str] = &[
    "loss-of-function",
    "gain-of-function",
    "overexpression",
    "expression",
    "amplification",
    "mutation",
];

static TRANSLOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^t\(([^;()]+);([^;()]+)\)\(([^;()]+);([^;()]+)\)$").unwrap()
});
static PROTEIN_WITH_CDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(p\.)?([a-z*]\d+\S*)\s+\((c\.[^)]+)\)$").unwrap()
});
static EXON_INTRON_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(intron|exon)\s+(\d+)(?:-(\d+))?\s+(mutation|deletion|frameshift|insertion)s?$",
    )
    .unwrap()
});
static TWO_PARTNER_FUSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z][^-\s:]*)(?:-|::)([a-z][^-\s:]*)\s*(\S+)?$").unwrap()
});
static EXON_JUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^e(\d+)-e(\d+)$").unwrap());
static EXON_JUNCTION_ALT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z](\d+);[a-z](\d+)$").unwrap());
static GENE_FUSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z][^-\s]*\s+fusions?$").unwrap());
static CDS_SUBSTITUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*c\.\d+\s*[a-z]\s*>[a-z]\s*$").unwrap());
static SEMANTIC_CATEGORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^((delete?rious)|promoter)\s+mutation$").unwrap());
static SPLICING_ALTERATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(splicing\s+alteration)\s+\((c\..*)\)$").unwrap());
static RESIDUE_MODIFICATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z]\d+)\s+(phosphorylation|splice site)(\s+mutation)?$").unwrap()
});
static FUSION_WITH_MUTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\w+\s+fusion)\s+([a-z]\d+\S+)$").unwrap());
static GENE_MUTATIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\s+mutations?$").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn single(variant: NormalizedVariant) -> RuleResult {
    Some(Ok(vec![variant]))
}

fn concat(parts: &[&str], context: &NotationContext) -> RuleResult {
    let mut variants = Vec::new();
    for part in parts {
        match normalize(part, context) {
            Ok(found) => variants.extend(found),
            Err(err) => return Some(Err(err)),
        }
    }
    Some(Ok(variants))
}

fn category_term(name: &str, context: &NotationContext) -> RuleResult {
    if !CATEGORY_TERMS.contains(&name) {
        return None;
    }
    single(NormalizedVariant::category(
        name.replace('-', " "),
        context.reference(),
    ))
}

fn translocation(name: &str, _context: &NotationContext) -> RuleResult {
    let caps = TRANSLOCATION.captures(name)?;
    single(
        NormalizedVariant::positional(
            format!("translocation({}, {})", &caps[3], &caps[4]),
            Reference::named(&caps[1]),
        )
        .with_reference2(Reference::named(&caps[2])),
    )
}

fn protein_with_cds(name: &str, context: &NotationContext) -> RuleResult {
    let caps = PROTEIN_WITH_CDS.captures(name)?;
    let cds = rewrite_legacy_cds(&caps[3]);
    single(
        NormalizedVariant::positional(format!("p.{}", &caps[2]), context.reference())
            .with_inferred_by(NormalizedVariant::positional(cds, context.reference())),
    )
}

fn exon_intron_range(name: &str, context: &NotationContext) -> RuleResult {
    let caps = EXON_INTRON_RANGE.captures(name)?;
    let prefix = if caps[1].eq_ignore_ascii_case("exon") {
        "e"
    } else {
        "i"
    };
    let break2 = caps
        .get(3)
        .map(|end| format!("_{}", end.as_str()))
        .unwrap_or_default();
    let event = caps[4].to_lowercase();
    let suffix = if event == "frameshift" { "fs" } else { &event[..3] };
    single(NormalizedVariant::positional(
        format!("{prefix}.{}{break2}{suffix}", &caps[2]),
        context.reference(),
    ))
}

fn two_partner_fusion(name: &str, context: &NotationContext) -> RuleResult {
    let caps = TWO_PARTNER_FUSION.captures(name)?;
    let (gene1, gene2) = (&caps[1], &caps[2]);

    let notation = match caps.get(3).map(|m| m.as_str()) {
        None => None,
        Some(tail) => {
            if let Some(junction) = EXON_JUNCTION
                .captures(tail)
                .or_else(|| EXON_JUNCTION_ALT.captures(tail))
            {
                Some(format!("fusion(e.{},e.{})", &junction[1], &junction[2]))
            } else if tail.starts_with('-') || tail.starts_with(':') {
                return Some(Err(LoaderError::NotImplemented(format!(
                    "fusions of three or more partners are not supported ({name})"
                ))));
            } else if tail.contains('-') {
                let mutations: Vec<&str> = tail.split('-').collect();
                if mutations.len() > 2 || mutations.iter().any(|m| m.is_empty()) {
                    return Some(Err(LoaderError::NotImplemented(format!(
                        "combinations of three or more secondary mutations are not supported ({name})"
                    ))));
                }
                let pair = format!("{gene1}-{gene2}");
                return concat(&[pair.as_str(), mutations[0], mutations[1]], context);
            } else {
                let pair = format!("{gene1}-{gene2}");
                return concat(&[pair.as_str(), tail], context);
            }
        }
    };

    let (reference1, reference2) = if compare_gene_names(gene1, &context.feature_name) {
        (context.reference(), Reference::named(gene2))
    } else if compare_gene_names(gene2, &context.feature_name) {
        (Reference::named(gene1), context.reference())
    } else {
        return Some(Err(LoaderError::Notation(format!(
            "linked gene name ({}) does not match either of the fusion partners ({gene1}, {gene2}) for this variant ({name})",
            context.feature_name
        ))));
    };

    let variant = match notation {
        Some(fusion) => NormalizedVariant::positional(fusion, reference1),
        None => NormalizedVariant::category("fusion", reference1),
    };
    single(variant.with_reference2(reference2))
}

fn gene_fusion(name: &str, context: &NotationContext) -> RuleResult {
    GENE_FUSION.is_match(name).then(|| {
        Ok(vec![NormalizedVariant::category(
            "fusion",
            context.reference(),
        )])
    })
}

fn cds_substitution(name: &str, context: &NotationContext) -> RuleResult {
    if !CDS_SUBSTITUTION.is_match(name) {
        return None;
    }
    single(NormalizedVariant::positional(
        WHITESPACE.replace_all(name, "").into_owned(),
        context.reference(),
    ))
}

fn semantic_category(name: &str, context: &NotationContext) -> RuleResult {
    if !SEMANTIC_CATEGORY.is_match(name) && !name.contains("domain") {
        return None;
    }
    single(NormalizedVariant::category(name, context.reference()))
}

fn splicing_alteration(name: &str, context: &NotationContext) -> RuleResult {
    let caps = SPLICING_ALTERATION.captures(name)?;
    single(
        NormalizedVariant::positional(&caps[2], context.reference())
            .with_infers(NormalizedVariant::category(&caps[1], context.reference())),
    )
}

fn residue_modification(name: &str, context: &NotationContext) -> RuleResult {
    let caps = RESIDUE_MODIFICATION.captures(name)?;
    let suffix = if caps[2].eq_ignore_ascii_case("phosphorylation") {
        "phos"
    } else {
        "spl"
    };
    single(NormalizedVariant::positional(
        format!("p.{}{suffix}", &caps[1]),
        context.reference(),
    ))
}

fn fusion_with_mutation(name: &str, context: &NotationContext) -> RuleResult {
    let caps = FUSION_WITH_MUTATION.captures(name)?;
    concat(&[&caps[1], &caps[2]], context)
}

fn gene_mutations(name: &str, context: &NotationContext) -> RuleResult {
    let caps = GENE_MUTATIONS.captures(name)?;
    if !compare_gene_names(&caps[1], &context.feature_name) {
        return None;
    }
    single(NormalizedVariant::category("mutation", context.reference()))
}
