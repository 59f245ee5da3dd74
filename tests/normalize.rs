use assert_matches::assert_matches;
use proptest::prelude::*;

use kb_loader::domain::{NormalizedVariant, NotationContext, Reference, VariantRecord};
use kb_loader::error::LoaderError;
use kb_loader::normalize::{normalize, normalize_record};

fn gene(name: &str) -> Reference {
    Reference::gene(name, Some("1".to_string()))
}

fn run(name: &str, feature: &str) -> Vec<NormalizedVariant> {
    normalize(name, &NotationContext::new(feature, Some("1"))).unwrap()
}

fn positional(variant: &str, reference: Reference) -> NormalizedVariant {
    NormalizedVariant::positional(variant, reference)
}

fn category(kind: &str, reference: Reference) -> NormalizedVariant {
    NormalizedVariant::category(kind, reference)
}

#[test]
fn exon_mutation() {
    assert_eq!(run("EXON 12 MUTATION", "gene"), vec![positional("e.12mut", gene("gene"))]);
}

#[test]
fn deleterious_mutation_is_category() {
    assert_eq!(
        run("DELETRIOUS MUTATION", "gene"),
        vec![category("deletrious mutation", gene("gene"))]
    );
}

#[test]
fn phosphorylation_and_splice_site() {
    assert_eq!(run("Y1234 phosphorylation", "gene"), vec![positional("p.y1234phos", gene("gene"))]);
    assert_eq!(run("F547 SPLICE SITE MUTATION", "alk"), vec![positional("p.f547spl", gene("alk"))]);
}

#[test]
fn single_gene_fusion_with_missense_mutation() {
    assert_eq!(
        run("ALK FUSION G1202R", "alk"),
        vec![category("fusion", gene("alk")), positional("p.g1202r", gene("alk"))]
    );
}

#[test]
fn fusion_with_two_resistance_mutations() {
    assert_eq!(
        run("EML4-ALK G1202R-L1198F", "alk"),
        vec![
            category("fusion", Reference::named("eml4")).with_reference2(gene("alk")),
            positional("p.g1202r", gene("alk")),
            positional("p.l1198f", gene("alk")),
        ]
    );
}

#[test]
fn fusion_partner_matching_context_carries_id() {
    assert_eq!(
        run("CD74-NRG1", "nrg1"),
        vec![category("fusion", Reference::named("cd74")).with_reference2(gene("nrg1"))]
    );
    assert_eq!(
        run("EML4-ALK E20;A20", "eml4"),
        vec![positional("fusion(e.20,e.20)", gene("eml4")).with_reference2(Reference::named("alk"))]
    );
}

#[test]
fn fusion_with_multiple_variants() {
    let expected = vec![
        category("fusion", Reference::named("lmna")).with_reference2(gene("ntrk1")),
        positional("p.g595r", gene("ntrk1")),
        positional("p.g667c", gene("ntrk1")),
    ];
    assert_eq!(run("LMNA-NTRK1 G595R AND G667C", "ntrk1"), expected);
    assert_eq!(run("LMNA::NTRK1 G595R AND G667C", "ntrk1"), expected);
}

#[test]
fn fusion_exon_junctions() {
    assert_eq!(
        run("EML4-ALK E20;A20", "alk"),
        vec![positional("fusion(e.20,e.20)", Reference::named("eml4")).with_reference2(gene("alk"))]
    );
    assert_eq!(
        run("EWSR1-FLI1 e7-e6", "fli1"),
        vec![positional("fusion(e.7,e.6)", Reference::named("ewsr1")).with_reference2(gene("fli1"))]
    );
}

#[test]
fn fusion_tolerates_gene_alias() {
    assert_eq!(
        run("BCR-ABL", "abl1"),
        vec![category("fusion", Reference::named("bcr")).with_reference2(gene("abl1"))]
    );
}

#[test]
fn fusion_partners_must_include_context_gene() {
    let result = normalize("EML4-ALK", &NotationContext::new("kras", Some("1")));
    assert_matches!(result, Err(LoaderError::Notation(_)));
}

#[test]
fn protein_with_legacy_cds_substitution() {
    assert_eq!(
        run("S111C (c.330CA>TT)", "ntrk1"),
        vec![
            positional("p.s111c", gene("ntrk1"))
                .with_inferred_by(positional("c.330_331delcainstt", gene("ntrk1")))
        ]
    );
}

#[test]
fn protein_with_cds_variants() {
    let cases = [
        ("E46* (c.136G>T)", "p.e46*", "c.136g>t"),
        ("t133lfs*26 (c.397dela)", "p.t133lfs*26", "c.397dela"),
        ("r79_s80del (c.236_241delgcagtc)", "p.r79_s80del", "c.236_241delgcagtc"),
        ("r82_v84del (c.244_252del)", "p.r82_v84del", "c.244_252del"),
        (
            "p.s193_c196dupstsc (c.577_588dupagcaccagctgc)",
            "p.s193_c196dupstsc",
            "c.577_588dupagcaccagctgc",
        ),
        ("A122I (c.364_365GC>AT)", "p.a122i", "c.364_365gc>at"),
    ];
    for (name, protein, cds) in cases {
        assert_eq!(
            run(name, "alk"),
            vec![positional(protein, gene("alk")).with_inferred_by(positional(cds, gene("alk")))],
            "{name}"
        );
    }
}

#[test]
fn huge_legacy_cds_position_does_not_abort() {
    let name = format!("S111C (c.{}CA>TT)", u64::MAX);
    let result = normalize(&name, &NotationContext::new("ntrk1", Some("1")));
    assert!(result.is_ok());
}

#[test]
fn plain_categories_and_fallbacks() {
    assert_eq!(run("UNDEREXPRESSION", "ntrk1"), vec![category("underexpression", gene("ntrk1"))]);
    assert_eq!(
        run("DNA BINDING DOMAIN MUTATION", "ntrk1"),
        vec![category("dna binding domain mutation", gene("ntrk1"))]
    );
    assert_eq!(run("R132H", "ntrk1"), vec![positional("p.r132h", gene("ntrk1"))]);
    assert_eq!(run("AMPLIFICATION", "erbb2"), vec![category("amplification", gene("erbb2"))]);
    assert_eq!(
        run("LOSS-OF-FUNCTION", "erbb2"),
        vec![category("loss of function", gene("erbb2"))]
    );
}

#[test]
fn gene_fusion_and_mutation_plurals() {
    assert_eq!(run("NRG1 fusions", "nrg1"), vec![category("fusion", gene("nrg1"))]);
    assert_eq!(run("ABL1 mutations", "abl1"), vec![category("mutation", gene("abl1"))]);
    assert_eq!(run("mutations", "abl1"), vec![category("mutation", gene("abl1"))]);
    assert_eq!(run("exon 3 mutations", "abl1"), vec![positional("e.3mut", gene("abl1"))]);
}

#[test]
fn cds_and_exon_ranges() {
    assert_eq!(run("c.123G>T", "abl1"), vec![positional("c.123g>t", gene("abl1"))]);
    assert_eq!(run("exon 2-3 deletion", "abl1"), vec![positional("e.2_3del", gene("abl1"))]);
}

#[test]
fn exception_table_rewrites() {
    assert_eq!(run("G12/G13", "kras"), vec![positional("p.(g12_g13)mut", gene("kras"))]);
    assert_eq!(
        run("V600E+V600M", "braf"),
        vec![positional("p.v600e", gene("braf")), positional("p.v600m", gene("braf"))]
    );
}

#[test]
fn compound_with_splicing_alteration() {
    let variants = run("A50A (c.150C>G); Splicing alteration (c.463-1G>T)", "alk");
    assert_eq!(variants.len(), 2);
    assert_eq!(variants[0].variant(), Some("p.a50a"));
    assert_eq!(variants[0].inferred_by, vec![positional("c.150c>g", gene("alk"))]);
    assert_eq!(variants[1].variant(), Some("c.463-1g>t"));
    assert_eq!(variants[1].infers, vec![category("splicing alteration", gene("alk"))]);
}

#[test]
fn unparsable_names_become_categories() {
    assert_eq!(
        run("ERBB2 G776INSV_G/C", "erbb2"),
        vec![category("erbb2 g776insv_g/c", gene("erbb2"))]
    );
    assert_eq!(
        run("exon1 151nt del; Null (Partial deletion of Exon 1)", "erbb2"),
        vec![
            category("exon1 151nt del", gene("erbb2")),
            category("null (partial deletion of exon 1)", gene("erbb2")),
        ]
    );
}

#[test]
fn spaced_slash_is_ambiguous() {
    let result = normalize("V600E / V600K", &NotationContext::new("braf", Some("673")));
    assert_matches!(result, Err(LoaderError::AmbiguousNotation(_)));
}

#[test]
fn three_way_events_are_rejected() {
    let context = NotationContext::new("alk", Some("238"));
    assert_matches!(
        normalize("EML4-ALK G1202R-L1198F-C1156Y", &context),
        Err(LoaderError::NotImplemented(_))
    );
    assert_matches!(normalize("EML4-ALK-ROS1", &context), Err(LoaderError::NotImplemented(_)));
}

#[test]
fn normalization_is_idempotent_on_canonical_output() {
    for name in ["p.v600e", "e.12mut", "c.123g>t", "amplification"] {
        let first = run(name, "braf");
        let again = run(first[0].label(), "braf");
        assert_eq!(first, again, "{name}");
    }
}

#[test]
fn record_dispatch_by_feature_kind() {
    let factor: VariantRecord = serde_json::from_value(serde_json::json!({
        "id": 7,
        "name": "TMB-H",
        "feature": {"__typename": "Factor", "name": "TMB"}
    }))
    .unwrap();
    assert_eq!(
        normalize_record(&factor).unwrap(),
        vec![category("high signature", Reference::signature("high mutation burden"))]
    );

    let fusion: VariantRecord = serde_json::from_value(serde_json::json!({
        "id": "8",
        "name": "EML4::ALK",
        "feature": {
            "__typename": "Fusion",
            "fivePrimeGene": {"name": "EML4", "entrezId": 27436},
            "threePrimeGene": {"name": "ALK", "entrezId": 238}
        }
    }))
    .unwrap();
    assert_eq!(
        normalize_record(&fusion).unwrap(),
        vec![
            category("fusion", Reference::gene("eml4", Some("27436".to_string())))
                .with_reference2(Reference::gene("alk", Some("238".to_string())))
        ]
    );

    let unknown: VariantRecord = serde_json::from_value(serde_json::json!({
        "id": 9,
        "name": "x",
        "feature": {"__typename": "Region"}
    }))
    .unwrap();
    assert_matches!(normalize_record(&unknown), Err(LoaderError::NotImplemented(_)));
}

proptest! {
    #[test]
    fn alphanumeric_names_always_normalize(name in "[a-zA-Z0-9]{1,20}") {
        let variants = normalize(&name, &NotationContext::new("kras", Some("3845"))).unwrap();
        prop_assert!(!variants.is_empty());
    }
}
