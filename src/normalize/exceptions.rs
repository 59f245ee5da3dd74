use std::sync::LazyLock;

use regex::Regex;

/// Known non-standard upstream strings and their corrected form, matched verbatim
/// before any other processing.
const EXCEPTIONS: &[(&str, &str)] = &[
    ("E746_T751>I", "E746_T751delinsI"),
    ("EML4-ALK C1156Y-L1196M", "EML4-ALK and C1156Y and L1196M"),
    ("EML4-ALK C1156Y-L1198F", "EML4-ALK and C1156Y and L1198F"),
    ("EML4-ALK G1202R-L1196M", "EML4-ALK and G1202R and L1196M"),
    ("EML4-ALK G1202R-L1198F", "EML4-ALK and G1202R and L1198F"),
    ("EML4-ALK L1196M-L1198F", "EML4-ALK and L1196M and L1198F"),
    ("EML4-ALK T1151INST", "EML4-ALK and T1151_?1152insT"),
    ("Ex19 del L858R", "e.19del and L858R"),
    ("G12/G13", "p.(G12_G13)mut"),
    ("K558NP", "K558delKinsNP"),
    ("T1151insT", "T1151_?1152insT"),
    ("V600E AMPLIFICATION", "V600E and AMPLIFICATION"),
    ("V600E+V600M", "V600E and V600M"),
    ("V600_K601>E", "V600_K601delVKinsE"),
    ("del 755-759", "?755_?759del"),
    ("di842-843vm", "D842_I843delDIinsVM"),
    ("mutations", "mutation"),
    (
        "p.193_196dupSTSC (c.577_588dupAGCACCAGCTGC)",
        "p.S193_C196dupSTSC (c.577_588dupAGCACCAGCTGC)",
    ),
    ("p26.3-25.3 11mb del", "y.p26.3_p25.3del"),
];

static LEGACY_CDS_SUBSTITUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^c\.(\d+)([acgt][acgt]+)>([acgt][acgt]+)$").unwrap());

pub fn apply_exceptions(raw: &str) -> &str {
    EXCEPTIONS
        .iter()
        .find(|(from, _)| *from == raw)
        .map(|(_, to)| *to)
        .unwrap_or(raw)
}

/// Rewrites the deprecated multi-base substitution `c.330ca>tt` into the explicit
/// `c.330_331delcainstt`. Only a single start position with equal-length reference
/// and alternate runs is rewritten; anything else is returned unchanged.
pub fn rewrite_legacy_cds(cds: &str) -> String {
    let Some(caps) = LEGACY_CDS_SUBSTITUTION.captures(cds) else {
        return cds.to_string();
    };
    let (reference, alternate) = (&caps[2], &caps[3]);
    if reference.len() != alternate.len() {
        return cds.to_string();
    }
    let Ok(start) = caps[1].parse::<u64>() else {
        return cds.to_string();
    };
    let Some(end) = start.checked_add(reference.len() as u64 - 1) else {
        return cds.to_string();
    };
    format!("c.{start}_{end}del{reference}ins{alternate}")
}
