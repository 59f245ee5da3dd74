use serde::Serialize;
use serde_json::{Map, Value};

/// Name of the loader's own curated source. Vocabulary terms default to it.
pub const INTERNAL_SOURCE_NAME: &str = "bcgsc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceDefinition {
    pub name: &'static str,
    pub display_name: &'static str,
    pub url: &'static str,
    pub description: &'static str,
    pub usage: Option<&'static str>,
    pub sort: u32,
}

impl SourceDefinition {
    /// Body of the `Source` record created for this provider.
    pub fn to_content(&self) -> Map<String, Value> {
        let mut content = Map::new();
        content.insert("name".to_string(), Value::from(self.name));
        content.insert("displayName".to_string(), Value::from(self.display_name));
        content.insert("url".to_string(), Value::from(self.url));
        content.insert("description".to_string(), Value::from(self.description));
        if let Some(usage) = self.usage {
            content.insert("usage".to_string(), Value::from(usage));
        }
        content.insert("sort".to_string(), Value::from(self.sort));
        content
    }
}

pub const SOURCES: &[SourceDefinition] = &[
    SourceDefinition {
        name: INTERNAL_SOURCE_NAME,
        display_name: "GraphKB",
        url: "https://graphkb.bcgsc.ca",
        description: "Curated vocabulary and statements maintained alongside the knowledgebase",
        usage: None,
        sort: 0,
    },
    SourceDefinition {
        name: "civic",
        display_name: "CIViC",
        url: "https://civicdb.org",
        description: "Community-curated clinical interpretations of variants in cancer",
        usage: Some("https://creativecommons.org/publicdomain/zero/1.0"),
        sort: 2,
    },
    SourceDefinition {
        name: "oncokb",
        display_name: "OncoKB",
        url: "https://oncokb.org",
        description: "Precision oncology knowledge base of cancer gene alterations and their treatment implications",
        usage: Some("https://oncokb.org/terms"),
        sort: 2,
    },
    SourceDefinition {
        name: "cosmic",
        display_name: "COSMIC",
        url: "https://cancer.sanger.ac.uk/cosmic",
        description: "Catalogue of somatic mutations in human cancer",
        usage: Some("https://cancer.sanger.ac.uk/cosmic/license"),
        sort: 2,
    },
    SourceDefinition {
        name: "dbsnp",
        display_name: "dbSNP",
        url: "https://www.ncbi.nlm.nih.gov/snp",
        description: "Public archive of short genetic variations identified by rsID",
        usage: Some("https://www.ncbi.nlm.nih.gov/home/about/policies"),
        sort: 2,
    },
    SourceDefinition {
        name: "entrez gene",
        display_name: "Entrez Gene",
        url: "https://www.ncbi.nlm.nih.gov/gene",
        description: "Gene-specific records with nomenclature, reference sequences and cross references",
        usage: Some("https://www.ncbi.nlm.nih.gov/home/about/policies"),
        sort: 1,
    },
    SourceDefinition {
        name: "hgnc",
        display_name: "HGNC",
        url: "https://www.genenames.org/about",
        description: "Approved human gene nomenclature",
        usage: Some("https://www.ebi.ac.uk/about/terms-of-use"),
        sort: 1,
    },
    SourceDefinition {
        name: "ensembl",
        display_name: "Ensembl",
        url: "https://uswest.ensembl.org",
        description: "Genome browser and annotation for vertebrate genomes",
        usage: Some("https://uswest.ensembl.org/info/about/legal/disclaimer.html"),
        sort: 1,
    },
    SourceDefinition {
        name: "refseq",
        display_name: "RefSeq",
        url: "https://www.ncbi.nlm.nih.gov/refseq",
        description: "Non-redundant reference sequences for genomic, transcript and protein records",
        usage: Some("https://www.ncbi.nlm.nih.gov/home/about/policies"),
        sort: 1,
    },
    SourceDefinition {
        name: "drugbank",
        display_name: "DrugBank",
        url: "https://www.drugbank.ca",
        description: "Drug data combined with drug target information",
        usage: Some("https://creativecommons.org/licenses/by-nc/4.0/legalcode"),
        sort: 1,
    },
    SourceDefinition {
        name: "chembl",
        display_name: "ChEMBL",
        url: "https://www.ebi.ac.uk/chembl",
        description: "Manually curated database of bioactive molecules with drug-like properties",
        usage: Some("https://creativecommons.org/licenses/by-sa/3.0"),
        sort: 1,
    },
    SourceDefinition {
        name: "ncit",
        display_name: "NCIt",
        url: "https://ncit.nci.nih.gov/ncitbrowser",
        description: "NCI Thesaurus reference terminology",
        usage: Some("https://creativecommons.org/licenses/by/4.0"),
        sort: 3,
    },
    SourceDefinition {
        name: "disease ontology",
        display_name: "DO",
        url: "http://disease-ontology.org",
        description: "Standardized ontology for human disease",
        usage: Some("https://creativecommons.org/publicdomain/zero/1.0"),
        sort: 1,
    },
    SourceDefinition {
        name: "oncotree",
        display_name: "OncoTree",
        url: "http://oncotree.mskcc.org",
        description: "Cancer type classification maintained by MSKCC",
        usage: None,
        sort: 1,
    },
    SourceDefinition {
        name: "fda",
        display_name: "FDA-SRS",
        url: "https://fdasis.nlm.nih.gov/srs",
        description: "Substance registration system issuing unique ingredient identifiers",
        usage: None,
        sort: 2,
    },
    SourceDefinition {
        name: "sequence ontology",
        display_name: "SO",
        url: "http://www.sequenceontology.org",
        description: "Terms and relationships describing features and attributes of biological sequence",
        usage: Some("http://www.sequenceontology.org/?page_id=269"),
        sort: 1,
    },
    SourceDefinition {
        name: "variation ontology",
        display_name: "VariO",
        url: "http://variationontology.org",
        description: "Ontology for the annotation of variation effects and mechanisms",
        usage: Some("http://variationontology.org/citing.shtml"),
        sort: 1,
    },
    SourceDefinition {
        name: "moa",
        display_name: "MOAlmanac",
        url: "https://moalmanac.org",
        description: "Molecular oncology almanac of clinical and biological relationships",
        usage: Some("https://moalmanac.org/terms"),
        sort: 2,
    },
    SourceDefinition {
        name: "database of curated mutations",
        display_name: "DoCM",
        url: "http://www.docm.info",
        description: "Curated database of known disease-causing mutations",
        usage: Some("http://www.docm.info/terms"),
        sort: 2,
    },
    SourceDefinition {
        name: "clinicaltrials.gov",
        display_name: "clinicaltrials.gov",
        url: "https://clinicaltrials.gov",
        description: "Database of privately and publicly funded clinical studies",
        usage: Some("https://clinicaltrials.gov/ct2/about-site/terms-conditions#Use"),
        sort: 2,
    },
];

/// Looks a provider up by name or display name, ignoring case.
pub fn find(name: &str) -> Option<&'static SourceDefinition> {
    let name = name.trim();
    SOURCES.iter().find(|source| {
        source.name.eq_ignore_ascii_case(name) || source.display_name.eq_ignore_ascii_case(name)
    })
}
