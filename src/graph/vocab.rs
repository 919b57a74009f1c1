//! Vocabulary and namespaces used by the provenance graph.

use serde::{Deserialize, Serialize};

use super::Predicate;

/// `rdf:type`.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// `rdfs:label`.
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

/// `rdfs:Class`.
pub const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";

/// Default namespace for the ontology terms (`ex:`).
pub const DEFAULT_ONTOLOGY_NAMESPACE: &str = "http://example.org/vn/ontology#";

/// Default namespace under which unresolved entities are minted.
pub const DEFAULT_ENTITY_NAMESPACE: &str = "http://example.org/vn/entity/";

/// Resolves predicates and classes to IRIs under an ontology namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    ontology: String,
}

impl Vocabulary {
    /// Creates a vocabulary rooted at the given ontology namespace.
    #[must_use]
    pub fn new(ontology_namespace: impl Into<String>) -> Self {
        Self {
            ontology: ontology_namespace.into(),
        }
    }

    /// The ontology namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.ontology
    }

    /// IRI of the `Province` class.
    #[must_use]
    pub fn province_class(&self) -> String {
        format!("{}Province", self.ontology)
    }

    /// IRI for a predicate.
    #[must_use]
    pub fn predicate_iri(&self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Type => RDF_TYPE.to_string(),
            Predicate::Label => RDFS_LABEL.to_string(),
            Predicate::CanonicalLabel => format!("{}canonicalLabel", self.ontology),
            Predicate::FormedBy => format!("{}formedBy", self.ontology),
            Predicate::MergedInto => format!("{}mergedInto", self.ontology),
            Predicate::Other(iri) => iri.clone(),
        }
    }

    /// Maps an IRI back to a known predicate, or [`Predicate::Other`].
    #[must_use]
    pub fn predicate_from_iri(&self, iri: &str) -> Predicate {
        if iri == RDF_TYPE {
            return Predicate::Type;
        }
        if iri == RDFS_LABEL {
            return Predicate::Label;
        }
        match iri.strip_prefix(self.ontology.as_str()) {
            Some("canonicalLabel") => Predicate::CanonicalLabel,
            Some("formedBy") => Predicate::FormedBy,
            Some("mergedInto") => Predicate::MergedInto,
            _ => Predicate::Other(iri.to_string()),
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_ONTOLOGY_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_iri_roundtrip() {
        let vocab = Vocabulary::default();
        for p in [
            Predicate::Type,
            Predicate::Label,
            Predicate::CanonicalLabel,
            Predicate::FormedBy,
            Predicate::MergedInto,
        ] {
            let iri = vocab.predicate_iri(&p);
            assert_eq!(vocab.predicate_from_iri(&iri), p);
        }
    }

    #[test]
    fn test_unknown_predicate_is_other() {
        let vocab = Vocabulary::default();
        let p = vocab.predicate_from_iri("http://example.org/vn/ontology#population");
        assert_eq!(
            p,
            Predicate::Other("http://example.org/vn/ontology#population".to_string())
        );
    }

    #[test]
    fn test_custom_namespace() {
        let vocab = Vocabulary::new("urn:prov:");
        assert_eq!(vocab.province_class(), "urn:prov:Province");
        assert_eq!(vocab.predicate_iri(&Predicate::FormedBy), "urn:prov:formedBy");
    }
}
