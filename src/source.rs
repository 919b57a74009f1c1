//! External entity sources.
//!
//! The merge core never talks to the network. A source is asked once for the
//! list of labeled entities, and the caller snapshots the result into a graph
//! (see [`crate::entity::snapshot_graph`]).

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::entity::LabeledEntity;
use crate::error::FetchError;

/// Query for Vietnamese provinces with English labels on DBpedia.
pub const PROVINCES_QUERY: &str = r#"PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX yago: <http://dbpedia.org/class/yago/>

SELECT DISTINCT ?province ?provinceLabel
WHERE {
  ?province rdf:type yago:WikicatProvincesOfVietnam .
  ?province rdfs:label ?provinceLabel .
  FILTER (lang(?provinceLabel) = "en")
}"#;

const SPARQL_JSON: &str = "application/sparql-results+json";

/// Produces the labeled entities of the source graph.
pub trait EntitySource {
    /// Fetches every entity with its label.
    ///
    /// # Errors
    /// Returns [`FetchError`] if the source is unreachable or answers with
    /// something that cannot be decoded. There is no retry.
    fn fetch(&self) -> Result<Vec<LabeledEntity>, FetchError>;
}

/// In-memory source, for tests and pre-fetched data.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    entities: Vec<LabeledEntity>,
}

impl StaticSource {
    /// Creates a source serving `entities` in order.
    #[must_use]
    pub fn new(entities: Vec<LabeledEntity>) -> Self {
        Self { entities }
    }
}

impl EntitySource for StaticSource {
    fn fetch(&self) -> Result<Vec<LabeledEntity>, FetchError> {
        Ok(self.entities.clone())
    }
}

/// SPARQL endpoint source.
#[derive(Debug, Clone)]
pub struct SparqlSource {
    client: HttpClient,
    endpoint: String,
    query: String,
    entity_var: String,
    label_var: String,
}

impl SparqlSource {
    /// Creates a source for `endpoint` running [`PROVINCES_QUERY`].
    ///
    /// # Errors
    /// Returns [`FetchError::Request`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = endpoint.into();
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint,
            query: PROVINCES_QUERY.to_string(),
            entity_var: "province".to_string(),
            label_var: "provinceLabel".to_string(),
        })
    }

    /// Replaces the query and the variable names read from its bindings.
    #[must_use]
    pub fn with_query(
        mut self,
        query: impl Into<String>,
        entity_var: impl Into<String>,
        label_var: impl Into<String>,
    ) -> Self {
        self.query = query.into();
        self.entity_var = entity_var.into();
        self.label_var = label_var.into();
        self
    }

    /// The endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EntitySource for SparqlSource {
    fn fetch(&self) -> Result<Vec<LabeledEntity>, FetchError> {
        tracing::info!(endpoint = %self.endpoint, "querying SPARQL endpoint");
        let response = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, SPARQL_JSON)
            .query(&[("query", self.query.as_str()), ("format", SPARQL_JSON)])
            .send()
            .map_err(|e| FetchError::Request {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(|e| FetchError::Request {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
        })?;
        let entities = parse_sparql_results(&body, &self.entity_var, &self.label_var).map_err(
            |message| FetchError::MalformedResponse {
                endpoint: self.endpoint.clone(),
                message,
            },
        )?;
        tracing::info!(entities = entities.len(), "fetched entities");
        Ok(entities)
    }
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
    #[serde(rename = "xml:lang", default)]
    lang: Option<String>,
}

/// Decodes a SPARQL JSON result set into labeled entities.
///
/// Binding order is preserved. Bindings missing either variable are skipped.
///
/// # Errors
/// Returns a description of the problem if `body` is not a SPARQL JSON
/// result set.
pub fn parse_sparql_results(
    body: &str,
    entity_var: &str,
    label_var: &str,
) -> Result<Vec<LabeledEntity>, String> {
    let parsed: SparqlResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;

    let mut out = Vec::with_capacity(parsed.results.bindings.len());
    for mut binding in parsed.results.bindings {
        let (Some(id), Some(label)) = (binding.remove(entity_var), binding.remove(label_var))
        else {
            tracing::debug!("skipping incomplete SPARQL binding");
            continue;
        };
        let mut entity = LabeledEntity::new(id.value, label.value);
        entity.lang = label.lang;
        out.push(entity);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
      "head": { "vars": ["province", "provinceLabel"] },
      "results": { "bindings": [
        { "province": { "type": "uri", "value": "http://dbpedia.org/resource/Quảng_Nam_province" },
          "provinceLabel": { "type": "literal", "xml:lang": "en", "value": "Quảng Nam province" } },
        { "province": { "type": "uri", "value": "http://dbpedia.org/resource/Orphan" } },
        { "province": { "type": "uri", "value": "http://dbpedia.org/resource/Huế" },
          "provinceLabel": { "type": "literal", "value": "Huế" } }
      ] }
    }"#;

    #[test]
    fn test_parse_keeps_order_and_skips_incomplete() {
        let entities = parse_sparql_results(BODY, "province", "provinceLabel").unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].label, "Quảng Nam province");
        assert_eq!(entities[0].lang.as_deref(), Some("en"));
        assert_eq!(entities[1].id.as_str(), "http://dbpedia.org/resource/Huế");
        assert_eq!(entities[1].lang, None);
    }

    #[test]
    fn test_parse_rejects_non_result_set() {
        assert!(parse_sparql_results("{\"boolean\": true}", "a", "b").is_err());
        assert!(parse_sparql_results("<html>", "a", "b").is_err());
    }

    #[test]
    fn test_parse_empty_bindings() {
        let body = r#"{"head":{"vars":[]},"results":{"bindings":[]}}"#;
        assert!(parse_sparql_results(body, "province", "provinceLabel")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_static_source() {
        let source = StaticSource::new(vec![LabeledEntity::new("urn:a", "A")]);
        assert_eq!(source.fetch().unwrap().len(), 1);
    }

    #[test]
    fn test_with_query_overrides_variables() {
        let source = SparqlSource::new("http://localhost:3030/vn/query", Duration::from_secs(1))
            .unwrap()
            .with_query("SELECT ?s ?l WHERE { ?s ?p ?l }", "s", "l");
        assert_eq!(source.endpoint(), "http://localhost:3030/vn/query");
        assert_eq!(source.entity_var, "s");
        assert_eq!(source.label_var, "l");
    }

    #[test]
    fn test_unreachable_endpoint_is_request_error() {
        let source = SparqlSource::new("http://127.0.0.1:1/sparql", Duration::from_millis(500))
            .unwrap();
        assert!(matches!(source.fetch(), Err(FetchError::Request { .. })));
    }
}
