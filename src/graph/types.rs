//! Type projection.
//!
//! Annotation services report entity types as one comma-separated string
//! mixing several vocabularies, e.g.
//! `Http://xmlns.com/foaf/0.1/Person,Wikidata:Q5,DUL:NaturalPerson,DBpedia:Person`.
//! [`TypeProjector`] turns each recognized token into an `rdf:type` term.

use super::InvestigationGraph;
use super::vocab::{DBR, DUL, FOAF, Namespace, SCHEMA, WD};
use oxrdf::NamedNode;
use oxrdf::vocab::rdf;
use tracing::debug;

/// Vocabularies a type token can belong to, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    DBpedia,
    Wikidata,
    Schema,
    Foaf,
    Dul,
}

/// How the local part of a token is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extraction {
    /// Text after the first `:`, e.g. `DBpedia:Person`.
    AfterColon,
    /// Text after the FOAF version segment, e.g. `http://xmlns.com/foaf/0.1/Person`.
    AfterSegment(&'static str),
}

impl Vocabulary {
    pub const ALL: [Vocabulary; 5] = [
        Self::DBpedia,
        Self::Wikidata,
        Self::Schema,
        Self::Foaf,
        Self::Dul,
    ];

    /// Lowercase substring identifying the vocabulary in a token.
    pub fn marker(self) -> &'static str {
        match self {
            Self::DBpedia => "dbpedia",
            Self::Wikidata => "wikidata",
            Self::Schema => "schema",
            Self::Foaf => "foaf",
            Self::Dul => "dul",
        }
    }

    /// Namespace the extracted local part is qualified under.
    pub fn namespace(self) -> Namespace {
        match self {
            Self::DBpedia => DBR,
            Self::Wikidata => WD,
            Self::Schema => SCHEMA,
            Self::Foaf => FOAF,
            Self::Dul => DUL,
        }
    }

    fn extraction(self) -> Extraction {
        match self {
            Self::Foaf => Extraction::AfterSegment("/0.1/"),
            _ => Extraction::AfterColon,
        }
    }

    /// Classify a token by the first vocabulary marker it contains.
    pub fn classify(token: &str) -> Option<Self> {
        let lower = token.to_lowercase();
        Self::ALL.into_iter().find(|v| lower.contains(v.marker()))
    }

    /// Extract the local term name from a token of this vocabulary.
    pub fn local_part(self, token: &str) -> Option<&str> {
        let local = match self.extraction() {
            Extraction::AfterColon => token.split(':').nth(1)?,
            Extraction::AfterSegment(segment) => token.split_once(segment)?.1,
        };
        let local = local.trim();
        let plain = !local.is_empty()
            && local
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
        plain.then_some(local)
    }
}

/// Maps raw type strings onto typed statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeProjector;

impl TypeProjector {
    /// Project a single token; `None` when it belongs to no known vocabulary.
    pub fn project_token(token: &str) -> Option<NamedNode> {
        let token = token.trim();
        let vocabulary = Vocabulary::classify(token)?;
        let Some(local) = vocabulary.local_part(token) else {
            debug!(name: "types.dropped", token = %token, "Type token has no usable local name");
            return None;
        };
        Some(vocabulary.namespace().term(local))
    }

    /// Project every recognized token of a comma-separated type list.
    pub fn project(types: &str) -> Vec<NamedNode> {
        types
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .filter_map(Self::project_token)
            .collect()
    }

    /// Add `(entity, rdf:type, term)` for every projected type.
    ///
    /// Returns the number of typed statements produced.
    pub fn emit(graph: &mut InvestigationGraph, entity: &NamedNode, types: &str) -> usize {
        let terms = Self::project(types);
        for term in &terms {
            graph.add(entity.clone(), rdf::TYPE, term.clone());
        }
        terms.len()
    }
}
