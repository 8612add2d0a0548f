//! Row-to-graph mapping.
//!
//! Each investigation row becomes a fixed set of statements: the two actors
//! (investigatee and president), the investigation event, and, for rows
//! whose outcome is more than a bare indictment, an anonymous conviction
//! sub-event.

use super::types::TypeProjector;
use super::vocab::{DBR, EX, SEM, TL};
use super::{GraphError, InvestigationGraph, named_node};
use crate::annotation::{AnnotationOutcome, EntityAnnotator, TypeFilter};
use crate::dataset::{DatasetError, InvestigationRow};
use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use futures::{StreamExt, stream};
use oxrdf::vocab::{rdf, rdfs, xsd};
use oxrdf::{BlankNode, Literal, NamedNode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// =============================================================================
// Policy and Reports
// =============================================================================

/// What to do with a row that cannot be decoded or mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRowPolicy {
    /// Log the row and continue.
    #[default]
    Skip,
    /// Abort the run.
    Fail,
}

impl std::str::FromStr for InvalidRowPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown row policy '{other}' (expected skip or fail)")),
        }
    }
}

/// Statements produced by one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowReport {
    /// New statements appended to the graph
    pub triples_added: usize,
    /// Names that fell back to a local entity
    pub fallbacks: usize,
    /// Whether a conviction sub-event was emitted
    pub conviction: bool,
}

/// Totals for a whole build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BuildSummary {
    pub rows_read: usize,
    pub rows_mapped: usize,
    pub rows_skipped: usize,
    pub convictions: usize,
    pub fallbacks: usize,
    pub triples: usize,
}

/// A row with both of its names resolved.
#[derive(Debug, Clone)]
pub struct ResolvedRow {
    pub row: InvestigationRow,
    pub investigatee: AnnotationOutcome,
    /// `None` when the row names no president.
    pub president: Option<AnnotationOutcome>,
}

impl ResolvedRow {
    pub fn fallbacks(&self) -> usize {
        std::iter::once(&self.investigatee)
            .chain(self.president.as_ref())
            .filter(|o| o.is_fallback())
            .count()
    }
}

// =============================================================================
// Statement Template
// =============================================================================

fn int_literal(value: i64) -> Literal {
    Literal::new_typed_literal(value.to_string(), xsd::INT)
}

fn date_literal(value: NaiveDate) -> Literal {
    Literal::new_typed_literal(value.format("%Y-%m-%d").to_string(), xsd::DATE)
}

/// Append the statement template for one resolved row.
///
/// Every IRI is validated before the first statement is added, so a failing
/// row leaves the graph untouched.
pub fn emit_row(
    graph: &mut InvestigationGraph,
    resolved: &ResolvedRow,
) -> std::result::Result<RowReport, GraphError> {
    let row = &resolved.row;
    let investigation = EX.mint(&row.investigation)?;
    let investigatee_annotation = resolved.investigatee.annotation();
    let investigatee = named_node(&investigatee_annotation.uri)?;
    let president = resolved
        .president
        .as_ref()
        .map(|outcome| {
            let annotation = outcome.annotation();
            named_node(&annotation.uri).map(|node| (node, annotation.types.as_str()))
        })
        .transpose()?;
    let conviction_type = match &row.result {
        Some(result) if row.has_conviction() => Some(EX.mint(result)?),
        _ => None,
    };

    let before = graph.len();

    // Investigatee
    graph.add(investigatee.clone(), rdf::TYPE, SEM.term("Actor"));
    graph.add(investigatee.clone(), SEM.term("hasActorType"), DBR.term("Suspect"));
    if row.american {
        graph.add(investigatee.clone(), SEM.term("hasActorType"), EX.term("American"));
    }
    graph.add(investigatee.clone(), EX.term("actorIn"), investigation.clone());
    TypeProjector::emit(graph, &investigatee, &investigatee_annotation.types);

    // President
    if let Some((president, types)) = &president {
        graph.add(president.clone(), rdf::TYPE, SEM.term("Actor"));
        graph.add(president.clone(), SEM.term("hasActorType"), DBR.term("President"));
        TypeProjector::emit(graph, president, types);
    }

    // Investigation event
    graph.add(investigation.clone(), rdf::TYPE, DBR.term("Criminal_Investigation"));
    graph.add(investigation.clone(), rdf::TYPE, SEM.term("Event"));
    graph.add(
        investigation.clone(),
        rdfs::LABEL,
        Literal::new_simple_literal(row.investigation.as_str()),
    );
    if let Some(start) = row.investigation_start {
        graph.add(investigation.clone(), SEM.term("hasBeginTimeStamp"), date_literal(start));
    }
    if let Some(end) = row.investigation_end {
        graph.add(investigation.clone(), SEM.term("hasEndTimeStamp"), date_literal(end));
    }
    if let Some(days) = row.investigation_days {
        graph.add(investigation.clone(), TL.term("durationInt"), int_literal(days));
    }
    graph.add(investigation.clone(), SEM.term("hasActor"), investigatee.clone());
    if let Some((president, _)) = &president {
        graph.add(investigation.clone(), SEM.term("hasActor"), president.clone());
    }

    // Conviction sub-event
    if let Some(event_type) = &conviction_type {
        emit_conviction(graph, row, &investigation, &investigatee, event_type);
    }

    Ok(RowReport {
        triples_added: graph.len() - before,
        fallbacks: resolved.fallbacks(),
        conviction: conviction_type.is_some(),
    })
}

fn emit_conviction(
    graph: &mut InvestigationGraph,
    row: &InvestigationRow,
    investigation: &NamedNode,
    investigatee: &NamedNode,
    event_type: &NamedNode,
) {
    let conviction = BlankNode::default();
    graph.add(investigation.clone(), SEM.term("hasSubEvent"), conviction.clone());
    graph.add(conviction.clone(), rdf::TYPE, SEM.term("Event"));
    graph.add(conviction.clone(), SEM.term("eventType"), event_type.clone());
    if let Some(days) = row.indictment_days {
        graph.add(conviction.clone(), EX.term("indictmentDays"), int_literal(days));
    }
    if row.overturned {
        graph.add(conviction.clone(), SEM.term("eventType"), EX.term("Overturned"));
    }
    if row.pardoned {
        graph.add(conviction.clone(), SEM.term("eventType"), EX.term("Pardoned"));
    }
    if let Some(date) = row.cp_date {
        graph.add(conviction.clone(), SEM.term("hasTime"), date_literal(date));
    }
    if let Some(days) = row.cp_days {
        graph.add(conviction.clone(), TL.term("durationInt"), int_literal(days));
    }
    graph.add(conviction, SEM.term("hasActor"), investigatee.clone());
}

// =============================================================================
// Graph Builder
// =============================================================================

/// Drives the annotator over rows and appends their statements.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    annotator: EntityAnnotator,
    concurrency: usize,
    policy: InvalidRowPolicy,
}

impl GraphBuilder {
    /// Create a builder resolving one row at a time and skipping invalid rows.
    pub fn new(annotator: EntityAnnotator) -> Self {
        Self {
            annotator,
            concurrency: 1,
            policy: InvalidRowPolicy::default(),
        }
    }

    /// Number of rows whose annotations may be in flight at once.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: InvalidRowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve the investigatee and president of `row` concurrently.
    pub async fn resolve(&self, row: InvestigationRow) -> ResolvedRow {
        let filter = TypeFilter::person();
        let investigatee = self.annotator.annotate(&row.name, &filter);
        let president = async {
            match &row.president {
                Some(name) => Some(self.annotator.annotate(name, &filter).await),
                None => None,
            }
        };
        let (investigatee, president) = tokio::join!(investigatee, president);
        ResolvedRow {
            row,
            investigatee,
            president,
        }
    }

    /// Resolve and append a single row.
    pub async fn add_row(
        &self,
        row: &InvestigationRow,
        graph: &mut InvestigationGraph,
    ) -> std::result::Result<RowReport, GraphError> {
        let resolved = self.resolve(row.clone()).await;
        emit_row(graph, &resolved)
    }

    /// Build a graph from a stream of decoded rows.
    ///
    /// Annotation runs ahead for up to `concurrency` rows; statements are
    /// appended on this task in input order.
    pub async fn build<I>(&self, rows: I) -> Result<(InvestigationGraph, BuildSummary)>
    where
        I: IntoIterator<Item = std::result::Result<InvestigationRow, DatasetError>>,
    {
        let mut graph = InvestigationGraph::new();
        let mut summary = BuildSummary::default();

        let mut resolved = std::pin::pin!(
            stream::iter(rows)
                .map(|row| async move {
                    match row {
                        Ok(row) => Ok(self.resolve(row).await),
                        Err(e) => Err(e),
                    }
                })
                .buffered(self.concurrency)
        );

        while let Some(item) = resolved.next().await {
            summary.rows_read += 1;
            let outcome = match item {
                Ok(row) => emit_row(&mut graph, &row).map_err(PipelineError::from),
                Err(e) => Err(PipelineError::from(e)),
            };
            match outcome {
                Ok(report) => {
                    debug!(
                        name: "row.mapped",
                        row = summary.rows_read,
                        triples = report.triples_added,
                        fallbacks = report.fallbacks,
                        "Row mapped"
                    );
                    summary.rows_mapped += 1;
                    summary.fallbacks += report.fallbacks;
                    summary.convictions += usize::from(report.conviction);
                }
                Err(e) => match self.policy {
                    InvalidRowPolicy::Skip => {
                        warn!(name: "row.skipped", row = summary.rows_read, error = %e, "Skipping row");
                        summary.rows_skipped += 1;
                    }
                    InvalidRowPolicy::Fail => return Err(e),
                },
            }
        }

        summary.triples = graph.len();
        info!(
            name: "graph.built",
            rows = summary.rows_read,
            mapped = summary.rows_mapped,
            skipped = summary.rows_skipped,
            fallbacks = summary.fallbacks,
            triples = summary.triples,
            "Graph built"
        );
        Ok((graph, summary))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::tests::StubService;
    use crate::graph::vocab::{DUL, FOAF, SCHEMA, WD};
    use crate::annotation::{Annotation, FallbackReason};
    use oxrdf::{NamedOrBlankNodeRef, TermRef, TripleRef};
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn probe_a() -> InvestigationRow {
        InvestigationRow {
            investigation: "Probe A".to_string(),
            investigation_start: date(2018, 1, 1),
            investigation_end: date(2018, 6, 1),
            investigation_days: Some(151),
            name: "Jane Doe".to_string(),
            indictment_days: Some(30),
            result: Some("guilty plea".to_string()),
            cp_date: date(2018, 7, 1),
            cp_days: Some(20),
            overturned: false,
            pardoned: true,
            american: true,
            president: Some("John Smith".to_string()),
        }
    }

    fn offline_builder() -> GraphBuilder {
        GraphBuilder::new(EntityAnnotator::offline())
    }

    /// Blank-node objects of `sem:hasSubEvent` for `investigation`.
    fn sub_events(graph: &InvestigationGraph, investigation: &NamedNode) -> Vec<oxrdf::BlankNode> {
        let has_sub_event = SEM.term("hasSubEvent");
        graph
            .iter()
            .filter(|t| {
                t.subject == NamedOrBlankNodeRef::NamedNode(investigation.as_ref())
                    && t.predicate == has_sub_event.as_ref()
            })
            .filter_map(|t| match t.object {
                TermRef::BlankNode(b) => Some(b.into_owned()),
                _ => None,
            })
            .collect()
    }

    fn event_types(graph: &InvestigationGraph, event: &oxrdf::BlankNode) -> Vec<String> {
        let event_type = SEM.term("eventType");
        graph
            .iter()
            .filter(|t| {
                t.subject == NamedOrBlankNodeRef::BlankNode(event.as_ref())
                    && t.predicate == event_type.as_ref()
            })
            .filter_map(|t| match t.object {
                TermRef::NamedNode(n) => Some(n.as_str().to_string()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_probe_a_scenario() {
        let mut graph = InvestigationGraph::new();
        let report = offline_builder().add_row(&probe_a(), &mut graph).await.unwrap();

        let jane = EX.term("Jane_Doe");
        let john = EX.term("John_Smith");
        let probe = EX.term("Probe_A");
        let actor_type = SEM.term("hasActorType");

        assert!(graph.contains(TripleRef::new(&jane, rdf::TYPE, &SEM.term("Actor"))));
        assert!(graph.contains(TripleRef::new(&jane, &actor_type, &DBR.term("Suspect"))));
        assert!(graph.contains(TripleRef::new(&jane, &actor_type, &EX.term("American"))));
        assert!(graph.contains(TripleRef::new(&jane, &EX.term("actorIn"), &probe)));
        assert!(graph.contains(TripleRef::new(&jane, rdf::TYPE, &DBR.term("Person"))));

        assert!(graph.contains(TripleRef::new(&john, rdf::TYPE, &SEM.term("Actor"))));
        assert!(graph.contains(TripleRef::new(&john, &actor_type, &DBR.term("President"))));
        assert!(!graph.contains(TripleRef::new(&john, &actor_type, &EX.term("American"))));

        assert!(graph.contains(TripleRef::new(&probe, rdf::TYPE, &SEM.term("Event"))));
        assert!(graph.contains(TripleRef::new(
            &probe,
            rdf::TYPE,
            &DBR.term("Criminal_Investigation")
        )));
        assert!(graph.contains(TripleRef::new(
            &probe,
            rdfs::LABEL,
            &Literal::new_simple_literal("Probe A")
        )));
        assert!(graph.contains(TripleRef::new(
            &probe,
            &SEM.term("hasBeginTimeStamp"),
            &date_literal(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap())
        )));
        assert!(graph.contains(TripleRef::new(
            &probe,
            &SEM.term("hasEndTimeStamp"),
            &date_literal(NaiveDate::from_ymd_opt(2018, 6, 1).unwrap())
        )));
        assert!(graph.contains(TripleRef::new(&probe, &TL.term("durationInt"), &int_literal(151))));
        assert!(graph.contains(TripleRef::new(&probe, &SEM.term("hasActor"), &jane)));
        assert!(graph.contains(TripleRef::new(&probe, &SEM.term("hasActor"), &john)));

        let events = sub_events(&graph, &probe);
        assert_eq!(events.len(), 1);
        let types = event_types(&graph, &events[0]);
        assert!(types.contains(&"http://example.org/guilty_plea".to_string()));
        assert!(types.contains(&"http://example.org/Pardoned".to_string()));
        assert!(!types.contains(&"http://example.org/Overturned".to_string()));

        let conviction = NamedOrBlankNodeRef::BlankNode(events[0].as_ref());
        assert!(graph.contains(TripleRef::new(conviction, rdf::TYPE, &SEM.term("Event"))));
        assert!(graph.contains(TripleRef::new(
            conviction,
            &EX.term("indictmentDays"),
            &int_literal(30)
        )));
        assert!(graph.contains(TripleRef::new(
            conviction,
            &SEM.term("hasTime"),
            &date_literal(NaiveDate::from_ymd_opt(2018, 7, 1).unwrap())
        )));
        assert!(graph.contains(TripleRef::new(conviction, &TL.term("durationInt"), &int_literal(20))));
        assert!(graph.contains(TripleRef::new(conviction, &SEM.term("hasActor"), &jane)));

        assert_eq!(report.fallbacks, 2);
        assert!(report.conviction);
        assert_eq!(report.triples_added, graph.len());
    }

    #[tokio::test]
    async fn test_indictment_and_missing_result_emit_no_sub_event() {
        for result in [Some("indictment".to_string()), Some("Indictment".to_string()), None] {
            let mut row = probe_a();
            row.result = result;
            let mut graph = InvestigationGraph::new();
            let report = offline_builder().add_row(&row, &mut graph).await.unwrap();

            assert!(!report.conviction);
            assert!(sub_events(&graph, &EX.term("Probe_A")).is_empty());
            assert!(!graph.iter().any(|t| t.predicate == SEM.term("eventType").as_ref()));
        }
    }

    #[tokio::test]
    async fn test_flags_control_markers() {
        let mut row = probe_a();
        row.overturned = true;
        row.pardoned = false;
        row.american = false;
        let mut graph = InvestigationGraph::new();
        offline_builder().add_row(&row, &mut graph).await.unwrap();

        let events = sub_events(&graph, &EX.term("Probe_A"));
        let types = event_types(&graph, &events[0]);
        assert!(types.contains(&"http://example.org/Overturned".to_string()));
        assert!(!types.contains(&"http://example.org/Pardoned".to_string()));
        assert!(!graph.contains(TripleRef::new(
            &EX.term("Jane_Doe"),
            &SEM.term("hasActorType"),
            &EX.term("American")
        )));
    }

    #[tokio::test]
    async fn test_missing_optional_fields_emit_nothing() {
        let row = InvestigationRow {
            investigation: "Probe B".to_string(),
            investigation_start: None,
            investigation_end: None,
            investigation_days: None,
            name: "Jane Doe".to_string(),
            indictment_days: None,
            result: Some("conviction".to_string()),
            cp_date: None,
            cp_days: None,
            overturned: false,
            pardoned: false,
            american: false,
            president: None,
        };
        let mut graph = InvestigationGraph::new();
        offline_builder().add_row(&row, &mut graph).await.unwrap();

        let probe = EX.term("Probe_B");
        for predicate in ["hasBeginTimeStamp", "hasEndTimeStamp", "hasTime"] {
            let predicate = SEM.term(predicate);
            assert!(!graph.iter().any(|t| t.predicate == predicate.as_ref()));
        }
        assert!(!graph.iter().any(|t| t.predicate == TL.term("durationInt").as_ref()));
        assert!(!graph.iter().any(|t| t.predicate == EX.term("indictmentDays").as_ref()));
        let president = DBR.term("President");
        assert!(!graph.iter().any(|t| t.object == TermRef::NamedNode(president.as_ref())));

        // Sub-event is still emitted with its type and actor.
        let events = sub_events(&graph, &probe);
        assert_eq!(events.len(), 1);
        assert_eq!(
            event_types(&graph, &events[0]),
            vec!["http://example.org/conviction".to_string()]
        );
    }

    #[tokio::test]
    async fn test_resolved_entities_and_projected_types() {
        let service = StubService::default()
            .with(
                "Jane Doe",
                "http://dbpedia.org/resource/Jane_Doe",
                "Http://xmlns.com/foaf/0.1/Person,Wikidata:Q5,DBpedia:Person,OpenCyc:Thing",
            )
            .with(
                "John Smith",
                "http://dbpedia.org/resource/John_Smith",
                "Schema:Person,DUL:NaturalPerson",
            );
        let builder = GraphBuilder::new(EntityAnnotator::new(Arc::new(service)));
        let mut graph = InvestigationGraph::new();
        let report = builder.add_row(&probe_a(), &mut graph).await.unwrap();

        let jane = DBR.term("Jane_Doe");
        let john = DBR.term("John_Smith");
        assert_eq!(report.fallbacks, 0);
        assert!(graph.contains(TripleRef::new(&jane, rdf::TYPE, &FOAF.term("Person"))));
        assert!(graph.contains(TripleRef::new(&jane, rdf::TYPE, &WD.term("Q5"))));
        assert!(graph.contains(TripleRef::new(&jane, rdf::TYPE, &DBR.term("Person"))));
        assert!(graph.contains(TripleRef::new(&john, rdf::TYPE, &SCHEMA.term("Person"))));
        assert!(graph.contains(TripleRef::new(
            &john,
            rdf::TYPE,
            &DUL.term("NaturalPerson")
        )));
        // Actor, one per recognized token: 1 + 3 for Jane, 1 + 2 for John.
        let typed = |s: &NamedNode| {
            graph
                .iter()
                .filter(|t| {
                    t.subject == NamedOrBlankNodeRef::NamedNode(s.as_ref()) && t.predicate == rdf::TYPE
                })
                .count()
        };
        assert_eq!(typed(&jane), 4);
        assert_eq!(typed(&john), 3);
    }

    #[tokio::test]
    async fn test_same_name_maps_to_same_uri() {
        let mut first = probe_a();
        first.investigation = "Probe A".to_string();
        let mut second = probe_a();
        second.investigation = "Probe B".to_string();

        let mut graph = InvestigationGraph::new();
        let builder = offline_builder();
        builder.add_row(&first, &mut graph).await.unwrap();
        builder.add_row(&second, &mut graph).await.unwrap();

        let john = EX.term("John_Smith");
        let president = DBR.term("President");
        let president_statements = graph
            .iter()
            .filter(|t| {
                t.subject == NamedOrBlankNodeRef::NamedNode(john.as_ref())
                    && t.object == TermRef::NamedNode(president.as_ref())
            })
            .count();
        assert_eq!(president_statements, 1);
        assert_eq!(sub_events(&graph, &EX.term("Probe_B")).len(), 1);
    }

    #[tokio::test]
    async fn test_build_skips_invalid_rows() {
        let rows = vec![
            Ok(probe_a()),
            Err(DatasetError::InvalidRow {
                line: 3,
                message: "missing investigatee name".to_string(),
            }),
            Ok(InvestigationRow {
                investigation: "Probe C".to_string(),
                result: Some("indictment".to_string()),
                ..probe_a()
            }),
        ];
        let builder = offline_builder().with_concurrency(4);
        let (graph, summary) = builder.build(rows).await.unwrap();

        assert_eq!(summary.rows_read, 3);
        assert_eq!(summary.rows_mapped, 2);
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.convictions, 1);
        assert_eq!(summary.fallbacks, 4);
        assert_eq!(summary.triples, graph.len());
    }

    #[tokio::test]
    async fn test_build_fails_under_fail_policy() {
        let rows = vec![
            Ok(probe_a()),
            Err(DatasetError::Decode {
                line: 3,
                message: "invalid date".to_string(),
            }),
        ];
        let builder = offline_builder().with_policy(InvalidRowPolicy::Fail);
        let err = builder.build(rows).await.unwrap_err();
        assert!(matches!(err, PipelineError::Dataset(DatasetError::Decode { line: 3, .. })));
    }

    #[tokio::test]
    async fn test_invalid_fallback_iri_is_row_error() {
        let resolved = ResolvedRow {
            row: probe_a(),
            investigatee: AnnotationOutcome::Fallback {
                annotation: Annotation {
                    uri: "not an iri".to_string(),
                    types: TypeFilter::PERSON.to_string(),
                    surface_form: None,
                    similarity_score: None,
                },
                reason: FallbackReason::EmptyInput,
            },
            president: None,
        };
        let mut graph = InvestigationGraph::new();
        assert!(emit_row(&mut graph, &resolved).is_err());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("skip".parse::<InvalidRowPolicy>(), Ok(InvalidRowPolicy::Skip));
        assert_eq!("FAIL".parse::<InvalidRowPolicy>(), Ok(InvalidRowPolicy::Fail));
        assert!("retry".parse::<InvalidRowPolicy>().is_err());
    }
}
