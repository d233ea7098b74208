// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-Memory Graph Store
//!
//! Set-semantics triple store implementing [`GraphStore`] for tests and the
//! single-node daemon. Triples are indexed twice (subject→predicate→objects
//! and predicate→object→subjects) so the common access paths of the
//! registries never scan the whole graph.
//!
//! Every write, including the guard check of [`GuardedUpdate`], happens under
//! one exclusive lock, which makes `apply` a true compare-and-swap with respect
//! to every other caller in the process.
//!
//! # Query evaluation
//!
//! Pattern groups are evaluated left to right over a list of partial
//! solutions (variable bindings). Aggregation, `distinct`, ordering and
//! `limit` are applied afterwards, in that order.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::domain::graph::{
    Aggregate, Direction, Element, Filter, Group, Guard, GuardedUpdate, Query, Row, Slot, Term,
    Triple, TriplePattern,
};
use crate::domain::repository::{GraphStore, StoreError};

type Bindings = BTreeMap<String, Term>;

#[derive(Default)]
struct Graph {
    spo: BTreeMap<String, BTreeMap<String, BTreeSet<Term>>>,
    pos: BTreeMap<String, BTreeMap<Term, BTreeSet<String>>>,
    len: usize,
}

impl Graph {
    fn insert(&mut self, triple: Triple) -> bool {
        let Triple {
            subject,
            predicate,
            object,
        } = triple;
        let inserted = self
            .spo
            .entry(subject.clone())
            .or_default()
            .entry(predicate.clone())
            .or_default()
            .insert(object.clone());
        if inserted {
            self.pos
                .entry(predicate)
                .or_default()
                .entry(object)
                .or_default()
                .insert(subject);
            self.len += 1;
        }
        inserted
    }

    fn contains(&self, triple: &Triple) -> bool {
        self.spo
            .get(&triple.subject)
            .and_then(|preds| preds.get(&triple.predicate))
            .is_some_and(|objects| objects.contains(&triple.object))
    }

    fn has_any(&self, subject: &str, predicate: &str) -> bool {
        self.spo
            .get(subject)
            .and_then(|preds| preds.get(predicate))
            .is_some_and(|objects| !objects.is_empty())
    }

    fn remove(&mut self, subject: &str, predicate: &str, object: Option<&Term>) -> usize {
        let Some(preds) = self.spo.get_mut(subject) else {
            return 0;
        };
        let removed: Vec<Term> = match object {
            Some(object) => match preds.get_mut(predicate) {
                Some(objects) => {
                    if objects.remove(object) {
                        if objects.is_empty() {
                            preds.remove(predicate);
                        }
                        vec![object.clone()]
                    } else {
                        Vec::new()
                    }
                }
                None => Vec::new(),
            },
            None => preds
                .remove(predicate)
                .map(|objects| objects.into_iter().collect())
                .unwrap_or_default(),
        };
        if preds.is_empty() {
            self.spo.remove(subject);
        }

        if let Some(by_object) = self.pos.get_mut(predicate) {
            for object in &removed {
                if let Some(subjects) = by_object.get_mut(object) {
                    subjects.remove(subject);
                    if subjects.is_empty() {
                        by_object.remove(object);
                    }
                }
            }
            if by_object.is_empty() {
                self.pos.remove(predicate);
            }
        }

        self.len -= removed.len();
        removed.len()
    }

    /// Triples matching the fixed positions of a pattern.
    fn scan<'g>(
        &'g self,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&Term>,
    ) -> Vec<(&'g str, &'g str, &'g Term)> {
        let mut out = Vec::new();
        match (subject, predicate) {
            (Some(s), _) => {
                let Some((s, preds)) = self.spo.get_key_value(s) else {
                    return out;
                };
                for (p, objects) in preds {
                    if predicate.is_some_and(|want| want != p.as_str()) {
                        continue;
                    }
                    match object {
                        Some(o) => {
                            if let Some(o) = objects.get(o) {
                                out.push((s.as_str(), p.as_str(), o));
                            }
                        }
                        None => out.extend(objects.iter().map(|o| (s.as_str(), p.as_str(), o))),
                    }
                }
            }
            (None, Some(p)) => {
                let Some((p, by_object)) = self.pos.get_key_value(p) else {
                    return out;
                };
                match object {
                    Some(o) => {
                        if let Some((o, subjects)) = by_object.get_key_value(o) {
                            out.extend(subjects.iter().map(|s| (s.as_str(), p.as_str(), o)));
                        }
                    }
                    None => {
                        for (o, subjects) in by_object {
                            out.extend(subjects.iter().map(|s| (s.as_str(), p.as_str(), o)));
                        }
                    }
                }
            }
            (None, None) => {
                for (s, preds) in &self.spo {
                    for (p, objects) in preds {
                        for o in objects {
                            if object.map_or(true, |want| want == o) {
                                out.push((s.as_str(), p.as_str(), o));
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

/// A pattern position after substituting the current solution.
enum Resolved<'q> {
    Fixed(Term),
    Free(&'q str),
}

impl<'q> Resolved<'q> {
    fn of(slot: &'q Slot, solution: &Bindings) -> Self {
        match slot {
            Slot::Var(name) => match solution.get(name) {
                Some(term) => Self::Fixed(term.clone()),
                None => Self::Free(name),
            },
            Slot::Value(term) => Self::Fixed(term.clone()),
        }
    }

    /// Subjects and predicates are nodes; any other fixed term can not match.
    fn node(&self) -> Result<Option<&str>, ()> {
        match self {
            Self::Fixed(Term::Node(id)) => Ok(Some(id)),
            Self::Fixed(_) => Err(()),
            Self::Free(_) => Ok(None),
        }
    }

    fn term(&self) -> Option<&Term> {
        match self {
            Self::Fixed(term) => Some(term),
            Self::Free(_) => None,
        }
    }

    fn bind(&self, solution: &mut Bindings, value: Term) -> bool {
        match self {
            Self::Fixed(_) => true,
            Self::Free(name) => match solution.get(*name) {
                // same variable twice in one pattern
                Some(existing) => existing == &value,
                None => {
                    solution.insert(name.to_string(), value);
                    true
                }
            },
        }
    }
}

fn filter_holds(filter: &Filter, solution: &Bindings) -> bool {
    match filter {
        Filter::Eq(var, value) => solution.get(var) == Some(value),
        Filter::In(var, values) => solution.get(var).is_some_and(|t| values.contains(t)),
        Filter::Gt(var, value) => solution
            .get(var)
            .and_then(|t| compare_same_kind(t, value))
            .is_some_and(|ord| ord == Ordering::Greater),
        Filter::Bound(var) => solution.contains_key(var),
        Filter::Unbound(var) => !solution.contains_key(var),
    }
}

fn compare_same_kind(left: &Term, right: &Term) -> Option<Ordering> {
    match (left, right) {
        (Term::Integer(a), Term::Integer(b)) => Some(a.cmp(b)),
        (Term::Timestamp(a), Term::Timestamp(b)) => Some(a.cmp(b)),
        (Term::Text(a), Term::Text(b)) | (Term::Node(a), Term::Node(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl Graph {
    fn eval_group(&self, group: &Group, input: Vec<Bindings>) -> Result<Vec<Bindings>, StoreError> {
        let mut solutions = input;
        for element in &group.elements {
            if solutions.is_empty() {
                break;
            }
            solutions = match element {
                Element::Triple(pattern) => solutions
                    .iter()
                    .flat_map(|s| self.match_pattern(pattern, s))
                    .collect(),
                Element::Optional(inner) => {
                    let mut out = Vec::with_capacity(solutions.len());
                    for solution in solutions {
                        let extended = self.eval_group(inner, vec![solution.clone()])?;
                        if extended.is_empty() {
                            out.push(solution);
                        } else {
                            out.extend(extended);
                        }
                    }
                    out
                }
                Element::NotExists(inner) => {
                    let mut out = Vec::with_capacity(solutions.len());
                    for solution in solutions {
                        if self.eval_group(inner, vec![solution.clone()])?.is_empty() {
                            out.push(solution);
                        }
                    }
                    out
                }
                Element::Exists(inner) => {
                    let mut out = Vec::with_capacity(solutions.len());
                    for solution in solutions {
                        if !self.eval_group(inner, vec![solution.clone()])?.is_empty() {
                            out.push(solution);
                        }
                    }
                    out
                }
                Element::Union(branches) => {
                    if branches.is_empty() {
                        return Err(StoreError::InvalidQuery("union without branches".into()));
                    }
                    let mut out = Vec::new();
                    for solution in &solutions {
                        for branch in branches {
                            out.extend(self.eval_group(branch, vec![solution.clone()])?);
                        }
                    }
                    out
                }
                Element::Filter(filter) => solutions
                    .into_iter()
                    .filter(|s| filter_holds(filter, s))
                    .collect(),
            };
        }
        Ok(solutions)
    }

    fn match_pattern(&self, pattern: &TriplePattern, solution: &Bindings) -> Vec<Bindings> {
        let subject = Resolved::of(&pattern.subject, solution);
        let predicate = Resolved::of(&pattern.predicate, solution);
        let object = Resolved::of(&pattern.object, solution);

        let (Ok(s), Ok(p)) = (subject.node(), predicate.node()) else {
            return Vec::new();
        };

        self.scan(s, p, object.term())
            .into_iter()
            .filter_map(|(s, p, o)| {
                let mut next = solution.clone();
                let ok = subject.bind(&mut next, Term::node(s))
                    && predicate.bind(&mut next, Term::node(p))
                    && object.bind(&mut next, o.clone());
                ok.then_some(next)
            })
            .collect()
    }

    fn evaluate(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        validate(query)?;
        let solutions = self.eval_group(&query.pattern, vec![Bindings::new()])?;

        let mut rows: Vec<Row> = if query.group_by.is_empty() && query.aggregates.is_empty() {
            solutions.into_iter().map(Row).collect()
        } else {
            aggregate(query, solutions)
        };

        if query.distinct {
            let mut seen = BTreeSet::new();
            rows.retain(|row| seen.insert(row.clone()));
        }

        if !query.order_by.is_empty() {
            rows.sort_by(|a, b| {
                for key in &query.order_by {
                    // unbound sorts first
                    let ord = a.get(&key.var).cmp(&b.get(&key.var));
                    let ord = match key.direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}

fn validate(query: &Query) -> Result<(), StoreError> {
    for aggregate in &query.aggregates {
        if query.group_by.iter().any(|v| v == aggregate.alias()) {
            return Err(StoreError::InvalidQuery(format!(
                "aggregate alias '{}' shadows a group key",
                aggregate.alias()
            )));
        }
    }
    Ok(())
}

fn aggregate(query: &Query, solutions: Vec<Bindings>) -> Vec<Row> {
    let mut groups: BTreeMap<Vec<Option<Term>>, Vec<Bindings>> = BTreeMap::new();
    for solution in solutions {
        let key = query
            .group_by
            .iter()
            .map(|v| solution.get(v).cloned())
            .collect();
        groups.entry(key).or_default().push(solution);
    }
    // An ungrouped aggregate over no solutions still yields one row.
    if groups.is_empty() && query.group_by.is_empty() {
        groups.insert(Vec::new(), Vec::new());
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut row = Bindings::new();
            for (var, value) in query.group_by.iter().zip(key) {
                if let Some(value) = value {
                    row.insert(var.clone(), value);
                }
            }
            for aggregate in &query.aggregates {
                let value = match aggregate {
                    Aggregate::Count { var: None, .. } => Term::Integer(members.len() as i64),
                    Aggregate::Count { var: Some(v), .. } => {
                        Term::Integer(members.iter().filter(|m| m.contains_key(v)).count() as i64)
                    }
                    Aggregate::Concat { var, separator, .. } => {
                        let values: BTreeSet<String> = members
                            .iter()
                            .filter_map(|m| m.get(var))
                            .map(Term::lexical)
                            .collect();
                        Term::Text(values.into_iter().collect::<Vec<_>>().join(separator))
                    }
                };
                row.insert(aggregate.alias().to_string(), value);
            }
            Row(row)
        })
        .collect()
}

/// In-memory [`GraphStore`] backed by two B-tree indexes.
#[derive(Clone)]
pub struct InMemoryGraphStore {
    graph: Arc<RwLock<Graph>>,
    available: Arc<AtomicBool>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            graph: Arc::new(RwLock::new(Graph::default())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Number of facts currently stored.
    pub fn len(&self) -> usize {
        self.graph.read().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Simulate an outage: while unavailable every operation fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "in-memory graph store is offline".to_string(),
            ))
        }
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn add(&self, triple: Triple) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.graph.write().insert(triple);
        Ok(())
    }

    async fn add_all(&self, triples: Vec<Triple>) -> Result<(), StoreError> {
        self.ensure_available()?;
        let count = triples.len();
        let mut graph = self.graph.write();
        for triple in triples {
            graph.insert(triple);
        }
        trace!(count, "Inserted triple batch");
        Ok(())
    }

    async fn remove(
        &self,
        subject: &str,
        predicate: &str,
        object: Option<&Term>,
    ) -> Result<usize, StoreError> {
        self.ensure_available()?;
        Ok(self.graph.write().remove(subject, predicate, object))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.ensure_available()?;
        self.graph.read().evaluate(query)
    }

    async fn apply(&self, update: GuardedUpdate) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut graph = self.graph.write();

        let passed = update.guards.iter().all(|guard| match guard {
            Guard::Holds(triple) => graph.contains(triple),
            Guard::Absent { subject, predicate } => !graph.has_any(subject, predicate),
        });
        if !passed {
            debug!(guards = update.guards.len(), "Guarded update rejected");
            return Ok(false);
        }

        for removal in &update.removals {
            graph.remove(&removal.subject, &removal.predicate, removal.object.as_ref());
        }
        for triple in update.additions {
            graph.insert(triple);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{var, Filter};
    use chrono::{Duration, Utc};

    const TYPE: &str = "t:type";
    const NAME: &str = "t:name";
    const SKILL: &str = "t:skill";
    const STATUS: &str = "t:status";

    async fn seeded() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        store
            .add_all(vec![
                Triple::new("a:1", TYPE, Term::node("Agent")),
                Triple::new("a:1", NAME, Term::text("ada")),
                Triple::new("a:1", SKILL, Term::text("nlp")),
                Triple::new("a:1", SKILL, Term::text("search")),
                Triple::new("a:1", STATUS, Term::text("active")),
                Triple::new("a:2", TYPE, Term::node("Agent")),
                Triple::new("a:2", NAME, Term::text("bob")),
                Triple::new("a:2", SKILL, Term::text("vision")),
                Triple::new("a:2", STATUS, Term::text("inactive")),
                Triple::new("a:3", TYPE, Term::node("Agent")),
                Triple::new("a:3", NAME, Term::text("cy")),
                Triple::new("a:3", STATUS, Term::text("active")),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_set_semantics() {
        let store = InMemoryGraphStore::new();
        let t = Triple::new("s", "p", Term::Integer(1));
        store.add(t.clone()).await.unwrap();
        store.add(t).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_join_and_filter() {
        let store = seeded().await;
        let q = Query::new(
            Group::new()
                .triple(var("a"), TYPE, Term::node("Agent"))
                .triple(var("a"), STATUS, Term::text("active"))
                .triple(var("a"), SKILL, var("skill"))
                .filter(Filter::is_in("skill", [Term::text("nlp"), Term::text("vision")])),
        );
        let rows = store.query(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].str("a"), Some("a:1"));
    }

    #[tokio::test]
    async fn test_optional_keeps_unmatched_solutions() {
        let store = seeded().await;
        let q = Query::new(
            Group::new()
                .triple(var("a"), TYPE, Term::node("Agent"))
                .optional(Group::new().triple(var("a"), SKILL, var("skill"))),
        )
        .order_by("a", Direction::Asc);
        let rows = store.query(&q).await.unwrap();
        // a:1 twice, a:2 once, a:3 once without a skill
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].str("a"), Some("a:3"));
        assert!(rows[3].get("skill").is_none());
    }

    #[tokio::test]
    async fn test_not_exists_and_union() {
        let store = seeded().await;
        let without_skill = Query::new(
            Group::new()
                .triple(var("a"), TYPE, Term::node("Agent"))
                .not_exists(Group::new().triple(var("a"), SKILL, var("any"))),
        );
        let rows = store.query(&without_skill).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].str("a"), Some("a:3"));

        let either = Query::new(Group::new().triple(var("a"), TYPE, Term::node("Agent")).union(vec![
            Group::new().triple(var("a"), NAME, Term::text("bob")),
            Group::new().not_exists(Group::new().triple(var("a"), SKILL, var("any"))),
        ]))
        .order_by("a", Direction::Asc);
        let rows = store.query(&either).await.unwrap();
        let ids: Vec<_> = rows.iter().filter_map(|r| r.str("a")).collect();
        assert_eq!(ids, vec!["a:2", "a:3"]);
    }

    #[tokio::test]
    async fn test_group_concat_and_count() {
        let store = seeded().await;
        let q = Query::new(
            Group::new()
                .triple(var("a"), TYPE, Term::node("Agent"))
                .optional(Group::new().triple(var("a"), SKILL, var("skill"))),
        )
        .group_by(&["a"])
        .aggregate(Aggregate::concat("skill", ",", "skills"))
        .aggregate(Aggregate::Count {
            var: Some("skill".into()),
            alias: "n".into(),
        })
        .order_by("n", Direction::Desc)
        .limit(2);
        let rows = store.query(&q).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].str("a"), Some("a:1"));
        assert_eq!(rows[0].list("skills", ","), vec!["nlp", "search"]);
        assert_eq!(rows[0].integer("n"), Some(2));
        assert_eq!(rows[1].integer("n"), Some(1));
    }

    #[tokio::test]
    async fn test_ungrouped_count_over_nothing_is_zero() {
        let store = InMemoryGraphStore::new();
        let q = Query::new(Group::new().triple(var("s"), "nope", var("o")))
            .aggregate(Aggregate::count("n"));
        let rows = store.query(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].integer("n"), Some(0));
    }

    #[tokio::test]
    async fn test_gt_filter_on_timestamps() {
        let store = InMemoryGraphStore::new();
        let now = Utc::now();
        store
            .add_all(vec![
                Triple::new("m:old", "ts", Term::Timestamp(now - Duration::minutes(5))),
                Triple::new("m:new", "ts", Term::Timestamp(now + Duration::minutes(5))),
            ])
            .await
            .unwrap();
        let q = Query::new(
            Group::new()
                .triple(var("m"), "ts", var("ts"))
                .filter(Filter::gt("ts", Term::Timestamp(now))),
        );
        let rows = store.query(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].str("m"), Some("m:new"));
    }

    #[tokio::test]
    async fn test_guarded_update_is_all_or_nothing() {
        let store = seeded().await;
        let claim = || {
            GuardedUpdate::new()
                .guard(Guard::holds("a:3", STATUS, Term::text("active")))
                .guard(Guard::absent("a:3", SKILL))
                .replace("a:3", STATUS, Term::text("busy"))
                .add("a:3", SKILL, Term::text("ops"))
        };
        assert!(store.apply(claim()).await.unwrap());
        let before = store.len();
        assert!(!store.apply(claim()).await.unwrap());
        assert_eq!(store.len(), before);

        let q = Query::new(Group::new().triple("a:3", STATUS, var("s")));
        let rows = store.query(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].str("s"), Some("busy"));
    }

    #[tokio::test]
    async fn test_remove_all_values_of_predicate() {
        let store = seeded().await;
        assert_eq!(store.remove("a:1", SKILL, None).await.unwrap(), 2);
        assert_eq!(
            store
                .remove("a:2", SKILL, Some(&Term::text("nope")))
                .await
                .unwrap(),
            0
        );
        let q = Query::new(Group::new().triple(var("a"), SKILL, var("s")));
        assert_eq!(store.query(&q).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        let store = seeded().await;
        store.set_available(false);
        let q = Query::new(Group::new().triple(var("s"), var("p"), var("o")));
        assert!(matches!(
            store.query(&q).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.add(Triple::new("x", "y", Term::Integer(0))).await.is_err());
        store.set_available(true);
        assert_eq!(store.query(&q).await.unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_alias_shadowing_group_key_is_invalid() {
        let store = seeded().await;
        let q = Query::new(Group::new().triple(var("a"), TYPE, var("t")))
            .group_by(&["a"])
            .aggregate(Aggregate::count("a"));
        assert!(matches!(
            store.query(&q).await,
            Err(StoreError::InvalidQuery(_))
        ));
    }
}
