// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Fact Graph Model
//!
//! Value types for the shared fact graph: [`Term`]s, [`Triple`]s, the
//! parameterised [`Query`] builder and the atomic [`GuardedUpdate`].
//!
//! Queries are assembled from typed values, never from interpolated strings,
//! so a predicate or filter value can not change the shape of a query.
//!
//! | Building block | Semantics |
//! |----------------|-----------|
//! | [`Group::triple`] | conjunctive pattern, joins on shared variables |
//! | [`Group::optional`] | left join, keeps the solution when the block has no match |
//! | [`Group::not_exists`] / [`Group::exists`] | negation / existence test, binds nothing |
//! | [`Group::union`] | concatenation of alternative blocks |
//! | [`Group::filter`] | [`Filter`] over bound values |
//! | [`Query::group_by`] + [`Aggregate`] | `count` and separator-`concat` per group |
//! | [`Query::order_by`] | ordering on any output column, aggregates included |
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Store-agnostic query and update algebra

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Terms and triples
// ============================================================================

/// An RDF-style term. Nodes are ids and vocabulary IRIs; the rest are literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Term {
    Node(String),
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl Term {
    pub fn node(value: impl Into<String>) -> Self {
        Self::Node(value.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// String view of node and text terms.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Node(v) | Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Lexical form, used by `concat` aggregates.
    pub fn lexical(&self) -> String {
        match self {
            Self::Node(v) | Self::Text(v) => v.clone(),
            Self::Integer(v) => v.to_string(),
            Self::Timestamp(v) => v.to_rfc3339(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(v) => write!(f, "<{}>", v),
            Self::Text(v) => write!(f, "{:?}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

/// A single fact. The store holds a *set* of triples, so re-adding an
/// identical fact is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

// ============================================================================
// Query algebra
// ============================================================================

/// A position in a triple pattern: a variable or a fixed term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Var(String),
    Value(Term),
}

/// Shorthand for a variable slot.
pub fn var(name: &str) -> Slot {
    Slot::Var(name.to_string())
}

impl From<Term> for Slot {
    fn from(term: Term) -> Self {
        Slot::Value(term)
    }
}

/// Bare strings are node terms (ids, predicates, classes).
impl From<&str> for Slot {
    fn from(node: &str) -> Self {
        Slot::Value(Term::node(node))
    }
}

impl From<String> for Slot {
    fn from(node: String) -> Self {
        Slot::Value(Term::Node(node))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: Slot,
    pub predicate: Slot,
    pub object: Slot,
}

/// Filter over bound variables. A filter on an unbound variable is false,
/// except [`Filter::Unbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, Term),
    In(String, Vec<Term>),
    Gt(String, Term),
    Bound(String),
    Unbound(String),
}

impl Filter {
    pub fn eq(var: &str, value: Term) -> Self {
        Self::Eq(var.to_string(), value)
    }

    pub fn is_in(var: &str, values: impl IntoIterator<Item = Term>) -> Self {
        Self::In(var.to_string(), values.into_iter().collect())
    }

    pub fn gt(var: &str, value: Term) -> Self {
        Self::Gt(var.to_string(), value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Triple(TriplePattern),
    Optional(Group),
    NotExists(Group),
    Exists(Group),
    Union(Vec<Group>),
    Filter(Filter),
}

/// An ordered block of pattern elements, evaluated left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub elements: Vec<Element>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triple(
        mut self,
        subject: impl Into<Slot>,
        predicate: impl Into<Slot>,
        object: impl Into<Slot>,
    ) -> Self {
        self.elements.push(Element::Triple(TriplePattern {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }));
        self
    }

    pub fn optional(mut self, group: Group) -> Self {
        self.elements.push(Element::Optional(group));
        self
    }

    pub fn not_exists(mut self, group: Group) -> Self {
        self.elements.push(Element::NotExists(group));
        self
    }

    pub fn exists(mut self, group: Group) -> Self {
        self.elements.push(Element::Exists(group));
        self
    }

    pub fn union(mut self, branches: Vec<Group>) -> Self {
        self.elements.push(Element::Union(branches));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.elements.push(Element::Filter(filter));
        self
    }

    /// Append elements only when `cond` holds; keeps builder chains flat.
    pub fn when(self, cond: bool, f: impl FnOnce(Group) -> Group) -> Self {
        if cond {
            f(self)
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// Number of solutions in the group (or of bound values of `var`).
    Count { var: Option<String>, alias: String },
    /// Distinct bound values of `var`, sorted, joined with `separator`.
    Concat {
        var: String,
        separator: String,
        alias: String,
    },
}

impl Aggregate {
    pub fn count(alias: &str) -> Self {
        Self::Count {
            var: None,
            alias: alias.to_string(),
        }
    }

    pub fn concat(var: &str, separator: &str, alias: &str) -> Self {
        Self::Concat {
            var: var.to_string(),
            separator: separator.to_string(),
            alias: alias.to_string(),
        }
    }

    pub fn alias(&self) -> &str {
        match self {
            Self::Count { alias, .. } | Self::Concat { alias, .. } => alias,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub var: String,
    pub direction: Direction,
}

/// A read-only pattern query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub pattern: Group,
    pub group_by: Vec<String>,
    pub aggregates: Vec<Aggregate>,
    pub order_by: Vec<OrderKey>,
    pub distinct: bool,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(pattern: Group) -> Self {
        Self {
            pattern,
            ..Self::default()
        }
    }

    pub fn group_by(mut self, vars: &[&str]) -> Self {
        self.group_by = vars.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    pub fn order_by(mut self, var: &str, direction: Direction) -> Self {
        self.order_by.push(OrderKey {
            var: var.to_string(),
            direction,
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One solution of a query: variable (or aggregate alias) to term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Row(pub BTreeMap<String, Term>);

impl Row {
    pub fn get(&self, var: &str) -> Option<&Term> {
        self.0.get(var)
    }

    pub fn str(&self, var: &str) -> Option<&str> {
        self.get(var).and_then(Term::as_str)
    }

    pub fn integer(&self, var: &str) -> Option<i64> {
        self.get(var).and_then(Term::as_integer)
    }

    pub fn timestamp(&self, var: &str) -> Option<DateTime<Utc>> {
        self.get(var).and_then(Term::as_timestamp)
    }

    /// Split a `concat` aggregate back into its parts.
    pub fn list(&self, var: &str, separator: &str) -> Vec<String> {
        match self.str(var) {
            Some(s) if !s.is_empty() => s.split(separator).map(str::to_string).collect(),
            _ => Vec::new(),
        }
    }
}

/// Predicate/object pairs of one subject, built from `?p ?o` rows.
#[derive(Debug, Clone, Default)]
pub struct Facts {
    values: BTreeMap<String, Vec<Term>>,
}

impl Facts {
    pub fn from_rows(rows: &[Row], predicate_var: &str, object_var: &str) -> Self {
        let mut values: BTreeMap<String, Vec<Term>> = BTreeMap::new();
        for row in rows {
            if let (Some(p), Some(o)) = (row.str(predicate_var), row.get(object_var)) {
                values.entry(p.to_string()).or_default().push(o.clone());
            }
        }
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn one(&self, predicate: &str) -> Option<&Term> {
        self.values.get(predicate).and_then(|v| v.first())
    }

    pub fn all(&self, predicate: &str) -> &[Term] {
        self.values.get(predicate).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn str(&self, predicate: &str) -> Option<&str> {
        self.one(predicate).and_then(Term::as_str)
    }

    pub fn timestamp(&self, predicate: &str) -> Option<DateTime<Utc>> {
        self.one(predicate).and_then(Term::as_timestamp)
    }

    pub fn has(&self, predicate: &str, object: &Term) -> bool {
        self.all(predicate).contains(object)
    }
}

// ============================================================================
// Guarded updates (store-native compare-and-swap)
// ============================================================================

/// Precondition checked atomically with the writes of a [`GuardedUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The exact fact is present.
    Holds(Triple),
    /// The subject has no value for the predicate.
    Absent { subject: String, predicate: String },
}

impl Guard {
    pub fn holds(subject: &str, predicate: &str, object: Term) -> Self {
        Self::Holds(Triple::new(subject, predicate, object))
    }

    pub fn absent(subject: &str, predicate: &str) -> Self {
        Self::Absent {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
        }
    }
}

/// Removal of one value (`object = Some`) or all values of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub subject: String,
    pub predicate: String,
    pub object: Option<Term>,
}

/// All guards are checked and, if every one passes, all removals then all
/// additions are applied as one indivisible step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardedUpdate {
    pub guards: Vec<Guard>,
    pub removals: Vec<Removal>,
    pub additions: Vec<Triple>,
}

impl GuardedUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn remove(mut self, subject: &str, predicate: &str, object: Option<Term>) -> Self {
        self.removals.push(Removal {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object,
        });
        self
    }

    pub fn add(mut self, subject: &str, predicate: &str, object: Term) -> Self {
        self.additions.push(Triple::new(subject, predicate, object));
        self
    }

    /// Replace every value of a single-valued predicate.
    pub fn replace(self, subject: &str, predicate: &str, object: Term) -> Self {
        self.remove(subject, predicate, None).add(subject, predicate, object)
    }
}
