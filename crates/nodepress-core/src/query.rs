//! Query translation for every listing endpoint.
//!
//! [`translate`] turns a loosely-typed, caller-supplied parameter object into
//! a [`Filter`] and a set of [`ReadOptions`]. The same algorithm serves menus,
//! posts, and users; each entity only contributes a static [`FieldTable`]
//! naming its filterable fields, sortable fields, default sort, and minimum
//! page size.
//!
//! Translation never fails. A declared field whose value has the wrong shape
//! is dropped on its own and the rest of the filter still applies; bad sort or
//! paging input falls back to the documented defaults. Numeric strings are
//! accepted wherever a number is expected.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::id::DocId;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: usize = 50;

/// Page size used when the caller's value is missing or out of range.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Highest accepted page number.
pub const MAX_PAGE: usize = 1000;

/// Substring filter values are cut to this many characters.
pub const SUBSTRING_MAX_CHARS: usize = 50;

/// How a declared field's parameter is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Scalar equality.
    Exact,
    /// Case-insensitive "contains", value truncated to [`SUBSTRING_MAX_CHARS`].
    Substring,
    /// Closed interval from a `{from, to}` object.
    Range,
    /// Closed interval of instants from a `{from, to}` object holding RFC 3339
    /// timestamps or `YYYY-MM-DD` dates. The field also sorts
    /// chronologically.
    Timestamp,
    /// Equality on a well-formed [`DocId`].
    Identifier,
}

/// Sort direction, encoded as `1` / `-1` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Parse `1` / `-1`, as a number or a numeric string.
    #[must_use]
    pub fn from_param(value: &Value) -> Option<Self> {
        match as_integer(value)? {
            1 => Some(Self::Ascending),
            -1 => Some(Self::Descending),
            _ => None,
        }
    }
}

/// Static per-entity configuration for [`translate`].
#[derive(Debug)]
pub struct FieldTable {
    /// Filterable fields and how each is interpreted.
    pub fields: &'static [(&'static str, FieldKind)],
    /// Fields accepted in `sort.by`.
    pub sortable: &'static [&'static str],
    /// Sort applied when the caller's sort is missing or invalid.
    pub default_sort: (&'static str, SortOrder),
    /// Smallest accepted `pageSize`.
    pub min_page_size: usize,
}

impl FieldTable {
    fn is_timestamp(&self, field: &str) -> bool {
        self.fields
            .iter()
            .any(|&(name, kind)| name == field && kind == FieldKind::Timestamp)
    }
}

/// A single storage-level predicate on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals the value. On array fields, any element equals it.
    Equals(Value),
    /// Field contains the (already lowercased) needle, ignoring case.
    Contains(String),
    /// `from <= field <= to`.
    Between { from: Value, to: Value },
    /// `from <= field <= to`, with the field read as a timestamp.
    During {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl Predicate {
    fn matches(&self, field: Option<&Value>) -> bool {
        match field {
            None | Some(Value::Null) => false,
            Some(Value::Array(items)) => items.iter().any(|item| self.matches_scalar(item)),
            Some(value) => self.matches_scalar(value),
        }
    }

    fn matches_scalar(&self, value: &Value) -> bool {
        match self {
            Self::Equals(expected) => loose_eq(value, expected),
            Self::Contains(needle) => value
                .as_str()
                .is_some_and(|s| s.to_lowercase().contains(needle.as_str())),
            Self::Between { from, to } => {
                compare_values(value, from) != Ordering::Less
                    && compare_values(value, to) != Ordering::Greater
            }
            Self::During { from, to } => value
                .as_str()
                .and_then(as_instant)
                .is_some_and(|at| *from <= at && at <= *to),
        }
    }
}

/// A conjunction of per-field predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: BTreeMap<String, Predicate>,
}

impl Filter {
    /// A filter that matches every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the predicate for `field`.
    #[must_use]
    pub fn with(mut self, field: &str, predicate: Predicate) -> Self {
        self.clauses.insert(field.to_owned(), predicate);
        self
    }

    /// Shorthand for an equality clause.
    #[must_use]
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Self::new().with(field, Predicate::Equals(value.into()))
    }

    /// The predicate on `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Predicate> {
        self.clauses.get(field)
    }

    /// Number of clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether the filter has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether a document (in its JSON form) satisfies every clause.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(field, predicate)| predicate.matches(document.get(field)))
    }
}

/// Sort key and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub by: String,
    pub order: SortOrder,
    /// Compare values as instants. Set for [`FieldKind::Timestamp`] fields.
    pub chronological: bool,
}

/// Sort, page size, and offset for a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    pub sort: Sort,
    pub limit: usize,
    pub offset: usize,
}

impl ReadOptions {
    /// Sort keyed JSON documents, then skip `offset` and keep `limit`.
    ///
    /// Documents missing the sort field come first in ascending order; ties
    /// keep their input order. Strings compare lexically unless the sort is
    /// chronological.
    #[must_use]
    pub fn apply<K>(&self, mut documents: Vec<(K, Value)>) -> Vec<(K, Value)> {
        let by = self.sort.by.as_str();
        let compare: fn(&Value, &Value) -> Ordering = if self.sort.chronological {
            compare_instants
        } else {
            order_values
        };
        documents.sort_by(|(_, a), (_, b)| {
            let ord = match (a.get(by), b.get(by)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare(x, y),
            };
            match self.sort.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
        documents
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}

/// The translated form of a listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub options: ReadOptions,
}

/// Translate caller parameters into a filter and read options.
///
/// `params` is expected to be a JSON object; anything else is treated as an
/// empty parameter set. Only fields declared in `table` are considered.
#[must_use]
pub fn translate(params: &Value, table: &FieldTable) -> Query {
    let empty = Map::new();
    let params = params.as_object().unwrap_or(&empty);

    let mut filter = Filter::new();
    for &(field, kind) in table.fields {
        let Some(value) = params.get(field).filter(|v| !v.is_null()) else {
            continue;
        };
        match build_predicate(kind, value) {
            Some(predicate) => filter = filter.with(field, predicate),
            None => debug!(field, ?kind, "dropping invalid filter value"),
        }
    }

    let options = build_options(params, table);
    Query { filter, options }
}

fn build_predicate(kind: FieldKind, value: &Value) -> Option<Predicate> {
    match kind {
        FieldKind::Identifier => value
            .as_str()
            .and_then(DocId::parse)
            .map(|id| Predicate::Equals(Value::String(id.to_string()))),
        FieldKind::Exact => is_scalar(value).then(|| Predicate::Equals(value.clone())),
        FieldKind::Substring => {
            let text = value.as_str().filter(|s| !s.is_empty())?;
            let needle: String = text.chars().take(SUBSTRING_MAX_CHARS).collect();
            Some(Predicate::Contains(needle.to_lowercase()))
        }
        FieldKind::Range => {
            let bounds = value.as_object()?;
            let from = bounds.get("from").filter(|v| is_scalar(v))?;
            let to = bounds.get("to").filter(|v| is_scalar(v))?;
            Some(Predicate::Between {
                from: from.clone(),
                to: to.clone(),
            })
        }
        FieldKind::Timestamp => {
            let bounds = value.as_object()?;
            let from = bounds.get("from")?.as_str().and_then(as_instant)?;
            let to = bounds.get("to")?.as_str().and_then(as_instant)?;
            Some(Predicate::During { from, to })
        }
    }
}

fn build_options(params: &Map<String, Value>, table: &FieldTable) -> ReadOptions {
    let (by, order) = params
        .get("sort")
        .and_then(|s| parse_sort(s, table))
        .unwrap_or(table.default_sort);
    let sort = Sort {
        by: by.to_owned(),
        order,
        chronological: table.is_timestamp(by),
    };

    let limit = params
        .get("pageSize")
        .and_then(as_integer)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| (table.min_page_size..=MAX_PAGE_SIZE).contains(n))
        .unwrap_or(DEFAULT_PAGE_SIZE);

    let page = params
        .get("page")
        .and_then(as_integer)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| (1..=MAX_PAGE).contains(n))
        .unwrap_or(1);

    ReadOptions {
        sort,
        limit,
        offset: (page - 1) * limit,
    }
}

fn parse_sort<'a>(value: &'a Value, table: &FieldTable) -> Option<(&'a str, SortOrder)> {
    let by = value.get("by")?.as_str()?;
    if !table.sortable.contains(&by) {
        return None;
    }
    let order = SortOrder::from_param(value.get("order")?)?;
    Some((by, order))
}

/// Build a parameter object from flat query-string pairs.
///
/// Dotted keys nest: `sort.by=title&sort.order=-1` becomes
/// `{"sort": {"by": "title", "order": "-1"}}`. Values stay strings.
pub fn params_from_query<I>(pairs: I) -> Value
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut params = Map::new();
    for (key, value) in pairs {
        match key.split_once('.') {
            Some((outer, inner)) => {
                let slot = params
                    .entry(outer.to_owned())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(nested) = slot {
                    nested.insert(inner.to_owned(), Value::String(value));
                }
            }
            None => {
                params.insert(key, Value::String(value));
            }
        }
    }
    Value::Object(params)
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// An integral number, or a string holding one. Whole-valued floats
/// (`2.0`, `"1e1"`) count as integers.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole)),
        Value::String(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| s.parse::<f64>().ok().and_then(whole))
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn whole(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f.abs() < 1e15).then_some(f as i64)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// An RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
fn as_instant(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Equality between a stored value and a parameter, tolerating
/// string-encoded numbers and booleans on the parameter side.
fn loose_eq(stored: &Value, expected: &Value) -> bool {
    match (stored, expected) {
        (Value::Number(_), _) => {
            matches!((as_number(stored), as_number(expected)), (Some(a), Some(b)) if a == b)
        }
        (Value::Bool(b), Value::String(s)) => s.trim().parse::<bool>().is_ok_and(|p| p == *b),
        _ => stored == expected,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Comparison used by range checks against caller-supplied bounds.
///
/// Numbers compare numerically, numeric strings included when the other
/// side is a number. Other strings compare lexically and mismatched types
/// by a fixed type rank.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (as_number(a), as_number(b)) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => type_rank(a).cmp(&type_rank(b)),
            }
        }
        _ => order_values(a, b),
    }
}

/// Total order on stored values: by type rank first, then numbers
/// numerically, strings lexically, booleans false first.
fn order_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Total order for timestamp fields: values that parse as instants compare
/// chronologically and sort after those that do not, which fall back to
/// [`order_values`].
fn compare_instants(a: &Value, b: &Value) -> Ordering {
    let at = |v: &Value| v.as_str().and_then(as_instant);
    match (at(a), at(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => order_values(a, b),
    }
}
