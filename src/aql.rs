//! AQL rendering for connection queries
//!
//! Collections stored in the document database are paginated with a single AQL
//! query that returns one row shaped like [`PageSnapshot`](crate::executor::PageSnapshot):
//!
//! ```text
//! { records, totalCount, hasNextPage, hasPreviousPage }
//! ```
//!
//! Documents are bound to the variable `doc`. Record keys are stored as strings and
//! always compared through `TO_NUMBER`.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::executor::{ConnectionQuery, ScanDirection};
use crate::order::{OrderBy, OrderDirection, OrderField};

const KEY: &str = "TO_NUMBER(doc._key)";

/// Bind variables reserved by [`render`]
pub const RESERVED_BIND_VARS: [&str; 4] = ["@collection", "afterKey", "beforeKey", "limit"];

/// Collection selection expressed as an AQL condition on `doc`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AqlFilter {
    pub condition: String,
    pub bind_vars: Map<String, Value>,
}

impl AqlFilter {
    /// Select every document.
    pub fn all() -> Self {
        Self::new("true")
    }

    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            bind_vars: Map::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind_vars.insert(name.into(), value.into());
        self
    }
}

/// Query text plus bind variables, ready for the database driver
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AqlQuery {
    pub query: String,
    pub bind_vars: Map<String, Value>,
}

fn key_operator(wanted: Ordering) -> &'static str {
    if wanted == Ordering::Greater {
        ">"
    } else {
        "<"
    }
}

/// Condition: `doc` lies strictly on the `wanted` side of an anchor.
///
/// `anchor_value` renders the anchor's ordered field, `anchor_key` its numeric key.
fn beyond<F: OrderField>(
    order_by: Option<&OrderBy<F>>,
    anchor_value: impl Fn(&str) -> String,
    anchor_key: &str,
    wanted: Ordering,
) -> String {
    let key_op = key_operator(wanted);
    match order_by {
        None => format!("{} {} {}", KEY, key_op, anchor_key),
        Some(order) => {
            let path = order.field.path();
            let field_op = match order.direction {
                OrderDirection::Asc => key_op,
                OrderDirection::Desc => key_operator(wanted.reverse()),
            };
            let anchor = anchor_value(path);
            format!(
                "(doc.{path} {field_op} {anchor} OR \
                 (doc.{path} == {anchor} AND {KEY} {key_op} {anchor_key}))"
            )
        }
    }
}

/// Whether any matching document satisfies `condition`
fn any_matching(condition: &str) -> String {
    format!(
        "LENGTH(\n  FOR doc IN matching\n    FILTER {condition}\n    LIMIT 1\n    RETURN true\n) > 0"
    )
}

fn sort_clause<F: OrderField>(order_by: Option<&OrderBy<F>>, scan: ScanDirection) -> String {
    let flip = |direction: OrderDirection| match scan {
        ScanDirection::Forward => direction,
        ScanDirection::Backward => direction.reverse(),
    };
    match order_by {
        None => format!("SORT {} {}", KEY, flip(OrderDirection::Asc)),
        Some(order) => format!(
            "SORT doc.{} {}, {} {}",
            order.field.path(),
            flip(order.direction),
            KEY,
            flip(OrderDirection::Asc)
        ),
    }
}

/// Cursor bound on the window; field orderings look the anchor document up first.
fn cursor_bound<F: OrderField>(
    order_by: Option<&OrderBy<F>>,
    anchor_doc: &str,
    bind: &str,
    wanted: Ordering,
) -> (Option<String>, String) {
    match order_by {
        None => (
            None,
            beyond(order_by, |_| String::new(), &format!("TO_NUMBER(@{bind})"), wanted),
        ),
        Some(_) => (
            Some(format!("LET {anchor_doc} = DOCUMENT(@@collection, @{bind})")),
            format!(
                "{anchor_doc} != null AND {}",
                beyond(
                    order_by,
                    |path| format!("{anchor_doc}.{path}"),
                    &format!("TO_NUMBER({anchor_doc}._key)"),
                    wanted
                )
            ),
        ),
    }
}

/// Render a connection query into AQL.
///
/// The filter's bind variables are merged in; names listed in
/// [`RESERVED_BIND_VARS`] are overwritten.
pub fn render<F: OrderField>(query: &ConnectionQuery<F, AqlFilter>) -> AqlQuery {
    let order_by = query.order_by.as_ref();
    let mut bind_vars = query.filter.bind_vars.clone();
    bind_vars.insert("@collection".to_string(), Value::from(query.collection.clone()));
    bind_vars.insert("limit".to_string(), Value::from(query.limit));

    let mut lets = Vec::new();
    let mut window_filters = Vec::new();

    if let Some(after) = query.after {
        bind_vars.insert("afterKey".to_string(), Value::from(after.to_string()));
        let (lookup, condition) = cursor_bound(order_by, "afterDoc", "afterKey", Ordering::Greater);
        lets.extend(lookup);
        window_filters.push(condition);
    }
    if let Some(before) = query.before {
        bind_vars.insert("beforeKey".to_string(), Value::from(before.to_string()));
        let (lookup, condition) = cursor_bound(order_by, "beforeDoc", "beforeKey", Ordering::Less);
        lets.extend(lookup);
        window_filters.push(condition);
    }

    let (start, end) = match query.scan {
        ScanDirection::Forward => ("FIRST(retrieved)", "LAST(retrieved)"),
        ScanDirection::Backward => ("LAST(retrieved)", "FIRST(retrieved)"),
    };

    let mut text = String::new();
    text.push_str("LET matching = (\n");
    text.push_str("  FOR doc IN @@collection\n");
    text.push_str(&format!("    FILTER {}\n", query.filter.condition));
    text.push_str("    RETURN doc\n)\n");
    for lookup in &lets {
        text.push_str(lookup);
        text.push('\n');
    }
    text.push_str("LET retrieved = (\n");
    text.push_str("  FOR doc IN matching\n");
    for condition in &window_filters {
        text.push_str(&format!("    FILTER {}\n", condition));
    }
    text.push_str(&format!("    {}\n", sort_clause(order_by, query.scan)));
    text.push_str("    LIMIT @limit\n");
    text.push_str("    RETURN doc\n)\n");
    text.push_str(&format!("LET pageStart = {}\n", start));
    text.push_str(&format!("LET pageEnd = {}\n", end));
    let page_end = beyond(
        order_by,
        |path| format!("pageEnd.{path}"),
        "TO_NUMBER(pageEnd._key)",
        Ordering::Greater,
    );
    let page_start = beyond(
        order_by,
        |path| format!("pageStart.{path}"),
        "TO_NUMBER(pageStart._key)",
        Ordering::Less,
    );
    text.push_str(&format!(
        "LET hasNextPage = LENGTH(retrieved) > 0 AND {}\n",
        any_matching(&page_end)
    ));
    text.push_str(&format!(
        "LET hasPreviousPage = LENGTH(retrieved) > 0 AND {}\n",
        any_matching(&page_start)
    ));
    text.push_str(
        "RETURN { records: retrieved, totalCount: LENGTH(matching), hasNextPage, hasPreviousPage }",
    );

    AqlQuery {
        query: text,
        bind_vars,
    }
}
