//! Record ordering
//!
//! Connections are ordered either by record key, or by a typed order field with the
//! record key as tie-break. The tie-break always runs ascending so that every
//! ordering is total and cursors stay unambiguous.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;

use async_graphql::Enum;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique record identifier, compared numerically
pub type RecordKey = u64;

/// Sort direction
#[derive(Enum, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    /// Apply the direction to an ascending comparison.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            OrderDirection::Asc => ordering,
            OrderDirection::Desc => ordering.reverse(),
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            OrderDirection::Asc => OrderDirection::Desc,
            OrderDirection::Desc => OrderDirection::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field a connection can be ordered by
///
/// Implemented by a per-collection enum, e.g. `DkimOrderField::Selector`.
pub trait OrderField: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Field name used in logs.
    fn name(self) -> &'static str;

    /// Attribute path of the field inside a stored document.
    fn path(self) -> &'static str {
        self.name()
    }
}

/// Requested ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy<F> {
    pub field: F,
    pub direction: OrderDirection,
}

impl<F> OrderBy<F> {
    pub fn new(field: F, direction: OrderDirection) -> Self {
        Self { field, direction }
    }

    pub fn asc(field: F) -> Self {
        Self::new(field, OrderDirection::Asc)
    }

    pub fn desc(field: F) -> Self {
        Self::new(field, OrderDirection::Desc)
    }
}

/// Value of an orderable field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    // Values of different kinds order by kind: null < bool < number < string < timestamp
    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Number(_) => 2,
            FieldValue::String(_) => 3,
            FieldValue::Timestamp(_) => 4,
        }
    }

    /// Total ordering over field values.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (FieldValue::Number(a), FieldValue::Number(b)) => a.total_cmp(b),
            (FieldValue::String(a), FieldValue::String(b)) => a.cmp(b),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Paginated entity
pub trait Record: Clone + Send + Sync + 'static {
    type Field: OrderField;

    fn key(&self) -> RecordKey;

    /// Read an orderable field. Values are expected to be locale-resolved already.
    fn field(&self, field: Self::Field) -> FieldValue;
}

/// Compare two records under the effective ordering.
pub fn compare_records<R: Record>(a: &R, b: &R, order_by: Option<&OrderBy<R::Field>>) -> Ordering {
    let primary = match order_by {
        Some(order) => order
            .direction
            .apply(a.field(order.field).total_cmp(&b.field(order.field))),
        None => Ordering::Equal,
    };
    primary.then_with(|| a.key().cmp(&b.key()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum DomainField {
        Name,
    }

    impl OrderField for DomainField {
        fn name(self) -> &'static str {
            match self {
                DomainField::Name => "domain",
            }
        }
    }

    #[derive(Debug, Clone)]
    struct Domain {
        key: RecordKey,
        name: &'static str,
    }

    impl Record for Domain {
        type Field = DomainField;

        fn key(&self) -> RecordKey {
            self.key
        }

        fn field(&self, field: DomainField) -> FieldValue {
            match field {
                DomainField::Name => self.name.into(),
            }
        }
    }

    #[test]
    fn test_key_order_is_numeric() {
        let a = Domain { key: 9, name: "a" };
        let b = Domain { key: 10, name: "a" };
        assert_eq!(compare_records(&a, &b, None), Ordering::Less);
    }

    #[test]
    fn test_tie_break_stays_ascending() {
        let a = Domain { key: 1, name: "same" };
        let b = Domain { key: 2, name: "same" };
        let asc = OrderBy::asc(DomainField::Name);
        let desc = OrderBy::desc(DomainField::Name);
        assert_eq!(compare_records(&a, &b, Some(&asc)), Ordering::Less);
        assert_eq!(compare_records(&a, &b, Some(&desc)), Ordering::Less);
    }

    #[test]
    fn test_desc_reverses_primary() {
        let a = Domain { key: 1, name: "alpha" };
        let b = Domain { key: 2, name: "beta" };
        let desc = OrderBy::desc(DomainField::Name);
        assert_eq!(compare_records(&a, &b, Some(&desc)), Ordering::Greater);
    }

    #[test]
    fn test_mixed_values_order_by_kind() {
        assert_eq!(FieldValue::Null.total_cmp(&FieldValue::Bool(false)), Ordering::Less);
        assert_eq!(
            FieldValue::Number(10.0).total_cmp(&FieldValue::from("1")),
            Ordering::Less
        );
        assert_eq!(FieldValue::from(None::<bool>), FieldValue::Null);
    }
}
