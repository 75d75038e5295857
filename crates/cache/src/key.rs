//! Cache key scheme.
//!
//! Keys are structured values rather than concatenated strings. Equality is
//! decided on (namespace, entity type, discriminator), so an absent filter
//! value can never collide with a literal filter value that happens to spell
//! the sentinel used in the rendered form.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use buildvault_core::TaskId;

/// Token used for absent query values in the rendered (log) form of a key.
pub const NULL_SENTINEL: &str = "<null>";

/// Fixed label of a record category, used as a key namespace.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityType(&'static str);

impl EntityType {
    pub const fn new(label: &'static str) -> Self {
        Self(label)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Discriminator of a single-item lookup.
///
/// A record looked up by surrogate id and by name lands under two different
/// keys; writers must evict both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Id(i64),
    Name(String),
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Self::Id(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Id(id) => write!(f, "id:{}", id),
            Identifier::Name(name) => write!(f, "name:{}", name),
        }
    }
}

/// Value of one query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamValue {
    /// No filter on this parameter.
    Absent,
    Present(String),
}

impl ParamValue {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            ParamValue::Absent => None,
            ParamValue::Present(v) => Some(v),
        }
    }
}

impl From<Option<String>> for ParamValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(ParamValue::Absent, ParamValue::Present)
    }
}

impl From<Option<&str>> for ParamValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(ParamValue::Absent, |v| ParamValue::Present(v.to_string()))
    }
}

/// Canonical, unordered parameter set of a query lookup.
///
/// Backed by a sorted map: iteration and equality never depend on the order
/// in which parameters were inserted. Re-inserting a name replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter with a concrete value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), ParamValue::Present(value.into()));
        self
    }

    /// Add a parameter with no value ("no filter").
    pub fn with_absent(mut self, name: impl Into<String>) -> Self {
        self.0.insert(name.into(), ParamValue::Absent);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Parameters sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), ParamValue::from(v.map(Into::<String>::into))))
                .collect(),
        )
    }
}

impl From<HashMap<String, Option<String>>> for QueryParams {
    fn from(map: HashMap<String, Option<String>>) -> Self {
        map.into_iter().collect()
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", name, value.as_deref().unwrap_or(NULL_SENTINEL))?;
        }
        Ok(())
    }
}

/// Portion of the key space reserved for one concern.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Single,
    All,
    Query,
    Task,
}

/// Key of one cache entry. Build it through the key functions below.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Single {
        entity: EntityType,
        id: Identifier,
    },
    All {
        entity: EntityType,
    },
    Query {
        entity: EntityType,
        params: QueryParams,
    },
    /// Task status records live outside every entity namespace.
    Task(TaskId),
}

impl CacheKey {
    pub fn namespace(&self) -> Namespace {
        match self {
            CacheKey::Single { .. } => Namespace::Single,
            CacheKey::All { .. } => Namespace::All,
            CacheKey::Query { .. } => Namespace::Query,
            CacheKey::Task(_) => Namespace::Task,
        }
    }

    pub fn entity_type(&self) -> Option<EntityType> {
        match self {
            CacheKey::Single { entity, .. }
            | CacheKey::All { entity }
            | CacheKey::Query { entity, .. } => Some(*entity),
            CacheKey::Task(_) => None,
        }
    }

    /// True for listing and query keys of `entity`; the set `evict_by_type` sweeps.
    pub fn is_bulk_of(&self, entity: EntityType) -> bool {
        match self {
            CacheKey::All { entity: e } | CacheKey::Query { entity: e, .. } => *e == entity,
            CacheKey::Single { .. } | CacheKey::Task(_) => false,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Single { entity, id } => write!(f, "{}:{}", entity, id),
            CacheKey::All { entity } => write!(f, "{}:all", entity),
            CacheKey::Query { entity, params } => write!(f, "{}:query:{}", entity, params),
            CacheKey::Task(task_id) => write!(f, "task:{}", task_id),
        }
    }
}

/// Key of one record, looked up by id or by name.
pub fn single_key(entity: EntityType, id: impl Into<Identifier>) -> CacheKey {
    CacheKey::Single {
        entity,
        id: id.into(),
    }
}

/// Key of the full unfiltered listing of `entity`.
pub fn all_key(entity: EntityType) -> CacheKey {
    CacheKey::All { entity }
}

/// Key of a filtered lookup; invariant under parameter order.
pub fn query_key(entity: EntityType, params: impl Into<QueryParams>) -> CacheKey {
    CacheKey::Query {
        entity,
        params: params.into(),
    }
}

/// Key of a task status record.
pub fn task_key(task_id: TaskId) -> CacheKey {
    CacheKey::Task(task_id)
}
