use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A stored record as returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.data.get(field).is_some_and(|v| !v.is_null())
    }

    /// The record as a JSON object with its `id` merged in.
    pub fn into_value(self) -> Value {
        let mut data = self.data;
        data.insert("id".to_string(), Value::String(self.id));
        Value::Object(data)
    }
}

/// A record to append. The store stamps `server_timestamp_field` with its own clock.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub data: Map<String, Value>,
    pub server_timestamp_field: Option<String>,
}

impl NewDocument {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            data,
            server_timestamp_field: None,
        }
    }

    pub fn with_server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.server_timestamp_field = Some(field.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        data.get(&self.field).unwrap_or(&Value::Null) == &self.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality filters plus an optional single ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(field, value));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// The same filters without the ordering clause.
    pub fn unordered(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            order_by: None,
        }
    }

    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }
}

/// Composite index over a collection: equality fields (sorted) followed by the order field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    pub collection: String,
    pub fields: Vec<String>,
    pub order_field: String,
}

impl IndexSpec {
    pub fn new<I, S>(collection: impl Into<String>, fields: I, order_field: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        fields.sort();
        fields.dedup();
        Self {
            collection: collection.into(),
            fields,
            order_field: order_field.into(),
        }
    }

    /// The composite index an ordered query needs, if any.
    ///
    /// Single-field ordering is always served. Equality filters on fields
    /// other than the order field require a composite index.
    pub fn required_for(collection: &str, query: &Query) -> Option<Self> {
        let order = query.order_by.as_ref()?;
        let fields: Vec<&str> = query
            .filters
            .iter()
            .map(|f| f.field.as_str())
            .filter(|f| *f != order.field)
            .collect();
        if fields.is_empty() {
            return None;
        }
        Some(Self::new(collection, fields, order.field.as_str()))
    }

    pub fn name(&self) -> String {
        format!(
            "idx_{}__{}__{}",
            self.collection,
            self.fields.join("_"),
            self.order_field
        )
    }
}

impl std::fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}) order by {}",
            self.collection,
            self.fields.join(", "),
            self.order_field
        )
    }
}

/// Orders JSON scalars the way an ordered query does: null, booleans, numbers, strings.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
