use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// The eight pre-aggregated measures every result row carries.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Measure {
    #[serde(rename = "nombre_commandes")]
    OrderCount,
    #[serde(rename = "total_retard")]
    TotalDelay,
    #[serde(rename = "moyenne_retard")]
    AvgDelay,
    #[serde(rename = "min_retard")]
    MinDelay,
    #[serde(rename = "max_retard")]
    MaxDelay,
    #[serde(rename = "moy_prevue")]
    AvgPlanned,
    #[serde(rename = "moy_reelle")]
    AvgReal,
    #[serde(rename = "ecart_moyen")]
    AvgDeviation,
}

pub const MEASURES: [Measure; 8] = [
    Measure::OrderCount,
    Measure::TotalDelay,
    Measure::AvgDelay,
    Measure::MinDelay,
    Measure::MaxDelay,
    Measure::AvgPlanned,
    Measure::AvgReal,
    Measure::AvgDeviation,
];

impl Measure {
    /// The field name used in service records.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Measure::OrderCount => "nombre_commandes",
            Measure::TotalDelay => "total_retard",
            Measure::AvgDelay => "moyenne_retard",
            Measure::MinDelay => "min_retard",
            Measure::MaxDelay => "max_retard",
            Measure::AvgPlanned => "moy_prevue",
            Measure::AvgReal => "moy_reelle",
            Measure::AvgDeviation => "ecart_moyen",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Measure::OrderCount => "Orders",
            Measure::TotalDelay => "Total Delay",
            Measure::AvgDelay => "Avg Delay",
            Measure::MinDelay => "Min Delay",
            Measure::MaxDelay => "Max Delay",
            Measure::AvgPlanned => "Avg Planned",
            Measure::AvgReal => "Avg Real",
            Measure::AvgDeviation => "Avg Dev",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Measure> {
        MEASURES.into_iter().find(|m| m.key() == key)
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One row of an analysis result: the measures plus whatever dimension
/// attribute columns the requested selection grouped by.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct OlapRecord(Map<String, Value>);

impl OlapRecord {
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Looks `column` up literally, then by case-insensitive key when the
    /// literal key is absent or null.
    #[must_use]
    pub fn lookup(&self, column: &str) -> Option<&Value> {
        match self.0.get(column) {
            Some(value) if !value.is_null() => Some(value),
            _ => self
                .0
                .iter()
                .find(|(key, value)| key.eq_ignore_ascii_case(column) && !value.is_null())
                .map(|(_, value)| value),
        }
    }

    /// The trimmed display text of a column; empty when missing or null.
    #[must_use]
    pub fn text(&self, column: &str) -> String {
        self.lookup(column).map(value_text).unwrap_or_default()
    }

    #[must_use]
    pub fn measure(&self, measure: Measure) -> Option<f64> {
        self.0.get(measure.key()).and_then(Value::as_f64)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    /// Coerces every present, non-null measure field to a JSON number.
    /// Other fields are left untouched. Applying it twice changes nothing.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        for measure in MEASURES {
            if let Some(value) = self.0.get_mut(measure.key()) {
                if !value.is_null() {
                    *value = coerce_numeric(value);
                }
            }
        }
        self
    }
}

impl From<Map<String, Value>> for OlapRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn coerce_numeric(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::Bool(b) => Value::from(u8::from(*b)),
        Value::String(s) => parse_number(s.trim()).unwrap_or(Value::Null),
        Value::Null | Value::Array(_) | Value::Object(_) => Value::Null,
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(int) = s.parse::<i64>() {
        return Some(Value::from(int));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Normalizes raw service rows into records with numeric measures.
#[must_use]
pub fn normalize(raw: Vec<Map<String, Value>>) -> Vec<OlapRecord> {
    raw.into_iter()
        .map(|fields| OlapRecord::new(fields).normalize())
        .collect()
}

/// A loaded data set: the normalized rows and the grouping columns the
/// service reported for them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub records: Vec<OlapRecord>,
    pub dimension_columns: Vec<String>,
}

impl ResultSet {
    #[must_use]
    pub fn new(records: Vec<OlapRecord>, dimension_columns: Vec<String>) -> Self {
        Self {
            records,
            dimension_columns,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// The authoritative dimension columns. When the service reported none,
    /// the non-measure keys of the first record stand in.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        if !self.dimension_columns.is_empty() {
            return self.dimension_columns.clone();
        }
        self.records
            .first()
            .map(|rec| {
                rec.keys()
                    .filter(|key| Measure::from_key(key).is_none())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
