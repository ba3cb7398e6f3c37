//! An in-memory analysis service over a small, fixed fact table.
//!
//! Used by the CLI with `--mock` and by the session tests. Facts are
//! generated deterministically, so aggregates are stable across runs.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::{AnalyseRequest, AnalyseResponse, DataService, ResponseMetadata};
use crate::{
    catalog::{Dimension, Level},
    record::Measure,
};

/// Grouping columns are emitted in request body order.
const GROUPING_ORDER: [Dimension; 4] = [
    Dimension::Time,
    Dimension::Client,
    Dimension::Staff,
    Dimension::Product,
];

const YEARS: [u16; 2] = [2023, 2024];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const SEASONS: [&str; 4] = ["Winter", "Spring", "Summer", "Fall"];
/// Facts recorded per month.
const FACTS_PER_MONTH: usize = 5;

struct Client {
    name: &'static str,
    country: &'static str,
}

struct Employee {
    name: &'static str,
    department: &'static str,
}

struct Product {
    name: &'static str,
    category: &'static str,
    supplier: &'static str,
}

const CLIENTS: [Client; 5] = [
    Client { name: "TechCorp", country: "USA" },
    Client { name: "BizSol", country: "USA" },
    Client { name: "EduInst", country: "UK" },
    Client { name: "GovSys", country: "France" },
    Client { name: "RetailCo", country: "Germany" },
];

const EMPLOYEES: [Employee; 5] = [
    Employee { name: "John Doe", department: "Sales" },
    Employee { name: "Jane Smith", department: "Sales" },
    Employee { name: "Bob Johnson", department: "Marketing" },
    Employee { name: "Alice Brown", department: "Support" },
    Employee { name: "Charlie Davis", department: "Operations" },
];

const PRODUCTS: [Product; 5] = [
    Product { name: "Laptop X", category: "Electronics", supplier: "Dell" },
    Product { name: "Monitor Y", category: "Electronics", supplier: "Samsung" },
    Product { name: "Desk Chair", category: "Furniture", supplier: "IKEA" },
    Product { name: "Office Table", category: "Furniture", supplier: "Herman Miller" },
    Product { name: "ERP License", category: "Software", supplier: "Oracle" },
];

/// One order line at the finest grain.
#[derive(Clone, Debug)]
struct Fact {
    attributes: BTreeMap<&'static str, String>,
    orders: u64,
    avg_delay: f64,
    planned: f64,
    real: f64,
}

impl Fact {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn total_delay(&self) -> f64 {
        self.avg_delay * self.orders as f64
    }

    fn min_delay(&self) -> f64 {
        (self.avg_delay - 1.0).max(0.0)
    }

    fn max_delay(&self) -> f64 {
        self.avg_delay + 2.0
    }
}

fn season(month: usize) -> &'static str {
    SEASONS[(month % 12 + 3) / 3 - 1]
}

fn generate_facts() -> Vec<Fact> {
    let mut facts = Vec::with_capacity(YEARS.len() * MONTHS.len() * FACTS_PER_MONTH);
    for year in YEARS {
        for (idx, month_name) in MONTHS.iter().enumerate() {
            let month = idx + 1;
            for i in 0..FACTS_PER_MONTH {
                let client = &CLIENTS[(i + month) % CLIENTS.len()];
                let employee = &EMPLOYEES[(i + 2 * month + usize::from(year)) % EMPLOYEES.len()];
                let product = &PRODUCTS[(3 * i + month) % PRODUCTS.len()];

                // Sales and marketing run with shorter delays.
                let avg_delay = if matches!(employee.department, "Sales" | "Marketing") {
                    ((i + month) % 5) as f64 * 0.75
                } else {
                    2.0 + ((3 * month + i) % 8) as f64
                };
                let planned = 5.0 + ((month + 2 * i) % 10) as f64;

                let attributes = BTreeMap::from([
                    ("year", year.to_string()),
                    ("month", (*month_name).to_string()),
                    ("saison", season(month).to_string()),
                    ("pays", client.country.to_string()),
                    ("client", client.name.to_string()),
                    ("departement", employee.department.to_string()),
                    ("employe", employee.name.to_string()),
                    ("categorie", product.category.to_string()),
                    ("produit", product.name.to_string()),
                    ("fournisseur", product.supplier.to_string()),
                ]);
                facts.push(Fact {
                    attributes,
                    orders: 1 + ((i + month) % 5) as u64,
                    avg_delay,
                    planned,
                    real: planned + avg_delay,
                });
            }
        }
    }
    facts
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Grouping attributes for a level, in attribute order. `ALL` groups by
/// nothing.
fn group_keys(level: Level) -> Vec<String> {
    level
        .attributes()
        .into_iter()
        .map(str::to_lowercase)
        .collect()
}

fn aggregate(rows: &[&Fact], keys: &[String], values: &[String]) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in keys.iter().zip(values) {
        out.insert(key.clone(), Value::from(value.clone()));
    }

    let orders: u64 = rows.iter().map(|f| f.orders).sum();
    let total_delay: f64 = rows.iter().map(|f| f.total_delay()).sum();
    let weighted = |pick: fn(&Fact) -> f64| {
        if orders == 0 {
            0.0
        } else {
            rows.iter().map(|f| pick(f) * f.orders as f64).sum::<f64>() / orders as f64
        }
    };
    let avg_delay = if orders == 0 { 0.0 } else { total_delay / orders as f64 };
    let avg_planned = weighted(|f| f.planned);
    let avg_real = weighted(|f| f.real);
    let min_delay = rows.iter().map(|f| f.min_delay()).fold(f64::INFINITY, f64::min);
    let max_delay = rows.iter().map(|f| f.max_delay()).fold(f64::NEG_INFINITY, f64::max);

    out.insert(Measure::OrderCount.key().to_string(), Value::from(orders));
    for (measure, value) in [
        (Measure::TotalDelay, total_delay),
        (Measure::AvgDelay, avg_delay),
        (Measure::MinDelay, min_delay),
        (Measure::MaxDelay, max_delay),
        (Measure::AvgPlanned, avg_planned),
        (Measure::AvgReal, avg_real),
        (Measure::AvgDeviation, avg_real - avg_planned),
    ] {
        out.insert(measure.key().to_string(), Value::from(round2(value)));
    }
    out
}

#[derive(Debug)]
pub struct MockDataService {
    facts: Vec<Fact>,
}

impl Default for MockDataService {
    fn default() -> Self {
        Self {
            facts: generate_facts(),
        }
    }
}

impl MockDataService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `request` synchronously.
    ///
    /// Filters match the lower-cased column name exactly; an unknown column
    /// matches nothing. Groups appear in order of first occurrence.
    #[must_use]
    pub fn query(&self, request: &AnalyseRequest) -> AnalyseResponse {
        let filtered: Vec<&Fact> = self
            .facts
            .iter()
            .filter(|fact| {
                request
                    .filters
                    .iter()
                    .all(|(col, value)| fact.attribute(&col.to_lowercase()) == Some(value.as_str()))
            })
            .collect();

        let keys: Vec<String> = GROUPING_ORDER
            .into_iter()
            .flat_map(|dim| group_keys(request.selection.level(dim)))
            .collect();

        let data = if filtered.is_empty() {
            Vec::new()
        } else if keys.is_empty() {
            vec![aggregate(&filtered, &keys, &[])]
        } else {
            let mut order: Vec<Vec<String>> = Vec::new();
            let mut groups: HashMap<Vec<String>, Vec<&Fact>> = HashMap::new();
            for fact in filtered {
                let values: Vec<String> = keys
                    .iter()
                    .map(|key| fact.attribute(key).unwrap_or_default().to_string())
                    .collect();
                let group = groups.entry(values.clone()).or_default();
                if group.is_empty() {
                    order.push(values);
                }
                group.push(fact);
            }
            order
                .iter()
                .map(|values| {
                    let rows = groups.get(values).map(Vec::as_slice).unwrap_or_default();
                    aggregate(rows, &keys, values)
                })
                .collect()
        };

        let dimensions = GROUPING_ORDER
            .into_iter()
            .map(|dim| {
                (
                    dim.key().to_string(),
                    request.selection.level(dim).token().to_string(),
                )
            })
            .collect();

        AnalyseResponse {
            success: true,
            metadata: ResponseMetadata {
                dimension_count: request.selection.grouped_count(),
                record_count: data.len(),
                dimension_columns: keys,
            },
            data,
            dimensions,
            error: None,
        }
    }
}

#[async_trait]
impl DataService for MockDataService {
    async fn analyse(&self, request: &AnalyseRequest) -> Result<AnalyseResponse> {
        let response = self.query(request);
        debug!(
            "Mock analysis answered {} records for {:?}",
            response.data.len(),
            request.selection
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::{FilterMap, Selection};

    fn request(selection: Selection, filters: &[(&str, &str)]) -> AnalyseRequest {
        AnalyseRequest {
            selection,
            filters: filters
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<FilterMap>(),
        }
    }

    fn all_but(dimension: Dimension, level: Level) -> Selection {
        Selection {
            temp: Level::All,
            clie: Level::All,
            emp: Level::All,
            prod: Level::All,
        }
        .with(dimension, level)
    }

    fn orders(row: &Map<String, Value>) -> u64 {
        row["nombre_commandes"].as_u64().unwrap()
    }

    #[test]
    fn seasons_follow_the_calendar() {
        assert_eq!(season(12), "Winter");
        assert_eq!(season(1), "Winter");
        assert_eq!(season(3), "Spring");
        assert_eq!(season(7), "Summer");
        assert_eq!(season(10), "Fall");
    }

    #[test]
    fn grand_total_is_a_single_row() {
        let service = MockDataService::new();
        let resp = service.query(&request(all_but(Dimension::Time, Level::All), &[]));
        assert!(resp.success);
        assert_eq!(resp.data.len(), 1);
        assert_eq!(orders(&resp.data[0]), 360);
        assert!(resp.metadata.dimension_columns.is_empty());
        assert_eq!(resp.dimensions["temp"], "ALL");
    }

    #[test]
    fn groups_by_year_and_reports_columns() {
        let service = MockDataService::new();
        let resp = service.query(&request(Selection::baseline(), &[]));
        assert_eq!(resp.metadata.dimension_columns, vec!["year"]);
        assert_eq!(resp.metadata.record_count, 2);
        assert_eq!(resp.metadata.dimension_count, 1);
        let years: Vec<_> = resp.data.iter().map(|row| row["year"].clone()).collect();
        assert_eq!(years, vec![json!("2023"), json!("2024")]);
        assert!(resp.data.iter().all(|row| orders(row) == 180));
    }

    #[test]
    fn country_totals_add_up() {
        let service = MockDataService::new();
        let resp = service.query(&request(all_but(Dimension::Client, Level::Country), &[]));
        let by_country: BTreeMap<String, u64> = resp
            .data
            .iter()
            .map(|row| (row["pays"].as_str().unwrap().to_string(), orders(row)))
            .collect();
        assert_eq!(
            by_country,
            BTreeMap::from([
                ("France".to_string(), 96),
                ("Germany".to_string(), 120),
                ("UK".to_string(), 72),
                ("USA".to_string(), 72),
            ])
        );
    }

    #[test]
    fn filters_match_lower_cased_columns() {
        let service = MockDataService::new();
        let selection = all_but(Dimension::Client, Level::CountryClient);
        let resp = service.query(&request(selection, &[("PAYS", "USA")]));
        assert_eq!(resp.metadata.dimension_columns, vec!["pays", "client"]);
        let clients: Vec<_> = resp.data.iter().map(|row| row["client"].clone()).collect();
        assert_eq!(clients.len(), 2);
        assert!(clients.contains(&json!("TechCorp")));
        assert!(clients.contains(&json!("BizSol")));
    }

    #[test]
    fn unmatched_filter_returns_no_rows() {
        let service = MockDataService::new();
        let resp = service.query(&request(Selection::baseline(), &[("pays", "Spain")]));
        assert!(resp.success);
        assert!(resp.data.is_empty());

        let resp = service.query(&request(Selection::baseline(), &[("region", "Europe")]));
        assert!(resp.data.is_empty());
    }

    #[test]
    fn supplier_branch_groups_by_supplier() {
        let service = MockDataService::new();
        let resp = service.query(&request(all_but(Dimension::Product, Level::SupplierProduct), &[]));
        assert_eq!(resp.metadata.dimension_columns, vec!["fournisseur", "produit"]);
        assert_eq!(resp.data.len(), 5);
    }

    #[test]
    fn aggregates_are_weighted_and_rounded() {
        let service = MockDataService::new();
        let resp = service.query(&request(Selection::baseline(), &[]));
        for row in &resp.data {
            let total = row["total_retard"].as_f64().unwrap();
            let avg = row["moyenne_retard"].as_f64().unwrap();
            let count = orders(row) as f64;
            assert!((total / count - avg).abs() < 0.01);
            let planned = row["moy_prevue"].as_f64().unwrap();
            let real = row["moy_reelle"].as_f64().unwrap();
            let deviation = row["ecart_moyen"].as_f64().unwrap();
            assert!((real - planned - deviation).abs() < 0.02);
            assert!(row["min_retard"].as_f64().unwrap() <= row["max_retard"].as_f64().unwrap());
            for measure in ["moyenne_retard", "moy_prevue", "moy_reelle"] {
                let value = row[measure].as_f64().unwrap();
                assert_eq!(round2(value), value);
            }
        }
    }
}
