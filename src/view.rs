//! Presentation-facing derivations over a loaded data set. Nothing here
//! touches the query state.

use std::cmp::Ordering;

use serde_json::Value;

use crate::{
    catalog::Dimension,
    record::{value_text, Measure, OlapRecord},
};

pub const DEFAULT_ROWS_PER_PAGE: usize = 10;
/// Average delay, in days, above which the KPI summary raises an alert.
pub const DELAY_ALERT_THRESHOLD: f64 = 5.0;
/// Number of records listed per insight panel.
pub const INSIGHT_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// One page of table rows.
#[derive(Debug, PartialEq)]
pub struct Page<'a> {
    pub rows: Vec<&'a OlapRecord>,
    /// 1-based.
    pub number: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

/// Search, sort and pagination settings of the data table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableView {
    search: String,
    sort: Option<(String, SortDirection)>,
    page: usize,
    rows_per_page: usize,
}

impl Default for TableView {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS_PER_PAGE)
    }
}

impl TableView {
    #[must_use]
    pub fn new(rows_per_page: usize) -> Self {
        Self {
            search: String::new(),
            sort: None,
            page: 1,
            rows_per_page: rows_per_page.max(1),
        }
    }

    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Sets the free-text search and goes back to the first page.
    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
        self.page = 1;
    }

    #[must_use]
    pub fn sort(&self) -> Option<(&str, SortDirection)> {
        self.sort.as_ref().map(|(col, dir)| (col.as_str(), *dir))
    }

    /// Sorts by `column`. Sorting again by the same column flips the
    /// direction; a new column starts ascending.
    pub fn toggle_sort(&mut self, column: &str) -> SortDirection {
        let direction = match &self.sort {
            Some((current, dir)) if current == column => dir.flipped(),
            _ => SortDirection::Asc,
        };
        self.sort = Some((column.to_string(), direction));
        direction
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// The records matching the search, in display order.
    #[must_use]
    pub fn rows<'a>(&self, records: &'a [OlapRecord]) -> Vec<&'a OlapRecord> {
        let needle = self.search.to_lowercase();
        let mut rows: Vec<&OlapRecord> = records
            .iter()
            .filter(|rec| {
                needle.is_empty()
                    || rec
                        .values()
                        .any(|v| value_text(v).to_lowercase().contains(&needle))
            })
            .collect();
        if let Some((column, direction)) = &self.sort {
            rows.sort_by(|a, b| compare_cells(a.get(column), b.get(column), *direction));
        }
        rows
    }

    /// The current page, clamped to the pages that exist.
    #[must_use]
    pub fn page<'a>(&self, records: &'a [OlapRecord]) -> Page<'a> {
        let rows = self.rows(records);
        let total_rows = rows.len();
        let total_pages = total_rows.div_ceil(self.rows_per_page);
        let number = self.page.clamp(1, total_pages.max(1));
        let rows = rows
            .into_iter()
            .skip((number - 1) * self.rows_per_page)
            .take(self.rows_per_page)
            .collect();
        Page {
            rows,
            number,
            total_pages,
            total_rows,
        }
    }
}

/// Numbers compare numerically and everything else by text. Missing cells
/// sort last in either direction.
fn compare_cells(a: Option<&Value>, b: Option<&Value>, direction: SortDirection) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(a), Some(b)) => (a, b),
    };
    let ord = match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => value_text(a).cmp(&value_text(b)),
    };
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

/// Headline figures for the loaded rows.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Kpis {
    pub total_volume: usize,
    pub total_orders: f64,
    /// Mean of the per-row average delay; 0 without rows.
    pub avg_delay: f64,
    pub delay_alert: bool,
}

impl Kpis {
    #[must_use]
    pub fn from_records(records: &[OlapRecord]) -> Self {
        let total_volume = records.len();
        let total_orders = records
            .iter()
            .map(|rec| rec.measure(Measure::OrderCount).unwrap_or(0.0))
            .sum();
        let avg_delay = if records.is_empty() {
            0.0
        } else {
            records
                .iter()
                .map(|rec| rec.measure(Measure::AvgDelay).unwrap_or(0.0))
                .sum::<f64>()
                / total_volume as f64
        };
        Self {
            total_volume,
            total_orders,
            avg_delay,
            delay_alert: avg_delay > DELAY_ALERT_THRESHOLD,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
}

/// The `count` records with the lowest or highest `measure`. A missing
/// measure counts as 0.
#[must_use]
pub fn extreme_records(
    records: &[OlapRecord],
    measure: Measure,
    extreme: Extreme,
    count: usize,
) -> Vec<&OlapRecord> {
    let mut sorted: Vec<&OlapRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        let x = a.measure(measure).unwrap_or(0.0);
        let y = b.measure(measure).unwrap_or(0.0);
        let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        match extreme {
            Extreme::Min => ord,
            Extreme::Max => ord.reverse(),
        }
    });
    sorted.truncate(count);
    sorted
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insight {
    Good,
    Bad,
}

/// One-line commentary on a record, naming it by its most specific
/// non-calendar column.
#[must_use]
pub fn insight_text<S: AsRef<str>>(
    record: &OlapRecord,
    dimension_columns: &[S],
    insight: Insight,
) -> String {
    let column = dimension_columns
        .iter()
        .map(AsRef::as_ref)
        .find(|col| *col != "month" && *col != "year")
        .or_else(|| dimension_columns.first().map(AsRef::as_ref));
    let name = column
        .map(|col| record.text(col))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Entity".to_string());
    match insight {
        Insight::Bad => format!(
            "{name} is causing significant delays (Total: {}d).",
            record.text(Measure::TotalDelay.key())
        ),
        Insight::Good => format!("{name} is performing exceptionally well with minimal delay."),
    }
}

/// A human label for a column or level token.
#[must_use]
pub fn dimension_label(slug: &str) -> String {
    if slug.is_empty() {
        return "Select...".to_string();
    }
    let label = match slug.to_lowercase().as_str() {
        "year" | "annee" => Some("Year"),
        "month" | "mois" => Some("Month"),
        "saison" => Some("Season"),
        "categorie" => Some("Category"),
        "produit" => Some("Product"),
        "fournisseur" => Some("Supplier"),
        "client" => Some("Client"),
        "pays" => Some("Country"),
        "employe" => Some("Employee"),
        "departement" => Some("Department"),
        "all" => Some("All"),
        _ => None,
    };
    if let Some(label) = label {
        return label.to_string();
    }
    Dimension::for_column(slug)
        .or_else(|| slug.parse::<Dimension>().ok())
        .map_or_else(|| slug.to_uppercase(), |dim| dim.name().to_string())
}
