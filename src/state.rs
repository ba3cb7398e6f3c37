use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    catalog::{Dimension, Level, DIMENSIONS},
    error::StateError,
    record::OlapRecord,
};

/// Filter constraints keyed by resolved column name.
pub type FilterMap = BTreeMap<String, String>;

/// Separator between `column: value` pairs in drill path labels.
const LABEL_SEPARATOR: &str = " | ";

/// One level per dimension: the grouping granularity requested from the
/// analysis service.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub temp: Level,
    pub clie: Level,
    pub emp: Level,
    pub prod: Level,
}

impl Default for Selection {
    /// The finest navigable level on every dimension.
    fn default() -> Self {
        Self {
            temp: Level::YearMonth,
            clie: Level::CountryClient,
            emp: Level::DepartmentEmployee,
            prod: Level::CategoryProduct,
        }
    }
}

impl Selection {
    /// The selection a reset returns to: yearly totals, nothing else grouped.
    #[must_use]
    pub fn baseline() -> Self {
        Self {
            temp: Level::Year,
            clie: Level::All,
            emp: Level::All,
            prod: Level::All,
        }
    }

    #[must_use]
    pub fn level(&self, dimension: Dimension) -> Level {
        match dimension {
            Dimension::Time => self.temp,
            Dimension::Staff => self.emp,
            Dimension::Product => self.prod,
            Dimension::Client => self.clie,
        }
    }

    #[must_use]
    pub fn with(mut self, dimension: Dimension, level: Level) -> Self {
        match dimension {
            Dimension::Time => self.temp = level,
            Dimension::Staff => self.emp = level,
            Dimension::Product => self.prod = level,
            Dimension::Client => self.clie = level,
        }
        self
    }

    /// Whether every dimension is aggregated away. Never a valid request.
    #[must_use]
    pub fn is_all(&self) -> bool {
        DIMENSIONS.into_iter().all(|dim| self.level(dim).is_all())
    }

    /// Number of dimensions that group by at least one attribute.
    #[must_use]
    pub fn grouped_count(&self) -> usize {
        DIMENSIONS
            .into_iter()
            .filter(|dim| !self.level(*dim).is_all())
            .count()
    }
}

/// A breadcrumb pushed on every drill-down into a data point.
///
/// Only `selection` matters when drilling back up; `label` is for display.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DrillPathItem {
    pub selection: Selection,
    pub label: String,
}

/// The level one step finer than `level` when drilling into a data point
/// of `dimension`. `None` when the drill does not apply.
#[must_use]
pub fn drill_target(dimension: Dimension, level: Level) -> Option<Level> {
    match (dimension, level) {
        (Dimension::Time, Level::All) => Some(Level::Year),
        (Dimension::Time, Level::Year) => Some(Level::YearSeason),
        (Dimension::Time, Level::YearSeason) => Some(Level::YearMonth),
        (Dimension::Staff, Level::Department) => Some(Level::DepartmentEmployee),
        (Dimension::Product, Level::Category) => Some(Level::CategoryProduct),
        (Dimension::Product, Level::Supplier) => Some(Level::SupplierProduct),
        (Dimension::Client, Level::Country) => Some(Level::CountryClient),
        _ => None,
    }
}

/// Builds the human-readable breadcrumb for `record`, one `column: value`
/// pair per reported dimension column.
#[must_use]
pub fn drill_label<S: AsRef<str>>(record: &OlapRecord, dimension_columns: &[S]) -> String {
    dimension_columns
        .iter()
        .map(|col| format!("{}: {}", col.as_ref(), record.text(col.as_ref())))
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR)
}

/// Owns the selection, the filters and the drill path.
///
/// Every change to the selection or the filters bumps `revision`, which is
/// what tells the session a refetch is due.
#[derive(Clone, Debug)]
pub struct QueryState {
    selection: Selection,
    filters: FilterMap,
    drill_path: Vec<DrillPathItem>,
    revision: u64,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            selection: Selection::default(),
            filters: FilterMap::new(),
            drill_path: Vec::new(),
            revision: 0,
        }
    }
}

impl QueryState {
    /// Starts from `selection`, refusing one that aggregates every dimension
    /// away or puts a level on a dimension that does not offer it.
    pub fn new(selection: Selection) -> Result<Self, StateError> {
        for dimension in DIMENSIONS {
            let level = selection.level(dimension);
            if !dimension.selectable_levels().contains(&level) {
                return Err(StateError::UnknownLevel { dimension, level });
            }
        }
        if selection.is_all() {
            return Err(StateError::InvalidSelection);
        }
        Ok(Self {
            selection,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn filters(&self) -> &FilterMap {
        &self.filters
    }

    #[must_use]
    pub fn drill_path(&self) -> &[DrillPathItem] {
        &self.drill_path
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn commit(&mut self, selection: Selection) {
        if selection != self.selection {
            self.selection = selection;
            self.touch();
        }
    }

    /// Replaces the level of one dimension.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownLevel`] if `level` is not offered by
    /// `dimension`, and [`StateError::InvalidSelection`] if the result would
    /// have every dimension at `ALL`. The state is unchanged in both cases.
    pub fn set_level(&mut self, dimension: Dimension, level: Level) -> Result<(), StateError> {
        if !dimension.selectable_levels().contains(&level) {
            return Err(StateError::UnknownLevel { dimension, level });
        }
        let candidate = self.selection.with(dimension, level);
        if candidate.is_all() {
            warn!("Rejected selection: {} would leave every dimension at ALL", dimension);
            return Err(StateError::InvalidSelection);
        }
        self.commit(candidate);
        Ok(())
    }

    /// Drills one level deeper on `dimension`, remembering the current
    /// selection so [`QueryState::drill_up`] can restore it.
    ///
    /// A level with no finer drill target leaves the selection as it is; the
    /// breadcrumb is still recorded.
    ///
    /// # Errors
    ///
    /// Propagates the validation of [`QueryState::set_level`]; nothing is
    /// pushed when it fails.
    pub fn drill_into<S: AsRef<str>>(
        &mut self,
        record: &OlapRecord,
        dimension_columns: &[S],
        dimension: Dimension,
    ) -> Result<Level, StateError> {
        let snapshot = DrillPathItem {
            selection: self.selection,
            label: drill_label(record, dimension_columns),
        };
        let current = self.selection.level(dimension);
        let target = drill_target(dimension, current).unwrap_or(current);
        self.set_level(dimension, target)?;
        debug!("Drilled into {} ({} -> {})", snapshot.label, current, target);
        self.drill_path.push(snapshot);
        Ok(target)
    }

    /// Pops the latest breadcrumb and restores its selection verbatim.
    pub fn drill_up(&mut self) -> Option<DrillPathItem> {
        let item = self.drill_path.pop()?;
        self.commit(item.selection);
        Some(item)
    }

    /// Clears filters and the drill path, and returns to the baseline
    /// selection.
    pub fn reset(&mut self) {
        self.filters.clear();
        self.drill_path.clear();
        self.selection = Selection::baseline();
        self.touch();
    }

    pub fn set_filter(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let previous = self.filters.insert(column.into(), value.clone());
        if previous.as_ref() != Some(&value) {
            self.touch();
        }
    }

    pub fn clear_filter(&mut self, column: &str) -> bool {
        let removed = self.filters.remove(column).is_some();
        if removed {
            self.touch();
        }
        removed
    }

    /// Replaces every constraint on `columns` with `constraints` as one
    /// change. Empty `constraints` clear the slicer.
    pub fn apply_slice<S: AsRef<str>>(&mut self, columns: &[S], constraints: &[(String, String)]) {
        let mut next = self.filters.clone();
        for col in columns {
            next.remove(col.as_ref());
        }
        next.extend(constraints.iter().cloned());
        if next != self.filters {
            self.filters = next;
            self.touch();
        }
    }
}
