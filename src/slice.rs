//! Filter value sets derived from the currently loaded records.

use std::{cmp::Ordering, collections::BTreeMap, fmt};

use tracing::warn;

use crate::{
    catalog::Level,
    record::OlapRecord,
    resolver::resolve_compound,
    state::FilterMap,
};

/// Joins the per-column parts of a composite option.
pub const COMPOSITE_SEPARATOR: &str = " › ";

/// What the user picked in a slicer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SliceChoice {
    /// "(All)": drop every constraint of the slicer.
    All,
    Value(String),
}

/// One value a slicer offers, with the constraints picking it applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SliceOption {
    /// The non-empty column values joined by [`COMPOSITE_SEPARATOR`].
    pub label: String,
    /// One `column = value` pair per non-empty part, in column order.
    pub constraints: Vec<(String, String)>,
}

impl fmt::Display for SliceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// The distinct, sorted values available for filtering on `columns`.
///
/// With one column this is the set of its trimmed, non-empty values. With
/// several, each record contributes one composite option made of its
/// non-empty column values joined by [`COMPOSITE_SEPARATOR`]. Each option
/// keeps the columns its parts came from; when two records yield the same
/// label the first one wins.
#[must_use]
pub fn options_for<S: AsRef<str>>(columns: &[S], records: &[OlapRecord]) -> Vec<SliceOption> {
    if columns.is_empty() {
        return Vec::new();
    }
    let mut distinct: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for rec in records {
        let constraints: Vec<(String, String)> = columns
            .iter()
            .map(|col| (col.as_ref().to_string(), rec.text(col.as_ref())))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        if constraints.is_empty() {
            continue;
        }
        let label = constraints
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join(COMPOSITE_SEPARATOR);
        distinct.entry(label).or_insert(constraints);
    }
    let options = distinct
        .into_iter()
        .map(|(label, constraints)| SliceOption { label, constraints })
        .collect();
    sort_options(options)
}

/// Sorts numerically by label when every label parses as a number,
/// otherwise lexicographically.
fn sort_options(mut options: Vec<SliceOption>) -> Vec<SliceOption> {
    let numbers: Option<Vec<f64>> = options
        .iter()
        .map(|o| o.label.parse::<f64>().ok().filter(|n| n.is_finite()))
        .collect();
    match numbers {
        Some(numbers) => {
            let mut pairs: Vec<(f64, SliceOption)> = numbers.into_iter().zip(options).collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
            pairs.into_iter().map(|(_, o)| o).collect()
        }
        None => {
            options.sort_by(|a, b| a.label.cmp(&b.label));
            options
        }
    }
}

/// A filter control bound to one dimension level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slicer {
    pub level: Level,
    /// The result columns backing the level, in attribute order.
    pub columns: Vec<String>,
}

impl Slicer {
    /// Binds `level` to the columns of the loaded data. The slicer has no
    /// columns when the level is `ALL` or none of its attributes resolve.
    #[must_use]
    pub fn for_level<S: AsRef<str>>(level: Level, available: &[S]) -> Self {
        let columns = if level.is_all() {
            Vec::new()
        } else {
            resolve_compound(level.token(), available)
        };
        if columns.is_empty() && !level.is_all() {
            warn!("No result column backs level '{}'; offering no slice values", level);
        }
        Self { level, columns }
    }

    #[must_use]
    pub fn options(&self, records: &[OlapRecord]) -> Vec<SliceOption> {
        options_for(&self.columns, records)
    }

    /// The constraints `choice` stands for. `All` clears the slicer. A value
    /// must be one of the options offered by `records`, except on a
    /// single-column slicer, where any value constrains that column. `None`
    /// when the value cannot be placed.
    #[must_use]
    pub fn constraints(
        &self,
        records: &[OlapRecord],
        choice: &SliceChoice,
    ) -> Option<Vec<(String, String)>> {
        let value = match choice {
            SliceChoice::All => return Some(Vec::new()),
            SliceChoice::Value(value) => value,
        };
        if let Some(option) = self
            .options(records)
            .into_iter()
            .find(|option| option.label == *value)
        {
            return Some(option.constraints);
        }
        match self.columns.as_slice() {
            [column] => Some(vec![(column.clone(), value.clone())]),
            _ => None,
        }
    }

    /// The option currently selected through `filters`, if any.
    #[must_use]
    pub fn active(&self, filters: &FilterMap) -> Option<String> {
        let parts: Vec<&str> = self
            .columns
            .iter()
            .filter_map(|col| filters.get(col).map(String::as_str))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(COMPOSITE_SEPARATOR))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn records(value: serde_json::Value) -> Vec<OlapRecord> {
        serde_json::from_value(value).unwrap()
    }

    fn labels(options: &[SliceOption]) -> Vec<&str> {
        options.iter().map(|o| o.label.as_str()).collect()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(c, v)| ((*c).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn single_column_options_are_trimmed_unique_and_sorted() {
        let recs = records(json!([
            { "pays": " USA " },
            { "pays": "France" },
            { "pays": "USA" },
            { "pays": "" },
            { "pays": null },
            { "client": "TechCorp" },
        ]));
        let options = options_for(&["pays"], &recs);
        assert_eq!(labels(&options), vec!["France", "USA"]);
        assert_eq!(options[1].constraints, pairs(&[("pays", "USA")]));
    }

    #[test]
    fn numeric_values_sort_numerically() {
        let recs = records(json!([{ "year": 2024 }, { "year": "10" }, { "year": 9.5 }]));
        assert_eq!(labels(&options_for(&["year"], &recs)), vec!["9.5", "10", "2024"]);

        let mixed = records(json!([{ "m": "10" }, { "m": "9" }, { "m": "Jan" }]));
        assert_eq!(labels(&options_for(&["m"], &mixed)), vec!["10", "9", "Jan"]);
    }

    #[test]
    fn key_casing_falls_back_per_record() {
        let recs = records(json!([{ "PAYS": "UK" }, { "pays": "France" }]));
        assert_eq!(labels(&options_for(&["pays"], &recs)), vec!["France", "UK"]);
    }

    #[test]
    fn composite_options_join_columns() {
        let recs = records(json!([
            { "cat": "X", "prod": "A" },
            { "cat": "X", "prod": "B" },
            { "cat": "Y", "prod": "A" },
            { "cat": "X", "prod": "A" },
        ]));
        let options = options_for(&["cat", "prod"], &recs);
        assert_eq!(labels(&options), vec!["X › A", "X › B", "Y › A"]);
        assert_eq!(options[0].constraints, pairs(&[("cat", "X"), ("prod", "A")]));
    }

    #[test]
    fn composite_skips_empty_parts() {
        let recs = records(json!([{ "cat": "X", "prod": "" }, { "cat": "", "prod": "" }]));
        let options = options_for(&["cat", "prod"], &recs);
        assert_eq!(labels(&options), vec!["X"]);
        assert_eq!(options[0].constraints, pairs(&[("cat", "X")]));
    }

    #[test]
    fn empty_leading_part_keeps_its_own_column() {
        let recs = records(json!([{ "cat": "", "prod": "A" }, { "cat": "X", "prod": "B" }]));
        let slicer = Slicer {
            level: Level::CategoryProduct,
            columns: vec!["cat".to_string(), "prod".to_string()],
        };
        assert_eq!(labels(&slicer.options(&recs)), vec!["A", "X › B"]);
        assert_eq!(
            slicer.constraints(&recs, &SliceChoice::Value("A".to_string())),
            Some(pairs(&[("prod", "A")]))
        );
        assert_eq!(
            slicer.constraints(&recs, &SliceChoice::Value("X › B".to_string())),
            Some(pairs(&[("cat", "X"), ("prod", "B")]))
        );
    }

    #[test]
    fn choices_map_to_constraints() {
        let recs = records(json!([{ "client": "A › B" }, { "client": "TechCorp" }]));
        let single = Slicer {
            level: Level::Client,
            columns: vec!["client".to_string()],
        };
        assert_eq!(single.constraints(&recs, &SliceChoice::All), Some(Vec::new()));
        assert_eq!(
            single.constraints(&recs, &SliceChoice::Value("A › B".to_string())),
            Some(pairs(&[("client", "A › B")]))
        );
        assert_eq!(
            single.constraints(&recs, &SliceChoice::Value("Unlisted".to_string())),
            Some(pairs(&[("client", "Unlisted")]))
        );

        let composite = Slicer {
            level: Level::CountryClient,
            columns: vec!["pays".to_string(), "client".to_string()],
        };
        assert_eq!(
            composite.constraints(&recs, &SliceChoice::Value("France › Nobody".to_string())),
            None
        );
    }

    #[test]
    fn slicer_resolves_level_columns() {
        let available = ["categorie", "produit", "pays"];
        let slicer = Slicer::for_level(Level::CategoryProduct, &available);
        assert_eq!(slicer.columns, vec!["categorie", "produit"]);

        let mut filters = FilterMap::new();
        assert_eq!(slicer.active(&filters), None);
        filters.insert("categorie".to_string(), "Furniture".to_string());
        filters.insert("produit".to_string(), "Desk Chair".to_string());
        assert_eq!(slicer.active(&filters).as_deref(), Some("Furniture › Desk Chair"));
    }

    #[test]
    fn unresolved_slicer_offers_nothing() {
        let recs = records(json!([{ "pays": "UK" }]));
        let slicer = Slicer::for_level(Level::Supplier, &["pays"]);
        assert!(slicer.columns.is_empty());
        assert!(slicer.options(&recs).is_empty());
        assert!(Slicer::for_level(Level::All, &["pays"]).columns.is_empty());
    }
}
