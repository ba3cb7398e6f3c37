//! Maps logical dimension attribute names onto the column names a result set
//! actually carries.
//!
//! The service is not consistent about casing or naming (`year` may come back
//! as `ANNEE_ID`), so resolution falls through exact, alias and substring
//! matching. A name that matches nothing comes back as
//! [`Resolution::Unresolved`] rather than silently echoing the input.

use tracing::debug;

/// Known synonyms per canonical logical name, searched by exact or substring
/// match (both case-insensitive).
const ALIASES: &[(&str, &[&str])] = &[
    ("year", &["annee", "year", "yr", "an", "date_id"]),
    ("month", &["mois", "month", "mon", "month_id"]),
    ("saison", &["season", "sais", "trimestre"]),
    ("week", &["semaine"]),
    ("day", &["jour"]),
    ("client", &["cli_nom", "customer"]),
    ("product", &["produit", "libelle_produit"]),
    ("country", &["pays"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    Unresolved(String),
}

impl Resolution {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    #[must_use]
    pub fn resolved(self) -> Option<String> {
        match self {
            Resolution::Resolved(name) => Some(name),
            Resolution::Unresolved(_) => None,
        }
    }

    /// The resolved column, or the original input when nothing matched.
    #[must_use]
    pub fn into_name(self) -> String {
        match self {
            Resolution::Resolved(name) | Resolution::Unresolved(name) => name,
        }
    }
}

/// Resolves one logical name against `available`.
///
/// Priority: case-insensitive exact match, then the alias table, then a
/// case-insensitive substring match. At each stage the first column in
/// `available` order wins.
#[must_use]
pub fn resolve<S: AsRef<str>>(logical: &str, available: &[S]) -> Resolution {
    if logical.is_empty() {
        return Resolution::Unresolved(String::new());
    }
    let norm = logical.to_lowercase();
    let lowered: Vec<String> = available.iter().map(|c| c.as_ref().to_lowercase()).collect();
    let pick = |idx: usize| Resolution::Resolved(available[idx].as_ref().to_string());

    if let Some(idx) = lowered.iter().position(|col| *col == norm) {
        return pick(idx);
    }

    if let Some((_, synonyms)) = ALIASES.iter().find(|(canonical, _)| *canonical == norm) {
        if let Some(idx) = lowered
            .iter()
            .position(|col| synonyms.iter().any(|a| col.as_str() == *a || col.contains(*a)))
        {
            return pick(idx);
        }
    }

    if let Some(idx) = lowered.iter().position(|col| col.contains(&norm)) {
        return pick(idx);
    }

    debug!("column '{}' not found among {:?}", logical, lowered);
    Resolution::Unresolved(logical.to_string())
}

/// Resolves each `+`-separated part of a level token, dropping the parts
/// that match nothing. Order is preserved and each column appears once, even
/// when several parts land on it.
#[must_use]
pub fn resolve_compound<S: AsRef<str>>(level: &str, available: &[S]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for part in level.split('+').map(str::trim).filter(|part| !part.is_empty()) {
        if let Some(col) = resolve(part, available).resolved() {
            if !columns.contains(&col) {
                columns.push(col);
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_ignores_case() {
        assert_eq!(
            resolve("YEAR", &["month", "Year"]),
            Resolution::Resolved("Year".to_string())
        );
    }

    #[test]
    fn alias_matches_by_substring() {
        assert_eq!(
            resolve("year", &["ANNEE_ID", "LIBELLE"]),
            Resolution::Resolved("ANNEE_ID".to_string())
        );
        assert_eq!(
            resolve("country", &["CODE_CLIENT", "PAYS"]),
            Resolution::Resolved("PAYS".to_string())
        );
    }

    #[test]
    fn falls_back_to_substring_of_logical_name() {
        assert_eq!(
            resolve("pays", &["NUM_PAYS", "CODE_CLIENT"]),
            Resolution::Resolved("NUM_PAYS".to_string())
        );
    }

    #[test]
    fn unmatched_name_is_reported_unresolved() {
        let res = resolve("nonexistent", &["A", "B"]);
        assert!(!res.is_resolved());
        assert_eq!(res.into_name(), "nonexistent");
        assert_eq!(resolve("", &["A"]), Resolution::Unresolved(String::new()));
    }

    #[test]
    fn first_column_wins_within_a_stage() {
        assert_eq!(
            resolve("mois", &["mois_debut", "mois_fin"]),
            Resolution::Resolved("mois_debut".to_string())
        );
    }

    #[test]
    fn exact_match_beats_alias() {
        assert_eq!(
            resolve("year", &["annee", "year"]),
            Resolution::Resolved("year".to_string())
        );
    }

    #[test]
    fn compound_levels_resolve_part_by_part() {
        let cols = ["PAYS", "CLIENT_NOM"];
        assert_eq!(resolve_compound("pays+client", &cols), vec!["PAYS", "CLIENT_NOM"]);
        assert_eq!(resolve_compound("pays+region", &cols), vec!["PAYS"]);
        assert!(resolve_compound("ALL", &["year"]).is_empty());
    }

    #[test]
    fn compound_parts_sharing_a_column_yield_it_once() {
        assert_eq!(
            resolve_compound("categorie+produit", &["categorie_produit"]),
            vec!["categorie_produit"]
        );
        assert_eq!(
            resolve_compound("categorie+produit+fournisseur", &["fournisseur", "categorie_produit"]),
            vec!["categorie_produit", "fournisseur"]
        );
    }
}
