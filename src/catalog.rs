use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// One of the four independent axes the service aggregates over.
///
/// The serialized form is the key the analysis service expects in its
/// request body.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug)]
pub enum Dimension {
    #[serde(rename = "temp")]
    Time,
    #[serde(rename = "emp")]
    Staff,
    #[serde(rename = "prod")]
    Product,
    #[serde(rename = "clie")]
    Client,
}

pub const DIMENSIONS: [Dimension; 4] = [
    Dimension::Time,
    Dimension::Staff,
    Dimension::Product,
    Dimension::Client,
];

/// A grouping granularity within a dimension.
///
/// Every level but [`Level::All`] groups by one or more attributes, written
/// joined with `+` in the token (`year+month`). Serde goes through
/// [`Level::token`] and [`FromStr`].
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Level {
    All,
    Year,
    Season,
    Month,
    YearSeason,
    YearMonth,
    Department,
    Employee,
    DepartmentEmployee,
    Category,
    Product,
    Supplier,
    CategoryProduct,
    SupplierProduct,
    CategoryProductSupplier,
    Country,
    Client,
    CountryClient,
}

pub const LEVELS: [Level; 18] = [
    Level::All,
    Level::Year,
    Level::Season,
    Level::Month,
    Level::YearSeason,
    Level::YearMonth,
    Level::Department,
    Level::Employee,
    Level::DepartmentEmployee,
    Level::Category,
    Level::Product,
    Level::Supplier,
    Level::CategoryProduct,
    Level::SupplierProduct,
    Level::CategoryProductSupplier,
    Level::Country,
    Level::Client,
    Level::CountryClient,
];

const TIME_LEVELS: &[Level] = &[Level::All, Level::Year, Level::YearSeason, Level::YearMonth];
const STAFF_LEVELS: &[Level] = &[Level::All, Level::Department, Level::DepartmentEmployee];
const CLIENT_LEVELS: &[Level] = &[Level::All, Level::Country, Level::CountryClient];
const CATEGORY_BRANCH: &[Level] = &[Level::All, Level::Category, Level::CategoryProduct];
const SUPPLIER_BRANCH: &[Level] = &[Level::All, Level::Supplier, Level::SupplierProduct];
const PRODUCT_BRANCHES: &[(BranchTag, &[Level])] = &[
    (BranchTag::Category, CATEGORY_BRANCH),
    (BranchTag::Supplier, SUPPLIER_BRANCH),
];

// Every level a user may pick directly, including those outside the
// navigable hierarchy.
const TIME_SELECTABLE: &[Level] = &[
    Level::All,
    Level::Year,
    Level::YearSeason,
    Level::YearMonth,
    Level::Season,
    Level::Month,
];
const STAFF_SELECTABLE: &[Level] = &[
    Level::All,
    Level::Employee,
    Level::Department,
    Level::DepartmentEmployee,
];
const PRODUCT_SELECTABLE: &[Level] = &[
    Level::All,
    Level::Category,
    Level::CategoryProduct,
    Level::Supplier,
    Level::SupplierProduct,
    Level::Product,
    Level::CategoryProductSupplier,
];
const CLIENT_SELECTABLE: &[Level] = &[
    Level::All,
    Level::Client,
    Level::Country,
    Level::CountryClient,
];

impl Level {
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Level::All => "ALL",
            Level::Year => "year",
            Level::Season => "saison",
            Level::Month => "month",
            Level::YearSeason => "year+saison",
            Level::YearMonth => "year+month",
            Level::Department => "DEPARTEMENT",
            Level::Employee => "EMPLOYE",
            Level::DepartmentEmployee => "DEPARTEMENT+EMPLOYE",
            Level::Category => "categorie",
            Level::Product => "produit",
            Level::Supplier => "fournisseur",
            Level::CategoryProduct => "categorie+produit",
            Level::SupplierProduct => "fournisseur+produit",
            Level::CategoryProductSupplier => "categorie+produit+fournisseur",
            Level::Country => "pays",
            Level::Client => "client",
            Level::CountryClient => "pays+client",
        }
    }

    #[must_use]
    pub fn is_all(self) -> bool {
        self == Level::All
    }

    /// The grouping attributes of this level, in token order. Empty for `ALL`.
    #[must_use]
    pub fn attributes(self) -> Vec<&'static str> {
        if self.is_all() {
            Vec::new()
        } else {
            self.token().split('+').collect()
        }
    }

    /// The dimension whose selectable levels include this one, if any.
    ///
    /// `ALL` belongs to every dimension and therefore to none in particular.
    #[must_use]
    pub fn dimension(self) -> Option<Dimension> {
        if self.is_all() {
            return None;
        }
        DIMENSIONS
            .into_iter()
            .find(|dim| dim.selectable_levels().contains(&self))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Level {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        LEVELS
            .into_iter()
            .find(|level| level.token().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::UnknownLevel(s.to_string()))
    }
}

impl From<Level> for &'static str {
    fn from(level: Level) -> Self {
        level.token()
    }
}

impl TryFrom<String> for Level {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The two parallel drill paths of the product dimension.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[serde(rename_all = "lowercase")]
pub enum BranchTag {
    Category,
    Supplier,
}

impl BranchTag {
    #[must_use]
    pub fn levels(self) -> &'static [Level] {
        match self {
            BranchTag::Category => CATEGORY_BRANCH,
            BranchTag::Supplier => SUPPLIER_BRANCH,
        }
    }

    /// The first level below `ALL` on this branch.
    #[must_use]
    pub fn entry_level(self) -> Level {
        match self {
            BranchTag::Category => Level::Category,
            BranchTag::Supplier => Level::Supplier,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            BranchTag::Category => "By Category",
            BranchTag::Supplier => "By Supplier",
        }
    }
}

impl FromStr for BranchTag {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" | "categorie" => Ok(BranchTag::Category),
            "supplier" | "fournisseur" => Ok(BranchTag::Supplier),
            other => Err(ParseError::UnknownBranch(other.to_string())),
        }
    }
}

/// The shape of a dimension's roll-up/drill-down structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hierarchy {
    Linear(&'static [Level]),
    Branching {
        /// The level shared by every branch; descending from it needs a choice.
        entry: Level,
        branches: &'static [(BranchTag, &'static [Level])],
    },
}

impl Hierarchy {
    /// The ordered level array navigation should use when currently at
    /// `current`. `None` when `current` sits on no branch at all.
    #[must_use]
    pub fn levels_for(&self, current: Level) -> Option<&'static [Level]> {
        match self {
            Hierarchy::Linear(levels) => Some(*levels),
            Hierarchy::Branching { .. } => branch_for(current).map(BranchTag::levels),
        }
    }
}

/// Picks the product branch a level belongs to, by its leading attribute.
///
/// `ALL` defaults to the category branch. Callers that navigate downwards
/// from `ALL` must not rely on this default; see
/// [`crate::navigator::navigate`].
#[must_use]
pub fn branch_for(current: Level) -> Option<BranchTag> {
    if current.is_all() {
        return Some(BranchTag::Category);
    }
    match current.attributes().first() {
        Some(&"categorie") => Some(BranchTag::Category),
        Some(&"fournisseur") => Some(BranchTag::Supplier),
        _ => None,
    }
}

impl Dimension {
    /// The key used on the wire (`temp`, `emp`, `prod`, `clie`).
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Dimension::Time => "temp",
            Dimension::Staff => "emp",
            Dimension::Product => "prod",
            Dimension::Client => "clie",
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Dimension::Time => "Time",
            Dimension::Staff => "Staff",
            Dimension::Product => "Product",
            Dimension::Client => "Client",
        }
    }

    #[must_use]
    pub fn hierarchy(self) -> Hierarchy {
        match self {
            Dimension::Time => Hierarchy::Linear(TIME_LEVELS),
            Dimension::Staff => Hierarchy::Linear(STAFF_LEVELS),
            Dimension::Client => Hierarchy::Linear(CLIENT_LEVELS),
            Dimension::Product => Hierarchy::Branching {
                entry: Level::All,
                branches: PRODUCT_BRANCHES,
            },
        }
    }

    #[must_use]
    pub fn selectable_levels(self) -> &'static [Level] {
        match self {
            Dimension::Time => TIME_SELECTABLE,
            Dimension::Staff => STAFF_SELECTABLE,
            Dimension::Product => PRODUCT_SELECTABLE,
            Dimension::Client => CLIENT_SELECTABLE,
        }
    }

    /// Maps a result column (or level token) back to the dimension it groups.
    ///
    /// Matching is case-insensitive, so service columns such as `departement`
    /// resolve to [`Dimension::Staff`].
    #[must_use]
    pub fn for_column(column: &str) -> Option<Dimension> {
        column.parse::<Level>().ok().and_then(Level::dimension)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        DIMENSIONS
            .into_iter()
            .find(|dim| dim.key().eq_ignore_ascii_case(s) || dim.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::UnknownDimension(s.to_string()))
    }
}
