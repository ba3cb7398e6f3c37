//! The exploration session: query state, the loaded data set and the
//! single user-visible error message, kept consistent across fetches.

use anyhow::Result;
use tracing::{debug, error, info};

use crate::{
    catalog::{BranchTag, Dimension, Level},
    error::{ServiceError, StateError},
    navigator::{self, Affordances, Direction, Navigation},
    record::{OlapRecord, ResultSet},
    service::{AnalyseRequest, AnalyseResponse, DataService},
    slice::{SliceChoice, SliceOption, Slicer},
    state::{DrillPathItem, FilterMap, QueryState, Selection},
};

/// A fetch that has been started but not yet applied.
///
/// Only the ticket of the most recently started fetch can update the data
/// set; older tickets are discarded on completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    revision: u64,
    pub request: AnalyseRequest,
}

impl FetchTicket {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { records: usize },
    /// The previous data set stays displayed.
    Failed(ServiceError),
    /// A newer fetch was started meanwhile; the response was dropped.
    Stale,
}

#[derive(Debug)]
pub struct Explorer {
    state: QueryState,
    data: ResultSet,
    error: Option<String>,
    generation: u64,
    requested_revision: Option<u64>,
    loading: bool,
}

impl Default for Explorer {
    fn default() -> Self {
        Self::with_state(QueryState::default())
    }
}

impl Explorer {
    /// # Errors
    ///
    /// Returns an error if `selection` is not a valid starting point.
    pub fn new(selection: Selection) -> Result<Self, StateError> {
        Ok(Self::with_state(QueryState::new(selection)?))
    }

    fn with_state(state: QueryState) -> Self {
        Self {
            state,
            data: ResultSet::default(),
            error: None,
            generation: 0,
            requested_revision: None,
            loading: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &QueryState {
        &self.state
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        self.state.selection()
    }

    #[must_use]
    pub fn filters(&self) -> &FilterMap {
        self.state.filters()
    }

    #[must_use]
    pub fn drill_path(&self) -> &[DrillPathItem] {
        self.state.drill_path()
    }

    #[must_use]
    pub fn data(&self) -> &ResultSet {
        &self.data
    }

    /// The current user-visible error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether the selection or the filters changed since the last fetch
    /// was started.
    #[must_use]
    pub fn needs_fetch(&self) -> bool {
        self.requested_revision != Some(self.state.revision())
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        let revision = self.state.revision();
        self.requested_revision = Some(revision);
        FetchTicket {
            generation: self.generation,
            revision,
            request: AnalyseRequest::from_state(&self.state),
        }
    }

    /// Applies the result of the fetch identified by `ticket`, unless a
    /// newer fetch has been started since.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<AnalyseResponse>,
    ) -> FetchOutcome {
        if ticket.generation != self.generation {
            debug!(
                "Discarding stale response (generation {} < {})",
                ticket.generation, self.generation
            );
            return FetchOutcome::Stale;
        }
        self.loading = false;

        let loaded = match result {
            Ok(resp) => resp.into_result_set(),
            Err(e) => Err(ServiceError::Transport(format!("{e:#}"))),
        };
        match loaded {
            Ok(data) => {
                info!(
                    "Loaded {} records for revision {}",
                    data.len(),
                    ticket.revision
                );
                let records = data.len();
                self.data = data;
                FetchOutcome::Applied { records }
            }
            Err(e) => {
                error!("Problem while fetching analysis data: {}", e);
                self.error = Some(e.to_string());
                FetchOutcome::Failed(e)
            }
        }
    }

    /// Runs one fetch against `service` for the current state.
    pub async fn refresh<S: DataService + ?Sized>(&mut self, service: &S) -> FetchOutcome {
        let ticket = self.begin_fetch();
        let result = service.analyse(&ticket.request).await;
        self.complete_fetch(ticket, result)
    }

    /// Refetches only when the selection or the filters changed.
    pub async fn sync<S: DataService + ?Sized>(&mut self, service: &S) -> Option<FetchOutcome> {
        if self.needs_fetch() {
            Some(self.refresh(service).await)
        } else {
            None
        }
    }

    fn report(&mut self, e: &StateError) {
        self.error = Some(e.to_string());
    }

    /// Sets the level of one dimension. On rejection the error message is
    /// set and the selection is left as it was.
    pub fn set_level(&mut self, dimension: Dimension, level: Level) -> bool {
        match self.state.set_level(dimension, level) {
            Ok(()) => {
                self.error = None;
                true
            }
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    /// Takes one roll-up or drill-down step. An ambiguous descent is
    /// returned untouched for the caller to resolve with
    /// [`Explorer::choose_branch`].
    pub fn navigate(&mut self, dimension: Dimension, direction: Direction) -> Navigation {
        let step = navigator::navigate(dimension, self.state.selection(), direction);
        if let Navigation::Moved(level) = step {
            if !self.set_level(dimension, level) {
                return Navigation::Unchanged(self.state.selection().level(dimension));
            }
        }
        step
    }

    pub fn choose_branch(&mut self, branch: BranchTag) -> bool {
        self.set_level(Dimension::Product, navigator::descend_branch(branch))
    }

    pub fn affordances(&self, dimension: Dimension) -> Affordances {
        navigator::affordances(dimension, self.state.selection())
    }

    /// Drills into `record` along `dimension`. Returns the new level, or
    /// `None` when the drill was rejected.
    pub fn drill_into(&mut self, record: &OlapRecord, dimension: Dimension) -> Option<Level> {
        let columns = self.data.columns();
        match self.state.drill_into(record, &columns, dimension) {
            Ok(level) => {
                self.error = None;
                Some(level)
            }
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    pub fn drill_up(&mut self) -> Option<DrillPathItem> {
        self.state.drill_up()
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.error = None;
    }

    pub fn set_filter(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.state.set_filter(column, value);
    }

    pub fn clear_filter(&mut self, column: &str) -> bool {
        self.state.clear_filter(column)
    }

    /// The slicer for the current level of `dimension`, bound to the columns
    /// of the loaded data.
    #[must_use]
    pub fn slicer(&self, dimension: Dimension) -> Slicer {
        Slicer::for_level(self.state.selection().level(dimension), &self.data.columns())
    }

    #[must_use]
    pub fn slice_options(&self, dimension: Dimension) -> Vec<SliceOption> {
        self.slicer(dimension).options(&self.data.records)
    }

    /// Applies a slicer choice for `dimension`, replacing whatever the slicer
    /// constrained before. Returns `false` when no column backs the current
    /// level or the value is not among the loaded options.
    pub fn pick_slice(&mut self, dimension: Dimension, choice: &SliceChoice) -> bool {
        let slicer = self.slicer(dimension);
        if slicer.columns.is_empty() {
            self.error = Some(format!(
                "the {} dimension has no column to filter on at level '{}'",
                dimension, slicer.level
            ));
            return false;
        }
        let Some(constraints) = slicer.constraints(&self.data.records, choice) else {
            if let SliceChoice::Value(value) = choice {
                self.error = Some(format!(
                    "'{}' is not a {} value in the loaded data",
                    value, dimension
                ));
            }
            return false;
        };
        self.state.apply_slice(&slicer.columns, &constraints);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::service::MockDataService;

    /// Answers with queued responses, in order.
    struct Scripted {
        responses: Mutex<VecDeque<Result<AnalyseResponse>>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<AnalyseResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl DataService for Scripted {
        async fn analyse(&self, _request: &AnalyseRequest) -> Result<AnalyseResponse> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no more responses")))
        }
    }

    fn ok(value: serde_json::Value) -> Result<AnalyseResponse> {
        Ok(serde_json::from_value(value).unwrap())
    }

    #[tokio::test]
    async fn branch_choice_after_rolling_product_up() {
        let service = MockDataService::new();
        let mut explorer = Explorer::default();
        assert_eq!(*explorer.selection(), Selection::default());
        assert!(matches!(
            explorer.sync(&service).await,
            Some(FetchOutcome::Applied { .. })
        ));
        assert!(explorer.sync(&service).await.is_none());

        assert!(explorer.set_level(Dimension::Product, Level::All));
        assert!(explorer.error().is_none());
        assert_eq!(
            explorer.navigate(Dimension::Product, Direction::Down),
            Navigation::AmbiguousBranch(vec![BranchTag::Category, BranchTag::Supplier])
        );
        assert_eq!(explorer.selection().prod, Level::All);
        assert!(explorer.affordances(Dimension::Product).needs_branch);

        assert!(explorer.set_level(Dimension::Product, Level::Category));
        assert!(explorer.needs_fetch());
        explorer.sync(&service).await;
        assert_eq!(
            explorer.data().dimension_columns,
            vec![
                "year", "month", "pays", "client", "departement", "employe", "categorie"
            ]
        );
    }

    #[tokio::test]
    async fn all_dimensions_at_all_is_reported_not_applied() {
        let service = MockDataService::new();
        let mut explorer = Explorer::new(Selection::baseline()).unwrap();
        explorer.refresh(&service).await;
        let before = *explorer.selection();

        assert!(!explorer.set_level(Dimension::Time, Level::All));
        assert_eq!(explorer.error(), Some("cannot set all dimensions to ALL"));
        assert_eq!(*explorer.selection(), before);
        assert!(!explorer.needs_fetch());

        assert_eq!(
            explorer.navigate(Dimension::Time, Direction::Up),
            Navigation::Unchanged(Level::Year)
        );
        assert!(explorer.set_level(Dimension::Client, Level::Country));
        assert!(explorer.error().is_none());
    }

    #[tokio::test]
    async fn drill_into_a_row_and_back() {
        let service = MockDataService::new();
        let mut explorer = Explorer::new(Selection::baseline()).unwrap();
        explorer.set_filter("pays", "France");
        explorer.refresh(&service).await;
        let start = *explorer.selection();

        let row = explorer.data().records[0].clone();
        assert_eq!(explorer.drill_into(&row, Dimension::Time), Some(Level::YearSeason));
        assert_eq!(explorer.drill_path()[0].label, "year: 2023");
        explorer.sync(&service).await;
        assert_eq!(explorer.data().dimension_columns, vec!["year", "saison"]);

        let item = explorer.drill_up().unwrap();
        assert_eq!(item.selection, start);
        assert_eq!(*explorer.selection(), start);
        assert_eq!(explorer.filters().get("pays").map(String::as_str), Some("France"));
        assert!(explorer.drill_up().is_none());
    }

    #[tokio::test]
    async fn slicing_narrows_the_next_fetch() {
        let service = MockDataService::new();
        let mut explorer = Explorer::default();
        explorer.set_level(Dimension::Time, Level::Year);
        explorer.set_level(Dimension::Staff, Level::All);
        explorer.set_level(Dimension::Client, Level::All);
        explorer.refresh(&service).await;

        let options = explorer.slice_options(Dimension::Product);
        assert!(options.iter().any(|o| o.label == "Furniture › Desk Chair"));
        assert!(explorer.pick_slice(
            Dimension::Product,
            &SliceChoice::Value("Furniture › Desk Chair".to_string())
        ));
        assert_eq!(explorer.filters().len(), 2);
        explorer.sync(&service).await;
        assert!(explorer
            .data()
            .records
            .iter()
            .all(|rec| rec.text("produit") == "Desk Chair"));

        assert!(explorer.pick_slice(Dimension::Product, &SliceChoice::All));
        assert!(explorer.filters().is_empty());

        let revision = explorer.state.revision();
        assert!(!explorer.pick_slice(
            Dimension::Product,
            &SliceChoice::Value("Nowhere › Nothing".to_string())
        ));
        assert!(explorer.filters().is_empty());
        assert_eq!(explorer.state.revision(), revision);
        assert!(explorer.error().is_some());

        assert!(!explorer.pick_slice(Dimension::Staff, &SliceChoice::All));
        assert!(explorer.error().is_some());
    }

    #[tokio::test]
    async fn failure_keeps_previous_data() {
        let service = Scripted::new(vec![
            ok(json!({
                "success": true,
                "data": [{ "year": "2023", "nombre_commandes": "5" }],
                "metadata": { "dimension_columns": ["year"] },
            })),
            ok(json!({ "success": false, "error": "ORA-00942: table or view does not exist" })),
            Err(anyhow!("connection refused")),
        ]);
        let mut explorer = Explorer::new(Selection::baseline()).unwrap();

        assert_eq!(explorer.refresh(&service).await, FetchOutcome::Applied { records: 1 });
        let loaded = explorer.data().clone();

        let outcome = explorer.refresh(&service).await;
        assert!(matches!(outcome, FetchOutcome::Failed(ServiceError::Rejected(_))));
        assert_eq!(explorer.error(), Some("ORA-00942: table or view does not exist"));
        assert_eq!(explorer.data(), &loaded);

        let outcome = explorer.refresh(&service).await;
        assert!(matches!(outcome, FetchOutcome::Failed(ServiceError::Transport(_))));
        assert_eq!(explorer.error(), Some("network error: connection refused"));
        assert_eq!(explorer.data(), &loaded);
        assert_eq!(*explorer.selection(), Selection::baseline());
        assert!(!explorer.is_loading());
    }

    #[test]
    fn last_started_fetch_wins() {
        let mut explorer = Explorer::new(Selection::baseline()).unwrap();
        let first = explorer.begin_fetch();
        explorer.set_level(Dimension::Client, Level::Country);
        let second = explorer.begin_fetch();
        assert!(second.generation() > first.generation());

        let newer = ok(json!({
            "success": true,
            "data": [{ "year": "2024", "pays": "UK", "nombre_commandes": 2 }],
            "metadata": { "dimension_columns": ["year", "pays"] },
        }));
        assert_eq!(
            explorer.complete_fetch(second, newer),
            FetchOutcome::Applied { records: 1 }
        );
        assert!(!explorer.is_loading());

        let older = ok(json!({
            "success": true,
            "data": [{ "year": "2023", "nombre_commandes": 9 }, { "year": "2024", "nombre_commandes": 1 }],
            "metadata": { "dimension_columns": ["year"] },
        }));
        assert_eq!(explorer.complete_fetch(first, older), FetchOutcome::Stale);
        assert_eq!(explorer.data().dimension_columns, vec!["year", "pays"]);
    }
}
