use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::aggregate::Selection;
use crate::paginate::{Page, Paginator};
use crate::recipe::{Category, RecipeRecord};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("page {requested} does not exist, there are {total} pages")]
    OutOfRange { requested: usize, total: usize },
}

/// Everything an aggregation run needs, captured when the run starts.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub generation: u64,
    pub selection: Selection,
    pub categories: Vec<Category>,
}

/// Browsing state of one chat. All changes go through the transition
/// methods; rendering reads a [`Snapshot`].
#[derive(Debug)]
pub struct Browser {
    categories: Vec<Category>,
    /// Selection the current records were loaded for.
    selection: Selection,
    /// Latest requested selection, committed once its run succeeds.
    pending: Selection,
    records: Vec<RecipeRecord>,
    current_page: usize,
    generation: u64,
    loading: bool,
    paginator: Paginator,
}

pub struct Snapshot<'a> {
    pub selection: &'a Selection,
    pub page: Page<'a, RecipeRecord>,
    pub loading: bool,
}

impl Default for Browser {
    fn default() -> Self {
        Browser {
            categories: Vec::new(),
            selection: Selection::All,
            pending: Selection::All,
            records: Vec::new(),
            current_page: 1,
            generation: 0,
            loading: false,
            paginator: Paginator::default(),
        }
    }
}

impl Browser {
    pub fn new() -> Self {
        Browser::default()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn pending_selection(&self) -> &Selection {
        &self.pending
    }

    pub fn records(&self) -> &[RecipeRecord] {
        &self.records
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn on_categories_loaded(&mut self, categories: Vec<Category>) -> LoadTicket {
        self.categories = categories;
        self.start_load()
    }

    pub fn on_category_selected(&mut self, selection: Selection) -> LoadTicket {
        self.pending = selection;
        self.start_load()
    }

    /// Drops the categories and records of this chat, as on a fresh
    /// `/start`. The generation counter keeps counting so runs started
    /// before the reset are still recognised as stale.
    pub fn reset(&mut self) {
        let generation = self.generation;
        *self = Browser {
            generation,
            ..Browser::default()
        };
    }

    fn start_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.loading = true;
        LoadTicket {
            generation: self.generation,
            selection: self.pending.clone(),
            categories: self.categories.clone(),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Replaces the record list with the result of run `generation`, commits
    /// its selection and goes back to the first page. Returns false, leaving
    /// the state untouched, when a newer run has started since.
    pub fn finish_load(&mut self, generation: u64, records: Vec<RecipeRecord>) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.selection = self.pending.clone();
        self.records = records;
        self.current_page = 1;
        self.loading = false;
        true
    }

    /// Marks run `generation` as failed. The previous records stay, along
    /// with the selection they were loaded for.
    pub fn fail_load(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.pending = self.selection.clone();
        self.loading = false;
        true
    }

    pub fn total_pages(&self) -> usize {
        self.paginator.total_pages(self.records.len())
    }

    pub fn go_to_page(&mut self, page: usize) -> Result<usize, PageError> {
        let total = self.total_pages();
        if page == 0 || page > total {
            return Err(PageError::OutOfRange {
                requested: page,
                total,
            });
        }
        self.current_page = page;
        Ok(page)
    }

    pub fn next_page(&mut self) -> Result<usize, PageError> {
        self.go_to_page(self.current_page + 1)
    }

    pub fn prev_page(&mut self) -> Result<usize, PageError> {
        self.go_to_page(self.current_page.saturating_sub(1))
    }

    /// Record at 1-based `position` in the whole list.
    pub fn record(&self, position: usize) -> Option<&RecipeRecord> {
        position
            .checked_sub(1)
            .and_then(|index| self.records.get(index))
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            selection: &self.selection,
            page: self.paginator.page(&self.records, self.current_page),
            loading: self.loading,
        }
    }
}

/// One [`Browser`] per chat. Entries live as long as the process; `/start`
/// resets a chat's browser instead of adding a new one, so a chat holds at
/// most one record list.
#[derive(Debug, Default)]
pub struct Sessions {
    browsers: Mutex<HashMap<i64, Browser>>,
}

impl Sessions {
    /// Runs `f` on the browser of `chat`, creating it on first use. The lock
    /// is held for the duration of `f` only.
    pub fn with<R>(&self, chat: i64, f: impl FnOnce(&mut Browser) -> R) -> R {
        let mut browsers = self.browsers.lock().unwrap_or_else(PoisonError::into_inner);
        f(browsers.entry(chat).or_insert_with(Browser::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::aggregate::tests::FakeSource;

    fn records(count: usize) -> Vec<RecipeRecord> {
        (0..count)
            .map(|i| RecipeRecord {
                id: i.to_string(),
                name: format!("Dish {}", i),
                thumbnail_url: None,
                instructions: None,
                ingredients: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn categories_loaded_starts_an_all_run() {
        let mut browser = Browser::new();
        let ticket = browser.on_categories_loaded(vec![Category {
            name: "Beef".to_string(),
        }]);
        assert_eq!(ticket.selection, Selection::All);
        assert_eq!(ticket.categories.len(), 1);
        assert!(browser.snapshot().loading);
    }

    #[test]
    fn stale_run_does_not_overwrite_newer_selection() {
        let mut browser = Browser::new();
        let first = browser.on_category_selected(Selection::Category("Beef".to_string()));
        let second = browser.on_category_selected(Selection::Category("Seafood".to_string()));

        assert!(browser.finish_load(second.generation, records(2)));
        assert!(!browser.finish_load(first.generation, records(40)));
        assert_eq!(browser.records().len(), 2);
        assert!(!browser.fail_load(first.generation));
    }

    #[test]
    fn new_list_resets_to_first_page() {
        let mut browser = Browser::new();
        let ticket = browser.on_categories_loaded(Vec::new());
        browser.finish_load(ticket.generation, records(65));
        assert_eq!(browser.go_to_page(3), Ok(3));

        let ticket = browser.on_category_selected(Selection::Category("Seafood".to_string()));
        browser.finish_load(ticket.generation, records(5));
        assert_eq!(browser.current_page(), 1);
        assert_eq!(browser.snapshot().page.items.len(), 5);
    }

    #[test]
    fn failed_run_keeps_previous_records() {
        let mut browser = Browser::new();
        let ticket = browser.on_categories_loaded(Vec::new());
        browser.finish_load(ticket.generation, records(3));

        let ticket = browser.on_category_selected(Selection::Category("Beef".to_string()));
        assert!(browser.fail_load(ticket.generation));
        assert_eq!(browser.records().len(), 3);
        assert!(!browser.snapshot().loading);
    }

    #[test]
    fn failed_run_keeps_the_selection_of_the_shown_list() {
        let mut browser = Browser::new();
        let ticket = browser.on_categories_loaded(Vec::new());
        browser.finish_load(ticket.generation, records(3));

        let ticket = browser.on_category_selected(Selection::Category("Seafood".to_string()));
        assert_eq!(ticket.selection, Selection::Category("Seafood".to_string()));
        assert_eq!(browser.snapshot().selection, &Selection::All);

        browser.fail_load(ticket.generation);
        assert_eq!(browser.selection(), &Selection::All);
        assert_eq!(browser.pending_selection(), &Selection::All);
        assert_eq!(browser.snapshot().selection, &Selection::All);
    }

    #[test]
    fn selection_is_committed_with_its_records() {
        let mut browser = Browser::new();
        let ticket = browser.on_category_selected(Selection::Category("Beef".to_string()));
        assert_eq!(browser.selection(), &Selection::All);
        assert_eq!(
            browser.pending_selection(),
            &Selection::Category("Beef".to_string())
        );

        browser.finish_load(ticket.generation, records(2));
        assert_eq!(browser.selection(), &Selection::Category("Beef".to_string()));
    }

    #[test]
    fn reset_clears_the_list_and_still_rejects_older_runs() {
        let mut browser = Browser::new();
        let ticket = browser.on_categories_loaded(vec![Category {
            name: "Beef".to_string(),
        }]);
        browser.finish_load(ticket.generation, records(3));
        let before = browser.on_category_selected(Selection::Category("Beef".to_string()));

        browser.reset();
        assert!(browser.records().is_empty());
        assert!(browser.categories().is_empty());
        assert_eq!(browser.selection(), &Selection::All);
        assert!(!browser.finish_load(before.generation, records(5)));

        let after = browser.on_categories_loaded(Vec::new());
        assert!(after.generation > before.generation);
        assert!(browser.finish_load(after.generation, records(1)));
    }

    #[test]
    fn navigation_stays_within_bounds() {
        let mut browser = Browser::new();
        let ticket = browser.on_categories_loaded(Vec::new());
        browser.finish_load(ticket.generation, records(65));

        assert_eq!(
            browser.prev_page(),
            Err(PageError::OutOfRange {
                requested: 0,
                total: 3
            })
        );
        assert_eq!(browser.next_page(), Ok(2));
        assert_eq!(browser.next_page(), Ok(3));
        assert!(browser.next_page().is_err());
        assert_eq!(browser.current_page(), 3);
        assert_eq!(browser.snapshot().page.first_index, 60);
    }

    #[test]
    fn empty_list_has_no_valid_page() {
        let mut browser = Browser::new();
        assert_eq!(browser.total_pages(), 0);
        assert!(browser.go_to_page(1).is_err());
        assert!(browser.snapshot().page.items.is_empty());
    }

    #[test]
    fn record_positions_are_one_based() {
        let mut browser = Browser::new();
        let ticket = browser.on_categories_loaded(Vec::new());
        browser.finish_load(ticket.generation, records(3));
        assert_eq!(browser.record(1).map(|record| record.id.as_str()), Some("0"));
        assert!(browser.record(0).is_none());
        assert!(browser.record(4).is_none());
    }

    #[tokio::test]
    async fn selecting_seafood_replaces_all_categories_list() {
        let source = FakeSource::with_categories(&[("Beef", 40), ("Seafood", 6)]);
        let mut browser = Browser::new();

        let ticket = browser.on_categories_loaded(source.categories());
        let all = aggregate(&source, &ticket.selection, &ticket.categories)
            .await
            .unwrap();
        assert!(browser.finish_load(ticket.generation, all));
        assert_eq!(browser.records().len(), 46);
        browser.go_to_page(2).unwrap();

        let ticket = browser.on_category_selected(Selection::Category("Seafood".to_string()));
        let seafood = aggregate(&source, &ticket.selection, &ticket.categories)
            .await
            .unwrap();
        assert!(browser.finish_load(ticket.generation, seafood));

        assert_eq!(browser.records().len(), 6);
        assert!(browser.records().iter().all(|record| record.id.starts_with("Seafood")));
        assert!(browser
            .records()
            .iter()
            .all(|record| record.instructions.is_some() && !record.ingredients.is_empty()));
        assert_eq!(browser.current_page(), 1);
    }

    #[test]
    fn sessions_are_per_chat() {
        let sessions = Sessions::default();
        sessions.with(1, |browser| {
            let ticket = browser.on_category_selected(Selection::Category("Beef".to_string()));
            browser.finish_load(ticket.generation, records(1));
        });
        let other = sessions.with(2, |browser| browser.selection().clone());
        let first = sessions.with(1, |browser| browser.selection().clone());
        assert_eq!(other, Selection::All);
        assert_eq!(first, Selection::Category("Beef".to_string()));
    }
}
