use futures::future::try_join_all;
use std::fmt;

use crate::mealdb::{ApiError, RecipeSource};
use crate::recipe::{Category, RecipeRecord};

/// Which recipes the browser shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Category(String),
}

impl Selection {
    /// Resolves user input against the known categories. `all` or an empty
    /// string picks every category; names match case-insensitively.
    pub fn parse(input: &str, categories: &[Category]) -> Option<Selection> {
        let input = input.trim();
        if input.is_empty() || input.eq_ignore_ascii_case("all") {
            return Some(Selection::All);
        }
        categories
            .iter()
            .find(|category| category.name.eq_ignore_ascii_case(input))
            .map(|category| Selection::Category(category.name.clone()))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => write!(f, "All Categories"),
            Selection::Category(name) => write!(f, "{}", name),
        }
    }
}

/// Builds the flat record list for `selection`.
///
/// Every fetch of a run is issued concurrently and joined; the first failure
/// fails the whole run.
pub async fn aggregate(
    source: &dyn RecipeSource,
    selection: &Selection,
    categories: &[Category],
) -> Result<Vec<RecipeRecord>, ApiError> {
    match selection {
        Selection::All => aggregate_all(source, categories).await,
        Selection::Category(name) => aggregate_category(source, name).await,
    }
}

async fn aggregate_all(
    source: &dyn RecipeSource,
    categories: &[Category],
) -> Result<Vec<RecipeRecord>, ApiError> {
    let per_category = try_join_all(
        categories
            .iter()
            .map(|category| source.filter_by_category(&category.name)),
    )
    .await?;

    let records: Vec<RecipeRecord> = per_category
        .into_iter()
        .flatten()
        .map(RecipeRecord::from_stub)
        .collect();
    log::debug!(
        "Aggregated {} recipes over {} categories",
        records.len(),
        categories.len()
    );
    Ok(records)
}

async fn aggregate_category(
    source: &dyn RecipeSource,
    category: &str,
) -> Result<Vec<RecipeRecord>, ApiError> {
    let stubs = source.filter_by_category(category).await?;
    let details = try_join_all(stubs.iter().map(|stub| source.lookup_meal(&stub.id))).await?;

    let records: Vec<RecipeRecord> = stubs
        .into_iter()
        .zip(details)
        .map(|(stub, detail)| RecipeRecord::merge(stub, detail))
        .collect();
    log::debug!("Aggregated {} recipes for {}", records.len(), category);
    Ok(records)
}
