use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::recipe::{Category, Meal};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{endpoint} answered with status {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },

    #[error("No meal with id {0}")]
    NotFound(String),
}

/// Where categories and recipes come from.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError>;

    /// Stubs of every meal in `category`.
    async fn filter_by_category(&self, category: &str) -> Result<Vec<Meal>, ApiError>;

    /// Full record of one meal.
    async fn lookup_meal(&self, id: &str) -> Result<Meal, ApiError>;
}

/// Every TheMealDB answer wraps its payload in `{"meals": [...]}`, with
/// `null` standing for "no results".
#[derive(Deserialize)]
struct Envelope<T> {
    meals: Option<Vec<T>>,
}

impl<T> Envelope<T> {
    fn into_meals(self) -> Vec<T> {
        self.meals.unwrap_or_default()
    }

    /// The single record a lookup by `id` answers with.
    fn into_first(self, id: &str) -> Result<T, ApiError> {
        self.into_meals()
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }
}

pub struct MealDbClient {
    http: reqwest::Client,
    base_url: String,
}

impl MealDbClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_envelope<T>(
        &self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        log::debug!("GET {} {:?}", url, query);
        let response = self.http.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { endpoint, status });
        }

        Ok(response.json::<Envelope<T>>().await?)
    }
}

#[async_trait]
impl RecipeSource for MealDbClient {
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        Ok(self.get_envelope("list.php", &[("c", "list")]).await?.into_meals())
    }

    async fn filter_by_category(&self, category: &str) -> Result<Vec<Meal>, ApiError> {
        Ok(self
            .get_envelope("filter.php", &[("c", category)])
            .await?
            .into_meals())
    }

    async fn lookup_meal(&self, id: &str) -> Result<Meal, ApiError> {
        self.get_envelope("lookup.php", &[("i", id)])
            .await?
            .into_first(id)
    }
}
