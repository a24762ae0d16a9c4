use serde::Deserialize;
use std::collections::HashMap;

/// Number of `strIngredientN` fields a meal carries.
pub const INGREDIENT_SLOTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    #[serde(rename = "strCategory")]
    pub name: String,
}

/// A meal as TheMealDB returns it.
///
/// Filter queries only fill the id, name and thumbnail (a stub). Lookups
/// fill the whole record, instructions and ingredient slots included.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawMeal")]
pub struct Meal {
    pub id: String,
    pub name: String,
    pub thumbnail_url: Option<String>,
    pub instructions: Option<String>,
    pub ingredient_slots: [Option<String>; INGREDIENT_SLOTS],
}

#[derive(Deserialize)]
struct RawMeal {
    #[serde(rename = "idMeal")]
    id: String,
    #[serde(rename = "strMeal")]
    name: String,
    #[serde(rename = "strMealThumb", default)]
    thumbnail_url: Option<String>,
    #[serde(rename = "strInstructions", default)]
    instructions: Option<String>,
    #[serde(flatten)]
    rest: HashMap<String, serde_json::Value>,
}

impl From<RawMeal> for Meal {
    fn from(mut raw: RawMeal) -> Self {
        let ingredient_slots = std::array::from_fn(|slot| {
            match raw.rest.remove(&format!("strIngredient{}", slot + 1)) {
                Some(serde_json::Value::String(value)) => Some(value),
                _ => None,
            }
        });
        Meal {
            id: raw.id,
            name: raw.name,
            thumbnail_url: raw.thumbnail_url,
            instructions: raw.instructions,
            ingredient_slots,
        }
    }
}

impl Meal {
    /// Filled ingredient slots, in slot order.
    pub fn ingredients(&self) -> Vec<String> {
        self.ingredient_slots
            .iter()
            .flatten()
            .filter(|ingredient| !ingredient.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// What a recipe card displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRecord {
    pub id: String,
    pub name: String,
    pub thumbnail_url: Option<String>,
    pub instructions: Option<String>,
    pub ingredients: Vec<String>,
}

impl RecipeRecord {
    /// Record built from a stub alone, used when browsing every category.
    pub fn from_stub(stub: Meal) -> Self {
        let ingredients = stub.ingredients();
        RecipeRecord {
            id: stub.id,
            name: stub.name,
            thumbnail_url: stub.thumbnail_url,
            instructions: stub.instructions,
            ingredients,
        }
    }

    /// Stub identity merged with the looked-up detail.
    pub fn merge(stub: Meal, detail: Meal) -> Self {
        let ingredients = detail.ingredients();
        RecipeRecord {
            id: stub.id,
            name: stub.name,
            thumbnail_url: detail.thumbnail_url.or(stub.thumbnail_url),
            instructions: detail.instructions,
            ingredients,
        }
    }
}
