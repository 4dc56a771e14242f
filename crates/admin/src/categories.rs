//! Category management.

use reqwest::Method;
use serde::Serialize;
use tracing::{info, instrument};

use shopfront_core::{Category, CategoryId};

use crate::AdminClient;
use crate::error::Result;

/// Fields of the create/edit category form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AdminClient {
    /// List all categories, bypassing the catalog cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self
            .send_list(self.request(Method::GET, "categories"))
            .await?)
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the category is not found or the API request fails.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn get_category(&self, id: CategoryId) -> Result<Category> {
        Ok(self
            .send_data(
                self.request(Method::GET, &format!("categories/{id}")),
                "category",
            )
            .await?)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`](shopfront_storefront::ApiError::Validation)
    /// with the backend's field errors if the input is rejected.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: &CategoryInput) -> Result<Category> {
        let category: Category = self
            .send_data(
                self.request(Method::POST, "categories").json(input),
                "category",
            )
            .await?;
        self.api().invalidate_categories().await;

        info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is rejected or the API request fails.
    #[instrument(skip(self, input), fields(category_id = %id))]
    pub async fn update_category(&self, id: CategoryId, input: &CategoryInput) -> Result<Category> {
        let category: Category = self
            .send_data(
                self.request(Method::PUT, &format!("categories/{id}"))
                    .json(input),
                "category",
            )
            .await?;
        self.api().invalidate_categories().await;

        info!("Category updated");
        Ok(category)
    }

    /// Delete a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<()> {
        self.send_unit(self.request(Method::DELETE, &format!("categories/{id}")))
            .await?;
        self.api().invalidate_categories().await;

        info!("Category deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_input_omits_missing_description() {
        let input = CategoryInput {
            name: "Fruit".to_string(),
            description: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Fruit"}));
    }
}
