use std::sync::Arc;

use tracing::info;

use crate::{
    error::{Result, ServiceError},
    models::food::{DeletedFood, NewFoodAnalysis},
    store::FoodStore,
};

pub struct FoodService {
    store: Arc<dyn FoodStore>,
}

impl FoodService {
    pub fn new(store: Arc<dyn FoodStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, food: NewFoodAnalysis) -> Result<i64> {
        food.validate()?;

        let id = self.store.insert_food(&food).await?;
        info!(user_id = %food.user_id, food_id = id, "Food analysis saved");
        Ok(id)
    }

    /// Deletes one record, or every record of the user when `food_id` is `None`.
    /// Deleting nothing is not an error.
    pub async fn delete(&self, user_id: &str, food_id: Option<i64>) -> Result<Vec<DeletedFood>> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::Validation("userId is required".to_string()));
        }

        let deleted = self.store.delete_foods(user_id, food_id).await?;
        info!(
            user_id = %user_id,
            food_id = ?food_id,
            deleted = deleted.len(),
            "Food records deleted"
        );
        Ok(deleted)
    }
}
