//! Car photos
//!
//! A car has any number of images and at most one primary image. Marking a
//! new image primary demotes the previous one inside the same transaction;
//! the partial unique index `idx_car_images_one_primary` backs this up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CarImage {
    pub id: Uuid,
    pub car_id: Uuid,
    pub url: String,

    /// Alt text for accessibility
    pub alt: Option<String>,

    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCarImage {
    pub car_id: Uuid,
    pub url: String,
    pub alt: Option<String>,
    pub is_primary: bool,
}

impl CarImage {
    /// Attaches an image to a car
    pub async fn create(pool: &PgPool, data: CreateCarImage) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if data.is_primary {
            sqlx::query("UPDATE car_images SET is_primary = FALSE WHERE car_id = $1 AND is_primary")
                .bind(data.car_id)
                .execute(&mut *tx)
                .await?;
        }

        let image = sqlx::query_as::<_, CarImage>(
            r#"
            INSERT INTO car_images (car_id, url, alt, is_primary)
            VALUES ($1, $2, $3, $4)
            RETURNING id, car_id, url, alt, is_primary, created_at
            "#,
        )
        .bind(data.car_id)
        .bind(data.url)
        .bind(data.alt)
        .bind(data.is_primary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(image)
    }

    /// Lists a car's images, primary first
    pub async fn list_by_car(pool: &PgPool, car_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CarImage>(
            r#"
            SELECT id, car_id, url, alt, is_primary, created_at
            FROM car_images
            WHERE car_id = $1
            ORDER BY is_primary DESC, created_at ASC
            "#,
        )
        .bind(car_id)
        .fetch_all(pool)
        .await
    }

    /// Removes one of a car's images; false if `id` is not an image of `car_id`
    pub async fn delete(pool: &PgPool, car_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM car_images WHERE id = $1 AND car_id = $2")
            .bind(id)
            .bind(car_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
