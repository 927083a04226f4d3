//! Car listing endpoints
//!
//! - `GET /v1/cars` - Search listings (public)
//! - `GET /v1/cars/:id` - Car detail with images, rating and host (public)
//! - `POST /v1/cars` - List a car; the caller becomes a host
//! - `POST /v1/cars/:id/availability` - Open or close a car for booking (owner)
//! - `POST /v1/cars/:id/images` - Attach an image (owner)
//! - `DELETE /v1/cars/:id/images/:image_id` - Remove an image (owner)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use carshare_shared::{
    auth::middleware::AuthContext,
    models::{
        car::{Car, CarListing, CarSearch, CreateCar, SortBy, SortOrder},
        car_image::{CarImage, CreateCarImage},
        review::Review,
        user::User,
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Query string for `GET /v1/cars`
///
/// ```text
/// GET /v1/cars?q=tesla&location=Seattle&features=Autopilot,AWD&sort_by=rating&order=desc
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct CarSearchParams {
    pub q: Option<String>,
    pub location: Option<String>,
    pub min_daily_rate_cents: Option<i64>,
    pub max_daily_rate_cents: Option<i64>,

    /// Comma-separated; every feature must be present
    pub features: Option<String>,

    pub available_only: Option<bool>,
    pub sort_by: Option<SortBy>,
    pub order: Option<SortOrder>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<CarSearchParams> for CarSearch {
    fn from(params: CarSearchParams) -> Self {
        let features = params
            .features
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        CarSearch {
            q: params.q,
            location: params.location,
            min_daily_rate_cents: params.min_daily_rate_cents,
            max_daily_rate_cents: params.max_daily_rate_cents,
            features,
            available_only: params.available_only.unwrap_or(true),
            sort_by: params.sort_by.unwrap_or_default(),
            order: params.order.unwrap_or_default(),
            limit: params.limit,
            offset: params.offset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchCarsResponse {
    pub cars: Vec<CarListing>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCarRequest {
    #[validate(length(min = 1, max = 100, message = "Make must be 1-100 characters"))]
    pub make: String,

    #[validate(length(min = 1, max = 100, message = "Model must be 1-100 characters"))]
    pub model: String,

    #[validate(range(min = 1900, max = 2100, message = "Year is out of range"))]
    pub year: i32,

    #[validate(length(min = 1, max = 20, message = "License plate must be 1-20 characters"))]
    pub license_plate: String,

    #[validate(length(equal = 17, message = "VIN must be 17 characters"))]
    pub vin: String,

    #[validate(length(min = 1, max = 50))]
    pub color: String,

    #[validate(range(min = 0, message = "Mileage cannot be negative"))]
    pub mileage: i32,

    #[validate(length(min = 1, max = 50))]
    pub fuel_type: String,

    #[validate(length(min = 1, max = 50))]
    pub transmission: String,

    #[validate(range(min = 1, max = 15))]
    pub seats: i32,

    #[validate(range(min = 1, max = 6))]
    pub doors: i32,

    #[serde(default)]
    pub features: Vec<String>,

    #[serde(default)]
    pub description: String,

    #[validate(range(min = 1, message = "Daily rate must be positive"))]
    pub daily_rate_cents: i64,

    #[validate(range(min = 1))]
    pub weekly_rate_cents: Option<i64>,

    #[validate(range(min = 1))]
    pub monthly_rate_cents: Option<i64>,

    #[validate(length(min = 1, max = 255, message = "Location must be 1-255 characters"))]
    pub location: String,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CreateCarRequest {
    /// Field validation plus the coordinate bounds
    fn check(&self) -> ApiResult<()> {
        self.validate()?;

        let mut details = Vec::new();
        if self.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            details.push(ValidationErrorDetail {
                field: "latitude".to_string(),
                message: "Latitude must be between -90 and 90".to_string(),
            });
        }
        if self.longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng)) {
            details.push(ValidationErrorDetail {
                field: "longitude".to_string(),
                message: "Longitude must be between -180 and 180".to_string(),
            });
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationError(details))
        }
    }

    fn into_create(self, host_id: Uuid) -> CreateCar {
        CreateCar {
            host_id,
            make: self.make,
            model: self.model,
            year: self.year,
            license_plate: self.license_plate.to_uppercase(),
            vin: self.vin.to_uppercase(),
            color: self.color,
            mileage: self.mileage,
            fuel_type: self.fuel_type,
            transmission: self.transmission,
            seats: self.seats,
            doors: self.doors,
            features: self.features,
            description: self.description,
            daily_rate_cents: self.daily_rate_cents,
            weekly_rate_cents: self.weekly_rate_cents,
            monthly_rate_cents: self.monthly_rate_cents,
            location: self.location,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetAvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddImageRequest {
    #[validate(url(message = "Invalid image URL"))]
    pub url: String,

    #[validate(length(max = 255))]
    pub alt: Option<String>,

    #[serde(default)]
    pub is_primary: bool,
}

/// Public view of a car's owner
#[derive(Debug, Serialize)]
pub struct HostSummary {
    pub id: Uuid,
    pub name: String,
    pub is_verified: bool,
}

#[derive(Debug, Serialize)]
pub struct CarDetail {
    #[serde(flatten)]
    pub car: Car,
    pub images: Vec<CarImage>,
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub host: Option<HostSummary>,
}

/// Loads a car the caller owns
///
/// 404 if the car does not exist, 403 if it belongs to someone else.
pub(crate) async fn load_owned_car(
    state: &AppState,
    auth: &AuthContext,
    car_id: Uuid,
) -> ApiResult<Car> {
    let car = Car::find_by_id(&state.db, car_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Car not found".to_string()))?;

    if car.host_id != auth.user_id {
        return Err(ApiError::Forbidden(
            "Only the car's host can do this".to_string(),
        ));
    }

    Ok(car)
}

pub async fn search_cars(
    State(state): State<AppState>,
    Query(params): Query<CarSearchParams>,
) -> ApiResult<Json<SearchCarsResponse>> {
    let search = CarSearch::from(params);
    let cars = Car::search(&state.db, &search).await?;

    Ok(Json(SearchCarsResponse {
        cars,
        limit: search.effective_limit(),
        offset: search.effective_offset(),
    }))
}

pub async fn get_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CarDetail>> {
    let car = Car::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Car not found".to_string()))?;

    let images = CarImage::list_by_car(&state.db, id).await?;
    let summary = Review::summary_for_car(&state.db, id).await?;
    let host = User::find_by_id(&state.db, car.host_id)
        .await?
        .map(|user| HostSummary {
            id: user.id,
            name: user.display_name().to_string(),
            is_verified: user.is_verified,
        });

    Ok(Json(CarDetail {
        car,
        images,
        average_rating: summary.average_rating,
        review_count: summary.review_count,
        host,
    }))
}

/// Lists a car for rent
///
/// # Errors
///
/// - `409 Conflict`: VIN or license plate already listed
/// - `422 Unprocessable Entity`: Invalid fields
pub async fn create_car(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCarRequest>,
) -> ApiResult<(StatusCode, Json<Car>)> {
    req.check()?;

    let car = Car::create(&state.db, req.into_create(auth.user_id)).await?;

    info!(car_id = %car.id, host_id = %auth.user_id, "Car listed");

    Ok((StatusCode::CREATED, Json(car)))
}

pub async fn set_availability(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetAvailabilityRequest>,
) -> ApiResult<Json<Car>> {
    load_owned_car(&state, &auth, id).await?;

    let car = Car::set_availability(&state.db, id, req.is_available)
        .await?
        .ok_or_else(|| ApiError::NotFound("Car not found".to_string()))?;

    info!(car_id = %id, is_available = req.is_available, "Car availability changed");

    Ok(Json(car))
}

pub async fn add_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddImageRequest>,
) -> ApiResult<(StatusCode, Json<CarImage>)> {
    req.validate()?;
    load_owned_car(&state, &auth, id).await?;

    let image = CarImage::create(
        &state.db,
        CreateCarImage {
            car_id: id,
            url: req.url,
            alt: req.alt,
            is_primary: req.is_primary,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn delete_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    load_owned_car(&state, &auth, id).await?;

    if !CarImage::delete(&state.db, id, image_id).await? {
        return Err(ApiError::NotFound("Image not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreateCarRequest {
        CreateCarRequest {
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            year: 2022,
            license_plate: "abc1234".to_string(),
            vin: "4t1bf1fk5cu123456".to_string(),
            color: "Silver".to_string(),
            mileage: 15_000,
            fuel_type: "Hybrid".to_string(),
            transmission: "Automatic".to_string(),
            seats: 5,
            doors: 4,
            features: vec!["Bluetooth".to_string()],
            description: String::new(),
            daily_rate_cents: 4_500,
            weekly_rate_cents: None,
            monthly_rate_cents: None,
            location: "Downtown Seattle".to_string(),
            latitude: Some(47.6),
            longitude: Some(-122.3),
        }
    }

    #[test]
    fn test_search_params_split_features() {
        let params = CarSearchParams {
            features: Some("Bluetooth, AWD,,".to_string()),
            ..Default::default()
        };
        let search = CarSearch::from(params);

        assert_eq!(search.features, vec!["Bluetooth", "AWD"]);
        assert!(search.available_only);
        assert_eq!(search.sort_by, SortBy::Price);
    }

    #[test]
    fn test_search_params_from_query_string() {
        let params: CarSearchParams = parse_query(
            "q=tesla&sort_by=rating&order=desc&available_only=false&limit=5",
        );
        let search = CarSearch::from(params);

        assert_eq!(search.q.as_deref(), Some("tesla"));
        assert_eq!(search.sort_by, SortBy::Rating);
        assert_eq!(search.order, SortOrder::Desc);
        assert!(!search.available_only);
        assert_eq!(search.effective_limit(), 5);
    }

    fn parse_query(query: &str) -> CarSearchParams {
        let uri: axum::http::Uri = format!("/v1/cars?{query}").parse().unwrap();
        Query::<CarSearchParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_create_car_validation() {
        assert!(create_request().validate().is_ok());

        let mut bad = create_request();
        bad.vin = "SHORT".to_string();
        bad.daily_rate_cents = 0;

        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("vin"));
        assert!(fields.contains_key("daily_rate_cents"));
    }

    #[test]
    fn test_coordinates_checked() {
        let mut req = create_request();
        req.latitude = Some(120.0);

        match req.check() {
            Err(ApiError::ValidationError(details)) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "latitude");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_create_car_normalizes_identifiers() {
        let host_id = Uuid::new_v4();
        let data = create_request().into_create(host_id);

        assert_eq!(data.host_id, host_id);
        assert_eq!(data.license_plate, "ABC1234");
        assert_eq!(data.vin, "4T1BF1FK5CU123456");
    }

    #[test]
    fn test_add_image_validation() {
        let req = AddImageRequest {
            url: "not a url".to_string(),
            alt: None,
            is_primary: true,
        };
        assert!(req.validate().is_err());
    }
}
