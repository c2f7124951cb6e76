mod common;

use assert_matches::assert_matches;
use common::{activity_input, TestApp};
use tour_package_api::{entities::ActivityType, errors::ServiceError};
use uuid::Uuid;

#[tokio::test]
async fn create_then_lookup_by_type_and_name() {
    let app = TestApp::new().await;
    let activities = &app.services.activities;

    let flight = app.seed_activity(ActivityType::Flight, 150, 1_200_000).await;
    app.seed_activity(ActivityType::Accommodation, 20, 800_000).await;

    assert_eq!(activities.get_by_id(flight.id).await.unwrap().name, flight.name);
    assert_eq!(activities.list_all().await.unwrap().len(), 2);

    let flights = activities.list_by_type(ActivityType::Flight).await.unwrap();
    assert_eq!(flights.len(), 1);
    assert_eq!(flights[0].id, flight.id);

    let found = activities.search_by_name("flight TO").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(activities.search_by_name("DENPASAR").await.unwrap().len(), 2);
    assert!(activities.search_by_name("%").await.unwrap().is_empty());
    assert!(activities.search_by_name("Flight_to").await.unwrap().is_empty());
    assert!(activities.exists_by_name(&flight.name).await.unwrap());
    assert!(!activities.exists_by_name("Ferry to Gili").await.unwrap());
}

#[tokio::test]
async fn update_overwrites_fields_and_keeps_identity() {
    let app = TestApp::new().await;
    let flight = app.seed_activity(ActivityType::Flight, 150, 1_000).await;

    let mut input = activity_input(ActivityType::Flight, 120, 1_500);
    input.name = "GA-410".to_string();
    let updated = app.services.activities.update(flight.id, input).await.unwrap();

    assert_eq!(updated.id, flight.id);
    assert_eq!(updated.name, "GA-410");
    assert_eq!(updated.capacity, 120);
    assert_eq!(updated.price, 1_500);
}

#[tokio::test]
async fn update_of_missing_activity_is_not_found() {
    let app = TestApp::new().await;
    let result = app
        .services
        .activities
        .update(Uuid::new_v4(), activity_input(ActivityType::Vehicle, 4, 300))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn invalid_activity_is_rejected() {
    let app = TestApp::new().await;
    let mut input = activity_input(ActivityType::Vehicle, 4, 300);
    input.end_date = input.start_date;
    assert_matches!(
        app.services.activities.create(input).await,
        Err(ServiceError::InvalidInput(_))
    );
    assert!(app.services.activities.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreferenced_activity_can_be_deleted() {
    let app = TestApp::new().await;
    let hotel = app.seed_activity(ActivityType::Accommodation, 10, 500).await;

    app.services.activities.delete(hotel.id).await.unwrap();
    assert_matches!(
        app.services.activities.get_by_id(hotel.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn referenced_activity_cannot_be_deleted() {
    let app = TestApp::new().await;
    let package = app.seed_package(2).await;
    let plan = app.seed_plan(&package, ActivityType::Flight).await;
    let flight = app.seed_activity(ActivityType::Flight, 150, 1_000).await;
    app.services
        .ordered_quantities
        .create(&app.owner(), plan.id, flight.id, 2)
        .await
        .unwrap();

    assert_matches!(
        app.services.activities.delete(flight.id).await,
        Err(ServiceError::Conflict(_))
    );
    assert!(app.services.activities.get_by_id(flight.id).await.is_ok());
}

#[tokio::test]
async fn capacity_never_goes_negative() {
    let app = TestApp::new().await;
    let car = app.seed_activity(ActivityType::Vehicle, 3, 250).await;

    let after = app.services.activities.decrement_capacity(car.id, 2).await.unwrap();
    assert_eq!(after.capacity, 1);

    assert_matches!(
        app.services.activities.decrement_capacity(car.id, 2).await,
        Err(ServiceError::Conflict(_))
    );
    assert_eq!(app.services.activities.get_by_id(car.id).await.unwrap().capacity, 1);
}
