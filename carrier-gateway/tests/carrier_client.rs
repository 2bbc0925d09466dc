mod support;

use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

use carrier_gateway::model::{TariffLocation, TariffPackage, TariffRequest};
use carrier_gateway::{CarrierConfig, CarrierError};
use support::*;

#[tokio::test]
async fn concurrent_callers_share_one_token_request() {
    let server = MockServer::start_async().await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200)
                .delay(Duration::from_millis(150))
                .json_body(json!({"access_token": TOKEN, "expires_in": 3600}));
        })
        .await;
    let client = client(carrier_config(&server));

    let calls = (0..8).map(|_| client.access_token());
    let tokens = futures::future::join_all(calls).await;

    assert!(tokens.iter().all(|t| t.as_deref().ok() == Some(TOKEN)));
    token.assert_hits_async(1).await;
    assert_eq!(client.access_token().await.unwrap(), TOKEN);
    token.assert_hits_async(1).await;
}

#[tokio::test]
async fn oversized_token_lifetime_is_capped() {
    let server = MockServer::start_async().await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200).json_body(json!({"access_token": TOKEN, "expires_in": u64::MAX}));
        })
        .await;
    let client = client(carrier_config(&server));

    assert_eq!(client.access_token().await.unwrap(), TOKEN);
    assert_eq!(client.access_token().await.unwrap(), TOKEN);
    token.assert_hits_async(1).await;
}

#[tokio::test]
async fn missing_credentials_never_reach_the_carrier() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    let client = client(CarrierConfig::for_api(server.base_url()));

    assert!(matches!(client.access_token().await, Err(CarrierError::NotConfigured)));
    assert!(matches!(client.suggest_cities("Москва").await, Err(CarrierError::NotConfigured)));
    token.assert_hits_async(0).await;
}

#[tokio::test]
async fn failed_token_exchange_is_an_upstream_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(401).body("invalid_client");
        })
        .await;
    let client = client(carrier_config(&server));

    let err = client.access_token().await.unwrap_err();
    assert!(matches!(err, CarrierError::Upstream(ref m) if m.contains("401")), "{err:?}");
}

#[tokio::test]
async fn city_lookups_are_cached_and_malformed_entries_dropped() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let cities = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/location/suggest/cities")
                .query_param("name", "Москва")
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(200).json_body(json!([
                {"city_uuid": "c1", "code": 44, "full_name": "Москва, Россия", "country_code": "RU"},
                {"city_uuid": "c2", "full_name": "без кода"},
                "garbage"
            ]));
        })
        .await;
    let client = client(carrier_config(&server));

    let first = client.suggest_cities(" Москва ").await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].code, 44);
    let second = client.suggest_cities("москва").await.unwrap();
    assert_eq!(first, second);
    cities.assert_hits_async(1).await;
    assert_eq!(client.cached_city_lookups(), 1);
}

#[tokio::test]
async fn empty_city_name_is_rejected_locally() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    let client = client(carrier_config(&server));

    let err = client.suggest_cities("   ").await.unwrap_err();
    assert!(matches!(err, CarrierError::InvalidRequest(ref m) if m == "City name cannot be empty"));
    token.assert_hits_async(0).await;
}

#[tokio::test]
async fn delivery_points_are_flattened_and_cached_per_type() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let pvz = server
        .mock_async(|when, then| {
            when.method(GET).path("/deliverypoints").query_param("city_code", "44").query_param("type", "PVZ");
            then.status(200).json_body(json!([{
                "code": "MSK71",
                "uuid": "p1",
                "type": "PVZ",
                "work_time": "Пн-Пт 10:00-20:00",
                "location": {"city_code": 44, "city": "Москва", "longitude": 37.6, "latitude": 55.7, "address": "ул. Ленина, 1"}
            }, {"code": "broken"}]));
        })
        .await;
    let postamats = server
        .mock_async(|when, then| {
            when.method(GET).path("/deliverypoints").query_param("type", "POSTAMAT");
            then.status(200).json_body(json!([]));
        })
        .await;
    let client = client(carrier_config(&server));

    let points = client.delivery_points(44, None).await.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].code, "MSK71");
    assert_eq!(points[0].city, "Москва");
    client.delivery_points(44, Some("pvz")).await.unwrap();
    assert!(client.delivery_points(44, Some("postamat")).await.unwrap().is_empty());

    pvz.assert_hits_async(1).await;
    postamats.assert_hits_async(1).await;
    assert_eq!(client.cached_point_lookups(), 2);
}

#[tokio::test]
async fn tariff_list_is_decoded() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/calculator/tarifflist").json_body_partial(r#"{"packages":[{"weight":600}]}"#);
            then.status(200).json_body(json!({"tariff_codes": [
                {"tariff_code": 136, "tariff_name": "Посылка склад-склад", "delivery_mode": 4, "delivery_sum": 250.0, "period_min": 1, "period_max": 2},
                {"tariff_name": "no code"}
            ]}));
        })
        .await;
    let client = client(carrier_config(&server));
    let request = TariffRequest {
        from_location: TariffLocation { code: Some(44), ..Default::default() },
        to_location: TariffLocation { code: Some(137), ..Default::default() },
        packages: vec![TariffPackage { weight: 600, length: None, width: None, height: None }],
        tariff_code: None,
    };

    let tariffs = client.calculate_tariffs(&request).await.unwrap();
    assert_eq!(tariffs.len(), 1);
    assert_eq!(tariffs[0].tariff_code, 136);
    assert_eq!(tariffs[0].delivery_sum, 250.0);

    let empty = TariffRequest { packages: vec![], ..request };
    assert!(matches!(client.calculate_tariffs(&empty).await, Err(CarrierError::InvalidRequest(_))));
}

#[tokio::test]
async fn unauthorized_response_drops_the_cached_token() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    let info = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/orders/{SHIPMENT_ID}"));
            then.status(401).json_body(json!({"requests": [{"state": "INVALID", "errors": [{"code": "v2_token_expired", "message": "token expired"}]}]}));
        })
        .await;
    let client = client(carrier_config(&server));

    let err = client.shipment_info(SHIPMENT_ID).await.unwrap_err();
    assert!(matches!(err, CarrierError::Upstream(ref m) if m.contains("token expired")), "{err:?}");
    client.shipment_info(SHIPMENT_ID).await.unwrap_err();

    info.assert_hits_async(2).await;
    token.assert_hits_async(2).await;
}

#[tokio::test]
async fn slow_carrier_times_out() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/location/suggest/cities");
            then.status(200).delay(Duration::from_millis(800)).json_body(json!([]));
        })
        .await;
    let mut config = carrier_config(&server);
    config.read_timeout = Duration::from_millis(100);
    let client = client(config);

    assert!(matches!(client.suggest_cities("Казань").await, Err(CarrierError::Timeout)));
    assert_eq!(client.cached_city_lookups(), 0);
}
