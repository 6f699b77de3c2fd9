/// Integration tests with mocked external APIs
/// Exercises the GHunt gateway and Nominatim adapters without hitting real services
use base64::Engine;
use opse_ghunt::config::Config;
use opse_ghunt::credentials::{AndroidCreds, Credentials, REQUIRED_COOKIES};
use opse_ghunt::enrichment::{GhuntTool, LookupState};
use opse_ghunt::errors::AppError;
use opse_ghunt::gateway_client::GhuntGatewayClient;
use opse_ghunt::geocoding::NominatimGeocoder;
use opse_ghunt::lookup_models::{ParamsTemplate, Position, ReviewsStatus};
use opse_ghunt::services::{
    CalendarFetcher, Geocoder, MapsFetcher, MemoryProfileSink, PeopleLookup, SessionValidator,
};
use opse_ghunt::session::Session;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn creds() -> Credentials {
    Credentials {
        cookies: REQUIRED_COOKIES
            .iter()
            .map(|name| (name.to_string(), format!("{}-value", name)))
            .collect(),
        osids: HashMap::new(),
        android: AndroidCreds {
            master_token: Some("master".to_string()),
            authorization_tokens: HashMap::new(),
        },
    }
}

fn session() -> Session {
    Session::open(creds(), Duration::from_secs(5)).unwrap()
}

fn ada() -> serde_json::Value {
    serde_json::json!({
        "personId": "111",
        "sourceIds": ["PROFILE"],
        "names": {
            "PROFILE": {
                "fullname": "Ada Byron Lovelace",
                "firstName": "Ada",
                "lastName": "Lovelace"
            }
        },
        "inAppReachability": { "PROFILE": { "apps": ["Maps"] } }
    })
}

fn paris_reviews() -> serde_json::Value {
    serde_json::json!({
        "status": "ok",
        "stats": { "Reviews": 2 },
        "reviews": [
            { "id": "r1", "rating": 5, "location": { "name": "Café", "position": { "latitude": 48.8566, "longitude": 2.3522 } } },
            { "id": "r2", "rating": 4, "location": { "name": "Musée", "position": { "latitude": 48.8606, "longitude": 2.3376 } } }
        ],
        "photos": []
    })
}

#[tokio::test]
async fn test_gateway_people_lookup_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/people/lookup"))
        .and(body_partial_json(serde_json::json!({
            "email": "ada@example.com",
            "params_template": "max_details"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "found": true, "person": ada() })),
        )
        .mount(&mock_server)
        .await;

    let client = GhuntGatewayClient::new(mock_server.uri());
    let record = client
        .people_lookup(&session(), "ada@example.com", ParamsTemplate::MaxDetails)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.person_id().unwrap(), "111");
    assert_eq!(record.first_name().unwrap(), "Ada");
}

#[tokio::test]
async fn test_gateway_people_lookup_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/people/lookup"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "found": false })),
        )
        .mount(&mock_server)
        .await;

    let client = GhuntGatewayClient::new(mock_server.uri());
    let record = client
        .people_lookup(&session(), "ghost@example.com", ParamsTemplate::MaxDetails)
        .await
        .unwrap();

    assert!(record.is_none());
}

#[tokio::test]
async fn test_gateway_error_status_is_external_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/people/lookup"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(&mock_server)
        .await;

    let client = GhuntGatewayClient::new(mock_server.uri());
    let err = client
        .people_lookup(&session(), "ada@example.com", ParamsTemplate::MaxDetails)
        .await
        .unwrap_err();

    match err {
        AppError::ExternalApiError(msg) => assert!(msg.contains("upstream down")),
        other => panic!("Expected ExternalApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_gateway_check_cookies_sends_cookies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/check"))
        .and(body_partial_json(serde_json::json!({
            "cookies": { "SID": "SID-value" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "valid": false })))
        .mount(&mock_server)
        .await;

    let client = GhuntGatewayClient::new(mock_server.uri());
    assert!(!client.check_cookies(&session()).await.unwrap());
}

#[tokio::test]
async fn test_gateway_maps_and_calendar() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/maps/reviews"))
        .and(body_partial_json(serde_json::json!({ "person_id": "111" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(paris_reviews()))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "found": true,
            "details": { "id": "ada@example.com", "summary": "Ada", "time_zone": "Europe/Paris" },
            "events": [
                { "id": "e1", "summary": "Analytical engine review", "start": "2024-05-01T09:00:00Z" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = GhuntGatewayClient::new(mock_server.uri());
    let s = session();

    let maps = client.get_reviews(&s, "111").await.unwrap();
    assert_eq!(maps.status, ReviewsStatus::Ok);
    assert_eq!(maps.reviews.len(), 2);
    assert_eq!(maps.positions().len(), 2);
    assert_eq!(maps.stats.get("Reviews"), Some(&2));

    let calendar = client.fetch_all(&s, "ada@example.com").await.unwrap().unwrap();
    assert_eq!(calendar.details.time_zone.as_deref(), Some("Europe/Paris"));
    assert_eq!(calendar.events.len(), 1);
}

#[tokio::test]
async fn test_gateway_calendar_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/calendar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "found": false })))
        .mount(&mock_server)
        .await;

    let client = GhuntGatewayClient::new(mock_server.uri());
    assert!(client
        .fetch_all(&session(), "ada@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_nominatim_reverse_is_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("format", "jsonv2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "display_name": "Paris, France",
            "address": { "city": "Paris", "postcode": "75001", "country": "France" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let geocoder =
        NominatimGeocoder::new(mock_server.uri(), "opse-test", Duration::from_secs(5)).unwrap();
    let position = Position {
        latitude: 48.8566,
        longitude: 2.3522,
    };

    let first = geocoder.reverse(position).await.unwrap().unwrap();
    let second = geocoder.reverse(position).await.unwrap().unwrap();

    assert_eq!(first.town.as_deref(), Some("Paris"));
    assert_eq!(first.postcode.as_deref(), Some("75001"));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_nominatim_spaces_uncached_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "address": { "city": "Paris", "country": "France" }
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let geocoder = NominatimGeocoder::new(mock_server.uri(), "opse-test", Duration::from_secs(5))
        .unwrap()
        .with_min_interval(Duration::from_millis(300));

    let started = std::time::Instant::now();
    for (latitude, longitude) in [(48.8566, 2.3522), (48.8606, 2.3376), (48.8566, 2.3522)] {
        geocoder
            .reverse(Position {
                latitude,
                longitude,
            })
            .await
            .unwrap();
    }

    // Two upstream calls, one interval between them; the repeat is served from cache
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_nominatim_unable_to_geocode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "error": "Unable to geocode" })),
        )
        .mount(&mock_server)
        .await;

    let geocoder =
        NominatimGeocoder::new(mock_server.uri(), "opse-test", Duration::from_secs(5)).unwrap();
    let result = geocoder
        .reverse(Position {
            latitude: 0.0,
            longitude: -140.0,
        })
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn test_full_enrichment_through_adapters() {
    let gateway = MockServer::start().await;
    let nominatim = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "valid": true })))
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path("/people/lookup"))
        .and(body_partial_json(serde_json::json!({ "email": "ada@example.com" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "found": true, "person": ada() })),
        )
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path("/people/lookup"))
        .and(body_partial_json(serde_json::json!({ "email": "ghost@example.com" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "found": false })),
        )
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path("/maps/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(paris_reviews()))
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "found": false })))
        .mount(&gateway)
        .await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "address": { "city": "Paris", "postcode": "75001", "country": "France" }
        })))
        .mount(&nominatim)
        .await;

    let encoded = base64::engine::general_purpose::STANDARD
        .encode(serde_json::to_vec(&creds()).unwrap());
    let mut creds_file = tempfile::NamedTempFile::new().unwrap();
    write!(creds_file, "{}", encoded).unwrap();

    let config = Config {
        port: 0,
        ghunt_gateway_url: gateway.uri(),
        ghunt_creds_path: creds_file.path().to_path_buf(),
        nominatim_base_url: nominatim.uri(),
        nominatim_user_agent: "opse-test".to_string(),
        nominatim_min_interval_ms: 0,
        gmaps_radius_km: 30.0,
        http_timeout_secs: 5,
        database_url: None,
    };
    let sink = Arc::new(MemoryProfileSink::new());
    let tool = GhuntTool::from_config(&config, sink.clone()).unwrap();

    let base = opse_ghunt::models::Profile::with_emails(["ghost@example.com", "ada@example.com"]);
    let report = tool.execute(&base).await.unwrap();

    assert_eq!(report.emails[0].state, LookupState::NotFound);
    assert_eq!(report.emails[1].state, LookupState::Found);

    let profile = &report.profile;
    assert_eq!(profile.firstname.as_ref().unwrap().str_value, "Ada");
    assert_eq!(profile.lastname.as_ref().unwrap().str_value, "Lovelace");
    assert_eq!(profile.middlenames.len(), 1);
    assert_eq!(profile.middlenames[0].str_value, "Byron");
    assert_eq!(profile.accounts.len(), 1);
    assert_eq!(profile.accounts[0].website_name, "Google Maps");
    assert_eq!(profile.accounts[0].login, "ada@example.com");
    assert_eq!(profile.addresses.len(), 1);
    assert_eq!(profile.addresses[0].city.as_deref(), Some("Paris"));
    assert_eq!(profile.addresses[0].state_code.as_deref(), Some("75001"));

    assert_eq!(sink.profiles().await.len(), 1);
}
