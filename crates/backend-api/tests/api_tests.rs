use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, AUTHORIZATION,
            CONTENT_TYPE, ORIGIN,
        },
        Method, Request, StatusCode,
    },
    Router,
};
use carpool_auth::Authenticator;
use carpool_backend_api::{build_router, AppState};
use carpool_config::{AppConfig, DatabaseConfig, MapsConfig};
use carpool_maps::{polyline, LatLng, MapsClient};
use chrono::{Duration, SecondsFormat, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

type TestResult<T = ()> = anyhow::Result<T>;

struct TestContext {
    _temp_dir: TempDir,
    pool: SqlitePool,
    state: AppState,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        Self::with_maps(None).await
    }

    async fn with_maps(maps: Option<MapsClient>) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let config = DatabaseConfig {
            url: format!("sqlite:{}", temp_dir.path().join("carpool.sqlite").display()),
            max_connections: 5,
        };
        let pool = carpool_database::initialize_database(&config).await?;

        let authenticator = Authenticator::new(pool.clone(), AppConfig::default().auth);
        let state = AppState::new(pool.clone(), authenticator, maps);

        Ok(Self {
            _temp_dir: temp_dir,
            pool,
            state,
        })
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResult<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&body)?)
            }
            None => Body::empty(),
        };

        let response = self.router().oneshot(builder.body(body)?).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, payload))
    }

    /// Registers a member and returns `(token, profile public id)`.
    async fn member(&self, name: &str) -> TestResult<(String, String)> {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "email": format!("{name}@example.com"),
                    "password": "correct horse battery",
                    "first_name": name,
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register {name}: {body}");
        Ok((
            body["token"].as_str().unwrap_or_default().to_string(),
            body["user"]["id"].as_str().unwrap_or_default().to_string(),
        ))
    }

    /// Offers a ride heading due east from (47.0, 8.0) to (47.0, 8.5).
    async fn offer_ride(&self, token: &str, seats: i64) -> TestResult<Value> {
        let (status, body) = self
            .send(Method::POST, "/api/rides", Some(token), Some(eastbound_ride(seats)))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create ride: {body}");
        Ok(body)
    }

    async fn available_seats(&self, ride_id: &str) -> TestResult<i64> {
        let seats = sqlx::query_scalar("SELECT available_seats FROM rides WHERE public_id = ?")
            .bind(ride_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(seats)
    }

    async fn held_seats(&self, ride_id: &str) -> TestResult<i64> {
        let seats = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(b.seats), 0) FROM bookings b
            JOIN rides r ON r.id = b.ride_id
            WHERE r.public_id = ? AND b.status IN ('pending', 'confirmed')
            "#,
        )
        .bind(ride_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(seats)
    }
}

async fn register_vehicle(ctx: &TestContext, token: &str, seats: i64) -> TestResult<String> {
    let (status, vehicle) = ctx
        .send(
            Method::POST,
            "/api/vehicles",
            Some(token),
            Some(json!({
                "make": "Toyota",
                "model": "Corolla",
                "year": 2021,
                "license_plate": "ZH 42 007",
                "seats": seats
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{vehicle}");
    Ok(vehicle["id"].as_str().unwrap_or_default().to_string())
}

fn departure_in(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339()
}

fn eastbound_ride(seats: i64) -> Value {
    json!({
        "origin": { "address": "Lenzburg", "lat": 47.0, "lng": 8.0 },
        "destination": { "address": "Winterthur", "lat": 47.0, "lng": 8.5 },
        "departure_time": departure_in(2),
        "total_seats": seats,
        "price_per_seat": 12.5,
    })
}

fn search_uri(origin: (f64, f64), destination: (f64, f64)) -> String {
    format!(
        "/api/rides/search?origin_lat={}&origin_lng={}&destination_lat={}&destination_lng={}",
        origin.0, origin.1, destination.0, destination.1
    )
}

mod router_tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok() -> TestResult {
        let ctx = TestContext::new().await?;
        let (status, body) = ctx.send(Method::GET, "/health", None, None).await?;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn openapi_document_is_served() -> TestResult {
        let ctx = TestContext::new().await?;
        let (status, body) = ctx
            .send(Method::GET, "/api-docs/openapi.json", None, None)
            .await?;

        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/rides/{ride_id}/bookings"].is_object());
        assert!(body["components"]["securitySchemes"]["bearerAuth"].is_object());
        Ok(())
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_origin() -> TestResult {
        let ctx = TestContext::new().await?;
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/rides")
            .header(ORIGIN, "https://carpool.example")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(ACCESS_CONTROL_REQUEST_HEADERS, "authorization, content-type")
            .body(Body::empty())?;

        let response = ctx.router().oneshot(request).await?;
        assert!(response.status().is_success());

        let allow_origin = response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert_eq!(allow_origin, "*");

        let allow_methods = response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_METHODS)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_uppercase();
        assert!(allow_methods.contains("POST") && allow_methods.contains("DELETE"));
        Ok(())
    }

    #[tokio::test]
    async fn errors_use_the_json_envelope() -> TestResult {
        let ctx = TestContext::new().await?;

        let (status, body) = ctx.send(Method::GET, "/api/auth/me", None, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, body) = ctx
            .send(Method::GET, "/api/rides/does-not-exist", None, None)
            .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "ride not found");
        Ok(())
    }

    #[tokio::test]
    async fn debug_database_reports_table_counts() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.member("dana").await?;

        let (status, body) = ctx.send(Method::GET, "/api/debug/db", None, None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], true);

        let profiles = body["tables"]
            .as_array()
            .and_then(|tables| tables.iter().find(|entry| entry["table"] == "profiles"))
            .cloned()
            .unwrap_or(Value::Null);
        assert_eq!(profiles["rows"], 1);
        Ok(())
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn register_login_me_and_logout() -> TestResult {
        let ctx = TestContext::new().await?;
        let (token, profile_id) = ctx.member("ada").await?;

        let (status, body) = ctx.send(Method::GET, "/api/auth/me", Some(&token), None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], profile_id);
        assert_eq!(body["email"], "ada@example.com");

        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "ADA@example.com", "password": "correct horse battery" })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        let second_token = body["token"].as_str().unwrap_or_default().to_string();
        assert_ne!(second_token, token);

        let (status, _) = ctx
            .send(Method::POST, "/api/auth/logout", Some(&token), None)
            .await?;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = ctx.send(Method::GET, "/api/auth/me", Some(&token), None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = ctx
            .send(Method::GET, "/api/auth/me", Some(&second_token), None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_and_bad_password_are_rejected() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.member("grace").await?;

        let (status, _) = ctx
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "email": "grace@example.com", "password": "another password" })),
            )
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = ctx
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "grace@example.com", "password": "wrong password" })),
            )
            .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = ctx
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "email": "short@example.com", "password": "short" })),
            )
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn identity_login_without_provider_is_unavailable() -> TestResult {
        let ctx = TestContext::new().await?;
        let (status, body) = ctx
            .send(
                Method::GET,
                "/api/auth/identity/login?redirect_uri=http://localhost:3000/callback",
                None,
                None,
            )
            .await?;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");
        Ok(())
    }

    #[tokio::test]
    async fn dev_token_authenticates() -> TestResult {
        let ctx = TestContext::new().await?;
        let (status, body) = ctx.send(Method::GET, "/api/auth/dev/token", None, None).await?;
        assert_eq!(status, StatusCode::OK);

        let token = body["token"].as_str().unwrap_or_default().to_string();
        let (status, me) = ctx.send(Method::GET, "/api/auth/me", Some(&token), None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "dev@carpool.local");
        Ok(())
    }
}

mod profile_and_vehicle_tests {
    use super::*;

    #[tokio::test]
    async fn public_profile_hides_contact_details() -> TestResult {
        let ctx = TestContext::new().await?;
        let (token, profile_id) = ctx.member("lin").await?;
        let (viewer, _) = ctx.member("sam").await?;

        let (status, body) = ctx
            .send(
                Method::PUT,
                "/api/profiles/me",
                Some(&token),
                Some(json!({ "display_name": "Lin R.", "phone": "+41 79 000 00 00", "bio": "Early commuter" })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["phone"], "+41 79 000 00 00");

        let (status, body) = ctx
            .send(
                Method::GET,
                &format!("/api/profiles/{profile_id}"),
                Some(&viewer),
                None,
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["display_name"], "Lin R.");
        assert!(body.get("phone").is_none());
        assert!(body.get("email").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn vehicles_are_private_to_their_owner() -> TestResult {
        let ctx = TestContext::new().await?;
        let (owner, _) = ctx.member("owner").await?;
        let (other, _) = ctx.member("other").await?;

        let (status, vehicle) = ctx
            .send(
                Method::POST,
                "/api/vehicles",
                Some(&owner),
                Some(json!({
                    "make": "Skoda",
                    "model": "Octavia",
                    "color": "grey",
                    "license_plate": "AG 123 456",
                    "seats": 4
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{vehicle}");
        let vehicle_id = vehicle["id"].as_str().unwrap_or_default().to_string();

        let (status, _) = ctx
            .send(
                Method::GET,
                &format!("/api/vehicles/{vehicle_id}"),
                Some(&other),
                None,
            )
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let mut ride = eastbound_ride(5);
        ride["vehicle_id"] = json!(vehicle_id);
        let (status, body) = ctx
            .send(Method::POST, "/api/rides", Some(&owner), Some(ride))
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "more seats than the vehicle: {body}");

        let (status, _) = ctx
            .send(
                Method::DELETE,
                &format!("/api/vehicles/{vehicle_id}"),
                Some(&owner),
                None,
            )
            .await?;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, list) = ctx.send(Method::GET, "/api/vehicles", Some(&owner), None).await?;
        assert_eq!(list["vehicles"].as_array().map(Vec::len), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn vehicle_seats_cannot_drop_below_active_rides() -> TestResult {
        let ctx = TestContext::new().await?;
        let (owner, _) = ctx.member("owner").await?;
        let vehicle_id = register_vehicle(&ctx, &owner, 4).await?;
        let vehicle_uri = format!("/api/vehicles/{vehicle_id}");

        let mut payload = eastbound_ride(4);
        payload["vehicle_id"] = json!(vehicle_id);
        let (status, ride) = ctx
            .send(Method::POST, "/api/rides", Some(&owner), Some(payload))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{ride}");
        let ride_id = ride["id"].as_str().unwrap_or_default().to_string();

        let (status, body) = ctx
            .send(Method::PUT, &vehicle_uri, Some(&owner), Some(json!({ "seats": 3 })))
            .await?;
        assert_eq!(status, StatusCode::CONFLICT, "{body}");

        let (_, unchanged) = ctx.send(Method::GET, &vehicle_uri, Some(&owner), None).await?;
        assert_eq!(unchanged["seats"], 4);

        let (status, body) = ctx
            .send(
                Method::PUT,
                &vehicle_uri,
                Some(&owner),
                Some(json!({ "seats": 4, "color": "blue" })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["color"], "blue");

        ctx.send(Method::POST, &format!("/api/rides/{ride_id}/cancel"), Some(&owner), None)
            .await?;
        let (status, body) = ctx
            .send(Method::PUT, &vehicle_uri, Some(&owner), Some(json!({ "seats": 2 })))
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["seats"], 2);
        Ok(())
    }
}

mod ride_tests {
    use super::*;

    #[tokio::test]
    async fn offered_ride_is_listed_with_straight_segments() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, driver_id) = ctx.member("driver").await?;

        let mut payload = eastbound_ride(3);
        payload["waypoints"] = json!([{ "address": "Baden", "lat": 47.0, "lng": 8.25 }]);
        let (status, ride) = ctx
            .send(Method::POST, "/api/rides", Some(&driver), Some(payload))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{ride}");
        assert_eq!(ride["available_seats"], 3);
        assert_eq!(ride["status"], "active");
        assert_eq!(ride["driver"]["id"], driver_id);
        assert_eq!(ride["segments"].as_array().map(Vec::len), Some(2));
        assert_eq!(ride["segments"][1]["start"]["address"], "Baden");

        let ride_id = ride["id"].as_str().unwrap_or_default();

        let (status, listed) = ctx.send(Method::GET, "/api/rides", None, None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["rides"][0]["id"], ride_id);

        let (_, segments) = ctx
            .send(Method::GET, &format!("/api/rides/{ride_id}/segments"), None, None)
            .await?;
        assert_eq!(segments["segments"][0]["sequence"], 0);

        let (_, by_driver) = ctx
            .send(Method::GET, &format!("/api/rides/driver/{driver_id}"), None, None)
            .await?;
        assert_eq!(by_driver["rides"].as_array().map(Vec::len), Some(1));

        let (_, profile) = ctx.send(Method::GET, "/api/profiles/me", Some(&driver), None).await?;
        assert_eq!(profile["is_driver"], true);
        Ok(())
    }

    #[tokio::test]
    async fn past_departures_and_bad_seat_counts_are_rejected() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;

        let mut past = eastbound_ride(2);
        past["departure_time"] = json!(departure_in(-1));
        let (status, _) = ctx.send(Method::POST, "/api/rides", Some(&driver), Some(past)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = ctx
            .send(Method::POST, "/api/rides", Some(&driver), Some(eastbound_ride(0)))
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = ctx
            .send(Method::POST, "/api/rides", None, Some(eastbound_ride(2)))
            .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn only_the_driver_can_edit_and_seats_cannot_drop_below_bookings() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let (rider, _) = ctx.member("rider").await?;
        let ride = ctx.offer_ride(&driver, 4).await?;
        let ride_id = ride["id"].as_str().unwrap_or_default().to_string();

        let (status, _) = ctx
            .send(
                Method::POST,
                &format!("/api/rides/{ride_id}/bookings"),
                Some(&rider),
                Some(json!({ "seats": 3 })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = ctx
            .send(
                Method::PUT,
                &format!("/api/rides/{ride_id}"),
                Some(&rider),
                Some(json!({ "notes": "mine now" })),
            )
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = ctx
            .send(
                Method::PUT,
                &format!("/api/rides/{ride_id}"),
                Some(&driver),
                Some(json!({ "total_seats": 2 })),
            )
            .await?;
        assert_eq!(status, StatusCode::CONFLICT, "{body}");

        let (status, body) = ctx
            .send(
                Method::PUT,
                &format!("/api/rides/{ride_id}"),
                Some(&driver),
                Some(json!({ "total_seats": 5, "notes": "Room for luggage" })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["total_seats"], 5);
        assert_eq!(body["available_seats"], 2);
        assert_eq!(body["notes"], "Room for luggage");
        Ok(())
    }

    #[tokio::test]
    async fn cancelling_a_ride_releases_bookings_and_notifies_passengers() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let (rider, _) = ctx.member("rider").await?;
        let ride = ctx.offer_ride(&driver, 3).await?;
        let ride_id = ride["id"].as_str().unwrap_or_default().to_string();

        let (_, booking) = ctx
            .send(
                Method::POST,
                &format!("/api/rides/{ride_id}/bookings"),
                Some(&rider),
                Some(json!({ "seats": 2 })),
            )
            .await?;
        let booking_id = booking["id"].as_str().unwrap_or_default().to_string();

        let (status, cancelled) = ctx
            .send(Method::POST, &format!("/api/rides/{ride_id}/cancel"), Some(&driver), None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "cancelled");
        assert_eq!(cancelled["available_seats"], 3);

        let (_, booking) = ctx
            .send(Method::GET, &format!("/api/bookings/{booking_id}"), Some(&rider), None)
            .await?;
        assert_eq!(booking["status"], "cancelled");

        let (_, notifications) = ctx
            .send(Method::GET, "/api/notifications", Some(&rider), None)
            .await?;
        assert_eq!(notifications["notifications"][0]["type"], "ride_cancelled");

        let (status, _) = ctx
            .send(Method::POST, &format!("/api/rides/{ride_id}/cancel"), Some(&driver), None)
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn created_ride_reads_back_every_submitted_field() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let vehicle_id = register_vehicle(&ctx, &driver, 4).await?;
        let departure = (Utc::now() + Duration::days(3)).to_rfc3339_opts(SecondsFormat::Secs, true);

        let (status, created) = ctx
            .send(
                Method::POST,
                "/api/rides",
                Some(&driver),
                Some(json!({
                    "origin": { "address": "Aarau", "lat": 47.3904, "lng": 8.0457 },
                    "destination": { "address": "Zug", "lat": 47.1662, "lng": 8.5155 },
                    "departure_time": departure,
                    "total_seats": 3,
                    "vehicle_id": vehicle_id,
                    "price_per_seat": 9.75,
                    "notes": "Meeting point at the station"
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        let ride_id = created["id"].as_str().unwrap_or_default().to_string();

        let (status, ride) = ctx
            .send(Method::GET, &format!("/api/rides/{ride_id}"), None, None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        for view in [&created, &ride] {
            assert_eq!(view["departure_time"], departure);
            assert_eq!(view["price_per_seat"], 9.75);
            assert_eq!(view["total_seats"], 3);
            assert_eq!(view["available_seats"], 3);
            assert_eq!(view["notes"], "Meeting point at the station");
            assert_eq!(view["vehicle"]["id"], vehicle_id);
            assert_eq!(view["origin"]["address"], "Aarau");
            assert_eq!(view["origin"]["lat"], 47.3904);
            assert_eq!(view["origin"]["lng"], 8.0457);
            assert_eq!(view["destination"]["address"], "Zug");
            assert_eq!(view["destination"]["lat"], 47.1662);
            assert_eq!(view["destination"]["lng"], 8.5155);
        }
        Ok(())
    }

    #[tokio::test]
    async fn client_supplied_route_is_stored_as_one_segment() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let encoded = polyline::encode(&[
            LatLng::new(47.0, 8.0),
            LatLng::new(47.02, 8.25),
            LatLng::new(47.0, 8.5),
        ]);

        let mut payload = eastbound_ride(2);
        payload["route"] = json!({
            "polyline": encoded,
            "distance_meters": 41_000,
            "duration_seconds": 2_400
        });
        let (status, ride) = ctx
            .send(Method::POST, "/api/rides", Some(&driver), Some(payload))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{ride}");
        assert_eq!(ride["route"]["polyline"], encoded);
        assert_eq!(ride["route"]["distance_meters"], 41_000);
        assert_eq!(ride["route"]["duration_seconds"], 2_400);
        assert_eq!(ride["segments"].as_array().map(Vec::len), Some(1));
        assert_eq!(ride["segments"][0]["polyline"], encoded);
        Ok(())
    }

    #[tokio::test]
    async fn client_routes_off_the_globe_or_overflowing_are_rejected() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;

        let out_of_range =
            polyline::encode(&[LatLng::new(1000.0, 2000.0), LatLng::new(1000.1, 2000.1)]);
        let overflowing = "}~~~~~~~~~~~F?".repeat(3);

        for encoded in [out_of_range, overflowing] {
            let mut payload = eastbound_ride(2);
            payload["route"] = json!({ "polyline": encoded });
            let (status, body) = ctx
                .send(Method::POST, "/api/rides", Some(&driver), Some(payload))
                .await?;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }

        let (_, listed) = ctx.send(Method::GET, "/api/rides", None, None).await?;
        assert_eq!(listed["rides"].as_array().map(Vec::len), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn rides_respect_vehicle_ownership_and_capacity() -> TestResult {
        let ctx = TestContext::new().await?;
        let (owner, _) = ctx.member("owner").await?;
        let (driver, _) = ctx.member("driver").await?;
        let vehicle_id = register_vehicle(&ctx, &owner, 3).await?;

        let mut borrowed = eastbound_ride(2);
        borrowed["vehicle_id"] = json!(vehicle_id);
        let (status, _) = ctx
            .send(Method::POST, "/api/rides", Some(&driver), Some(borrowed))
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let mut crowded = eastbound_ride(4);
        crowded["vehicle_id"] = json!(vehicle_id);
        let (status, body) = ctx
            .send(Method::POST, "/api/rides", Some(&owner), Some(crowded))
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

        let mut fitting = eastbound_ride(3);
        fitting["vehicle_id"] = json!(vehicle_id);
        let (status, body) = ctx
            .send(Method::POST, "/api/rides", Some(&owner), Some(fitting))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        Ok(())
    }

    #[tokio::test]
    async fn driver_rides_can_be_filtered_by_status() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, driver_id) = ctx.member("driver").await?;
        let kept = ctx.offer_ride(&driver, 2).await?;
        let dropped = ctx.offer_ride(&driver, 3).await?;
        let dropped_id = dropped["id"].as_str().unwrap_or_default().to_string();
        ctx.send(Method::POST, &format!("/api/rides/{dropped_id}/cancel"), Some(&driver), None)
            .await?;

        let uri = format!("/api/rides/driver/{driver_id}");
        let (_, all) = ctx.send(Method::GET, &uri, None, None).await?;
        assert_eq!(all["rides"].as_array().map(Vec::len), Some(2));

        let (_, active) = ctx.send(Method::GET, &format!("{uri}?status=active"), None, None).await?;
        assert_eq!(active["rides"].as_array().map(Vec::len), Some(1));
        assert_eq!(active["rides"][0]["id"], kept["id"]);

        let (_, cancelled) = ctx
            .send(Method::GET, &format!("{uri}?status=cancelled"), None, None)
            .await?;
        assert_eq!(cancelled["rides"].as_array().map(Vec::len), Some(1));
        assert_eq!(cancelled["rides"][0]["id"], dropped_id.as_str());
        assert_eq!(cancelled["rides"][0]["status"], "cancelled");

        let (status, _) = ctx.send(Method::GET, &format!("{uri}?status=parked"), None, None).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }
}

mod search_tests {
    use super::*;

    #[tokio::test]
    async fn search_matches_riders_along_the_route() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let (rider, _) = ctx.member("rider").await?;
        let ride = ctx.offer_ride(&driver, 3).await?;

        let (status, body) = ctx
            .send(
                Method::GET,
                &search_uri((47.001, 8.1), (47.001, 8.4)),
                Some(&rider),
                None,
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        let results = body["results"].as_array().cloned().unwrap_or_default();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["ride"]["id"], ride["id"]);

        let pickup = results[0]["pickup_progress_meters"].as_f64().unwrap_or_default();
        let dropoff = results[0]["dropoff_progress_meters"].as_f64().unwrap_or_default();
        assert!(pickup < dropoff);
        assert!(results[0]["pickup_distance_meters"].as_f64().unwrap_or(f64::MAX) < 200.0);
        Ok(())
    }

    #[tokio::test]
    async fn search_ignores_opposite_direction_far_points_and_own_rides() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let (rider, _) = ctx.member("rider").await?;
        ctx.offer_ride(&driver, 3).await?;

        let (_, westbound) = ctx
            .send(Method::GET, &search_uri((47.0, 8.4), (47.0, 8.1)), Some(&rider), None)
            .await?;
        assert_eq!(westbound["results"].as_array().map(Vec::len), Some(0));

        let (_, far) = ctx
            .send(Method::GET, &search_uri((47.3, 8.1), (47.0, 8.4)), Some(&rider), None)
            .await?;
        assert_eq!(far["results"].as_array().map(Vec::len), Some(0));

        let (_, own) = ctx
            .send(Method::GET, &search_uri((47.0, 8.1), (47.0, 8.4)), Some(&driver), None)
            .await?;
        assert_eq!(own["results"].as_array().map(Vec::len), Some(0));

        let (status, _) = ctx
            .send(Method::GET, &search_uri((95.0, 8.1), (47.0, 8.4)), Some(&rider), None)
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn search_respects_requested_seats() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let (rider, _) = ctx.member("rider").await?;
        ctx.offer_ride(&driver, 2).await?;

        let uri = format!("{}&seats=3", search_uri((47.0, 8.1), (47.0, 8.4)));
        let (_, body) = ctx.send(Method::GET, &uri, Some(&rider), None).await?;
        assert_eq!(body["results"].as_array().map(Vec::len), Some(0));
        Ok(())
    }
}

mod booking_tests {
    use super::*;

    #[tokio::test]
    async fn booking_lifecycle_keeps_seat_accounting_consistent() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let (alice, _) = ctx.member("alice").await?;
        let (bob, _) = ctx.member("bob").await?;
        let ride = ctx.offer_ride(&driver, 3).await?;
        let ride_id = ride["id"].as_str().unwrap_or_default().to_string();
        let bookings_uri = format!("/api/rides/{ride_id}/bookings");

        let (status, first) = ctx
            .send(Method::POST, &bookings_uri, Some(&alice), Some(json!({ "seats": 2 })))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{first}");
        assert_eq!(first["status"], "pending");
        assert_eq!(ctx.available_seats(&ride_id).await?, 1);

        let (status, body) = ctx
            .send(Method::POST, &bookings_uri, Some(&bob), Some(json!({ "seats": 2 })))
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "not enough seats available");

        let (status, _) = ctx
            .send(Method::POST, &bookings_uri, Some(&alice), Some(json!({ "seats": 1 })))
            .await?;
        assert_eq!(status, StatusCode::CONFLICT, "second open booking by the same rider");

        let (status, _) = ctx
            .send(Method::POST, &bookings_uri, Some(&driver), Some(json!({ "seats": 1 })))
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let first_id = first["id"].as_str().unwrap_or_default().to_string();
        let (status, _) = ctx
            .send(Method::POST, &format!("/api/bookings/{first_id}/confirm"), Some(&alice), None)
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, confirmed) = ctx
            .send(Method::POST, &format!("/api/bookings/{first_id}/confirm"), Some(&driver), None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["status"], "confirmed");

        let (_, second) = ctx
            .send(Method::POST, &bookings_uri, Some(&bob), Some(json!({ "seats": 1 })))
            .await?;
        let second_id = second["id"].as_str().unwrap_or_default().to_string();
        assert_eq!(ctx.available_seats(&ride_id).await?, 0);

        let (status, rejected) = ctx
            .send(Method::POST, &format!("/api/bookings/{second_id}/reject"), Some(&driver), None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rejected["status"], "rejected");
        assert_eq!(ctx.available_seats(&ride_id).await?, 1);

        let (status, _) = ctx
            .send(Method::POST, &format!("/api/bookings/{second_id}/confirm"), Some(&driver), None)
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, cancelled) = ctx
            .send(Method::POST, &format!("/api/bookings/{first_id}/cancel"), Some(&alice), None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "cancelled");
        assert_eq!(ctx.available_seats(&ride_id).await?, 3);
        assert_eq!(ctx.held_seats(&ride_id).await?, 0);

        let (_, listed) = ctx.send(Method::GET, &bookings_uri, Some(&driver), None).await?;
        assert_eq!(listed["bookings"].as_array().map(Vec::len), Some(2));

        let (status, _) = ctx.send(Method::GET, &bookings_uri, Some(&alice), None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, mine) = ctx
            .send(Method::GET, "/api/bookings?status=cancelled", Some(&alice), None)
            .await?;
        assert_eq!(mine["bookings"].as_array().map(Vec::len), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_requests_never_overbook() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let ride = ctx.offer_ride(&driver, 2).await?;
        let ride_id = ride["id"].as_str().unwrap_or_default().to_string();

        let mut riders = Vec::new();
        for index in 0..6 {
            riders.push(ctx.member(&format!("rider{index}")).await?.0);
        }

        let uri = format!("/api/rides/{ride_id}/bookings");
        let attempts = riders.iter().map(|token| {
            ctx.send(Method::POST, &uri, Some(token.as_str()), Some(json!({ "seats": 1 })))
        });
        let outcomes = futures::future::join_all(attempts).await;

        let mut created = 0;
        for outcome in outcomes {
            let (status, body) = outcome?;
            match status {
                StatusCode::CREATED => created += 1,
                StatusCode::CONFLICT => {}
                other => panic!("unexpected status {other}: {body}"),
            }
        }

        assert_eq!(created, 2);
        assert_eq!(ctx.available_seats(&ride_id).await?, 0);
        assert_eq!(ctx.held_seats(&ride_id).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn driver_is_notified_of_requests() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let (rider, _) = ctx.member("rider").await?;
        let ride = ctx.offer_ride(&driver, 2).await?;
        let ride_id = ride["id"].as_str().unwrap_or_default().to_string();

        let (_, booking) = ctx
            .send(
                Method::POST,
                &format!("/api/rides/{ride_id}/bookings"),
                Some(&rider),
                Some(json!({ "seats": 1, "message": "I can meet at the station" })),
            )
            .await?;

        let (_, unread) = ctx
            .send(Method::GET, "/api/notifications/unread-count", Some(&driver), None)
            .await?;
        assert_eq!(unread["unread_count"], 1);

        let (_, list) = ctx
            .send(Method::GET, "/api/notifications?unread_only=true", Some(&driver), None)
            .await?;
        let notification = list["notifications"][0].clone();
        assert_eq!(notification["type"], "booking_requested");
        assert_eq!(notification["booking_id"], booking["id"]);
        assert_eq!(notification["ride_id"], ride["id"]);
        Ok(())
    }
}

mod completion_tests {
    use super::*;

    #[tokio::test]
    async fn completing_a_ride_records_impact_for_everyone_carried() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let (confirmed_rider, _) = ctx.member("confirmed").await?;
        let (pending_rider, _) = ctx.member("pending").await?;
        let ride = ctx.offer_ride(&driver, 4).await?;
        let ride_id = ride["id"].as_str().unwrap_or_default().to_string();
        let bookings_uri = format!("/api/rides/{ride_id}/bookings");

        let (_, booking) = ctx
            .send(Method::POST, &bookings_uri, Some(&confirmed_rider), Some(json!({ "seats": 2 })))
            .await?;
        let booking_id = booking["id"].as_str().unwrap_or_default().to_string();
        ctx.send(Method::POST, &format!("/api/bookings/{booking_id}/confirm"), Some(&driver), None)
            .await?;
        let (_, pending) = ctx
            .send(Method::POST, &bookings_uri, Some(&pending_rider), Some(json!({ "seats": 1 })))
            .await?;

        let (status, completed) = ctx
            .send(Method::POST, &format!("/api/rides/{ride_id}/complete"), Some(&driver), None)
            .await?;
        assert_eq!(status, StatusCode::OK, "{completed}");
        assert_eq!(completed["status"], "completed");
        assert_eq!(completed["available_seats"], 2);

        let pending_id = pending["id"].as_str().unwrap_or_default();
        let (_, pending) = ctx
            .send(Method::GET, &format!("/api/bookings/{pending_id}"), Some(&pending_rider), None)
            .await?;
        assert_eq!(pending["status"], "rejected");

        let (_, passenger) = ctx
            .send(Method::GET, "/api/impact/me", Some(&confirmed_rider), None)
            .await?;
        let (_, driver_impact) = ctx.send(Method::GET, "/api/impact/me", Some(&driver), None).await?;
        let (_, nobody) = ctx
            .send(Method::GET, "/api/impact/me", Some(&pending_rider), None)
            .await?;

        assert_eq!(passenger["rides_shared"], 1);
        assert_eq!(driver_impact["rides_shared"], 1);
        assert_eq!(nobody["rides_shared"], 0);
        assert_eq!(nobody["co2_saved_kg"], 0.0);

        let km = passenger["distance_shared_km"].as_f64().unwrap_or_default();
        assert!(km > 30.0 && km < 45.0, "unexpected distance {km}");
        let co2 = passenger["co2_saved_kg"].as_f64().unwrap_or_default();
        assert!((co2 - km * 0.192 * 2.0).abs() < 1e-6);
        let driver_co2 = driver_impact["co2_saved_kg"].as_f64().unwrap_or_default();
        assert!((driver_co2 - co2).abs() < 1e-6);

        let (_, summary) = ctx.send(Method::GET, "/api/impact/summary", None, None).await?;
        assert_eq!(summary["participants"], 2);
        assert_eq!(summary["completed_rides"], 1);
        assert_eq!(summary["rides_shared"], 2);

        let (status, _) = ctx
            .send(
                Method::POST,
                &format!("/api/bookings/{booking_id}/cancel"),
                Some(&confirmed_rider),
                None,
            )
            .await?;
        assert_eq!(status, StatusCode::CONFLICT);
        let (_, still_confirmed) = ctx
            .send(Method::GET, &format!("/api/bookings/{booking_id}"), Some(&confirmed_rider), None)
            .await?;
        assert_eq!(still_confirmed["status"], "confirmed");
        assert_eq!(ctx.available_seats(&ride_id).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn completing_without_passengers_records_nothing() -> TestResult {
        let ctx = TestContext::new().await?;
        let (driver, _) = ctx.member("driver").await?;
        let ride = ctx.offer_ride(&driver, 2).await?;
        let ride_id = ride["id"].as_str().unwrap_or_default().to_string();

        let (status, _) = ctx
            .send(Method::POST, &format!("/api/rides/{ride_id}/complete"), Some(&driver), None)
            .await?;
        assert_eq!(status, StatusCode::OK);

        let (_, impact) = ctx.send(Method::GET, "/api/impact/me", Some(&driver), None).await?;
        assert_eq!(impact["rides_shared"], 0);
        assert!(impact["updated_at"].is_null());
        Ok(())
    }
}

mod message_tests {
    use super::*;

    #[tokio::test]
    async fn conversations_threads_and_read_state() -> TestResult {
        let ctx = TestContext::new().await?;
        let (alice, alice_id) = ctx.member("alice").await?;
        let (bob, bob_id) = ctx.member("bob").await?;
        let (carol, carol_id) = ctx.member("carol").await?;

        for content in ["Hi Bob", "Is the seat still free?"] {
            let (status, message) = ctx
                .send(
                    Method::POST,
                    "/api/messages",
                    Some(&alice),
                    Some(json!({ "recipient_id": bob_id, "content": content })),
                )
                .await?;
            assert_eq!(status, StatusCode::CREATED, "{message}");
        }
        ctx.send(
            Method::POST,
            "/api/messages",
            Some(&carol),
            Some(json!({ "recipient_id": bob_id, "content": "Running late" })),
        )
        .await?;

        let (_, unread) = ctx
            .send(Method::GET, "/api/messages/unread-count", Some(&bob), None)
            .await?;
        assert_eq!(unread["unread_count"], 3);

        let (_, conversations) = ctx.send(Method::GET, "/api/messages", Some(&bob), None).await?;
        let conversations = conversations["conversations"].as_array().cloned().unwrap_or_default();
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0]["counterpart"]["id"], carol_id);
        let with_alice = &conversations[1];
        assert_eq!(with_alice["counterpart"]["id"], alice_id);
        assert_eq!(with_alice["last_message"], "Is the seat still free?");
        assert_eq!(with_alice["unread_count"], 2);

        let (_, thread) = ctx
            .send(Method::GET, &format!("/api/messages/{alice_id}"), Some(&bob), None)
            .await?;
        assert_eq!(thread["messages"][0]["content"], "Hi Bob");
        assert_eq!(thread["messages"][1]["content"], "Is the seat still free?");

        let (_, paged) = ctx
            .send(
                Method::GET,
                &format!("/api/messages/{alice_id}?limit=1&offset=1"),
                Some(&bob),
                None,
            )
            .await?;
        assert_eq!(paged["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(paged["messages"][0]["content"], "Is the seat still free?");

        let (status, marked) = ctx
            .send(Method::POST, &format!("/api/messages/{alice_id}/read"), Some(&bob), None)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(marked["updated"], 2);

        let (_, unread) = ctx
            .send(Method::GET, "/api/messages/unread-count", Some(&bob), None)
            .await?;
        assert_eq!(unread["unread_count"], 1);

        let (_, notifications) = ctx
            .send(Method::GET, "/api/notifications", Some(&bob), None)
            .await?;
        assert_eq!(notifications["notifications"][0]["type"], "new_message");
        Ok(())
    }

    #[tokio::test]
    async fn invalid_messages_are_rejected() -> TestResult {
        let ctx = TestContext::new().await?;
        let (alice, alice_id) = ctx.member("alice").await?;
        let (_, bob_id) = ctx.member("bob").await?;

        let cases = [
            (json!({ "recipient_id": bob_id, "content": "   " }), StatusCode::BAD_REQUEST),
            (json!({ "recipient_id": alice_id, "content": "note to self" }), StatusCode::BAD_REQUEST),
            (json!({ "recipient_id": "nobody", "content": "hello" }), StatusCode::NOT_FOUND),
            (
                json!({ "recipient_id": bob_id, "content": "x".repeat(2001) }),
                StatusCode::BAD_REQUEST,
            ),
            (
                json!({ "recipient_id": bob_id, "ride_id": "missing", "content": "hello" }),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (payload, expected) in cases {
            let (status, body) = ctx
                .send(Method::POST, "/api/messages", Some(&alice), Some(payload))
                .await?;
            assert_eq!(status, expected, "{body}");
        }
        Ok(())
    }
}

mod notification_tests {
    use super::*;

    #[tokio::test]
    async fn notifications_can_be_read_and_deleted() -> TestResult {
        let ctx = TestContext::new().await?;
        let (alice, _) = ctx.member("alice").await?;
        let (bob, bob_id) = ctx.member("bob").await?;

        for content in ["one", "two", "three"] {
            ctx.send(
                Method::POST,
                "/api/messages",
                Some(&alice),
                Some(json!({ "recipient_id": bob_id, "content": content })),
            )
            .await?;
        }

        let (_, list) = ctx.send(Method::GET, "/api/notifications", Some(&bob), None).await?;
        let ids: Vec<String> = list["notifications"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(ids.len(), 3);

        let (status, updated) = ctx
            .send(
                Method::PUT,
                &format!("/api/notifications/{}/read", ids[0]),
                Some(&bob),
                Some(json!({ "read": true })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["notification"]["read"], true);

        let (status, _) = ctx
            .send(
                Method::PUT,
                &format!("/api/notifications/{}/read", ids[1]),
                Some(&alice),
                Some(json!({ "read": true })),
            )
            .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, marked) = ctx
            .send(Method::POST, "/api/notifications/read-all", Some(&bob), None)
            .await?;
        assert_eq!(marked["updated"], 2);

        let (status, _) = ctx
            .send(Method::DELETE, &format!("/api/notifications/{}", ids[2]), Some(&bob), None)
            .await?;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, list) = ctx
            .send(Method::GET, "/api/notifications?limit=10", Some(&bob), None)
            .await?;
        assert_eq!(list["notifications"].as_array().map(Vec::len), Some(2));
        Ok(())
    }
}

mod maps_tests {
    use super::*;
    use httpmock::prelude::*;

    fn maps_client(server: &MockServer) -> TestResult<MapsClient> {
        let config = MapsConfig {
            api_key: Some("test-maps-key".into()),
            places_base_url: server.base_url(),
            geocode_base_url: server.base_url(),
            routes_base_url: server.base_url(),
            request_timeout_seconds: 2,
            ..MapsConfig::default()
        };
        Ok(MapsClient::new(&config)?)
    }

    #[tokio::test]
    async fn maps_endpoints_are_unavailable_without_configuration() -> TestResult {
        let ctx = TestContext::new().await?;
        let (token, _) = ctx.member("ada").await?;

        let (status, body) = ctx
            .send(Method::GET, "/api/maps/geocode?address=Zurich", Some(&token), None)
            .await?;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "maps integration is not configured");

        let (status, _) = ctx
            .send(Method::GET, "/api/maps/geocode?address=Zurich", None, None)
            .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn geocode_proxies_the_provider() -> TestResult {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/maps/api/geocode/json")
                    .query_param("address", "Bahnhofplatz, Bern");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .body(
                        json!({
                            "status": "OK",
                            "results": [{
                                "formatted_address": "Bahnhofplatz, 3011 Bern, Switzerland",
                                "place_id": "bern-hb",
                                "geometry": { "location": { "lat": 46.9488, "lng": 7.4393 } }
                            }]
                        })
                        .to_string(),
                    );
            })
            .await;

        let ctx = TestContext::with_maps(Some(maps_client(&server)?)).await?;
        let (token, _) = ctx.member("ada").await?;

        let (status, body) = ctx
            .send(
                Method::GET,
                "/api/maps/geocode?address=Bahnhofplatz,%20Bern",
                Some(&token),
                None,
            )
            .await?;
        mock.assert_async().await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["results"][0]["place_id"], "bern-hb");
        assert_eq!(body["results"][0]["location"]["lat"], 46.9488);
        Ok(())
    }

    #[tokio::test]
    async fn ride_creation_uses_provider_route_legs() -> TestResult {
        let server = MockServer::start_async().await;
        let leg = polyline::encode(&[
            LatLng::new(47.0, 8.0),
            LatLng::new(47.01, 8.25),
            LatLng::new(47.0, 8.5),
        ]);
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/directions/v2:computeRoutes");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .body(
                        json!({
                            "routes": [{
                                "distanceMeters": 41000,
                                "duration": "2400s",
                                "polyline": { "encodedPolyline": leg },
                                "legs": [{
                                    "distanceMeters": 41000,
                                    "duration": "2400s",
                                    "polyline": { "encodedPolyline": leg },
                                    "startLocation": { "latLng": { "latitude": 47.0, "longitude": 8.0 } },
                                    "endLocation": { "latLng": { "latitude": 47.0, "longitude": 8.5 } }
                                }]
                            }]
                        })
                        .to_string(),
                    );
            })
            .await;

        let ctx = TestContext::with_maps(Some(maps_client(&server)?)).await?;
        let (driver, _) = ctx.member("driver").await?;
        let ride = ctx.offer_ride(&driver, 3).await?;

        mock.assert_async().await;
        assert_eq!(ride["route"]["distance_meters"], 41000);
        assert_eq!(ride["route"]["duration_seconds"], 2400);
        assert_eq!(ride["segments"].as_array().map(Vec::len), Some(1));
        assert_eq!(ride["segments"][0]["start"]["address"], "Lenzburg");
        assert_eq!(ride["segments"][0]["polyline"], leg);
        Ok(())
    }

    #[tokio::test]
    async fn route_without_result_is_unprocessable() -> TestResult {
        let server = MockServer::start_async().await;
        let _mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/directions/v2:computeRoutes");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .body("{}");
            })
            .await;

        let ctx = TestContext::with_maps(Some(maps_client(&server)?)).await?;
        let (token, _) = ctx.member("ada").await?;

        let (status, _) = ctx
            .send(
                Method::POST,
                "/api/maps/route",
                Some(&token),
                Some(json!({
                    "origin": { "lat": 47.0, "lng": 8.0 },
                    "destination": { "lat": -33.9, "lng": 151.2 }
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (driver, _) = ctx.member("driver").await?;
        let ride = ctx.offer_ride(&driver, 2).await?;
        assert_eq!(ride["segments"].as_array().map(Vec::len), Some(1));
        Ok(())
    }
}
