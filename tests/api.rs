//! Drives the assembled router against an in-memory SQLite database.

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use msdss_users::{
    api::{UsersApi, UsersSettings, settings::{RouteGroup, RouteSettings}},
    auth::UserRequirement,
    config::{EnvOptions, SecretKind, SecretOverrides},
    database::DatabaseSettings,
    users::UserCreate,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const EMAIL: &str = "test@example.com";
const PASSWORD: &str = "msdss123";

fn settings(routes: RouteSettings) -> UsersSettings {
    UsersSettings::new()
        .with_env(EnvOptions::disabled())
        .with_database(DatabaseSettings::sqlite_memory())
        .with_secrets(SecretOverrides::new().with(SecretKind::General, "integration-secret"))
        .with_routes(routes)
}

async fn app(routes: RouteSettings) -> Result<(UsersApi, Router)> {
    let api = UsersApi::new(settings(routes)).await?;
    let router = api.router();
    Ok((api, router))
}

async fn send(router: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).context("response is not JSON")?
    };
    Ok((status, body))
}

fn json_request(method: &str, uri: &str, body: &Value, token: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::from(body.to_string()))?)
}

fn get_request(uri: &str, token: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::empty())?)
}

fn login_request(uri: &str, email: &str, password: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={email}&password={password}")))?)
}

async fn register(router: &Router, email: &str) -> Result<(StatusCode, Value)> {
    send(
        router,
        json_request(
            "POST",
            "/auth/register",
            &json!({"email": email, "password": PASSWORD}),
            None,
        )?,
    )
    .await
}

async fn login(router: &Router, email: &str) -> Result<String> {
    let (status, body) = send(router, login_request("/auth/jwt/login", email, PASSWORD)?).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["token_type"], "bearer");
    body["access_token"]
        .as_str()
        .map(ToString::to_string)
        .context("missing access_token")
}

async fn superuser_token(api: &UsersApi, router: &Router) -> Result<String> {
    api.manager()
        .create(UserCreate::new("admin@example.com", PASSWORD).with_superuser(true), false)
        .await?;
    login(router, "admin@example.com").await
}

#[tokio::test]
async fn register_login_and_me() -> Result<()> {
    let (_api, router) = app(RouteSettings::new()).await?;

    let (status, user) = register(&router, EMAIL).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["email"], EMAIL);
    assert_eq!(user["is_active"], true);
    assert_eq!(user["is_superuser"], false);
    assert_eq!(user["is_verified"], false);
    assert!(user.get("hashed_password").is_none());

    let token = login(&router, EMAIL).await?;
    let (status, me) = send(&router, get_request("/users/me", Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user["id"]);

    let (status, _) = send(&router, get_request("/users/me", None)?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_is_rejected() -> Result<()> {
    let (api, router) = app(RouteSettings::new()).await?;

    assert_eq!(register(&router, EMAIL).await?.0, StatusCode::CREATED);
    let (status, body) = register(&router, EMAIL).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "REGISTER_USER_ALREADY_EXISTS");

    assert_eq!(api.manager().store().count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn safe_register_ignores_flags() -> Result<()> {
    let (_api, router) = app(RouteSettings::new()).await?;

    let (status, user) = send(
        &router,
        json_request(
            "POST",
            "/auth/register",
            &json!({"email": EMAIL, "password": PASSWORD, "is_superuser": true, "is_verified": true}),
            None,
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["is_superuser"], false);
    assert_eq!(user["is_verified"], false);
    Ok(())
}

#[tokio::test]
async fn bad_credentials() -> Result<()> {
    let (_api, router) = app(RouteSettings::new()).await?;
    register(&router, EMAIL).await?;

    for (email, password) in [(EMAIL, "wrong"), ("nobody@example.com", PASSWORD)] {
        let (status, body) = send(&router, login_request("/auth/jwt/login", email, password)?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "LOGIN_BAD_CREDENTIALS");
    }
    Ok(())
}

#[tokio::test]
async fn refresh_issues_new_token() -> Result<()> {
    let (_api, router) = app(RouteSettings::new()).await?;
    register(&router, EMAIL).await?;
    let token = login(&router, EMAIL).await?;

    let (status, body) = send(
        &router,
        Request::builder()
            .method("POST")
            .uri("/auth/jwt/refresh")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());

    let (_api, router) = app(RouteSettings::new().with_enable_refresh(false)).await?;
    let (status, _) = send(
        &router,
        Request::builder()
            .method("POST")
            .uri("/auth/jwt/refresh")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn cookie_login_and_logout() -> Result<()> {
    let (_api, router) = app(RouteSettings::new()).await?;
    register(&router, EMAIL).await?;

    let response = router
        .clone()
        .oneshot(login_request("/auth/login", EMAIL, PASSWORD)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .context("missing Set-Cookie")?
        .to_str()?
        .to_string();
    assert!(cookie.starts_with("msdss_users_auth="));
    assert!(cookie.contains("HttpOnly"));
    let pair = cookie.split(';').next().context("empty cookie")?.to_string();

    let (status, me) = send(
        &router,
        Request::builder()
            .uri("/users/me")
            .header(header::COOKIE, pair.clone())
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], EMAIL);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header(header::COOKIE, pair)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .context("missing Set-Cookie")?
        .to_str()?;
    assert!(cleared.contains("Max-Age=0"));

    let (status, _) = send(
        &router,
        Request::builder()
            .method("POST")
            .uri("/auth/logout")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn route_groups_toggle_independently() -> Result<()> {
    let routes = RouteSettings::new().with_enabled(RouteGroup::Register, false);
    let (api, router) = app(routes).await?;
    assert!(!api.mounted().contains(&RouteGroup::Register));

    let (status, _) = register(&router, EMAIL).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    api.manager()
        .create(UserCreate::new(EMAIL, PASSWORD), false)
        .await?;
    let token = login(&router, EMAIL).await?;
    let (status, _) = send(&router, get_request("/users/me", Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn prefixes_are_configurable() -> Result<()> {
    let routes = RouteSettings::from_overrides([("users", "prefix", "/accounts")])?;
    let (_api, router) = app(routes).await?;
    register(&router, EMAIL).await?;
    let token = login(&router, EMAIL).await?;

    let (status, _) = send(&router, get_request("/accounts/me", Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&router, get_request("/users/me", Some(&token))?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn superuser_routes() -> Result<()> {
    let (api, router) = app(RouteSettings::new()).await?;
    let (_, user) = register(&router, EMAIL).await?;
    let id = user["id"].as_str().context("missing id")?.to_string();

    let token = login(&router, EMAIL).await?;
    let (status, _) = send(&router, get_request(&format!("/users/{id}"), Some(&token))?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = superuser_token(&api, &router).await?;
    let (status, fetched) = send(&router, get_request(&format!("/users/{id}"), Some(&admin))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["is_verified"], false);

    let (status, updated) = send(
        &router,
        json_request(
            "PATCH",
            &format!("/users/{id}"),
            &json!({"is_verified": true, "is_superuser": true}),
            Some(&admin),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_verified"], true);
    assert_eq!(updated["is_superuser"], true);

    let (status, _) = send(
        &router,
        Request::builder()
            .method("DELETE")
            .uri(format!("/users/{id}"))
            .header(header::AUTHORIZATION, format!("Bearer {admin}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&router, get_request(&format!("/users/{id}"), Some(&admin))?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&router, get_request("/users/not-a-uuid", Some(&admin))?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn self_update_cannot_escalate() -> Result<()> {
    let (_api, router) = app(RouteSettings::new()).await?;
    register(&router, EMAIL).await?;
    let token = login(&router, EMAIL).await?;

    let (status, me) = send(
        &router,
        json_request("PATCH", "/users/me", &json!({"is_superuser": true}), Some(&token))?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["is_superuser"], false);

    register(&router, "other@example.com").await?;
    let (status, body) = send(
        &router,
        json_request("PATCH", "/users/me", &json!({"email": "other@example.com"}), Some(&token))?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "UPDATE_USER_EMAIL_ALREADY_EXISTS");
    Ok(())
}

#[tokio::test]
async fn verify_flow() -> Result<()> {
    let (api, router) = app(RouteSettings::new()).await?;
    register(&router, EMAIL).await?;

    let (status, _) = send(
        &router,
        json_request("POST", "/auth/request-verify-token", &json!({"email": "ghost@example.com"}), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);

    let token = api
        .manager()
        .request_verify(EMAIL)
        .await?
        .context("no verification token")?;

    let (status, body) = send(
        &router,
        json_request("POST", "/auth/verify", &json!({"token": "garbage"}), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "VERIFY_USER_BAD_TOKEN");

    let (status, user) = send(
        &router,
        json_request("POST", "/auth/verify", &json!({"token": token}), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["is_verified"], true);

    let (status, body) = send(
        &router,
        json_request("POST", "/auth/verify", &json!({"token": token}), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "VERIFY_USER_ALREADY_VERIFIED");
    Ok(())
}

#[tokio::test]
async fn reset_flow() -> Result<()> {
    let (api, router) = app(RouteSettings::new()).await?;
    register(&router, EMAIL).await?;

    let (status, _) = send(
        &router,
        json_request("POST", "/auth/forgot-password", &json!({"email": "ghost@example.com"}), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);

    let token = api
        .manager()
        .forgot_password(EMAIL)
        .await?
        .context("no reset token")?;

    let reset = json!({"token": token, "password": "new-password"});
    let (status, _) = send(&router, json_request("POST", "/auth/reset-password", &reset, None)?).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&router, json_request("POST", "/auth/reset-password", &reset, None)?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "RESET_PASSWORD_BAD_TOKEN");

    let (status, _) = send(&router, login_request("/auth/jwt/login", EMAIL, "new-password")?).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn required_user_guards_a_group() -> Result<()> {
    let routes = RouteSettings::new()
        .with_required_user(RouteGroup::Register, Some(UserRequirement::SUPERUSER));
    let (api, router) = app(routes).await?;

    let (status, _) = register(&router, EMAIL).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = superuser_token(&api, &router).await?;
    let (status, _) = send(
        &router,
        json_request(
            "POST",
            "/auth/register",
            &json!({"email": EMAIL, "password": PASSWORD}),
            Some(&admin),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let token = login(&router, EMAIL).await?;
    let (status, _) = send(
        &router,
        json_request(
            "POST",
            "/auth/register",
            &json!({"email": "third@example.com", "password": PASSWORD}),
            Some(&token),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn health_and_openapi() -> Result<()> {
    let routes = RouteSettings::new().with_enabled(RouteGroup::Verify, false);
    let (_api, router) = app(routes).await?;

    let response = router.clone().oneshot(get_request("/health", None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.headers().contains_key("x-request-id"));

    let (status, spec) = send(&router, get_request("/openapi.json", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(spec["info"]["title"], "msdss-users");
    let paths = spec["paths"].as_object().context("missing paths")?;
    assert!(paths.contains_key("/auth/register"));
    assert!(paths.contains_key("/users/{id}"));
    assert!(!paths.contains_key("/auth/verify"));
    Ok(())
}

#[tokio::test]
async fn end_to_end_user_lifecycle() -> Result<()> {
    let (api, router) = app(RouteSettings::new()).await?;
    let manager = api.manager();

    register(&router, EMAIL).await?;
    let user = manager.get_by_email(EMAIL).await?;
    assert!(!user.is_verified);

    let update = msdss_users::users::UserUpdate {
        is_verified: Some(true),
        ..Default::default()
    };
    manager.update(&user, update, false).await?;
    let user = manager.get_by_email(EMAIL).await?;
    assert!(user.is_verified);

    manager.delete(&user).await?;
    assert!(matches!(
        manager.get_by_email(EMAIL).await,
        Err(msdss_users::users::UserError::NotExists)
    ));
    Ok(())
}
