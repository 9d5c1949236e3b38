use async_trait::async_trait;
use authkit::{
    authentication_middleware,
    config::{ApiKeyConfig, AuthenticationConfig, JwtConfig},
    handlers::{ApiKeyHandler, AuthenticationHandler, HandlerOptions, JwtBearerHandler},
    microsoft_account::{
        AuthorizationState, MicrosoftAccountAuthenticationExt, AUTHORIZATION_ENDPOINT,
    },
    secrets::InMemorySecretsProvider,
    security::{Claim, Principal, RequestPrincipal},
    AuthenticationBuilder, AuthenticationMode, AuthenticationPipeline, Challenge, CurrentUser,
    Identity, SchemeName, SignOut,
};
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use secrecy::Secret;
use std::sync::Arc;
use tower::ServiceExt;

const JWT_SECRET: &str = "integration-secret";
const API_KEY: &str = "ci-key-123";

/// Handler that only reacts to sign-out, clearing a session cookie
struct SessionCookieHandler {
    options: HandlerOptions,
}

#[async_trait]
impl AuthenticationHandler for SessionCookieHandler {
    fn options(&self) -> &HandlerOptions {
        &self.options
    }

    async fn authenticate(&self, _headers: &HeaderMap) -> authkit::Result<Option<Identity>> {
        Ok(None)
    }

    async fn sign_out(&self, response: &mut Response) -> authkit::Result<()> {
        response.headers_mut().append(
            header::SET_COOKIE,
            HeaderValue::from_static("session=; Max-Age=0; Path=/"),
        );
        Ok(())
    }
}

async fn setup_pipeline() -> Arc<AuthenticationPipeline> {
    let jwt = JwtBearerHandler::new(
        HandlerOptions::active("Bearer"),
        &JwtConfig {
            secret: Some(JWT_SECRET.to_string()),
            public_key: None,
            algorithm: "HS256".to_string(),
            issuer: None,
            audience: None,
        },
    )
    .unwrap();

    let api_key = ApiKeyHandler::new(
        HandlerOptions::active("ApiKey"),
        &ApiKeyConfig {
            header: "X-API-Key".to_string(),
            keys: [(API_KEY.to_string(), "CI pipeline".to_string())]
                .into_iter()
                .collect(),
            redis: None,
        },
    )
    .await
    .unwrap();

    let pipeline = AuthenticationBuilder::new()
        .add_handler(jwt)
        .add_handler(api_key)
        .add_handler(SessionCookieHandler {
            options: HandlerOptions::passive("Session"),
        })
        .use_microsoft_account_authentication(
            |o| {
                o.client_id = "app-id".to_string();
                o.client_secret = Some(Secret::new("app-secret".to_string()));
            },
            "",
        )
        .unwrap()
        .build()
        .unwrap();

    Arc::new(pipeline)
}

async fn whoami(CurrentUser(principal): CurrentUser) -> Json<serde_json::Value> {
    let schemes: Vec<String> = principal
        .authentication_schemes()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    Json(serde_json::json!({
        "sub": principal.find_first("sub").map(|c| c.value.clone()),
        "schemes": schemes,
    }))
}

async fn microsoft_login() -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Extension(Challenge::new(["Microsoft"]).with_redirect_uri("/dashboard")),
        "login required",
    )
}

async fn logout_session() -> impl IntoResponse {
    (Extension(SignOut::new(["Session"])), "signed out")
}

async fn app() -> Router {
    let pipeline = setup_pipeline().await;

    Router::new()
        .route("/whoami", get(whoami))
        .route("/login/microsoft", get(microsoft_login))
        .route("/logout", get(logout_session))
        .layer(axum::middleware::from_fn_with_state(
            pipeline,
            authentication_middleware,
        ))
}

/// Outer layer standing in for an upstream authenticator, e.g. mutual TLS
async fn upstream_identity(mut req: axum::extract::Request, next: Next) -> Response {
    let principal = Principal::new(Identity::new(
        "ClientCertificate",
        vec![Claim::new("sub", "svc-billing")],
    ));
    req.extensions_mut().insert(RequestPrincipal(principal));
    next.run(req).await
}

fn jwt(sub: &str) -> String {
    let claims = serde_json::json!({
        "sub": sub,
        "exp": (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_bearer_token_authenticates() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header(header::AUTHORIZATION, format!("Bearer {}", jwt("alice")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sub"], "alice");
    assert_eq!(body["schemes"], serde_json::json!(["Bearer"]));
}

#[tokio::test]
async fn test_identities_from_active_handlers_are_composed() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header(header::AUTHORIZATION, format!("Bearer {}", jwt("alice")))
                .header("X-API-Key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    // The handler registered last contributes the first identity
    assert_eq!(body["schemes"], serde_json::json!(["ApiKey", "Bearer"]));
}

#[tokio::test]
async fn test_upstream_principal_is_preserved() {
    let app = app()
        .await
        .layer(axum::middleware::from_fn(upstream_identity));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header(header::AUTHORIZATION, format!("Bearer {}", jwt("alice")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sub"], "alice");
    assert_eq!(
        body["schemes"],
        serde_json::json!(["Bearer", "ClientCertificate"])
    );
}

#[tokio::test]
async fn test_upstream_principal_alone_is_authenticated() {
    let app = app()
        .await
        .layer(axum::middleware::from_fn(upstream_identity));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sub"], "svc-billing");
    assert_eq!(body["schemes"], serde_json::json!(["ClientCertificate"]));
}

#[tokio::test]
async fn test_anonymous_request_gets_active_challenges() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header(header::HOST, "app.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenges: Vec<_> = response
        .headers()
        .get_all(header::WWW_AUTHENTICATE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(
        challenges,
        vec!["Bearer".to_string(), "ApiKey header=\"x-api-key\"".to_string()]
    );
    // The passive Microsoft handler stays out of unnamed challenges
    assert!(response.headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn test_invalid_token_is_treated_as_anonymous() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_named_challenge_redirects_to_microsoft() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/login/microsoft")
                .header(header::HOST, "app.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with(AUTHORIZATION_ENDPOINT));

    let url = url::Url::parse(location).unwrap();
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert_eq!(
        AuthorizationState::decode(&state).unwrap().redirect_uri,
        "/dashboard"
    );
}

#[tokio::test]
async fn test_named_sign_out_reaches_passive_handler() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::SET_COOKIE).unwrap(),
        "session=; Max-Age=0; Path=/"
    );
}

#[tokio::test]
async fn test_pipeline_from_config() {
    let yaml = r#"
schemes:
  - name: Bearer
    jwt:
      secret: "integration-secret"
  - name: ApiKey
    mode: passive
    api_key:
      keys:
        ci-key-123: "CI pipeline"
  - name: Microsoft
    microsoft_account:
      client_id: "app-id"
      client_secret_ref: ms_secret
"#;
    let config = AuthenticationConfig::from_yaml(yaml).unwrap();
    let secrets = InMemorySecretsProvider::default().with_secret("ms_secret", "shh");

    let pipeline = AuthenticationBuilder::from_config(&config, &secrets)
        .await
        .unwrap()
        .build()
        .unwrap();

    let modes: Vec<_> = pipeline
        .handlers()
        .iter()
        .map(|h| (h.scheme().to_string(), h.mode()))
        .collect();
    assert_eq!(
        modes,
        vec![
            ("Bearer".to_string(), AuthenticationMode::Active),
            ("ApiKey".to_string(), AuthenticationMode::Passive),
            ("Microsoft".to_string(), AuthenticationMode::Passive),
        ]
    );

    // Passive API key handler only runs when asked for by name
    let mut headers = HeaderMap::new();
    headers.insert("X-API-Key", HeaderValue::from_static(API_KEY));
    let mut slot: Option<authkit::Principal> = None;
    assert_eq!(pipeline.authenticate(&headers, &mut slot).await, 0);

    let identities = pipeline
        .authenticate_schemes(&headers, &[SchemeName::from("ApiKey")])
        .await
        .unwrap();
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].name(), Some("CI pipeline"));
}

#[tokio::test]
async fn test_from_config_rejects_unresolvable_secret() {
    let yaml = r#"
schemes:
  - name: Microsoft
    microsoft_account:
      client_id: "app-id"
      client_secret_ref: missing
"#;
    let config = AuthenticationConfig::from_yaml(yaml).unwrap();
    let result =
        AuthenticationBuilder::from_config(&config, &InMemorySecretsProvider::default()).await;
    assert!(result.is_err());
}
