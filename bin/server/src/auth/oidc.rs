//! OIDC client implementation using the openidconnect crate.

use async_trait::async_trait;
use base64::Engine;
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointMaybeSet, EndpointNotSet,
    EndpointSet, IssuerUrl, Nonce, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl,
    RequestTokenError, Scope, TokenResponse,
};
use rootcause::Report;
use serde_json::Value;
use std::time::Duration;
use tenant_gate_access::{
    AuthResult, AuthenticationError, CallbackData, FlowState, IdTokenClaims, IdentityProvider,
    LoginInitiation, OidcConfig,
};

/// OIDC client for authenticating users against the configured authority.
pub struct OidcClient {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    http_client: reqwest::Client,
}

impl OidcClient {
    /// Creates a new OIDC client by discovering the provider metadata.
    pub async fn discover(config: &OidcConfig, timeout: Duration) -> Result<Self, OidcError> {
        let issuer_url = IssuerUrl::new(config.issuer_url())
            .map_err(|e| OidcError::Configuration(format!("invalid issuer URL: {}", e)))?;

        let http_client = http_client(timeout)?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| OidcError::Discovery(format!("failed to discover provider: {}", e)))?;

        tracing::info!(issuer = %config.issuer_url(), "Discovered OIDC provider");

        Ok(Self::new(provider_metadata, config, http_client))
    }

    /// Creates a client for provider metadata that is already known.
    pub fn from_metadata(
        provider_metadata: CoreProviderMetadata,
        config: &OidcConfig,
        timeout: Duration,
    ) -> Result<Self, OidcError> {
        Ok(Self::new(provider_metadata, config, http_client(timeout)?))
    }

    fn new(
        provider_metadata: CoreProviderMetadata,
        config: &OidcConfig,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            provider_metadata,
            client_id: ClientId::new(config.client_id().to_string()),
            client_secret: ClientSecret::new(config.client_secret().to_string()),
            http_client,
        }
    }

    fn core_client(&self) -> CoreClient<
        EndpointSet,
        EndpointNotSet,
        EndpointNotSet,
        EndpointNotSet,
        EndpointMaybeSet,
        EndpointMaybeSet,
    > {
        CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
    }

    /// Generates the authorization URL and the flow state to keep until the callback.
    pub fn authorization_url(
        &self,
        scopes: &[&str],
        redirect_uri: &str,
    ) -> Result<LoginInitiation, OidcError> {
        let client = self.core_client().set_redirect_uri(redirect_url(redirect_uri)?);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);

        for scope in scopes {
            auth_request = auth_request.add_scope(Scope::new((*scope).to_string()));
        }

        let (auth_url, csrf_token, nonce) = auth_request.url();

        let flow = FlowState::new(
            csrf_token.secret().clone(),
            nonce.secret().clone(),
            pkce_verifier.secret().clone(),
            redirect_uri.to_string(),
            scopes.iter().map(|s| (*s).to_string()).collect(),
        );

        Ok(LoginInitiation {
            authorization_url: auth_url.to_string(),
            flow,
        })
    }

    /// Exchanges the authorization code for tokens and extracts the ID token claims.
    pub async fn exchange(
        &self,
        callback: &CallbackData,
        flow: &FlowState,
    ) -> Result<AuthResult, OidcError> {
        if !state_matches(callback, flow) {
            tracing::warn!("Callback state does not match the stored flow");
            return Ok(AuthResult::SessionExpired);
        }

        let client = self
            .core_client()
            .set_redirect_uri(redirect_url(&flow.redirect_uri)?);

        let mut token_request = client
            .exchange_code(AuthorizationCode::new(callback.code.clone()))
            .map_err(|e| OidcError::Configuration(format!("token endpoint error: {}", e)))?
            .set_pkce_verifier(PkceCodeVerifier::new(flow.pkce_verifier.clone()));
        if !flow.scopes.is_empty() {
            token_request = token_request.add_extra_param("scope", flow.scopes.join(" "));
        }

        let token_response = match token_request
            .request_async(&self.http_client)
            .await
        {
            Ok(response) => response,
            Err(RequestTokenError::ServerResponse(response)) => {
                let body = serde_json::to_value(&response).unwrap_or(Value::Null);
                return Ok(provider_error(&body));
            }
            Err(e) => {
                return Err(OidcError::TokenExchange(format!(
                    "token exchange failed: {}",
                    e
                )));
            }
        };

        let id_token = token_response
            .id_token()
            .ok_or_else(|| OidcError::TokenValidation("no ID token in response".to_string()))?;

        let nonce = Nonce::new(flow.nonce.clone());
        id_token
            .claims(&client.id_token_verifier(), &nonce)
            .map_err(|e| {
                OidcError::TokenValidation(format!("ID token validation failed: {}", e))
            })?;

        // The signature is verified above; custom claims such as `tid` are read
        // from the raw payload since the core claim types do not carry them.
        let payload = id_token_payload(&token_response)?;

        match IdTokenClaims::from_payload(payload) {
            Ok(claims) => Ok(AuthResult::Success(Box::new(claims))),
            Err(AuthenticationError::MissingClaim { claim }) => Ok(AuthResult::ProviderError {
                error: "invalid_token".to_string(),
                description: format!("ID token is missing the {claim} claim"),
            }),
            Err(e) => Err(OidcError::TokenValidation(e.to_string())),
        }
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    fn initiate_flow(
        &self,
        scopes: &[&str],
        redirect_uri: &str,
    ) -> Result<LoginInitiation, Report<AuthenticationError>> {
        Ok(self
            .authorization_url(scopes, redirect_uri)
            .map_err(AuthenticationError::from)?)
    }

    async fn exchange_code(
        &self,
        callback: &CallbackData,
        flow: &FlowState,
    ) -> Result<AuthResult, Report<AuthenticationError>> {
        Ok(self
            .exchange(callback, flow)
            .await
            .map_err(AuthenticationError::from)?)
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, OidcError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| OidcError::Configuration(format!("failed to create HTTP client: {}", e)))
}

fn redirect_url(redirect_uri: &str) -> Result<RedirectUrl, OidcError> {
    RedirectUrl::new(redirect_uri.to_string())
        .map_err(|e| OidcError::Configuration(format!("invalid redirect URI: {}", e)))
}

fn state_matches(callback: &CallbackData, flow: &FlowState) -> bool {
    callback.state.as_deref() == Some(flow.state.as_str())
}

/// Builds a provider refusal from an OAuth2 error response body.
fn provider_error(body: &Value) -> AuthResult {
    let error = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error")
        .to_string();
    let description = body
        .get("error_description")
        .and_then(Value::as_str)
        .map_or_else(|| error.clone(), str::to_string);

    AuthResult::ProviderError { error, description }
}

/// Extracts and decodes the raw ID token payload from a token response.
fn id_token_payload<TR>(token_response: &TR) -> Result<Value, OidcError>
where
    TR: serde::Serialize,
{
    let response_json = serde_json::to_value(token_response).map_err(|e| {
        OidcError::TokenValidation(format!("Failed to serialize token response: {}", e))
    })?;

    let id_token = response_json
        .get("id_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| OidcError::TokenValidation("No id_token in response".to_string()))?;

    decode_jwt_payload(id_token)
}

/// Decodes the payload of a compact JWT without verifying it.
fn decode_jwt_payload(jwt: &str) -> Result<Value, OidcError> {
    // JWT is base64url(header).base64url(payload).signature
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(OidcError::TokenValidation("Invalid JWT format".to_string()));
    }

    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| OidcError::TokenValidation(format!("Failed to decode JWT payload: {}", e)))?;

    serde_json::from_slice(&payload_bytes)
        .map_err(|e| OidcError::TokenValidation(format!("Failed to parse JWT payload: {}", e)))
}

/// OIDC-related errors.
#[derive(Debug)]
pub enum OidcError {
    /// Configuration error (invalid URLs, etc.)
    Configuration(String),
    /// Failed to discover provider metadata.
    Discovery(String),
    /// Token exchange failed.
    TokenExchange(String),
    /// Token validation failed.
    TokenValidation(String),
}

impl std::fmt::Display for OidcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "OIDC configuration error: {}", msg),
            Self::Discovery(msg) => write!(f, "OIDC discovery error: {}", msg),
            Self::TokenExchange(msg) => write!(f, "OIDC token exchange error: {}", msg),
            Self::TokenValidation(msg) => write!(f, "OIDC token validation error: {}", msg),
        }
    }
}

impl std::error::Error for OidcError {}

impl From<OidcError> for AuthenticationError {
    fn from(err: OidcError) -> Self {
        match err {
            OidcError::Configuration(reason) => Self::Configuration { reason },
            OidcError::Discovery(reason) | OidcError::TokenExchange(reason) => {
                Self::ProviderUnavailable { reason }
            }
            OidcError::TokenValidation(reason) => Self::InvalidToken { reason },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{Form, Json, Router, extract::State, http::StatusCode, routing::post};
    use openidconnect::core::{
        CoreJwsSigningAlgorithm, CoreResponseType, CoreSubjectIdentifierType,
    };
    use openidconnect::{
        AuthUrl, EmptyAdditionalProviderMetadata, JsonWebKeySetUrl, ResponseTypes, TokenUrl,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use url::Url;

    pub(crate) const AUTHORIZE_ENDPOINT: &str =
        "https://login.example.com/univ-tenant-123/oauth2/v2.0/authorize";
    const REDIRECT_URI: &str = "http://localhost:5000/getAToken";
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    type CapturedForm = Arc<Mutex<Option<HashMap<String, String>>>>;

    fn oidc_config() -> OidcConfig {
        OidcConfig::builder(
            "https://login.example.com/univ-tenant-123".to_string(),
            "client-id".to_string(),
            "client-secret".to_string(),
            REDIRECT_URI.to_string(),
        )
        .add_scope("User.Read".to_string())
        .build()
    }

    fn metadata(token_endpoint: &str) -> CoreProviderMetadata {
        CoreProviderMetadata::new(
            IssuerUrl::new("https://login.example.com/univ-tenant-123/v2.0".to_string())
                .expect("issuer"),
            AuthUrl::new(AUTHORIZE_ENDPOINT.to_string()).expect("authorization endpoint"),
            JsonWebKeySetUrl::new(
                "https://login.example.com/univ-tenant-123/discovery/v2.0/keys".to_string(),
            )
            .expect("jwks uri"),
            vec![ResponseTypes::new(vec![CoreResponseType::Code])],
            vec![CoreSubjectIdentifierType::Public],
            vec![CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256],
            EmptyAdditionalProviderMetadata {},
        )
        .set_token_endpoint(Some(
            TokenUrl::new(token_endpoint.to_string()).expect("token endpoint"),
        ))
    }

    /// A client whose provider metadata is known up front.
    pub(crate) fn offline_client(token_endpoint: &str) -> OidcClient {
        OidcClient::from_metadata(
            metadata(token_endpoint),
            &oidc_config(),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    /// Serves a token endpoint that records the form it receives and
    /// refuses the code.
    async fn refusing_token_endpoint() -> (String, CapturedForm) {
        async fn token(
            State(captured): State<CapturedForm>,
            Form(form): Form<HashMap<String, String>>,
        ) -> (StatusCode, Json<Value>) {
            *captured.lock().await = Some(form);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_grant",
                    "error_description": "AADSTS70008: code expired"
                })),
            )
        }

        let captured = CapturedForm::default();
        let app = Router::new()
            .route("/token", post(token))
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        (format!("http://{address}/token"), captured)
    }

    fn encode(value: &Value) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(value.to_string())
    }

    fn flow(state: &str) -> FlowState {
        FlowState::new(
            state.to_string(),
            "nonce".to_string(),
            VERIFIER.to_string(),
            REDIRECT_URI.to_string(),
            vec!["User.Read".to_string()],
        )
    }

    #[test]
    fn decodes_jwt_payload() {
        let payload = json!({"tid": "univ-tenant-123", "sub": "abc"});
        let jwt = format!("{}.{}.sig", encode(&json!({"alg": "RS256"})), encode(&payload));

        assert_eq!(decode_jwt_payload(&jwt).expect("payload"), payload);
    }

    #[test]
    fn rejects_malformed_jwt() {
        assert!(matches!(
            decode_jwt_payload("only.two"),
            Err(OidcError::TokenValidation(_))
        ));
        assert!(matches!(
            decode_jwt_payload("a.!!!.c"),
            Err(OidcError::TokenValidation(_))
        ));
    }

    #[test]
    fn reads_id_token_from_serialized_response() {
        let payload = json!({"tid": "univ-tenant-123"});
        let response = json!({
            "access_token": "at",
            "token_type": "Bearer",
            "id_token": format!("h.{}.s", encode(&payload)),
        });

        assert_eq!(id_token_payload(&response).expect("payload"), payload);
        assert!(id_token_payload(&json!({"access_token": "at"})).is_err());
    }

    #[test]
    fn state_must_match_stored_flow() {
        let stored = flow("csrf-1");
        let matching = CallbackData {
            code: "c".to_string(),
            state: Some("csrf-1".to_string()),
        };
        let forged = CallbackData {
            code: "c".to_string(),
            state: Some("csrf-2".to_string()),
        };
        let absent = CallbackData {
            code: "c".to_string(),
            state: None,
        };

        assert!(state_matches(&matching, &stored));
        assert!(!state_matches(&forged, &stored));
        assert!(!state_matches(&absent, &stored));
    }

    #[test]
    fn provider_error_prefers_description() {
        let result = provider_error(&json!({
            "error": "invalid_grant",
            "error_description": "AADSTS70008: code expired"
        }));
        assert_eq!(
            result,
            AuthResult::ProviderError {
                error: "invalid_grant".to_string(),
                description: "AADSTS70008: code expired".to_string(),
            }
        );

        let result = provider_error(&json!({"error": "invalid_client"}));
        assert_eq!(
            result,
            AuthResult::ProviderError {
                error: "invalid_client".to_string(),
                description: "invalid_client".to_string(),
            }
        );
    }

    #[test]
    fn oidc_errors_map_to_authentication_errors() {
        assert!(matches!(
            AuthenticationError::from(OidcError::TokenExchange("timeout".to_string())),
            AuthenticationError::ProviderUnavailable { .. }
        ));
        assert!(matches!(
            AuthenticationError::from(OidcError::TokenValidation("bad sig".to_string())),
            AuthenticationError::InvalidToken { .. }
        ));
    }

    #[test]
    fn authorization_url_targets_the_provider_endpoint() {
        let client = offline_client("https://login.example.com/univ-tenant-123/oauth2/v2.0/token");

        let initiation = client
            .authorization_url(&["User.Read"], REDIRECT_URI)
            .expect("authorization url");
        let url = Url::parse(&initiation.authorization_url).expect("url");
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let flow = &initiation.flow;

        assert_eq!(
            format!("{}{}", url.origin().ascii_serialization(), url.path()),
            AUTHORIZE_ENDPOINT
        );
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "client-id");
        assert_eq!(query["redirect_uri"], REDIRECT_URI);
        let scopes: Vec<&str> = query["scope"].split(' ').collect();
        assert!(scopes.contains(&"openid"), "{scopes:?}");
        assert!(scopes.contains(&"User.Read"), "{scopes:?}");
        assert_eq!(query["state"], flow.state);
        assert_eq!(query["nonce"], flow.nonce);
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(
            query["code_challenge"],
            PkceCodeChallenge::from_code_verifier_sha256(&PkceCodeVerifier::new(
                flow.pkce_verifier.clone()
            ))
            .as_str()
        );
        assert_eq!(flow.redirect_uri, REDIRECT_URI);
        assert_eq!(flow.scopes, vec!["User.Read".to_string()]);
    }

    #[test]
    fn every_flow_gets_fresh_secrets() {
        let client = offline_client("https://login.example.com/univ-tenant-123/oauth2/v2.0/token");

        let first = client
            .authorization_url(&["User.Read"], REDIRECT_URI)
            .expect("first");
        let second = client
            .authorization_url(&["User.Read"], REDIRECT_URI)
            .expect("second");

        assert_ne!(first.flow.state, second.flow.state);
        assert_ne!(first.flow.nonce, second.flow.nonce);
        assert_ne!(first.flow.pkce_verifier, second.flow.pkce_verifier);
    }

    #[test]
    fn invalid_redirect_uri_is_a_configuration_error() {
        let client = offline_client("https://login.example.com/univ-tenant-123/oauth2/v2.0/token");

        assert!(matches!(
            client.authorization_url(&["User.Read"], "not a url"),
            Err(OidcError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn exchange_sends_code_verifier_and_scope() {
        let (token_endpoint, captured) = refusing_token_endpoint().await;
        let client = offline_client(&token_endpoint);
        let callback = CallbackData {
            code: "auth-code".to_string(),
            state: Some("csrf-1".to_string()),
        };

        let result = client
            .exchange(&callback, &flow("csrf-1"))
            .await
            .expect("provider answered");

        assert_eq!(
            result,
            AuthResult::ProviderError {
                error: "invalid_grant".to_string(),
                description: "AADSTS70008: code expired".to_string(),
            }
        );
        let form = captured.lock().await.take().expect("token request");
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "auth-code");
        assert_eq!(form["code_verifier"], VERIFIER);
        assert_eq!(form["redirect_uri"], REDIRECT_URI);
        assert_eq!(form["scope"], "User.Read");
    }

    #[tokio::test]
    async fn exchange_with_forged_state_never_calls_the_provider() {
        let (token_endpoint, captured) = refusing_token_endpoint().await;
        let client = offline_client(&token_endpoint);
        let callback = CallbackData {
            code: "auth-code".to_string(),
            state: Some("csrf-2".to_string()),
        };

        let result = client
            .exchange(&callback, &flow("csrf-1"))
            .await
            .expect("result");

        assert_eq!(result, AuthResult::SessionExpired);
        assert!(captured.lock().await.is_none());
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let address = listener.local_addr().expect("address");
        drop(listener);
        let client = offline_client(&format!("http://{address}/token"));
        let callback = CallbackData {
            code: "auth-code".to_string(),
            state: Some("csrf-1".to_string()),
        };

        assert!(matches!(
            client.exchange(&callback, &flow("csrf-1")).await,
            Err(OidcError::TokenExchange(_))
        ));
    }
}
