// billing-backend/src/middleware/auth.rs

use crate::config::AppConfig;
use crate::error::AppError;
use crate::utils::jwt::{JwtManager, UserClaims};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, warn};

pub const ACCESS_TOKEN_COOKIE_NAME: &str = "access_token";

/// JWT認証ミドルウェアの設定
#[derive(Clone)]
pub struct AuthMiddlewareConfig {
    pub jwt_manager: Arc<JwtManager>,
    pub access_token_cookie_name: String,
    /// フォームPOSTの送信元として許可するオリジン
    pub app_origin: String,
}

impl AuthMiddlewareConfig {
    pub fn new(jwt_manager: Arc<JwtManager>, app_base_url: &str) -> Self {
        Self {
            jwt_manager,
            access_token_cookie_name: ACCESS_TOKEN_COOKIE_NAME.to_string(),
            app_origin: origin_of(app_base_url).to_string(),
        }
    }
}

/// 認証済みユーザー情報を格納するエクステンション
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: UserClaims,
    pub access_token: String,
}

impl AuthenticatedUser {
    pub fn new(claims: UserClaims, access_token: String) -> Self {
        Self {
            claims,
            access_token,
        }
    }

    pub fn user_id(&self) -> uuid::Uuid {
        self.claims.user_id
    }

    pub fn email(&self) -> &str {
        &self.claims.email
    }
}

fn authenticate(
    config: &AuthMiddlewareConfig,
    headers: &HeaderMap,
    cookie_jar: &CookieJar,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let Some(token) = extract_token(headers, cookie_jar, &config.access_token_cookie_name) else {
        return Ok(None);
    };

    let claims = config.jwt_manager.verify_access_token(&token)?;
    Ok(Some(AuthenticatedUser::new(claims.user, token)))
}

/// トークン必須のルート用
pub async fn jwt_auth_middleware(
    State(config): State<AuthMiddlewareConfig>,
    headers: HeaderMap,
    cookie_jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();

    let user = authenticate(&config, &headers, &cookie_jar)
        .inspect_err(|e| warn!(path = %path, error = %e, "Invalid access token"))?
        .ok_or_else(|| {
            warn!(path = %path, "Missing authentication token");
            AppError::Unauthorized("Authentication required".to_string())
        })?;

    request.extensions_mut().insert(user.clone());
    let mut response = next.run(request).await;
    // ロギングミドルウェアがユーザーIDを参照できるようにする
    response.extensions_mut().insert(user);
    Ok(response)
}

/// 画面用：トークンがあれば検証し、無効でもリクエストは通す
pub async fn optional_auth_middleware(
    State(config): State<AuthMiddlewareConfig>,
    headers: HeaderMap,
    cookie_jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match authenticate(&config, &headers, &cookie_jar) {
        Ok(user) => user,
        Err(e) => {
            debug!(path = %request.uri().path(), error = %e, "Ignoring invalid access token");
            None
        }
    };

    match user {
        Some(user) => {
            request.extensions_mut().insert(user.clone());
            let mut response = next.run(request).await;
            response.extensions_mut().insert(user);
            response
        }
        None => next.run(request).await,
    }
}

/// フォームPOSTが自サイトから送信されたかを確認
pub async fn same_origin_middleware(
    State(config): State<AuthMiddlewareConfig>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.method() == Method::POST {
        if let Some(origin) = request
            .headers()
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok())
        {
            if !origin.eq_ignore_ascii_case(&config.app_origin) {
                warn!(
                    origin = %origin,
                    path = %request.uri().path(),
                    "Rejected cross-origin form submission"
                );
                return Err(AppError::Forbidden(
                    "Cross-origin form submission".to_string(),
                ));
            }
        }
    }

    Ok(next.run(request).await)
}

/// CORS ミドルウェア設定
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true) // Cookie送信を許可
        .max_age(std::time::Duration::from_secs(3600))
}

/// セキュリティヘッダーミドルウェア
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; frame-ancestors 'none';",
        ),
    );
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );

    response
}

// --- ヘルパー関数 ---

/// リクエストからトークンを抽出（Authorizationヘッダー優先、Cookieはフォールバック）
pub fn extract_token(
    headers: &HeaderMap,
    cookie_jar: &CookieJar,
    cookie_name: &str,
) -> Option<String> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|auth_str| auth_str.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    auth_header.or_else(|| {
        cookie_jar
            .get(cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// URLからスキーム+ホスト(+ポート)部分を取り出す
fn origin_of(url: &str) -> &str {
    let url = url.trim_end_matches('/');
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => &url[..scheme_end + 3 + path_start],
                None => url,
            }
        }
        None => url,
    }
}

// --- Axum Extractors ---

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthenticatedUser>().cloned())
    }
}
