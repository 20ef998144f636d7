// tests/integration/pages_tests.rs

use crate::common::app_helper::setup_test_app;
use crate::common::request::{body_text, location, page_request};
use axum::http::{header, HeaderValue, StatusCode};

#[tokio::test]
async fn test_pricing_page_renders_all_tiers() {
    // Arrange
    let app = setup_test_app().await;

    // Act
    let response = app.send(page_request("GET", "/pricing", None, None)).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"data-tier="free""#));
    assert!(html.contains(r#"data-tier="pro""#));
    assert!(html.contains(r#"data-tier="enterprise""#));
    assert_eq!(html.matches(r#"action="/billing/checkout""#).count(), 2);
}

#[tokio::test]
async fn test_pricing_page_marks_current_plan() {
    let app = setup_test_app().await;
    let user = app.create_user();
    app.subscribe(&user, "pro").await;

    let response = app
        .send(page_request("GET", "/pricing", Some(&user.access_token), None))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"<section class="card current" data-tier="pro">"#));
    assert!(html.contains("Current plan"));
    assert!(html.contains(&user.email));
}

#[tokio::test]
async fn test_pricing_page_shows_canceled_checkout_notice() {
    let app = setup_test_app().await;

    let response = app
        .send(page_request("GET", "/pricing?checkout=canceled", None, None))
        .await;

    let html = body_text(response).await;
    assert!(html.contains("Checkout was canceled."));
}

#[tokio::test]
async fn test_billing_page_redirects_anonymous_user_to_login() {
    let app = setup_test_app().await;

    let response = app.send(page_request("GET", "/billing", None, None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "http://localhost:5000/login?next=%2Fbilling"
    );
}

#[tokio::test]
async fn test_billing_page_ignores_invalid_cookie() {
    let app = setup_test_app().await;

    let response = app
        .send(page_request("GET", "/billing", Some("garbage"), None))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_billing_page_for_free_user() {
    let app = setup_test_app().await;
    let user = app.create_user();

    let response = app
        .send(page_request("GET", "/billing", Some(&user.access_token), None))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Choose a plan"));
    assert!(html.contains("No payments yet."));
    assert!(!html.contains(r#"action="/billing/portal""#));
}

#[tokio::test]
async fn test_billing_page_for_subscriber() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    app.subscribe(&user, "pro").await;

    // Act
    let response = app
        .send(page_request(
            "GET",
            "/billing?checkout=success",
            Some(&user.access_token),
            None,
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Thanks for subscribing!"));
    assert!(html.contains(r#"action="/billing/cancel""#));
    assert!(html.contains(r#"action="/billing/portal""#));
    assert!(!html.contains(r#"action="/billing/resume""#));
}

#[tokio::test]
async fn test_checkout_form_redirects_to_provider() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();

    // Act
    let response = app
        .send(page_request(
            "POST",
            "/billing/checkout",
            Some(&user.access_token),
            Some("tier=pro&interval=month"),
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response)
        .starts_with("http://localhost:5000/billing/mock-checkout?session_id=cs_mock_"));
}

#[tokio::test]
async fn test_checkout_form_requires_login() {
    let app = setup_test_app().await;

    let response = app
        .send(page_request(
            "POST",
            "/billing/checkout",
            None,
            Some("tier=pro"),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "http://localhost:5000/login?next=%2Fpricing"
    );
}

#[tokio::test]
async fn test_checkout_form_errors_redirect_with_message() {
    let app = setup_test_app().await;
    let user = app.create_user();

    for form in ["tier=free", "tier=gold", "tier=enterprise&interval=year"] {
        let response = app
            .send(page_request(
                "POST",
                "/billing/checkout",
                Some(&user.access_token),
                Some(form),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER, "form {}", form);
        assert!(
            location(&response).starts_with("/billing?error="),
            "form {} redirected to {}",
            form,
            location(&response)
        );
    }
}

#[tokio::test]
async fn test_cross_origin_form_post_is_rejected() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let mut request = page_request(
        "POST",
        "/billing/checkout",
        Some(&user.access_token),
        Some("tier=pro"),
    );
    request.headers_mut().insert(
        header::ORIGIN,
        HeaderValue::from_static("https://attacker.example"),
    );

    // Act
    let response = app.send(request).await;

    // Assert
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.gateway.customers_created(), 0);
}

#[tokio::test]
async fn test_same_origin_form_post_is_accepted() {
    let app = setup_test_app().await;
    let user = app.create_user();
    let mut request = page_request(
        "POST",
        "/billing/checkout",
        Some(&user.access_token),
        Some("tier=pro"),
    );
    request.headers_mut().insert(
        header::ORIGIN,
        HeaderValue::from_static("http://localhost:5000"),
    );

    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_cancel_and_resume_forms() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    app.subscribe(&user, "pro").await;

    // Act: 解約予約
    let response = app
        .send(page_request(
            "POST",
            "/billing/cancel",
            Some(&user.access_token),
            Some(""),
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/billing?notice=canceled");

    let response = app
        .send(page_request(
            "GET",
            "/billing?notice=canceled",
            Some(&user.access_token),
            None,
        ))
        .await;
    let html = body_text(response).await;
    assert!(html.contains("Your subscription will end at the close of the current period."));
    assert!(html.contains(r#"action="/billing/resume""#));

    // Act: 取り消し
    let response = app
        .send(page_request(
            "POST",
            "/billing/resume",
            Some(&user.access_token),
            Some(""),
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/billing?notice=resumed");
}

#[tokio::test]
async fn test_portal_form_without_account_redirects_with_error() {
    let app = setup_test_app().await;
    let user = app.create_user();

    let response = app
        .send(page_request(
            "POST",
            "/billing/portal",
            Some(&user.access_token),
            Some(""),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/billing?error="));
}
