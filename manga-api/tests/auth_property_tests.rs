//! Property-Based Tests for Route Protection
//!
//! For any request to an admin route, a missing or unusable bearer token
//! yields 401, a valid token without the admin role yields 403, and a valid
//! admin token reaches the handler.

mod support;

use axum::http::{Method, StatusCode};
use manga_core::Role;
use manga_test_utils::generators::{arb_entity_id, arb_role};
use proptest::prelude::*;
use support::test_app;

// ============================================================================
// PROPERTY TEST STRATEGIES
// ============================================================================

/// Bearer values that are never valid access tokens.
fn arb_bad_token() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9]{0,40}",
        "[a-zA-Z0-9_-]{10,30}\\.[a-zA-Z0-9_-]{10,30}\\.[a-zA-Z0-9_-]{10,30}",
        Just("eyJhbGciOiJub25lIn0.e30.".to_string()),
    ]
}

fn runtime() -> Result<tokio::runtime::Runtime, TestCaseError> {
    tokio::runtime::Runtime::new().map_err(|e| TestCaseError::fail(e.to_string()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_bad_tokens_are_unauthorized(token in arb_bad_token()) {
        runtime()?.block_on(async {
            let app = test_app().map_err(TestCaseError::fail)?;
            let response = app
                .send(Method::POST, "/api/v1/analytics/reset/daily", Some(&token), None)
                .await
                .map_err(TestCaseError::fail)?;
            prop_assert_eq!(response.status, StatusCode::UNAUTHORIZED);
            Ok(())
        })?;
    }

    #[test]
    fn prop_admin_routes_follow_role(role in arb_role()) {
        runtime()?.block_on(async {
            let app = test_app().map_err(TestCaseError::fail)?;
            let (_, token) = app
                .user_with_role("prober", role)
                .await
                .map_err(TestCaseError::fail)?;
            let response = app
                .send(Method::GET, "/api/v1/analytics/stats", Some(&token), None)
                .await
                .map_err(TestCaseError::fail)?;

            let expected = match role {
                Role::Admin => StatusCode::OK,
                Role::User => StatusCode::FORBIDDEN,
            };
            prop_assert_eq!(response.status, expected);
            Ok(())
        })?;
    }

    #[test]
    fn prop_unknown_manga_is_not_found(id in arb_entity_id()) {
        runtime()?.block_on(async {
            let app = test_app().map_err(TestCaseError::fail)?;
            let response = app
                .get(&format!("/api/v1/manga/{}", id))
                .await
                .map_err(TestCaseError::fail)?;
            prop_assert_eq!(response.status, StatusCode::NOT_FOUND);
            prop_assert_eq!(response.error_code(), Some("MANGA_NOT_FOUND"));
            Ok(())
        })?;
    }
}
