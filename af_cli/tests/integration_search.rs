//! Integration tests for the search command's data layer using TestContext.

use af_core::{Error, FileSpec};
use af_io::test_utils::{TestContext, search_entry};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

// ============================================================================
// Query wire format
// ============================================================================

mod wire {
    use super::*;

    #[tokio::test]
    async fn test_search_posts_compiled_query() {
        let ctx = TestContext::new().await;
        let entry = search_entry("libs", "com/acme/a.jar", b"a");

        Mock::given(method("POST"))
            .and(path("/api/search/aql"))
            .and(body_string_contains(r#"items.find({"#))
            .and(body_string_contains(r#""repo":"libs""#))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(af_io::test_utils::search_results_json(&[entry])),
            )
            .expect(1)
            .mount(&ctx.mock_server)
            .await;

        let results = ctx
            .resolver()
            .search(&FileSpec::pattern("libs/com/acme/*.jar"))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].relative_path(), "com/acme/a.jar");
    }

    #[tokio::test]
    async fn test_paging_and_sort_are_sent() {
        let ctx = TestContext::new().await;

        Mock::given(method("POST"))
            .and(path("/api/search/aql"))
            .and(body_string_contains(r#".sort({"$desc":["created"]})"#))
            .and(body_string_contains(".offset(5).limit(10)"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"results":[]}"#))
            .expect(1)
            .mount(&ctx.mock_server)
            .await;

        let file = FileSpec {
            sort_by: vec!["created".to_string()],
            sort_order: Some(af_core::SortOrder::Desc),
            offset: Some(5),
            limit: Some(10),
            ..FileSpec::pattern("libs/")
        };
        let results = ctx.resolver().search(&file).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_aql_entry_is_sent_verbatim() {
        let ctx = TestContext::new().await;

        Mock::given(method("POST"))
            .and(path("/api/search/aql"))
            .and(body_string_contains(r#"items.find({"repo":"custom"})"#))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"results":[]}"#))
            .expect(1)
            .mount(&ctx.mock_server)
            .await;

        let file = FileSpec {
            aql: Some(serde_json::json!({ "items.find": { "repo": "custom" } })),
            ..Default::default()
        };
        ctx.resolver().search(&file).await.unwrap();
    }
}

// ============================================================================
// Failures
// ============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_server_error_is_a_search_failure() {
        let ctx = TestContext::new().await;

        Mock::given(method("POST"))
            .and(path("/api/search/aql"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&ctx.mock_server)
            .await;

        let err = ctx
            .resolver()
            .search(&FileSpec::pattern("libs/"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SearchFailure { .. }));
    }

    #[tokio::test]
    async fn test_invalid_props_fail_before_any_request() {
        let ctx = TestContext::new().await;

        let file = FileSpec {
            props: "novalue".to_string(),
            ..FileSpec::pattern("libs/")
        };
        let err = ctx.resolver().search(&file).await.unwrap_err();

        assert!(matches!(err, Error::InvalidProperties { .. }));
        assert_eq!(ctx.requests_to("POST", "/api/search/aql").await, 0);
    }
}
