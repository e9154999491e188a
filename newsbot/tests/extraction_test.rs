use common::ExtractionConfig;
use mockito::Matcher;
use newsbot::extraction::{ArticleExtractor, ExtractionError, HttpExtractor};

const ARTICLE_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head><style>body { margin: 0; }</style></head>
  <body>
    <header><a href="/">Daily News</a></header>
    <nav><ul><li>World</li><li>Sports</li></ul></nav>
    <article>
      <h1>Local team wins</h1>
      <p>The local team won the final
         on Sunday.</p>
    </article>
    <script>window.analytics = {};</script>
    <footer>All rights reserved</footer>
  </body>
</html>"#;

fn extractor() -> HttpExtractor {
    HttpExtractor::new(&ExtractionConfig::default()).expect("extractor")
}

#[tokio::test]
async fn test_extracts_article_text_with_browser_user_agent() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/article")
        .match_header("user-agent", Matcher::Regex("^Mozilla/5.0".to_string()))
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(ARTICLE_HTML)
        .create_async()
        .await;

    let text = extractor()
        .extract(&format!("{}/article", server.url()))
        .await
        .expect("extracted text");

    assert_eq!(text, "Local team wins The local team won the final on Sunday.");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/gone")
        .with_status(404)
        .with_body("not here")
        .expect(1)
        .create_async()
        .await;

    let err = extractor()
        .extract(&format!("{}/gone", server.url()))
        .await
        .unwrap_err();

    match err {
        ExtractionError::Status(status) => assert_eq!(status.as_u16(), 404),
        other => panic!("unexpected error: {other}"),
    }
    // Fail fast: a single request, no retry
    mock.assert_async().await;
}

#[tokio::test]
async fn test_long_page_is_capped() {
    let mut server = mockito::Server::new_async().await;

    let body = format!("<html><body><p>{}</p></body></html>", "lorem ipsum ".repeat(5_000));
    let _mock = server
        .mock("GET", "/long")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let text = extractor()
        .extract(&format!("{}/long", server.url()))
        .await
        .expect("extracted text");

    assert!(text.chars().count() <= 15_000);
    assert!(!text.contains("  "));
    assert!(!text.chars().any(|c| c.is_control()));
}

#[tokio::test]
async fn test_malformed_url_is_rejected() {
    let err = extractor().extract("not a url").await.unwrap_err();
    assert!(matches!(err, ExtractionError::InvalidUrl { .. }));

    let err = extractor().extract("ftp://example.com/file").await.unwrap_err();
    assert!(matches!(err, ExtractionError::InvalidUrl { .. }));
}

#[tokio::test]
async fn test_unreachable_host_is_a_fetch_error() {
    // Port 9 (discard) on localhost is not expected to be listening
    let err = extractor().extract("http://127.0.0.1:9/article").await.unwrap_err();
    assert!(matches!(err, ExtractionError::Fetch(_)));
}
