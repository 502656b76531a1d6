use std::time::Duration;

use post_image_harvester::infrastructure::HttpSession;
use post_image_harvester::models::{DownloadOutcome, DownloadTask, ImageReference};
use post_image_harvester::workflow::{fetch, process_photo_link, SIZE_THRESHOLD};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session() -> HttpSession {
    HttpSession::new(0, Duration::from_secs(5)).expect("创建 HTTP 会话")
}

async fn serve_bytes(server: &MockServer, route: &str, len: usize) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; len]))
        .mount(server)
        .await;
}

fn task(url: String, dir: &TempDir, index: usize) -> DownloadTask {
    DownloadTask::new(ImageReference::from(url), dir.path(), index, 3)
}

#[tokio::test]
async fn test_image_below_threshold_is_skipped() {
    let server = MockServer::start().await;
    serve_bytes(&server, "/small.jpg", 9_999).await;
    let dir = TempDir::new().unwrap();

    let outcome = fetch(&task(format!("{}/small.jpg?fbid=42", server.uri()), &dir, 1), &mut session()).await;

    assert_eq!(outcome, DownloadOutcome::Skipped { declared_len: 9_999 });
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_image_at_threshold_is_saved_with_fbid_name() {
    let server = MockServer::start().await;
    serve_bytes(&server, "/big.jpg", SIZE_THRESHOLD as usize).await;
    let dir = TempDir::new().unwrap();

    let outcome = fetch(&task(format!("{}/big.jpg?fbid=12345", server.uri()), &dir, 2), &mut session()).await;

    let expected = dir.path().join("fb_12345_2.jpg");
    assert_eq!(outcome, DownloadOutcome::Saved(expected.clone()));
    assert_eq!(std::fs::metadata(&expected).unwrap().len(), SIZE_THRESHOLD);
}

#[tokio::test]
async fn test_bad_status_is_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let outcome = fetch(&task(format!("{}/missing.jpg", server.uri()), &dir, 1), &mut session()).await;

    match outcome {
        DownloadOutcome::Failed(reason) => assert!(reason.contains("404"), "{}", reason),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_host_is_failed() {
    let dir = TempDir::new().unwrap();
    let outcome = fetch(&task("http://127.0.0.1:9/a.jpg".to_string(), &dir, 1), &mut session()).await;
    assert!(matches!(outcome, DownloadOutcome::Failed(_)));
}

#[tokio::test]
async fn test_photo_link_downloads_each_extracted_image() {
    let server = MockServer::start().await;
    let page = format!(
        r#"<html><body>
            <img data-visualcompletion="media-vc-image" src="{uri}/media/full.jpg?fbid=555">
            <img data-visualcompletion="media-vc-image" src="{uri}/media/thumb.jpg">
            <img data-visualcompletion="media-vc-image" src="{uri}/static/logo.png">
        </body></html>"#,
        uri = server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/photo"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html; charset=utf-8"))
        .mount(&server)
        .await;
    serve_bytes(&server, "/media/full.jpg", 20_000).await;
    serve_bytes(&server, "/media/thumb.jpg", 500).await;
    let dir = TempDir::new().unwrap();

    let link = format!("{}/photo?fbid=555&set=pcb.9", server.uri());
    let outcomes = process_photo_link(&link, dir.path(), &mut session()).await;

    assert_eq!(
        outcomes,
        vec![
            DownloadOutcome::Saved(dir.path().join("fb_555_1.jpg")),
            DownloadOutcome::Skipped { declared_len: 500 },
        ]
    );
}

async fn serve_photo_page(server: &MockServer, route: &str, image_route: &str) {
    let page = format!(
        r#"<html><body><img data-visualcompletion="media-vc-image" src="{}{}"></body></html>"#,
        server.uri(),
        image_route
    );
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_images_without_fbid_are_named_after_their_photo_link() {
    let server = MockServer::start().await;
    serve_photo_page(&server, "/first", "/media/a.jpg").await;
    serve_photo_page(&server, "/second", "/media/b.jpg").await;
    serve_bytes(&server, "/media/a.jpg", 20_000).await;
    serve_bytes(&server, "/media/b.jpg", 20_000).await;
    let dir = TempDir::new().unwrap();
    let mut http = session();

    let first = format!("{}/first?fbid=111&set=pcb.9", server.uri());
    let second = format!("{}/second?fbid=222&set=pcb.9", server.uri());
    let mut outcomes = process_photo_link(&first, dir.path(), &mut http).await;
    outcomes.extend(process_photo_link(&second, dir.path(), &mut http).await);

    assert_eq!(
        outcomes,
        vec![
            DownloadOutcome::Saved(dir.path().join("fb_111_1.jpg")),
            DownloadOutcome::Saved(dir.path().join("fb_222_1.jpg")),
        ]
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn test_existing_file_is_not_overwritten() {
    let server = MockServer::start().await;
    serve_bytes(&server, "/big.jpg", 20_000).await;
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("fb_12345_2.jpg"), b"earlier").unwrap();

    let image = task(format!("{}/big.jpg?fbid=12345", server.uri()), &dir, 2);
    let outcome = fetch(&image, &mut session()).await;

    assert_eq!(outcome, DownloadOutcome::Saved(dir.path().join("fb_12345_2-2.jpg")));
    assert_eq!(std::fs::read(dir.path().join("fb_12345_2.jpg")).unwrap(), b"earlier");
    assert_eq!(std::fs::metadata(dir.path().join("fb_12345_2-2.jpg")).unwrap().len(), 20_000);
}

#[tokio::test]
async fn test_login_redirect_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", format!("{}/login/", server.uri())))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><img data-visualcompletion="media-vc-image" src="https://scontent.example/x.jpg"></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let link = format!("{}/photo?fbid=1&set=pcb.2", server.uri());
    let outcomes = process_photo_link(&link, dir.path(), &mut session()).await;

    assert!(outcomes.is_empty());
}

#[tokio::test]
async fn test_non_set_links_are_not_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let album = format!("{}/photo?fbid=1&set=a.2", server.uri());
    let download = format!("{}/photo/download/?fbid=1&set=pcb.2", server.uri());
    assert!(process_photo_link(&album, dir.path(), &mut session()).await.is_empty());
    assert!(process_photo_link(&download, dir.path(), &mut session()).await.is_empty());
}
