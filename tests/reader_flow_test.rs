use httpmock::prelude::*;
use mangahub::domain::ports::ComicSource;
use mangahub::{
    LocalStorage, MangaError, MemoryDocumentStore, OTruyenClient, ReadingHistory, Session,
    ViewService,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn comic_body(server: &MockServer) -> serde_json::Value {
    json!({
        "status": "success",
        "data": {
            "item": {
                "_id": "1",
                "name": "Đảo Hải Tặc",
                "slug": "dao-hai-tac",
                "status": "ongoing",
                "thumb_url": "dao-hai-tac-thumb.jpg",
                "author": ["Eiichiro Oda"],
                "category": [{"id": "a", "name": "Action", "slug": "action"}],
                "chapters": [{"server_name": "Server #1", "server_data": [
                    {"filename": "", "chapter_name": "1", "chapter_title": "Romance Dawn", "chapter_api_data": server.url("/chapter/1")},
                    {"filename": "", "chapter_name": "2", "chapter_title": "", "chapter_api_data": server.url("/chapter/2")},
                    {"filename": "", "chapter_name": "3", "chapter_title": "", "chapter_api_data": server.url("/chapter/3")}
                ]}]
            },
            "APP_DOMAIN_CDN_IMAGE": "https://img.otruyenapi.com"
        }
    })
}

fn setup(server: &MockServer) -> (ViewService, Arc<OTruyenClient>) {
    let client = Arc::new(OTruyenClient::new(&server.base_url(), Duration::from_secs(5)).unwrap());
    let store = Arc::new(MemoryDocumentStore::new());
    (ViewService::new(client.clone(), store), client)
}

#[tokio::test]
async fn test_open_chapter_and_continue_reading() {
    let server = MockServer::start();
    let comic_mock = server.mock(|when, then| {
        when.method(GET).path("/truyen-tranh/dao-hai-tac");
        then.status(200).json_body(comic_body(&server));
    });
    let chapter_mock = server.mock(|when, then| {
        when.method(GET).path("/chapter/2");
        then.status(200).json_body(json!({
            "status": "success",
            "data": {
                "domain_cdn": "https://sv1.otruyencdn.com",
                "item": {
                    "_id": "c2",
                    "comic_name": "Đảo Hải Tặc",
                    "chapter_name": "2",
                    "chapter_path": "uploads/20240101/abc/chapter_2",
                    "chapter_image": [
                        {"image_page": 3, "image_file": "page_3.jpg"},
                        {"image_page": 1, "image_file": "page_1.jpg"},
                        {"image_page": 2, "image_file": "page_2.jpg"}
                    ]
                }
            }
        }));
    });

    let dir = TempDir::new().unwrap();
    let history = ReadingHistory::new(LocalStorage::new(dir.path()));
    let (views, _) = setup(&server);

    let reader = views.reader("dao-hai-tac", "2", &history).await.unwrap();

    comic_mock.assert();
    chapter_mock.assert();
    assert_eq!(reader.images.len(), 3);
    assert_eq!(
        reader.images[0],
        "https://sv1.otruyencdn.com/uploads/20240101/abc/chapter_2/page_1.jpg"
    );
    assert_eq!(reader.prev.unwrap().chapter_name, "1");
    assert_eq!(reader.next.unwrap().chapter_name, "3");
    assert_eq!(
        reader.thumb_url,
        "https://img.otruyenapi.com/uploads/comics/dao-hai-tac-thumb.jpg"
    );

    // History survives a fresh handle on the same directory.
    let reopened = ReadingHistory::new(LocalStorage::new(dir.path()));
    let items = reopened.list().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].comic_slug, "dao-hai-tac");
    assert_eq!(items[0].chapter_name, "2");
}

#[tokio::test]
async fn test_detail_view_over_http() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/truyen-tranh/dao-hai-tac");
        then.status(200).json_body(comic_body(&server));
    });

    let (views, _) = setup(&server);
    let detail = views
        .detail("dao-hai-tac", &Session::anonymous())
        .await
        .unwrap();

    assert_eq!(detail.comic.author, vec!["Eiichiro Oda"]);
    assert_eq!(detail.chapters[0].chapter_name, "3");
    assert_eq!(detail.first_chapter.unwrap().chapter_title, "Romance Dawn");
    assert!(detail.rating.is_none());
    assert!(detail.comments.is_empty());
}

#[tokio::test]
async fn test_missing_comic_and_chapter_are_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/truyen-tranh/dao-hai-tac");
        then.status(200).json_body(comic_body(&server));
    });
    server.mock(|when, then| {
        when.method(GET).path("/truyen-tranh/khong-co");
        then.status(404).json_body(json!({"status": "error"}));
    });

    let dir = TempDir::new().unwrap();
    let history = ReadingHistory::new(LocalStorage::new(dir.path()));
    let (views, _) = setup(&server);

    let err = views.reader("khong-co", "1", &history).await.unwrap_err();
    assert!(matches!(err, MangaError::NotFound { .. }));

    let err = views.reader("dao-hai-tac", "99", &history).await.unwrap_err();
    assert!(matches!(err, MangaError::NotFound { .. }));

    assert!(history.list().await.is_empty());
}

#[tokio::test]
async fn test_list_pages_from_pagination() {
    let server = MockServer::start();
    let list_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/danh-sach/dang-phat-hanh")
            .query_param("page", "2");
        then.status(200).json_body(json!({
            "status": "success",
            "data": {
                "items": [{"_id": "1", "name": "A", "slug": "a", "thumb_url": "https://cdn/a.jpg",
                           "chaptersLatest": [{"filename": "", "chapter_name": "120", "chapter_title": "", "chapter_api_data": ""}]}],
                "titlePage": "Đang phát hành",
                "params": {"pagination": {"totalItems": 49, "totalItemsPerPage": 24, "currentPage": 2, "pageRanges": 5}},
                "APP_DOMAIN_CDN_IMAGE": "https://img.otruyenapi.com"
            }
        }));
    });

    let (views, client) = setup(&server);
    let list = views.list("dang-phat-hanh", 2).await.unwrap();

    list_mock.assert();
    assert_eq!(list.title, "Truyện Đang Phát Hành");
    assert_eq!(list.total_pages, 3);
    assert_eq!(list.total_items, 49);
    assert_eq!(list.items[0].thumb_url, "https://cdn/a.jpg");
    assert_eq!(list.items[0].latest_chapter.as_deref(), Some("120"));

    // The client itself is usable through the port as well.
    let direct = client.comics_list("dang-phat-hanh", 2).await.unwrap();
    assert_eq!(direct.data.items.len(), 1);
}
