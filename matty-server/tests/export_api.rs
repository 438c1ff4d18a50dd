//! Integration tests for GET /api/designs/{id}/export.

mod common;

use std::io::Cursor;

use common::server::as_owner;
use common::TestServer;
use matty_core::DesignRecord;
use matty_renderer::data_uri_from_bytes;
use serde_json::json;

fn png_data_uri(rgba: [u8; 4]) -> String {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba(rgba));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode png");
    data_uri_from_bytes(buf.get_ref())
}

async fn create_design(server: &TestServer, client: &reqwest::Client) -> DesignRecord {
    let body = json!({
        "title": "Summer Sale",
        "elements": [
            {"type": "rectangle", "x": 0, "y": 0, "width": 50, "height": 50, "color": "#ff0000"},
            {"type": "image", "x": 300, "y": 300, "width": 100, "height": 100, "src": png_data_uri([0, 0, 255, 255])}
        ]
    });
    as_owner(client.post(server.designs_url()), "alice")
        .json(&body)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("record")
}

#[tokio::test]
async fn test_png_export_is_attachment() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let record = create_design(&server, &client).await;

    let url = server.url(&format!("/api/designs/{}/export", record.id));
    let resp = as_owner(client.get(&url), "alice")
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/png");
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"Summer Sale.png\""
    );

    let bytes = resp.bytes().await.expect("body");
    let out = image::load_from_memory(&bytes).expect("png").to_rgba8();
    assert_eq!(out.dimensions(), (800, 600));
    assert_eq!(out.get_pixel(25, 25).0, [255, 0, 0, 255]);
    let [r, g, b, a] = out.get_pixel(350, 350).0;
    assert!(r <= 3 && g <= 3 && b >= 252 && a == 255, "got {r},{g},{b},{a}");
    assert_eq!(out.get_pixel(700, 50).0, [255, 255, 255, 255]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_jpeg_export() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let record = create_design(&server, &client).await;

    let url = server.url(&format!("/api/designs/{}/export?format=jpeg", record.id));
    let resp = as_owner(client.get(&url), "alice")
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/jpeg");
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"Summer Sale.jpg\""
    );
    let bytes = resp.bytes().await.expect("body");
    assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_export_respects_owner() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let record = create_design(&server, &client).await;

    let url = server.url(&format!("/api/designs/{}/export", record.id));
    let resp = as_owner(client.get(&url), "bob")
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 404);

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_format_is_rejected() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let record = create_design(&server, &client).await;

    let url = server.url(&format!("/api/designs/{}/export?format=svg", record.id));
    let resp = as_owner(client.get(&url), "alice")
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 400);

    server.shutdown().await;
}

#[tokio::test]
async fn test_broken_image_does_not_fail_export() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let body = json!({
        "title": "",
        "elements": [
            {"type": "image", "x": 0, "y": 0, "width": 100, "height": 100, "src": "data:image/png;base64,bm9wZQ=="}
        ]
    });
    let record: DesignRecord = as_owner(client.post(server.designs_url()), "alice")
        .json(&body)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("record");

    let url = server.url(&format!("/api/designs/{}/export", record.id));
    let resp = as_owner(client.get(&url), "alice")
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"design.png\""
    );

    server.shutdown().await;
}
