use astrosniff_cli::api;
use astrosniff_core::ScanOptions;
use astrosniff_local::HttpFetcher;
use std::net::SocketAddr;

async fn serve_api() -> SocketAddr {
    let app = api::app(HttpFetcher::new().unwrap(), ScanOptions::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn missing_url_parameter_is_400() {
    let addr = serve_api().await;
    let resp = reqwest::get(format!("http://{addr}/api/check")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let v: serde_json::Value = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
    assert_eq!(
        v["error"].as_str(),
        Some("Missing required query parameter: url"),
    );
}

#[tokio::test]
async fn unparseable_url_is_400() {
    let addr = serve_api().await;
    let resp = reqwest::get(format!("http://{addr}/api/check?url=not%20a%20url"))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let v: serde_json::Value = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
    assert!(v["error"].as_str().unwrap().contains("is not a valid URL"));
}

#[tokio::test]
async fn loopback_target_is_rejected() {
    let addr = serve_api().await;
    let resp = reqwest::get(format!(
        "http://{addr}/api/check?url=http%3A%2F%2F127.0.0.1%2F"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn private_range_target_is_rejected() {
    let addr = serve_api().await;
    for target in ["http://10.0.0.8/", "http://192.168.1.1/", "http://169.254.0.9/"] {
        let resp = reqwest::get(format!("http://{addr}/api/check?url={target}"))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400, "expected 400 for {target}");
    }
}
