use axum::Router;
use tokio::net::TcpListener;

/// Serves `app` on an ephemeral localhost port and returns its base URL.
pub async fn spawn_server(app: Router) -> String {
    spawn_server_with(|_| app).await
}

/// Like `spawn_server`, for routers that need to know their own base URL.
pub async fn spawn_server_with(build: impl FnOnce(String) -> Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let app = build(base_url.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base_url
}
