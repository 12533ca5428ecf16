use mock_server::User;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr}");
    let seed = vec![User {
        id: 42,
        name: "Ann".to_string(),
    }];
    mock_server::run_with_users(listener, seed).await
}
