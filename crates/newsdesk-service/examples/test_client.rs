use reqwest;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Testing Newsdesk API endpoints...");
    println!("Make sure the server is running with: cargo run -p newsdesk-service");
    println!();

    let client = reqwest::Client::new();

    // Test health endpoint
    println!("Testing /health endpoint...");
    let response = client.get("http://localhost:3000/health").send().await?;

    println!("Status: {}", response.status());
    let text = response.text().await?;
    println!("Response: {}", text);
    println!();

    // Test story listing
    println!("Testing /api/v1/stories endpoint...");
    let response = client
        .get("http://localhost:3000/api/v1/stories?limit=5")
        .send()
        .await?;

    println!("Status: {}", response.status());
    let response_body: serde_json::Value = response.json().await?;
    println!("Response: {:#}", response_body);
    println!();

    // Test catalog stats
    println!("Testing /api/v1/stats endpoint...");
    let response = client.get("http://localhost:3000/api/v1/stats").send().await?;

    println!("Status: {}", response.status());
    let response_body: serde_json::Value = response.json().await?;
    println!("Response: {:#}", response_body);

    Ok(())
}
