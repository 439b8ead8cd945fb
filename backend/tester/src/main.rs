use anyhow::{Context, Result, bail};
use clap::Parser;
use reqwest::Client;
use serde_json::{Value, json};
use uuid::Uuid;

/// Smoke test a running gateway: register, file a grievance, read it back.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(default_value = "http://localhost:8000")]
    base_url: String,
}

async fn expect_data(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.context("response is not JSON")?;

    if !status.is_success() || body["success"] != json!(true) {
        bail!("{status}: {body}");
    }

    Ok(body["data"].clone())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let base = args.base_url.trim_end_matches('/');
    let client = Client::new();

    let health = expect_data(client.get(format!("{base}/health")).send().await?).await?;
    println!("Health: {health}");

    let email = format!("smoke-{}@example.com", Uuid::new_v4().simple());
    let session = expect_data(
        client
            .post(format!("{base}/api/auth/register"))
            .json(&json!({ "email": email, "password": "smoke-test", "name": "Smoke" }))
            .send()
            .await?,
    )
    .await?;
    let token = session["token"]
        .as_str()
        .context("register returned no token")?
        .to_string();
    println!("Registered {email}");

    let filed = expect_data(
        client
            .post(format!("{base}/api/grievance/file"))
            .bearer_auth(&token)
            .json(&json!({ "text": "Unauthorized debit of 500 from my savings account" }))
            .send()
            .await?,
    )
    .await?;
    println!("Filed: {filed}");

    let complaint_id = filed["complaint_id"]
        .as_str()
        .context("filing returned no complaint id")?;

    let status = expect_data(
        client
            .get(format!("{base}/api/grievance/status/{complaint_id}"))
            .bearer_auth(&token)
            .send()
            .await?,
    )
    .await?;
    println!("Status: {status}");

    let analytics = expect_data(
        client
            .get(format!("{base}/api/grievance/analytics"))
            .bearer_auth(&token)
            .send()
            .await?,
    )
    .await?;
    println!("Analytics: {analytics}");

    Ok(())
}
