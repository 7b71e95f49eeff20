//! Fetch JSON example
//!
//! Fetches a document from httpbin with shared and per-request headers, then
//! decodes it into a typed model.

use std::collections::HashMap;

use courier::{Auth, Dispatcher, Environment, OperationResult, RequestDescriptor};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Echo {
    args: HashMap<String, String>,
    headers: HashMap<String, String>,
    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting fetch example...");

    let environment = Environment::new("https://httpbin.org")
        .header("x-client", "courier-demo")?
        .auth(Auth::bearer("demo-token"))?;
    let dispatcher = Dispatcher::reqwest(environment)?;

    let request = RequestDescriptor::builder("/get")
        .parameter("q", "rust")
        .parameter("page", 2)
        .build();

    let result = dispatcher.execute(request).await;
    match &result {
        OperationResult::Json { value, response } => {
            println!("Status: {}", response.status);
            println!("Raw: {}", value);
        }
        OperationResult::Error { error, .. } => {
            println!("Request failed: {}", error);
            return Ok(());
        }
        OperationResult::File { .. } => unreachable!("data requests never produce files"),
    }

    let (echo, _): (Echo, _) = result.decode()?;
    println!("URL: {}", echo.url);
    println!("Args: {:?}", echo.args);
    println!("Client header: {:?}", echo.headers.get("X-Client"));

    Ok(())
}
