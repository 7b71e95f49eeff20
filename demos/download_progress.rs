//! Download with progress example
//!
//! Downloads a file to a temporary location while printing progress, then
//! cancels a second, slow download half way through.

use std::time::Duration;

use courier::{Dispatcher, Environment, NetworkOperation, OperationKind, RequestDescriptor};
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dispatcher = Dispatcher::reqwest(Environment::new("https://httpbin.org"))?;

    println!("=== Download ===");
    let request = RequestDescriptor::builder("/bytes/102400")
        .kind(OperationKind::Download)
        .progress(|fraction| println!("Progress: {:.1}%", fraction * 100.0))
        .build();

    let result = dispatcher.execute(request).await;
    match result.file() {
        Some(location) => {
            let size = std::fs::metadata(location)?.len();
            println!("Saved {} bytes to {}", size, location.display());
            std::fs::remove_file(location)?;
        }
        None => println!("Download failed: {:?}", result.as_error()),
    }

    println!("\n=== Cancelled download ===");
    let operation = NetworkOperation::new(
        RequestDescriptor::builder("/drip")
            .parameter("duration", 5)
            .parameter("numbytes", 10)
            .kind(OperationKind::Download)
            .build(),
    );

    let (tx, rx) = oneshot::channel();
    operation.execute(&dispatcher, move |result| {
        let _ = tx.send(result);
    });
    tokio::time::sleep(Duration::from_millis(500)).await;
    operation.cancel();

    let result = rx.await?;
    println!("Result after cancel: {:?}", result.as_error());

    Ok(())
}
