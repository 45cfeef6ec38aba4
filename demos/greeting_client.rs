//! Greeting client demonstration.
//!
//! This example walks one client/server exchange through the capture pipeline:
//! 1. Build the client request from a name (or the default name)
//! 2. Offer the request for capture before calling the server
//! 3. Call an in-process server
//! 4. Offer the server's response for capture
//! 5. List what the directory sink stored
//!
//! The rate gate admits two captures per second, so the third and fourth
//! greetings in the same second run without being captured.
//!
//! Run with: `cargo run --example greeting_client`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use payload_capture::{
    CaptureConfig, CaptureFactory, DirectorySink, ExchangeRecorder, Metadata, OperationContext,
    Sink,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

const TEMPLATE: &str = "Hello, %s!";
const DEFAULT_NAME: &str = "Stranger";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClientRequest {
    name: String,
    message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerResponse {
    server_name: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ClientResponse {
    id: u64,
    content: String,
    server_response: ServerResponse,
}

struct GreetingClient {
    recorder: ExchangeRecorder,
    counter: AtomicU64,
}

impl GreetingClient {
    fn display_message(&self, name: Option<&str>) -> ClientResponse {
        let client_name = name.unwrap_or(DEFAULT_NAME);
        let message = TEMPLATE.replace("%s", client_name);
        let request = ClientRequest {
            name: client_name.to_string(),
            message: message.clone(),
        };

        let ctx = Arc::new(OperationContext::new("ServerService", "getMessageFromServer"));
        let mut request_metadata = Metadata::new();
        request_metadata.add("name", name);

        let server_response = self.recorder.exchange(
            &ctx,
            &request,
            request_metadata,
            call_server,
            |resp| Metadata::from([("name", resp.server_name.as_str())]),
        );

        ClientResponse {
            id: self.counter.fetch_add(1, Ordering::Relaxed) + 1,
            content: message,
            server_response,
        }
    }
}

fn call_server(request: &ClientRequest) -> ServerResponse {
    ServerResponse {
        server_name: "sample-server".to_string(),
        message: format!("Hi {}, the server received: {}", request.name, request.message),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    println!("=== Greeting Client Capture Example ===\n");

    let root = std::env::temp_dir().join(format!("payload-capture-demo-{}", std::process::id()));
    let sink = Arc::new(DirectorySink::new(&root).expect("create capture directory"));
    let config = CaptureConfig::default();
    let dyn_sink: Arc<dyn Sink> = sink.clone();
    let factory = CaptureFactory::from_config(&config, Some(dyn_sink)).expect("valid config");

    let client = GreetingClient {
        recorder: ExchangeRecorder::new(factory),
        counter: AtomicU64::new(0),
    };

    for name in [Some("Alice"), None, Some("Bob"), Some("Carol")] {
        let response = client.display_message(name);
        println!(
            "✓ #{} {} -> {}",
            response.id, response.content, response.server_response.message
        );
    }

    println!("\n--- Stored captures under {} ---", root.display());
    for stored in sink.list().expect("list captures") {
        println!(
            "{} {} ({} bytes) metadata={}",
            stored.manifest.kind,
            stored.manifest.key,
            stored.manifest.payload_len,
            serde_json::to_string(&stored.manifest.metadata).unwrap_or_default()
        );
    }

    if let Some(stats) = client.recorder.stats() {
        println!(
            "\ncommitted={} encode_failures={} commit_failures={}",
            stats.committed, stats.encode_failures, stats.commit_failures
        );
    }
}
