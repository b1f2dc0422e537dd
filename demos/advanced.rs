//! Advanced Route Example
//!
//! This example demonstrates:
//! 1. Translating raw JSON text into structured content with metadata
//! 2. Using a handler object with a stop hook
//! 3. Using hooks for monitoring circuit breaker events
//! 4. Deciding acknowledgement in a custom error handler

use async_trait::async_trait;
use parking_lot::Mutex;
use routebreaker::{
    BoxError, CircuitBreaker, ErrorHandler, Handler, HandlerError, HookRegistry, MessageHandler,
    Metadata, Provider, Route, RouteError, Translated,
};
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct GatewayError;

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payment gateway unavailable")
    }
}

impl Error for GatewayError {}

struct Fixtures(Mutex<Vec<Value>>);

#[async_trait]
impl Provider<Value> for Fixtures {
    async fn fetch_messages(&self) -> Result<Vec<Value>, BoxError> {
        Ok(self.0.lock().drain(..).collect())
    }

    fn stop(&self) {}
}

struct Payments;

#[async_trait]
impl MessageHandler<Value, bool> for Payments {
    async fn handle(&self, content: Value, metadata: Metadata) -> Result<bool, HandlerError> {
        match content.get("amount").and_then(Value::as_u64) {
            Some(0) => Err(HandlerError::DeleteMessage),
            Some(amount) if amount > 1_000 => Err(HandlerError::failed(GatewayError)),
            Some(amount) => {
                println!("charged {} ({:?})", amount, metadata.get("received_from"));
                Ok(true)
            }
            None => Err(HandlerError::failed("payment without amount")),
        }
    }

    fn stop(&self) {
        println!("payments handler stopped");
    }
}

// Raw messages carry a JSON document as a string
fn decode(raw: Value) -> Result<Translated<Value>, BoxError> {
    let text = raw.as_str().ok_or("expected a JSON string")?;
    let content: Value = serde_json::from_str(text)?;
    Ok(Translated::new(content).with_metadata("received_from", "fixtures"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    println!("=== Advanced Route Example ===\n");

    let hooks = HookRegistry::new();
    hooks.set_on_trip(|| println!("circuit OPENED"));
    hooks.set_on_probe(|| println!("circuit HALF-OPEN, replaying last failure"));
    hooks.set_on_reset(|| println!("circuit CLOSED"));
    hooks.set_on_failure(|| println!("failure recorded"));

    let breaker = CircuitBreaker::builder()
        .failure_threshold(2)
        .reset_timeout(Duration::from_millis(200))
        .trip_on::<GatewayError>()
        .hooks(hooks)
        .build()?;

    let fixtures = Arc::new(Fixtures(Mutex::new(vec![
        Value::from(r#"{"amount": 25}"#),
        Value::from(r#"{"amount": 0}"#),
        Value::from(r#"{"amount": 5000}"#),
        Value::from(r#"{"note": "missing amount"}"#),
        Value::from("not json"),
    ])));

    let route: Route<Value> = Route::builder()
        .name("payments")
        .provider(Arc::clone(&fixtures))
        .translator(decode)
        .handler(Handler::object(Arc::new(Payments)))
        .error_handler(ErrorHandler::blocking(|error: RouteError, message: Value| {
            println!("error handler: {} for {}", error, message);
            // Undecodable payloads will never succeed; drop them
            Ok(matches!(error, RouteError::Translation(_)))
        }))
        .circuit_breaker(breaker)
        .build()?;

    match route.dispatch().await {
        Ok(acknowledged) => println!("\n{} message(s) acknowledged", acknowledged),
        Err(err) => println!("\ndispatch failed: {}", err),
    }
    println!("breaker after dispatch: {:?}", route.circuit_breaker());

    tokio::time::sleep(Duration::from_millis(250)).await;
    let probe = route.fetch_messages().await?;
    println!("probe batch: {:?}", probe);

    route.stop();
    Ok(())
}
