use async_trait::async_trait;
use parking_lot::Mutex;
use routebreaker::{
    BoxError, CircuitBreaker, Handler, HandlerError, Metadata, Provider, Route, RouteError,
};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug)]
struct ServiceError(String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

// In-memory queue standing in for a broker
struct MemoryQueue {
    pending: Mutex<VecDeque<String>>,
}

#[async_trait]
impl Provider<String> for MemoryQueue {
    async fn fetch_messages(&self) -> Result<Vec<String>, BoxError> {
        let mut pending = self.pending.lock();
        Ok(pending.pop_front().into_iter().collect())
    }

    async fn confirm_message(&self, message: String) -> Result<(), BoxError> {
        println!("  acknowledged {}", message);
        Ok(())
    }

    async fn message_not_processed(&self, message: String) -> Result<(), BoxError> {
        println!("  returning {} to the queue", message);
        self.pending.lock().push_front(message);
        Ok(())
    }

    fn stop(&self) {
        println!("Queue stopped");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let queue = Arc::new(MemoryQueue {
        pending: Mutex::new((1..=6).map(|i| format!("order-{}", i)).collect()),
    });

    // Fails on calls 2 through 5, then recovers
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let handler = Handler::blocking(move |content: String, _metadata: Metadata| {
        let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if (2..=5).contains(&call) {
            return Err(HandlerError::failed(ServiceError(format!(
                "cannot process {}",
                content
            ))));
        }
        println!("  processed {} on call {}", content, call);
        Ok(true)
    });

    let breaker = CircuitBreaker::builder()
        .failure_threshold(3) // three consecutive failures open the circuit
        .reset_timeout(Duration::from_millis(500))
        .trip_on::<ServiceError>()
        .build()?;

    let route: Route<String> = Route::builder()
        .name("orders")
        .provider(Arc::clone(&queue))
        .handler(handler)
        .circuit_breaker(breaker)
        .build()?;

    for cycle in 1..=8 {
        println!("\nCycle {}: circuit {}", cycle, route.circuit_breaker().status());

        match route.dispatch().await {
            Ok(acknowledged) => println!("  {} message(s) acknowledged", acknowledged),
            Err(RouteError::Handler(err)) => println!("  delivery failed: {}", err),
            Err(err) => println!("  other error: {}", err),
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    route.stop();
    Ok(())
}
