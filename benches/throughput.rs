use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use routebreaker::{BoxError, CircuitBreaker, Handler, HandlerError, Metadata, Provider, Route};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug)]
struct BenchError(String);

impl BenchError {
    fn new(msg: &str) -> Self {
        BenchError(msg.to_string())
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Benchmark error: {}", self.0)
    }
}

impl Error for BenchError {}

struct IdleProvider;

#[async_trait]
impl Provider<String> for IdleProvider {
    async fn fetch_messages(&self) -> Result<Vec<String>, BoxError> {
        Ok(Vec::new())
    }

    fn stop(&self) {}
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_breaker_bookkeeping(c: &mut Criterion) {
    let breaker = CircuitBreaker::<u64>::builder()
        .failure_threshold(u32::MAX)
        .reset_timeout(Duration::from_secs(30))
        .trip_on::<BenchError>()
        .build()
        .unwrap();

    c.bench_function("breaker_open_close", |b| {
        b.iter(|| {
            breaker.open(black_box(1));
            breaker.close();
        })
    });

    c.bench_function("breaker_status", |b| b.iter(|| black_box(breaker.status())));

    let error = BenchError::new("Simulated failure");
    c.bench_function("breaker_matches", |b| {
        b.iter(|| black_box(breaker.matches(&error)))
    });
}

fn bench_route_delivery(c: &mut Criterion) {
    let rt = runtime();

    let non_blocking: Route<String> = Route::builder()
        .provider(Arc::new(IdleProvider))
        .handler(Handler::non_blocking(|_content: String, _metadata: Metadata| async {
            Ok::<_, HandlerError>(true)
        }))
        .build()
        .unwrap();

    c.bench_function("route_deliver_non_blocking", |b| {
        b.iter(|| black_box(rt.block_on(non_blocking.deliver("payload".to_string()))))
    });

    let blocking: Route<String> = Route::builder()
        .provider(Arc::new(IdleProvider))
        .handler(Handler::blocking(|_content: String, _metadata: Metadata| {
            Ok::<_, HandlerError>(true)
        }))
        .build()
        .unwrap();

    c.bench_function("route_deliver_blocking", |b| {
        b.iter(|| black_box(rt.block_on(blocking.deliver("payload".to_string()))))
    });
}

fn bench_route_retry_until_open(c: &mut Criterion) {
    let rt = runtime();

    let route: Route<String> = Route::builder()
        .provider(Arc::new(IdleProvider))
        .handler(Handler::non_blocking(|_content: String, _metadata: Metadata| async {
            Err::<bool, _>(HandlerError::failed(BenchError::new("Simulated failure")))
        }))
        .circuit_breaker(
            CircuitBreaker::builder()
                .failure_threshold(5)
                .trip_on::<BenchError>()
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    c.bench_function("route_deliver_retry_to_threshold", |b| {
        b.iter(|| {
            route.circuit_breaker().close();
            black_box(rt.block_on(route.deliver("payload".to_string())))
        })
    });
}

criterion_group!(
    benches,
    bench_breaker_bookkeeping,
    bench_route_delivery,
    bench_route_retry_until_open
);
criterion_main!(benches);
