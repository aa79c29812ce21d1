//! Capture hot path benchmark
//!
//! Everything the interceptor does synchronously between a transport call
//! completing and the caller seeing its result:
//!
//! 1. `Classifier::classify` - keyword rules over URL, body and stack
//! 2. `Session::append` - id assignment, race window, tally, listeners
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench classify_overhead
//! ```
//!
//! # Expected Output
//!
//! ```text
//! classify/plain          time:   [1.5 µs 1.6 µs 1.7 µs]
//! session_append/100      time:   [250 µs 260 µs 270 µs]
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sonda::classify::RaceSignal;
use sonda::context::FixedStackCapture;
use sonda::{CaptureConfig, CapturedRequest, Classifier, Session, TransportKind};

const STACK: &str = "Error\n    \
    at capture (https://cdn.test/sonda.js:1:1)\n    \
    at wrapped (https://cdn.test/sonda.js:2:1)\n    \
    at dispatch (https://app.test/static/js/vendor.redux.js:120:9)\n    \
    at onClick (https://app.test/static/js/main.js:4412:17)\n    \
    at HTMLButtonElement.handleEvent (https://app.test/static/js/react-dom.js:88:3)";

fn create_bench_record(i: u64, url: &str) -> CapturedRequest {
    let mut record = CapturedRequest::new(TransportKind::Request, "POST", url);
    record.monotonic_start = i as f64;
    record.duration_ms = 12.0;
    record.status = 200;
    record.response_size_bytes = 4096;
    record.request_body_preview = "name=ana&amount=10&callback=done".to_string();
    record.stack_trace = Some(STACK.to_string());
    record
}

/// Benchmark: one classification pass
fn bench_classify(c: &mut Criterion) {
    let classifier = Classifier::new(512);
    let mut group = c.benchmark_group("classify");

    for (name, url) in [
        ("plain", "https://shop.test/api/items/42"),
        ("query", "https://shop.test/login?next=%2Fhome&debug=1&format=csv"),
    ] {
        let record = create_bench_record(0, url);
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut record = record.clone();
                classifier.classify(black_box(&mut record), RaceSignal::Unique);
                record
            });
        });
    }

    group.finish();
}

/// Benchmark: appending a batch to a fresh session
///
/// Distinct URLs keep every entry in the race window, the worst case for
/// the duplicate scan.
fn bench_session_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_append");

    for batch in [10u64, 100, 1000] {
        let records: Vec<CapturedRequest> = (0..batch)
            .map(|i| create_bench_record(i, &format!("https://shop.test/api/items/{}", i)))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(batch), &records, |b, records| {
            b.iter(|| {
                let session = Session::builder(CaptureConfig::quiet())
                    .stack_capture(FixedStackCapture(STACK.to_string()))
                    .build()
                    .unwrap();
                for record in records {
                    session.append(black_box(record.clone()));
                }
                session.len()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_session_append);
criterion_main!(benches);
