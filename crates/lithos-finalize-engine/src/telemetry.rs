// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Optional OpenTelemetry instrumentation. Without the `telemetry` feature
//! every hook compiles to a no-op.
#![cfg_attr(not(feature = "telemetry"), allow(dead_code))]

#[cfg(feature = "telemetry")]
mod otel {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::OnceLock;
    use std::time::Duration;

    use opentelemetry::global;
    use opentelemetry::metrics::{Counter, Histogram};
    use opentelemetry::trace::{Span as _, SpanKind, Tracer};
    use opentelemetry::KeyValue;

    const SCOPE_NAME: &str = "lithos_finalize_engine";

    static ENABLED: AtomicBool = AtomicBool::new(false);
    static HANDLES: OnceLock<Handles> = OnceLock::new();

    struct Handles {
        tracer: global::BoxedTracer,
        render_hist: Histogram<f64>,
        render_counter: Counter<u64>,
        analyze_counter: Counter<u64>,
        helper_counter: Counter<u64>,
    }

    impl Handles {
        fn new() -> Self {
            let meter = global::meter(SCOPE_NAME);
            Self {
                tracer: global::tracer(SCOPE_NAME),
                render_hist: meter
                    .f64_histogram("lithos.finalize.render.duration_ms")
                    .with_description("Template render duration in milliseconds")
                    .init(),
                render_counter: meter
                    .u64_counter("lithos.finalize.render.count")
                    .with_description("Number of template renders")
                    .init(),
                analyze_counter: meter
                    .u64_counter("lithos.finalize.analyze.count")
                    .with_description("Number of template analyses")
                    .init(),
                helper_counter: meter
                    .u64_counter("lithos.finalize.helper.count")
                    .with_description("Number of helper invocations")
                    .init(),
            }
        }
    }

    fn handles() -> &'static Handles {
        HANDLES.get_or_init(Handles::new)
    }

    pub fn enable() {
        ENABLED.store(true, Ordering::Relaxed);
    }

    pub fn disable() {
        ENABLED.store(false, Ordering::Relaxed);
    }

    fn enabled() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    pub fn record_render(template: &str, duration: Duration, success: bool) {
        if !enabled() {
            return;
        }
        let hs = handles();
        let duration_ms = duration.as_secs_f64() * 1_000.0;
        let attrs = [
            KeyValue::new("template.name", template.to_string()),
            KeyValue::new("render.success", success),
        ];
        hs.render_counter.add(1, &attrs);
        hs.render_hist.record(duration_ms, &attrs);
        let mut span = hs
            .tracer
            .span_builder("Template::render")
            .with_kind(SpanKind::Internal)
            .start(&hs.tracer);
        span.set_attribute(KeyValue::new("template.name", template.to_string()));
        span.set_attribute(KeyValue::new("render.duration_ms", duration_ms));
        span.set_attribute(KeyValue::new("render.success", success));
        span.end();
    }

    pub fn record_analyze(template: &str, unknown_functions: usize) {
        if !enabled() {
            return;
        }
        let attrs = [
            KeyValue::new("template.name", template.to_string()),
            KeyValue::new("analyze.unknown_functions", unknown_functions as i64),
        ];
        handles().analyze_counter.add(1, &attrs);
    }

    pub fn record_helper_invocation(name: &str, success: bool) {
        if !enabled() {
            return;
        }
        let attrs = [
            KeyValue::new("helper.name", name.to_string()),
            KeyValue::new("helper.success", success),
        ];
        handles().helper_counter.add(1, &attrs);
    }
}

#[cfg(not(feature = "telemetry"))]
mod otel {
    use std::time::Duration;

    pub fn enable() {}
    pub fn disable() {}
    pub fn record_render(_template: &str, _duration: Duration, _success: bool) {}
    pub fn record_analyze(_template: &str, _unknown_functions: usize) {}
    pub fn record_helper_invocation(_name: &str, _success: bool) {}
}

pub use otel::{disable, enable, record_analyze, record_helper_invocation, record_render};
