use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Failed to build metrics exporter: {0}")]
pub struct TelemetryError(String);

pub struct Metrics {
    request_counter: Counter<u64>,
    prediction_duration: Histogram<u64>,
    prediction_counter: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();
        // TODO: opentelemetry-prometheus is deprecated, switch /metrics to an OTLP push exporter
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| TelemetryError(e.to_string()))?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("currency_api");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Requests received per route")
            .build();

        let boundaries = generate_boundaries((50, 100, 250, 1000, 5000));

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Time spent classifying an upload request, in milliseconds")
            .build();

        let prediction_counter = meter
            .u64_counter("predictions_total")
            .with_description("Classified images by outcome")
            .build();

        Ok(Metrics {
            request_counter,
            prediction_duration,
            prediction_counter,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        self.request_counter.add(1, &label("route", route));
    }

    pub fn record_prediction_duration(&self, duration_ms: u64, route: &str) {
        self.prediction_duration
            .record(duration_ms, &label("route", route));
    }

    /// `outcome` is a prediction label or `failed`.
    pub fn record_prediction(&self, outcome: &str) {
        self.prediction_counter.add(1, &label("outcome", outcome));
    }
}

fn label(key: &'static str, value: &str) -> [KeyValue; 1] {
    [KeyValue::new(key, value.to_string())]
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    // Inference round trips cluster below 100ms; coarser buckets above.
    const STEPS: [usize; 4] = [10, 25, 250, 1000];
    let edges = [parts.0, parts.1, parts.2, parts.3, parts.4];

    let mut seen = HashSet::new();
    edges
        .windows(2)
        .zip(STEPS)
        .flat_map(|(range, step)| (range[0]..=range[1]).step_by(step))
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let parts = (50, 70, 120, 620, 2620);
        let get = generate_boundaries(parts);
        let expected = vec![
            50.0, 60.0, 70.0, 95.0, 120.0, 370.0, 620.0, 1620.0, 2620.0,
        ];

        assert_eq!(get, expected);
    }
}
