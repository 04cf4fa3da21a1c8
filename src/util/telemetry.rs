use std::time::Duration;

use opentelemetry::{KeyValue, global};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{self, Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::util::env::Env;

pub type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>;

/// Exporter pipelines for the service. Without a collector endpoint the service only logs to the
/// console, with spans echoed through the stdout exporter.
#[derive(Debug, Clone)]
pub struct Telemetry {
    tracer_name: String,
    log_filter: String,
    providers: Providers,
}

#[derive(Debug, Clone)]
enum Providers {
    Collector {
        logger_provider: SdkLoggerProvider,
        tracer_provider: SdkTracerProvider,
        meter_provider: SdkMeterProvider,
    },
    Console {
        tracer_provider: SdkTracerProvider,
    },
}

impl Telemetry {
    pub fn new(env: &Env) -> Result<Telemetry> {
        let service_version = env!("CARGO_PKG_VERSION");
        let base_resource = base_attrs(env.api_service_name.clone(), service_version);

        let providers = match env.otel_exporter_otlp_endpoint.as_deref() {
            Some(collector_url) => Providers::Collector {
                logger_provider: build_logger_provider(collector_url, base_resource.clone())?,
                tracer_provider: build_tracer_provider(collector_url, base_resource.clone())?,
                meter_provider: build_meter_provider(collector_url, base_resource)?,
            },
            None => Providers::Console {
                tracer_provider: init_stdout_provider(base_resource),
            },
        };

        Ok(Self {
            tracer_name: env.api_tracer_name.clone(),
            log_filter: env.log_filter.clone(),
            providers,
        })
    }

    pub fn register(self) -> Self {
        match &self.providers {
            Providers::Collector {
                logger_provider,
                tracer_provider,
                meter_provider,
            } => {
                let fmt_layer = tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true);
                let filter = EnvFilter::new(&self.log_filter);
                global::set_tracer_provider(tracer_provider.clone());
                let tracer = global::tracer(self.tracer_name.clone());

                tracing_subscriber::registry()
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .with(OpenTelemetryTracingBridge::new(logger_provider))
                    .with(tracing_opentelemetry::MetricsLayer::new(
                        meter_provider.clone(),
                    ))
                    .with(filter)
                    .with(fmt_layer)
                    .init();
            }
            Providers::Console { tracer_provider } => {
                let fmt_layer = tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true);
                let filter = EnvFilter::new(&self.log_filter);
                global::set_tracer_provider(tracer_provider.clone());
                let tracer = global::tracer(self.tracer_name.clone());

                tracing_subscriber::registry()
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .with(filter)
                    .with(fmt_layer)
                    .init();
            }
        }

        self
    }

    pub fn shutdown(self) {
        match self.providers {
            Providers::Collector {
                logger_provider,
                tracer_provider,
                meter_provider,
            } => {
                if let Err(e) = meter_provider.shutdown() {
                    eprintln!("error during metering shutdown: {e:?}");
                }

                if let Err(e) = logger_provider.shutdown() {
                    eprintln!("error during logging shutdown: {e:?}");
                }

                if let Err(e) = tracer_provider.shutdown() {
                    eprintln!("error during tracing shutdown: {e:?}");
                }
            }
            Providers::Console { tracer_provider } => {
                if let Err(e) = tracer_provider.shutdown() {
                    eprintln!("error during tracing shutdown: {e:?}");
                }
            }
        }
    }
}

pub fn build_logger_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkLoggerProvider> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(Endpoint::Logs.to_url(collector_url))
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

pub fn build_tracer_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(Endpoint::Traces.to_url(collector_url))
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

pub fn build_meter_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(Endpoint::Metrics.to_url(collector_url))
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

/// Console-only tracing for local development, no collector required
fn init_stdout_provider(base_resource: Resource) -> SdkTracerProvider {
    let exporter = opentelemetry_stdout::SpanExporter::default();
    SdkTracerProvider::builder()
        .with_simple_exporter(exporter)
        .with_id_generator(RandomIdGenerator::default())
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(base_resource)
        .build()
}

fn base_attrs(name: String, version: &'static str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", name),
            KeyValue::new("service.version", version),
        ])
        .build()
}

enum Endpoint {
    Logs,
    Traces,
    Metrics,
}

impl Endpoint {
    pub fn to_url(&self, collector_endpoint: &str) -> String {
        let location: &str = match self {
            Endpoint::Logs => "/v1/logs",
            Endpoint::Traces => "/v1/traces",
            Endpoint::Metrics => "/v1/metrics",
        };
        format!("{}{location}", collector_endpoint.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(
            Endpoint::Traces.to_url("http://collector:4317"),
            "http://collector:4317/v1/traces"
        );
        assert_eq!(
            Endpoint::Logs.to_url("http://collector:4317/"),
            "http://collector:4317/v1/logs"
        );
        assert_eq!(
            Endpoint::Metrics.to_url("http://collector:4317"),
            "http://collector:4317/v1/metrics"
        );
    }
}
