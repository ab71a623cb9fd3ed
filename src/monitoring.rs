use hiro_system_kit::slog;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::core::{AtomicU64, GenericGauge};
use prometheus::{
    self, exponential_buckets, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};
use serde_json::Value as JsonValue;

use crate::utils::Context;

type UInt64Gauge = GenericGauge<AtomicU64>;

/// Label of the ingestion histogram, one per kind of queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestionEvent {
    RawEvent,
    Block,
    Microblock,
    BurnBlock,
    MempoolTxs,
    DroppedMempoolTxs,
    NewAttachment,
}

impl IngestionEvent {
    pub const ALL: [IngestionEvent; 7] = [
        IngestionEvent::RawEvent,
        IngestionEvent::Block,
        IngestionEvent::Microblock,
        IngestionEvent::BurnBlock,
        IngestionEvent::MempoolTxs,
        IngestionEvent::DroppedMempoolTxs,
        IngestionEvent::NewAttachment,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            IngestionEvent::RawEvent => "raw_event",
            IngestionEvent::Block => "block",
            IngestionEvent::Microblock => "microblock",
            IngestionEvent::BurnBlock => "burn_block",
            IngestionEvent::MempoolTxs => "mempool_txs",
            IngestionEvent::DroppedMempoolTxs => "dropped_mempool_txs",
            IngestionEvent::NewAttachment => "new_attachment",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrometheusMonitoring {
    pub ingestion_timers: HistogramVec,
    pub requests_total: IntCounterVec,
    pub last_block_height: UInt64Gauge,
    pub last_burn_block_height: UInt64Gauge,
    pub queue_depth: IntGauge,
    pub registry: Registry,
}

impl PrometheusMonitoring {
    pub fn new() -> Result<PrometheusMonitoring, String> {
        let registry = Registry::new();
        let buckets = exponential_buckets(50.0, 3.0, 10).map_err(|e| e.to_string())?;
        let ingestion_timers = HistogramVec::new(
            HistogramOpts::new(
                "stacks_event_ingestion_timers",
                "Stacks event ingestion timers, in milliseconds",
            )
            .buckets(buckets),
            &["event"],
        )
        .map_err(|e| e.to_string())?;
        registry
            .register(Box::new(ingestion_timers.clone()))
            .map_err(|e| e.to_string())?;
        let requests_total = IntCounterVec::new(
            Opts::new(
                "stacks_event_observer_requests_total",
                "Requests received from the Stacks node, by path and response status",
            ),
            &["path", "status"],
        )
        .map_err(|e| e.to_string())?;
        registry
            .register(Box::new(requests_total.clone()))
            .map_err(|e| e.to_string())?;
        let last_block_height = PrometheusMonitoring::create_and_register_uint64_gauge(
            &registry,
            "stacks_event_observer_last_block_height",
            "Height of the last Stacks block ingested.",
        )?;
        let last_burn_block_height = PrometheusMonitoring::create_and_register_uint64_gauge(
            &registry,
            "stacks_event_observer_last_burn_block_height",
            "Height of the last burn block ingested.",
        )?;
        let queue_depth = PrometheusMonitoring::create_and_register_int_gauge(
            &registry,
            "stacks_event_observer_queue_depth",
            "Tasks waiting for or holding the ingestion queue.",
        )?;
        Ok(PrometheusMonitoring {
            ingestion_timers,
            requests_total,
            last_block_height,
            last_burn_block_height,
            queue_depth,
            registry,
        })
    }

    pub fn create_and_register_uint64_gauge(
        registry: &Registry,
        name: &str,
        help: &str,
    ) -> Result<UInt64Gauge, String> {
        let g = UInt64Gauge::new(name, help).map_err(|e| e.to_string())?;
        registry
            .register(Box::new(g.clone()))
            .map_err(|e| e.to_string())?;
        Ok(g)
    }

    pub fn create_and_register_int_gauge(
        registry: &Registry,
        name: &str,
        help: &str,
    ) -> Result<IntGauge, String> {
        let g = IntGauge::new(name, help).map_err(|e| e.to_string())?;
        registry
            .register(Box::new(g.clone()))
            .map_err(|e| e.to_string())?;
        Ok(g)
    }

    pub fn observe_ingestion(&self, event: IngestionEvent, elapsed_ms: f64) {
        self.ingestion_timers
            .with_label_values(&[event.label()])
            .observe(elapsed_ms);
    }

    pub fn request_handled(&self, path: &str, status: u16) {
        self.requests_total
            .with_label_values(&[path, &status.to_string()])
            .inc();
    }

    pub fn block_ingested(&self, block_height: u64) {
        if block_height > self.last_block_height.get() {
            self.last_block_height.set(block_height);
        }
    }

    pub fn burn_block_ingested(&self, burn_block_height: u64) {
        if burn_block_height > self.last_burn_block_height.get() {
            self.last_burn_block_height.set(burn_block_height);
        }
    }

    pub fn get_metrics(&self) -> JsonValue {
        let mut ingested = serde_json::Map::new();
        for event in IngestionEvent::ALL.iter() {
            let histogram = self.ingestion_timers.with_label_values(&[event.label()]);
            ingested.insert(
                event.label().to_string(),
                json!({
                    "count": histogram.get_sample_count(),
                    "total_ms": histogram.get_sample_sum(),
                }),
            );
        }
        json!({
            "stacks": {
                "last_block_height": self.last_block_height.get(),
                "last_burn_block_height": self.last_burn_block_height.get(),
            },
            "queue_depth": self.queue_depth.get(),
            "ingestion": ingested,
        })
    }
}

async fn serve_req(
    req: Request<Body>,
    registry: Registry,
    ctx: Context,
) -> Result<Response<Body>, hyper::Error> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            ctx.try_log(|logger| {
                slog::debug!(
                    logger,
                    "Prometheus monitoring: responding to metrics request"
                )
            });

            let encoder = TextEncoder::new();
            let metric_families = registry.gather();
            let mut buffer = vec![];
            let response = match encoder.encode(&metric_families, &mut buffer) {
                Ok(_) => {
                    let mut response = Response::new(Body::from(buffer));
                    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
                        response.headers_mut().insert(CONTENT_TYPE, content_type);
                    }
                    response
                }
                Err(e) => {
                    ctx.try_log(|logger| {
                        slog::debug!(
                            logger,
                            "Prometheus monitoring: failed to encode metrics: {}",
                            e.to_string()
                        )
                    });
                    empty_response(StatusCode::INTERNAL_SERVER_ERROR)
                }
            };
            Ok(response)
        }
        (_, _) => {
            ctx.try_log(|logger| {
                slog::debug!(
                    logger,
                    "Prometheus monitoring: received request with invalid method/route: {}/{}",
                    req.method(),
                    req.uri().path()
                )
            });
            Ok(empty_response(StatusCode::NOT_FOUND))
        }
    }
}

fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

pub async fn start_serving_prometheus_metrics(port: u16, registry: Registry, ctx: Context) {
    let addr = ([0, 0, 0, 0], port).into();
    let ctx_clone = ctx.clone();
    let make_svc = make_service_fn(|_| {
        let registry = registry.clone();
        let ctx_clone = ctx_clone.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |r| {
                serve_req(r, registry.clone(), ctx_clone.clone())
            }))
        }
    });
    let serve_future = Server::bind(&addr).serve(make_svc);

    ctx.try_log(|logger| slog::info!(logger, "Prometheus monitoring: listening on port {}", port));

    if let Err(err) = serve_future.await {
        ctx.try_log(|logger| slog::warn!(logger, "Prometheus monitoring: server error: {}", err));
    }
}
