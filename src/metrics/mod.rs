//! Prometheus metrics for the decision cycle and the HTTP surface

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    pub cycles_total: IntCounter,
    pub cycle_duration_seconds: Histogram,
    pub cycles_active: IntGauge,
    pub instruments_skipped_total: IntCounter,
    pub verdicts_ready_total: IntCounter,
    pub orders_placed_total: IntCounter,
    pub orders_failed_total: IntCounter,
    pub risk_rejections_total: IntCounterVec,
    pub exits_total: IntCounterVec,
    pub open_positions: IntGauge,
    pub gateway_connected: Gauge,

    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles_total = IntCounter::new("engine_cycles_total", "Completed decision cycles")?;
        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("engine_cycle_duration_seconds", "Decision cycle duration")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        let cycles_active = IntGauge::new("engine_cycles_active", "Cycles currently running")?;
        let instruments_skipped_total = IntCounter::new(
            "engine_instruments_skipped_total",
            "Instruments skipped in a cycle after a gateway failure or timeout",
        )?;
        let verdicts_ready_total =
            IntCounter::new("engine_verdicts_ready_total", "Strategy verdicts that came out ready")?;
        let orders_placed_total =
            IntCounter::new("engine_orders_placed_total", "Orders accepted by the gateway")?;
        let orders_failed_total =
            IntCounter::new("engine_orders_failed_total", "Orders rejected or timed out")?;
        let risk_rejections_total = IntCounterVec::new(
            Opts::new("engine_risk_rejections_total", "Ready verdicts blocked by a risk gate"),
            &["gate"],
        )?;
        let exits_total = IntCounterVec::new(
            Opts::new("engine_exits_total", "Positions closed, by reason"),
            &["reason"],
        )?;
        let open_positions = IntGauge::new("engine_open_positions", "Positions tracked as open")?;
        let gateway_connected =
            Gauge::new("engine_gateway_connected", "1 when the last account check was healthy")?;

        let http_requests_total = IntCounter::new("http_requests_total", "HTTP requests served")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration",
        ))?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests in flight")?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;
        registry.register(Box::new(cycles_active.clone()))?;
        registry.register(Box::new(instruments_skipped_total.clone()))?;
        registry.register(Box::new(verdicts_ready_total.clone()))?;
        registry.register(Box::new(orders_placed_total.clone()))?;
        registry.register(Box::new(orders_failed_total.clone()))?;
        registry.register(Box::new(risk_rejections_total.clone()))?;
        registry.register(Box::new(exits_total.clone()))?;
        registry.register(Box::new(open_positions.clone()))?;
        registry.register(Box::new(gateway_connected.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            cycle_duration_seconds,
            cycles_active,
            instruments_skipped_total,
            verdicts_ready_total,
            orders_placed_total,
            orders_failed_total,
            risk_rejections_total,
            exits_total,
            open_positions,
            gateway_connected,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
        })
    }

    /// Render every registered metric in the text exposition format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
