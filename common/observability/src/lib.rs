use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters shared by the order, payment and carrier services.
///
/// Each service registers the same set; series a service never touches stay at zero.
#[derive(Clone)]
pub struct FulfillmentMetrics {
    pub registry: Registry,
    pub orders_created_total: IntCounter,
    pub order_create_rejections_total: IntCounterVec,
    pub payment_inits_total: IntCounterVec,
    pub payment_webhooks_total: IntCounterVec,
    pub carrier_requests_total: IntCounterVec,
    pub carrier_request_duration_seconds: HistogramVec,
    pub carrier_token_refresh_total: IntCounterVec,
    pub lookup_cache_requests_total: IntCounterVec,
    pub carrier_webhooks_total: IntCounterVec,
}

impl FulfillmentMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let orders_created_total = IntCounter::new(
            "orders_created_total",
            "Orders committed with stock decremented",
        )?;
        let order_create_rejections_total = IntCounterVec::new(
            Opts::new("order_create_rejections_total", "Order creation attempts rejected, by reason"),
            &["reason"],
        )?;
        let payment_inits_total = IntCounterVec::new(
            Opts::new("payment_inits_total", "Payment initiation attempts, by result"),
            &["result"],
        )?;
        let payment_webhooks_total = IntCounterVec::new(
            Opts::new("payment_webhooks_total", "Payment gateway notifications, by reconciliation outcome"),
            &["outcome"],
        )?;
        let carrier_requests_total = IntCounterVec::new(
            Opts::new("carrier_requests_total", "Outbound carrier API calls, by operation and result"),
            &["operation", "result"],
        )?;
        let carrier_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "carrier_request_duration_seconds",
                "Latency of outbound carrier API calls",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["operation"],
        )?;
        let carrier_token_refresh_total = IntCounterVec::new(
            Opts::new("carrier_token_refresh_total", "Carrier OAuth token exchanges, by result"),
            &["result"],
        )?;
        let lookup_cache_requests_total = IntCounterVec::new(
            Opts::new("lookup_cache_requests_total", "Carrier lookup cache reads, by cache and hit/miss"),
            &["cache", "result"],
        )?;
        let carrier_webhooks_total = IntCounterVec::new(
            Opts::new("carrier_webhooks_total", "Carrier status webhooks, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_created_total.clone()))?;
        registry.register(Box::new(order_create_rejections_total.clone()))?;
        registry.register(Box::new(payment_inits_total.clone()))?;
        registry.register(Box::new(payment_webhooks_total.clone()))?;
        registry.register(Box::new(carrier_requests_total.clone()))?;
        registry.register(Box::new(carrier_request_duration_seconds.clone()))?;
        registry.register(Box::new(carrier_token_refresh_total.clone()))?;
        registry.register(Box::new(lookup_cache_requests_total.clone()))?;
        registry.register(Box::new(carrier_webhooks_total.clone()))?;
        Ok(FulfillmentMetrics {
            registry,
            orders_created_total,
            order_create_rejections_total,
            payment_inits_total,
            payment_webhooks_total,
            carrier_requests_total,
            carrier_request_duration_seconds,
            carrier_token_refresh_total,
            lookup_cache_requests_total,
            carrier_webhooks_total,
        })
    }

    /// Text exposition of this registry plus the process-wide default registry.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut families = self.registry.gather();
        families.extend(prometheus::gather());
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
