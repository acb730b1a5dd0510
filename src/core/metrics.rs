// src/core/metrics.rs

//! Defines and registers Prometheus metrics for the AT-TLS core.
//!
//! Metrics are registered once, globally, through `lazy_static`.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};

/// Label values for the `kind` label of the query counters.
pub const QUERY_KIND_METADATA: &str = "metadata";
pub const QUERY_KIND_CERTIFICATE: &str = "certificate";
pub const QUERY_KIND_COMBINED: &str = "combined";

lazy_static! {
    /// The number of threads that currently have a context attached.
    pub static ref BOUND_CONTEXTS: Gauge =
        register_gauge!("attls_bound_contexts", "Number of threads with an attached AT-TLS context.").unwrap();

    /// Privileged queries issued, labeled by kind.
    pub static ref QUERIES_TOTAL: CounterVec =
        register_counter_vec!("attls_queries_total", "Total number of privileged AT-TLS queries issued.", &["kind"]).unwrap();
    /// Privileged queries that returned a nonzero return code, labeled by kind.
    pub static ref QUERY_FAILURES_TOTAL: CounterVec =
        register_counter_vec!("attls_query_failures_total", "Total number of failed privileged AT-TLS queries.", &["kind"]).unwrap();
    /// Control operations issued, labeled by operation.
    pub static ref CONTROL_CALLS_TOTAL: CounterVec =
        register_counter_vec!("attls_control_calls_total", "Total number of AT-TLS control operations issued.", &["op"]).unwrap();
    /// Field reads answered from the cache without a privileged call.
    pub static ref CACHE_HITS_TOTAL: Counter =
        register_counter!("attls_cache_hits_total", "Total number of AT-TLS reads served from the cache.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
