//! Metrics definitions for the merger.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "merger.requests",
    metric_type: MetricType::Counter,
    description: "Number of update requests, tagged by outcome",
};

pub const EXPIRED_RESETS: MetricDef = MetricDef {
    name: "merger.expired_resets",
    metric_type: MetricType::Counter,
    description: "Number of times an expired document was cleared before merging",
};

pub const COERCED_VALUES: MetricDef = MetricDef {
    name: "merger.coerced_values",
    metric_type: MetricType::Counter,
    description: "Number of invalid speed or expires values replaced by defaults, tagged by field",
};

pub const STORE_READ_DURATION: MetricDef = MetricDef {
    name: "merger.store.read.duration",
    metric_type: MetricType::Histogram,
    description: "Time to fetch and parse the stored document in seconds",
};

pub const STORE_WRITE_DURATION: MetricDef = MetricDef {
    name: "merger.store.write.duration",
    metric_type: MetricType::Histogram,
    description: "Time to write the merged document in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUESTS,
    EXPIRED_RESETS,
    COERCED_VALUES,
    STORE_READ_DURATION,
    STORE_WRITE_DURATION,
];
