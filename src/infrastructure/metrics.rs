// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

use crate::config::settings::MetricsSettings;
use crate::domain::models::job::JobKind;

/// 初始化指标系统
///
/// 未启用时不安装 recorder，下面的计数调用都是空操作。
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        return;
    }

    let addr: SocketAddr = match settings.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", settings.listen_addr, e);
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_counter!("jobs_started_total", "Total number of worker launches");
    describe_counter!(
        "jobs_start_failed_total",
        "Total number of jobs that failed to start"
    );
    describe_counter!("jobs_stopped_total", "Total number of jobs stopped");
    describe_counter!(
        "messages_dropped_total",
        "Total number of undecodable bus messages"
    );
    describe_gauge!("active_jobs", "Jobs with a live worker");

    info!("Metrics exporter listening on {}", addr);
}

pub fn record_job_started(kind: JobKind) {
    counter!("jobs_started_total", "kind" => kind.queue_name()).increment(1);
}

pub fn record_job_start_failed(kind: JobKind) {
    counter!("jobs_start_failed_total", "kind" => kind.queue_name()).increment(1);
}

pub fn record_job_stopped(kind: JobKind) {
    counter!("jobs_stopped_total", "kind" => kind.queue_name()).increment(1);
}

pub fn record_message_dropped(kind: JobKind) {
    counter!("messages_dropped_total", "kind" => kind.queue_name()).increment(1);
}

pub fn set_active_jobs(kind: JobKind, count: usize) {
    gauge!("active_jobs", "kind" => kind.queue_name()).set(count as f64);
}
