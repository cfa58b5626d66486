// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::config::settings::{ServiceSettings, Settings};
use crate::domain::models::job::JobKind;
use crate::domain::models::message::{
    encode_message, ControlMessage, ModelMessage, PagesMessage, ProgressMessage,
};
use crate::domain::models::progress::ProgressReport;
use crate::domain::repositories::message_bus::{MessageBus, OutputCategory, Topics};
use crate::domain::repositories::worker_runtime::WorkerRuntime;
use crate::infrastructure::metrics;
use crate::utils::codec::encode_model_data;
use crate::utils::errors::ServiceError;
use crate::workers::job_tracker::{JobTracker, StartOutcome, TrackerOptions};
use crate::workers::process_manager::{LaunchOptions, WorkerProcessManager};
use crate::workers::worker::Worker;

/// 每个 tick 最多处理的提示数
const MAX_HINTS_PER_TICK: usize = 100;

/// 单条输入消息处理后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// 消息路由服务
///
/// 每种作业类型一个实例。循环消费输入主题，把控制消息交给作业状态机，
/// 并按固定间隔把所有作业的进度发布到输出主题。
pub struct Service {
    name: String,
    kind: JobKind,
    bus: Arc<dyn MessageBus>,
    topics: Topics,
    tracker: JobTracker,
    settings: ServiceSettings,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Service {
    pub fn new(
        kind: JobKind,
        bus: Arc<dyn MessageBus>,
        runtime: Arc<dyn WorkerRuntime>,
        settings: &Settings,
    ) -> Self {
        let manager = WorkerProcessManager::new(runtime, LaunchOptions::from_settings(settings));
        let tracker = JobTracker::new(
            kind,
            manager,
            TrackerOptions::from_settings(&settings.service),
        );
        Self {
            name: format!("{}-service", kind.queue_name()),
            kind,
            bus,
            topics: Topics::new(settings.bus.queue_prefix.clone(), kind),
            tracker,
            settings: settings.service.clone(),
            shutdown: None,
        }
    }

    /// 绑定外部关闭信号，收到 `true` 时循环按关闭消息的流程退出
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// 处理输入主题上的一条消息
    ///
    /// 无法解码的消息记录日志后丢弃。
    pub async fn handle_input(&mut self, payload: &[u8]) -> Flow {
        let message = match ControlMessage::decode(payload, self.kind) {
            Ok(message) => message,
            Err(e) => {
                warn!(service = %self.name, error = %e, "Dropping malformed message");
                metrics::record_message_dropped(self.kind);
                return Flow::Continue;
            }
        };
        self.dispatch(message).await
    }

    /// 处理提示主题上的一条消息
    pub async fn handle_hint(&mut self, payload: &[u8]) {
        match ControlMessage::decode_hint(payload) {
            Ok(message) => {
                self.dispatch(message).await;
            }
            Err(e) => {
                warn!(service = %self.name, error = %e, "Dropping malformed hint");
                metrics::record_message_dropped(self.kind);
            }
        }
    }

    async fn dispatch(&mut self, message: ControlMessage) -> Flow {
        match message {
            ControlMessage::Start(spec) => {
                info!(job_id = %spec.job_id, workspace_id = %spec.workspace_id, "Start message received");
                if let StartOutcome::Failed(reason) = self.tracker.start(&spec).await {
                    let report = ProgressReport::Failed(reason);
                    self.publish_progress(&spec.job_id, &report).await;
                }
            }
            ControlMessage::Stop { job_id, verbose } => {
                info!(job_id = %job_id, verbose, "Stop message received");
                if let Err(e) = self.tracker.stop(&job_id, verbose).await {
                    error!(job_id = %job_id, error = %e, "Failed to stop worker, job stays running");
                }
            }
            ControlMessage::Hint { workspace_id, hint } => {
                self.tracker.hint(&workspace_id, &hint).await;
            }
            ControlMessage::ServiceShutdown => {
                info!(service = %self.name, "Shutdown message received");
                return Flow::Shutdown;
            }
        }
        Flow::Continue
    }

    /// 发布所有作业的进度、页面样本和模型
    pub async fn send_updates(&mut self) {
        let updates = self.tracker.poll().await;
        debug!(service = %self.name, jobs = updates.len(), "Sending updates");

        for update in updates {
            self.publish_progress(&update.job_id, &update.report).await;

            if !update.pages.is_empty() {
                let message = PagesMessage {
                    id: update.job_id.clone(),
                    page_sample: update.pages,
                };
                self.publish(OutputCategory::Pages, &message).await;
            }

            if self.kind != JobKind::Training {
                continue;
            }
            let Some(link_model) = encode_model_data(update.model.as_deref()) else {
                continue;
            };
            let message = ModelMessage {
                id: update.job_id.clone(),
                link_model,
            };
            if self.publish(OutputCategory::Model, &message).await {
                info!(job_id = %update.job_id, "Link model published");
                self.tracker.mark_model_published(&update.job_id);
            }
        }
    }

    async fn publish_progress(&self, job_id: &str, report: &ProgressReport) -> bool {
        let message = ProgressMessage {
            id: job_id.to_string(),
            progress: report.text(),
        };
        self.publish(OutputCategory::Progress, &message).await
    }

    async fn publish<T: Serialize + Sync>(&self, category: OutputCategory, message: &T) -> bool {
        let topic = self.topics.output(category);
        let payload = match encode_message(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!(topic = %topic, error = %e, "Failed to encode message");
                return false;
            }
        };
        match self.bus.publish(&topic, payload).await {
            Ok(()) => true,
            Err(e) => {
                error!(topic = %topic, error = %e, "Failed to publish message");
                false
            }
        }
    }

    async fn drain_hints(&mut self) {
        let Some(topic) = self.topics.hints_input() else {
            return;
        };
        for _ in 0..MAX_HINTS_PER_TICK {
            match self.bus.consume(&topic, std::time::Duration::ZERO).await {
                Ok(Some(payload)) => self.handle_hint(&payload).await,
                Ok(None) => break,
                Err(e) => {
                    error!(topic = %topic, error = %e, "Failed to consume hints");
                    break;
                }
            }
        }
    }

    /// 消费一次输入主题，等待至多一个 tick
    async fn next_input(&mut self) -> Result<Option<Vec<u8>>, ServiceError> {
        let topic = self.topics.input();
        let timeout = self.settings.poll_timeout();
        let Some(shutdown) = self.shutdown.as_mut() else {
            return Ok(self.bus.consume(&topic, timeout).await?);
        };

        tokio::select! {
            result = self.bus.consume(&topic, timeout) => Ok(result?),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    Ok(Some(br#"{"shutdown": true}"#.to_vec()))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

#[async_trait]
impl Worker for Service {
    async fn run(&mut self) -> Result<(), ServiceError> {
        info!(
            service = %self.name,
            input = %self.topics.input(),
            interval_ms = self.settings.update_interval().as_millis() as u64,
            "Service started"
        );

        let update_interval = self.settings.update_interval();
        let mut last_update = Instant::now();

        loop {
            match self.next_input().await {
                Ok(Some(payload)) => {
                    if self.handle_input(&payload).await == Flow::Shutdown {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(service = %self.name, error = %e, "Failed to consume input");
                    sleep(self.settings.poll_timeout()).await;
                }
            }

            self.drain_hints().await;

            if last_update.elapsed() >= update_interval {
                self.send_updates().await;
                last_update = Instant::now();
            }
        }

        if self.settings.stop_on_shutdown {
            info!(service = %self.name, jobs = self.tracker.active_jobs(), "Stopping all jobs");
            self.tracker.shutdown().await;
        }
        info!(service = %self.name, "Service stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
