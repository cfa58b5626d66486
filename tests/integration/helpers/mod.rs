// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ddcrawl::config::settings::Settings;
use ddcrawl::domain::models::job::JobKind;
use ddcrawl::domain::repositories::message_bus::{MessageBus, OutputCategory, Topics};
use ddcrawl::domain::repositories::worker_runtime::{WorkerHandle, WorkerInvocation, WorkerRuntime};
use ddcrawl::infrastructure::bus::InMemoryBus;
use ddcrawl::utils::codec::encode_model_data;
use ddcrawl::utils::errors::RuntimeError;
use ddcrawl::workers::ServiceManager;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use tempfile::TempDir;

/// 模拟工作进程的运行时
///
/// 启动时把预设的条目和检查点写进工作目录，就像爬虫已经跑了一段时间。
#[derive(Default)]
pub struct FakeWorkerRuntime {
    pub items: Vec<Value>,
    pub checkpoint: Option<Vec<u8>>,
    pub fail_launch: bool,
    pub launches: Mutex<Vec<WorkerInvocation>>,
    pub terminated: Mutex<Vec<WorkerHandle>>,
}

impl FakeWorkerRuntime {
    pub fn with_items(items: Vec<Value>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn terminate_count(&self) -> usize {
        self.terminated.lock().unwrap().len()
    }

    pub fn workspace_of(&self, job_id: &str) -> Option<PathBuf> {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|invocation| invocation.job_id == job_id)
            .map(|invocation| invocation.workspace.clone())
    }
}

#[async_trait]
impl WorkerRuntime for FakeWorkerRuntime {
    async fn launch(&self, invocation: &WorkerInvocation) -> Result<WorkerHandle, RuntimeError> {
        if self.fail_launch {
            return Err(RuntimeError::NonZeroExit {
                command: "docker run".to_string(),
                code: 125,
                stderr: "Unable to find image".to_string(),
            });
        }

        if !self.items.is_empty() {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            for item in &self.items {
                writeln!(encoder, "{}", item).unwrap();
            }
            std::fs::write(
                invocation.workspace.join(&invocation.items_file),
                encoder.finish().unwrap(),
            )
            .unwrap();
        }
        if let Some(checkpoint) = &self.checkpoint {
            std::fs::write(invocation.workspace.join("Q-1.joblib"), checkpoint).unwrap();
        }

        let mut launches = self.launches.lock().unwrap();
        launches.push(invocation.clone());
        Ok(WorkerHandle::parse(&format!("fake-{}-{}", invocation.job_id, launches.len())).unwrap())
    }

    async fn terminate(&self, handle: &WorkerHandle) -> Result<(), RuntimeError> {
        self.terminated.lock().unwrap().push(handle.clone());
        Ok(())
    }
}

/// 运行中的测试服务
pub struct TestApp {
    pub bus: Arc<InMemoryBus>,
    pub runtime: Arc<FakeWorkerRuntime>,
    pub settings: Arc<Settings>,
    pub manager: ServiceManager,
    // Keep the jobs root alive
    pub _jobs_root: TempDir,
}

pub fn test_settings(root: &std::path::Path, kinds: Vec<JobKind>) -> Settings {
    let mut settings = Settings::defaults().unwrap();
    settings.bus.kind = "memory".to_string();
    settings.bus.queue_prefix = "test-".to_string();
    settings.worker.jobs_root = root.display().to_string();
    settings.service.kinds = kinds;
    settings.service.poll_timeout_ms = 10;
    settings.service.check_updates_every = 2;
    settings
}

pub fn create_test_app(kinds: Vec<JobKind>, runtime: FakeWorkerRuntime) -> TestApp {
    let jobs_root = tempfile::tempdir().unwrap();
    let settings = Arc::new(test_settings(jobs_root.path(), kinds));
    let bus = Arc::new(InMemoryBus::new());
    let runtime = Arc::new(runtime);

    let mut manager = ServiceManager::new(bus.clone(), runtime.clone(), settings.clone());
    manager.start_services();

    TestApp {
        bus,
        runtime,
        settings,
        manager,
        _jobs_root: jobs_root,
    }
}

impl TestApp {
    pub fn topics(&self, kind: JobKind) -> Topics {
        Topics::new(self.settings.bus.queue_prefix.clone(), kind)
    }

    pub async fn send(&self, kind: JobKind, message: Value) {
        self.bus
            .publish(&self.topics(kind).input(), serde_json::to_vec(&message).unwrap())
            .await
            .unwrap();
    }

    pub async fn send_raw(&self, kind: JobKind, payload: &[u8]) {
        self.bus
            .publish(&self.topics(kind).input(), payload.to_vec())
            .await
            .unwrap();
    }

    pub async fn send_hint(&self, message: Value) {
        let topic = self.topics(JobKind::Crawling).hints_input().unwrap();
        self.bus
            .publish(&topic, serde_json::to_vec(&message).unwrap())
            .await
            .unwrap();
    }

    /// 收集输出主题上的消息，直到满足条件或超时
    pub async fn collect_until(
        &self,
        kind: JobKind,
        category: OutputCategory,
        timeout: Duration,
        done: impl Fn(&[Value]) -> bool,
    ) -> Vec<Value> {
        let topic = self.topics(kind).output(category);
        let deadline = tokio::time::Instant::now() + timeout;
        let mut received = Vec::new();
        loop {
            for payload in self.bus.drain(&topic).await {
                received.push(serde_json::from_slice(&payload).unwrap());
            }
            if done(&received) || tokio::time::Instant::now() >= deadline {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// 所有服务处理完关闭消息后返回
    pub async fn shutdown(mut self) -> Arc<FakeWorkerRuntime> {
        self.manager.request_shutdown();
        tokio::time::timeout(Duration::from_secs(5), self.manager.join())
            .await
            .unwrap();
        self.runtime
    }
}

pub fn start_message(id: &str, kind: JobKind) -> Value {
    let mut message = json!({
        "id": id,
        "workspace_id": "workspace-1",
        "page_model": encode_model_data(Some(b"page classifier".as_slice())),
        "seeds": ["http://example.com", "https://example.org/start"],
    });
    if kind == JobKind::Crawling {
        message["link_model"] = json!(encode_model_data(Some(b"link classifier".as_slice())));
    }
    message
}

pub fn stop_message(id: &str) -> Value {
    json!({"id": id, "stop": true})
}

pub fn sample_items() -> Vec<Value> {
    vec![
        json!({"url": "http://example.com/a", "score": 0.8}),
        json!({"url": "http://www.example.com/b", "score": 0.3}),
        json!({"url": "https://example.org/c", "score": 0.95}),
        json!({"url": "ftp://files.example.net/d", "score": 0.1}),
    ]
}
