// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::settings::Settings;
use crate::domain::models::job::{JobKind, JobSpec};
use crate::domain::repositories::worker_runtime::{WorkerHandle, WorkerInvocation, WorkerRuntime};
use crate::infrastructure::workspace::{
    JobWorkspace, HINTS_FILE, ITEMS_FILE, LINK_MODEL_FILE, LOG_FILE, PAGE_MODEL_FILE, SEEDS_FILE,
};
use crate::utils::errors::{RuntimeError, StartFailure};

/// 启动工作进程的参数
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub jobs_root: PathBuf,
    pub max_items: u64,
    pub log_level: String,
    pub checkpoint_interval: u64,
}

impl LaunchOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            jobs_root: settings.worker.jobs_root(),
            max_items: settings.worker.max_items,
            log_level: settings.worker.log_level.clone(),
            checkpoint_interval: settings.service.checkpoint_interval,
        }
    }
}

/// 停止结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// 工作进程已停止并回收
    Stopped(WorkerHandle),
    /// 没有可停止的工作进程
    NotRunning,
}

struct AttachedWorker {
    handle: WorkerHandle,
    workspace: JobWorkspace,
}

/// 工作进程管理器
///
/// 把作业转换成一个运行中的隔离工作进程，并独占作业ID到句柄的映射。
/// 同一作业ID任何时刻最多只有一个句柄。
pub struct WorkerProcessManager {
    runtime: Arc<dyn WorkerRuntime>,
    options: LaunchOptions,
    workers: HashMap<String, AttachedWorker>,
}

impl WorkerProcessManager {
    pub fn new(runtime: Arc<dyn WorkerRuntime>, options: LaunchOptions) -> Self {
        Self {
            runtime,
            options,
            workers: HashMap::new(),
        }
    }

    /// 加载服务重启前仍在运行的工作进程
    ///
    /// 工作目录里记录了句柄，但还没有按作业ID建立索引，
    /// 因此重启后的恢复尚未实现，总是返回空表。
    pub fn load_all_running(&self) -> HashMap<String, WorkerHandle> {
        HashMap::new()
    }

    /// 启动作业
    ///
    /// 1. 创建工作目录并写入输入
    /// 2. 以读写方式绑定工作目录启动隔离工作进程
    /// 3. 记录返回的句柄
    ///
    /// 任一步骤失败都不会记录句柄，作业视为未启动。
    pub async fn start(&mut self, job: &JobSpec) -> Result<JobWorkspace, StartFailure> {
        if let Some(existing) = self.workers.get(&job.job_id) {
            warn!(
                job_id = %job.job_id,
                container = %existing.handle,
                "Refusing to start a second worker"
            );
            return Err(StartFailure::AlreadyRunning(job.job_id.clone()));
        }

        let workspace = JobWorkspace::create(&self.options.jobs_root, &job.job_id).await?;
        workspace
            .write_inputs(&job.seeds, &job.page_model, job.link_model.as_deref())
            .await?;
        if job.kind == JobKind::Crawling {
            workspace.init_hints(&job.hints).await?;
        }

        let invocation = self.invocation(job, &workspace);
        info!(
            job_id = %job.job_id,
            workspace = %workspace.root().display(),
            "Starting worker"
        );
        let handle = self.runtime.launch(&invocation).await?;

        if let Err(e) = workspace.record_worker_handle(&handle).await {
            warn!(job_id = %job.job_id, container = %handle, error = %e, "Failed to persist worker handle");
        }
        info!(
            job_id = %job.job_id,
            workspace = %workspace.root().display(),
            container = %handle,
            "Worker started"
        );

        self.workers.insert(
            job.job_id.clone(),
            AttachedWorker {
                handle,
                workspace: workspace.clone(),
            },
        );
        Ok(workspace)
    }

    /// 停止作业的工作进程
    ///
    /// 未知或已停止的作业只记录日志。运行时报错时句柄保留，
    /// 工作进程可能仍在运行，之后的 Start 会被拒绝，Stop 可以重试。
    pub async fn stop(&mut self, job_id: &str) -> Result<StopOutcome, RuntimeError> {
        let Some(worker) = self.workers.remove(job_id) else {
            info!(job_id, "Can not stop worker: it is not running");
            return Ok(StopOutcome::NotRunning);
        };

        info!(
            job_id,
            workspace = %worker.workspace.root().display(),
            container = %worker.handle,
            "Stopping worker"
        );
        if let Err(e) = self.runtime.terminate(&worker.handle).await {
            warn!(job_id, container = %worker.handle, error = %e, "Worker may still be running");
            self.workers.insert(job_id.to_string(), worker);
            return Err(e);
        }
        info!(job_id, container = %worker.handle, "Worker stopped");
        Ok(StopOutcome::Stopped(worker.handle))
    }

    /// 作业当前的工作进程句柄
    pub fn handle(&self, job_id: &str) -> Option<&WorkerHandle> {
        self.workers.get(job_id).map(|w| &w.handle)
    }

    /// 仍然挂载工作进程的作业ID
    pub fn running_job_ids(&self) -> Vec<String> {
        self.workers.keys().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.workers.len()
    }

    fn invocation(&self, job: &JobSpec, workspace: &JobWorkspace) -> WorkerInvocation {
        let crawling = job.kind == JobKind::Crawling;
        WorkerInvocation {
            job_id: job.job_id.clone(),
            kind: job.kind,
            workspace: workspace.root().to_path_buf(),
            seeds_file: SEEDS_FILE.to_string(),
            classifier_file: PAGE_MODEL_FILE.to_string(),
            items_file: ITEMS_FILE.to_string(),
            log_file: LOG_FILE.to_string(),
            log_level: self.options.log_level.clone(),
            max_items: self.options.max_items,
            checkpoint_interval: (!crawling).then_some(self.options.checkpoint_interval),
            link_model_file: job
                .link_model
                .as_ref()
                .map(|_| LINK_MODEL_FILE.to_string()),
            hints_file: crawling.then(|| HINTS_FILE.to_string()),
            broadness: job.broadness,
        }
    }
}
