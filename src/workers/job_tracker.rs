// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;

use tracing::{debug, error, info, instrument, warn};

use crate::config::settings::ServiceSettings;
use crate::domain::models::job::{Hint, JobError, JobKind, JobSpec, JobStatus};
use crate::domain::models::message::PageSample;
use crate::domain::models::progress::{page_sample, ProgressReport, ProgressSnapshot};
use crate::infrastructure::metrics;
use crate::infrastructure::workspace::JobWorkspace;
use crate::utils::errors::{RuntimeError, StartFailure, WorkspaceError};
use crate::workers::process_manager::{StopOutcome, WorkerProcessManager};

/// 进度提取参数
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    pub relevancy_threshold: f64,
    pub page_sample_size: usize,
}

impl TrackerOptions {
    pub fn from_settings(settings: &ServiceSettings) -> Self {
        Self {
            relevancy_threshold: settings.relevancy_threshold,
            page_sample_size: settings.page_sample_size,
        }
    }
}

/// 单个作业的内存状态
#[derive(Debug)]
pub struct TrackedJob {
    pub job_id: String,
    pub workspace_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    workspace: Option<JobWorkspace>,
    last_snapshot: Option<ProgressSnapshot>,
    last_pages: Vec<PageSample>,
    model_published: bool,
}

impl TrackedJob {
    fn new(spec: &JobSpec) -> Self {
        Self {
            job_id: spec.job_id.clone(),
            workspace_id: spec.workspace_id.clone(),
            kind: spec.kind,
            status: JobStatus::Pending,
            workspace: None,
            last_snapshot: None,
            last_pages: Vec::new(),
            model_published: false,
        }
    }

    pub fn workspace(&self) -> Option<&JobWorkspace> {
        self.workspace.as_ref()
    }

    fn transition(&mut self, next: impl FnOnce(JobStatus) -> Result<JobStatus, JobError>) {
        match next(self.status) {
            Ok(status) => {
                debug!(job_id = %self.job_id, from = %self.status, to = %status, "Job state changed");
                self.status = status;
            }
            Err(e) => warn!(job_id = %self.job_id, error = %e, "Ignoring transition"),
        }
    }
}

/// Start 处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// 作业已在运行，重复投递的 Start 被忽略
    Duplicate,
    /// 启动失败，作业没有留在作业表中
    Failed(String),
}

/// 一次轮询产生的作业更新
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub job_id: String,
    pub report: ProgressReport,
    pub pages: Vec<PageSample>,
    /// 训练作业第一次产出的链接模型
    pub model: Option<Vec<u8>>,
}

/// 作业状态机表
///
/// 每个作业一个状态机，按作业ID索引。只由服务循环这一个写者修改，不需要加锁。
/// 作业进入 Terminated 后即从表中移除。
pub struct JobTracker {
    kind: JobKind,
    manager: WorkerProcessManager,
    options: TrackerOptions,
    jobs: HashMap<String, TrackedJob>,
}

impl JobTracker {
    pub fn new(kind: JobKind, manager: WorkerProcessManager, options: TrackerOptions) -> Self {
        let recovered = manager.load_all_running();
        if !recovered.is_empty() {
            info!(kind = %kind, count = recovered.len(), "Recovered running workers");
        }
        Self {
            kind,
            manager,
            options,
            jobs: HashMap::new(),
        }
    }

    pub fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.get(job_id).map(|job| job.status)
    }

    pub fn job(&self, job_id: &str) -> Option<&TrackedJob> {
        self.jobs.get(job_id)
    }

    pub fn manager(&self) -> &WorkerProcessManager {
        &self.manager
    }

    /// 表中的作业数，终止的作业不会留在表中
    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// 处理 Start
    ///
    /// 只在作业不在表中时启动；失败的作业直接终止，不进入作业表。
    #[instrument(skip(self, spec), fields(job_id = %spec.job_id, kind = %self.kind))]
    pub async fn start(&mut self, spec: &JobSpec) -> StartOutcome {
        if let Some(existing) = self.jobs.get(&spec.job_id) {
            warn!(status = %existing.status, "Job already active, ignoring duplicate start");
            return StartOutcome::Duplicate;
        }

        let mut job = TrackedJob::new(spec);
        let outcome = match self.manager.start(spec).await {
            Ok(workspace) => {
                job.workspace = Some(workspace);
                job.transition(JobStatus::start);
                metrics::record_job_started(self.kind);
                info!("Job running");
                self.jobs.insert(spec.job_id.clone(), job);
                StartOutcome::Started
            }
            Err(e) => {
                if matches!(e, StartFailure::AlreadyRunning(_)) {
                    warn!("Worker attached to a job that is not tracked");
                }
                error!(error = %e, "Job failed to start");
                job.transition(JobStatus::terminate);
                metrics::record_job_start_failed(self.kind);
                StartOutcome::Failed(e.to_string())
            }
        };
        metrics::set_active_jobs(self.kind, self.manager.active_count());
        outcome
    }

    /// 处理 Stop
    ///
    /// 幂等：未知的作业只记录日志。停止成功后作业进入 Terminated 并移出作业表；
    /// 终止工作进程失败时作业回到 Running，句柄保留，之后的 Stop 会重试。
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn stop(&mut self, job_id: &str, verbose: bool) -> Result<StopOutcome, RuntimeError> {
        let Some(job) = self.jobs.get_mut(job_id) else {
            info!("Stop requested for unknown job");
            return Ok(StopOutcome::NotRunning);
        };
        if verbose {
            debug!("Verbose stop requested");
        }

        job.transition(JobStatus::begin_stop);
        match self.manager.stop(job_id).await {
            Ok(outcome) => {
                job.transition(JobStatus::terminate);
                self.jobs.remove(job_id);
                metrics::record_job_stopped(self.kind);
                metrics::set_active_jobs(self.kind, self.manager.active_count());
                Ok(outcome)
            }
            Err(e) => {
                job.transition(JobStatus::resume);
                Err(e)
            }
        }
    }

    /// 处理运行时提示
    ///
    /// 投递给该工作区下所有运行中的爬取作业，返回投递数。
    #[instrument(skip(self, hint), fields(url = %hint.url, pinned = hint.pinned))]
    pub async fn hint(&mut self, workspace_id: &str, hint: &Hint) -> usize {
        if self.kind != JobKind::Crawling {
            warn!("Hints are only supported for crawling jobs");
            return 0;
        }

        let mut delivered = 0;
        for job in self.jobs.values() {
            if job.workspace_id != workspace_id || job.status != JobStatus::Running {
                continue;
            }
            let Some(workspace) = &job.workspace else {
                continue;
            };
            match workspace.append_hint(hint).await {
                Ok(()) => {
                    info!(job_id = %job.job_id, "Hint delivered");
                    delivered += 1;
                }
                Err(e) => error!(job_id = %job.job_id, error = %e, "Failed to deliver hint"),
            }
        }
        if delivered == 0 {
            warn!(workspace_id, "No running job for hint");
        }
        delivered
    }

    /// 轮询所有非终态作业的进度
    pub async fn poll(&mut self) -> Vec<JobUpdate> {
        let mut updates = Vec::new();
        for job in self.jobs.values_mut() {
            if !matches!(job.status, JobStatus::Pending | JobStatus::Running) {
                continue;
            }
            match poll_job(job, &self.options).await {
                Ok(update) => updates.push(update),
                Err(e) => error!(job_id = %job.job_id, error = %e, "Failed to read job progress"),
            }
        }
        updates
    }

    /// 模型消息发布成功后调用，保证只发布一次
    pub fn mark_model_published(&mut self, job_id: &str) {
        if let Some(job) = self.jobs.get_mut(job_id) {
            job.model_published = true;
        }
    }

    /// 停止表中所有作业
    pub async fn shutdown(&mut self) {
        let active: Vec<String> = self.jobs.keys().cloned().collect();
        for job_id in active {
            if let Err(e) = self.stop(&job_id, false).await {
                error!(job_id = %job_id, error = %e, "Failed to stop job on shutdown");
            }
        }
    }
}

async fn poll_job(job: &mut TrackedJob, options: &TrackerOptions) -> Result<JobUpdate, WorkspaceError> {
    let mut update = JobUpdate {
        job_id: job.job_id.clone(),
        report: ProgressReport::NotRunning,
        pages: Vec::new(),
        model: None,
    };

    let Some(workspace) = job.workspace.as_ref() else {
        return Ok(update);
    };
    if !workspace.items_started().await {
        debug!(job_id = %job.job_id, "Worker is not running yet");
        return Ok(update);
    }

    let items = workspace.read_items().await?;
    let checkpoint = workspace.latest_checkpoint().await?;

    if job.kind == JobKind::Training && !job.model_published {
        if let Some(name) = &checkpoint {
            let data = workspace.read_file(name).await?;
            if !data.is_empty() {
                update.model = Some(data);
            }
        }
    }

    if items.is_empty() && job.last_snapshot.is_none() {
        update.report = ProgressReport::NoUpdates;
        return Ok(update);
    }

    let snapshot =
        ProgressSnapshot::from_items(&items, options.relevancy_threshold).with_checkpoint(checkpoint);
    let snapshot = match &job.last_snapshot {
        Some(previous) => snapshot.merge_monotonic(previous),
        None => snapshot,
    };
    job.last_snapshot = Some(snapshot.clone());

    update.report = ProgressReport::Snapshot(snapshot);
    // A truncated re-read can come back empty while the snapshot holds.
    let pages = page_sample(&items, options.page_sample_size);
    if !pages.is_empty() {
        job.last_pages = pages;
    }
    update.pages = job.last_pages.clone();
    Ok(update)
}
