// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::models::job::{Broadness, JobKind};
use crate::utils::errors::RuntimeError;

/// 工作进程句柄
///
/// 不透明的进程/容器标识，停止完成后失效。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerHandle(String);

impl WorkerHandle {
    /// 从运行时输出构造句柄，空白输出视为无效
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 工作进程调用参数
///
/// 所有路径都是相对于工作目录的文件名，由运行时按自己的挂载点解析。
#[derive(Debug, Clone)]
pub struct WorkerInvocation {
    pub job_id: String,
    pub kind: JobKind,
    /// 宿主机上的工作目录，以读写方式绑定给工作进程
    pub workspace: PathBuf,
    pub seeds_file: String,
    pub classifier_file: String,
    pub items_file: String,
    pub log_file: String,
    pub log_level: String,
    /// 条目数上限，防止作业失控
    pub max_items: u64,
    pub checkpoint_interval: Option<u64>,
    pub link_model_file: Option<String>,
    pub hints_file: Option<String>,
    pub broadness: Option<Broadness>,
}

impl WorkerInvocation {
    /// 工作进程使用的 scrapy spider
    pub fn spider(&self) -> &'static str {
        match self.kind {
            JobKind::Training => "relevant",
            JobKind::Crawling => "deepdeep",
        }
    }

    /// 按给定的工作目录根路径生成命令行参数
    pub fn arguments(&self, root: &Path) -> Vec<String> {
        let at = |file: &str| root.join(file).display().to_string();

        let mut args = vec![
            "scrapy".to_string(),
            "crawl".to_string(),
            self.spider().to_string(),
            "-a".to_string(),
            format!("seeds_url={}", at(&self.seeds_file)),
            "-a".to_string(),
            format!("checkpoint_path={}", root.display()),
            "-a".to_string(),
            format!("classifier_path={}", at(&self.classifier_file)),
        ];
        if let Some(interval) = self.checkpoint_interval {
            args.push("-a".to_string());
            args.push(format!("checkpoint_interval={}", interval));
        }
        if let Some(link_model) = &self.link_model_file {
            args.push("-a".to_string());
            args.push(format!("link_clf_path={}", at(link_model)));
        }
        if let Some(hints) = &self.hints_file {
            args.push("-a".to_string());
            args.push(format!("hints_path={}", at(hints)));
        }
        if let Some(broadness) = self.broadness {
            args.push("-a".to_string());
            args.push(format!("broadness={}", broadness));
        }
        args.extend([
            "-o".to_string(),
            format!("gzip:{}", at(&self.items_file)),
            "--logfile".to_string(),
            at(&self.log_file),
            "-L".to_string(),
            self.log_level.clone(),
            "-s".to_string(),
            format!("CLOSESPIDER_ITEMCOUNT={}", self.max_items),
        ]);
        args
    }
}

/// 隔离工作进程运行时特质
///
/// 把容器、子进程或远程作业等隔离技术隐藏在 `launch`/`terminate` 之后，
/// 编排逻辑不关心具体实现。
#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    /// 启动隔离的工作进程并返回句柄
    async fn launch(&self, invocation: &WorkerInvocation) -> Result<WorkerHandle, RuntimeError>;

    /// 发送终止信号，等待退出并回收隔离资源
    async fn terminate(&self, handle: &WorkerHandle) -> Result<(), RuntimeError>;
}

#[async_trait]
impl<T: WorkerRuntime + ?Sized> WorkerRuntime for Arc<T> {
    async fn launch(&self, invocation: &WorkerInvocation) -> Result<WorkerHandle, RuntimeError> {
        (**self).launch(invocation).await
    }

    async fn terminate(&self, handle: &WorkerHandle) -> Result<(), RuntimeError> {
        (**self).terminate(handle).await
    }
}
