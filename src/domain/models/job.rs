// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 作业类型枚举
///
/// 两种作业共用同一套控制协议，区别在于负载语义：
/// 训练作业产出链接模型，爬取作业消费链接模型并接受运行时提示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// 训练作业
    #[serde(rename = "trainer", alias = "training")]
    Training,
    /// 爬取作业
    #[serde(rename = "crawler", alias = "crawling")]
    Crawling,
}

impl JobKind {
    /// 主题名中使用的服务名
    pub fn queue_name(&self) -> &'static str {
        match self {
            JobKind::Training => "trainer",
            JobKind::Crawling => "crawler",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.queue_name())
    }
}

impl FromStr for JobKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trainer" | "training" => Ok(JobKind::Training),
            "crawler" | "crawling" => Ok(JobKind::Crawling),
            _ => Err(()),
        }
    }
}

/// 爬取广度
///
/// 控制爬取作业的探索范围，`N<k>` 表示每个域名大约 k 个页面。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Broadness {
    /// 只在种子域名内深入
    Deep,
    N10,
    N100,
    N1000,
    N10000,
    /// 不限制域名
    Broad,
}

impl fmt::Display for Broadness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let token = match self {
            Broadness::Deep => "DEEP",
            Broadness::N10 => "N10",
            Broadness::N100 => "N100",
            Broadness::N1000 => "N1000",
            Broadness::N10000 => "N10000",
            Broadness::Broad => "BROAD",
        };
        write!(f, "{}", token)
    }
}

/// 运行时提示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub url: String,
    /// 置顶提示会提升优先级
    #[serde(default)]
    pub pinned: bool,
}

/// 作业定义
///
/// 由 Start 控制消息构建，包含启动工作进程所需的全部输入。
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// 调用方提供的作业ID，同类型内全局唯一
    pub job_id: String,
    /// 调用方的工作区ID，提示消息按它路由
    pub workspace_id: String,
    pub kind: JobKind,
    /// 种子URL，保持顺序
    pub seeds: Vec<String>,
    /// 页面分类器（不透明字节）
    pub page_model: Vec<u8>,
    /// 训练作业产出的链接模型，仅爬取作业使用
    pub link_model: Option<Vec<u8>>,
    /// 初始提示，仅爬取作业使用
    pub hints: Vec<Hint>,
    /// 仅爬取作业使用
    pub broadness: Option<Broadness>,
}

/// 作业状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → Running → Stopping → Terminated
/// Terminated 为终态，任何状态都可以直接失败进入 Terminated。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 已收到 Start，工作进程尚未确认启动
    #[default]
    Pending,
    /// 工作进程已启动，正在轮询进度
    Running,
    /// 已收到 Stop，正在终止
    Stopping,
    /// 工作进程已停止，资源已回收
    Terminated,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Terminated)
    }

    /// Pending → Running
    pub fn start(self) -> Result<Self, JobError> {
        match self {
            JobStatus::Pending => Ok(JobStatus::Running),
            _ => Err(JobError::InvalidStateTransition {
                from: self,
                to: JobStatus::Running,
            }),
        }
    }

    /// Pending/Running → Stopping
    pub fn begin_stop(self) -> Result<Self, JobError> {
        match self {
            JobStatus::Pending | JobStatus::Running => Ok(JobStatus::Stopping),
            _ => Err(JobError::InvalidStateTransition {
                from: self,
                to: JobStatus::Stopping,
            }),
        }
    }

    /// Stopping → Running，终止工作进程失败时回退
    pub fn resume(self) -> Result<Self, JobError> {
        match self {
            JobStatus::Stopping => Ok(JobStatus::Running),
            _ => Err(JobError::InvalidStateTransition {
                from: self,
                to: JobStatus::Running,
            }),
        }
    }

    /// 任意非终态 → Terminated
    pub fn terminate(self) -> Result<Self, JobError> {
        match self {
            JobStatus::Terminated => Err(JobError::InvalidStateTransition {
                from: self,
                to: JobStatus::Terminated,
            }),
            _ => Ok(JobStatus::Terminated),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Stopping => write!(f, "stopping"),
            JobStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// 作业领域错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JobError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: JobStatus, to: JobStatus },
}
