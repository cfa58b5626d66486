// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::settings::WorkerSettings;
use crate::domain::repositories::worker_runtime::{WorkerHandle, WorkerInvocation, WorkerRuntime};
use crate::utils::errors::RuntimeError;

/// 容器内的工作目录挂载点
const MOUNT_POINT: &str = "/job";

/// `docker stop` 之外额外等待 CLI 返回的时间
const CLI_GRACE: Duration = Duration::from_secs(10);

/// 基于 docker CLI 的工作进程运行时
///
/// 每个作业一个分离运行的容器，工作目录以读写方式挂载到 `/job`。
/// 容器ID即工作进程句柄。容器按工作目录命名，启动失败时可以按名字清理。
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    program: String,
    leading_args: Vec<String>,
    image: String,
    launch_timeout: Duration,
    stop_timeout: Duration,
}

impl DockerRuntime {
    pub fn new(image: impl Into<String>, launch_timeout: Duration, stop_timeout: Duration) -> Self {
        Self {
            program: "docker".to_string(),
            leading_args: Vec::new(),
            image: image.into(),
            launch_timeout,
            stop_timeout,
        }
    }

    pub fn from_settings(settings: &WorkerSettings) -> Self {
        Self::new(
            settings.image.clone(),
            Duration::from_secs(settings.launch_timeout_secs),
            Duration::from_secs(settings.stop_timeout_secs),
        )
    }

    /// 使用其他兼容 docker 的 CLI（例如 podman）
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// 放在每条子命令之前的参数，例如 `sudo docker` 中的 `docker`
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// 作业容器的名字，由工作目录名得出
    pub fn container_name(invocation: &WorkerInvocation) -> String {
        let base = invocation
            .workspace
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| invocation.job_id.clone());
        let base: String = base
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || "_.-".contains(c) { c } else { '-' })
            .collect();
        format!("ddcrawl-{}", base)
    }

    /// `docker run` 的完整参数
    pub fn run_arguments(&self, invocation: &WorkerInvocation) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            Self::container_name(invocation),
            "-v".to_string(),
            format!("{}:{}", invocation.workspace.display(), MOUNT_POINT),
            self.image.clone(),
        ];
        args.extend(invocation.arguments(Path::new(MOUNT_POINT)));
        args
    }

    async fn exec(&self, args: &[String], timeout: Duration) -> Result<String, RuntimeError> {
        let command = format!("{} {}", self.program, args.first().map(String::as_str).unwrap_or(""));
        debug!(command = %command, "Executing container command");

        let output = tokio::time::timeout(
            timeout,
            Command::new(&self.program)
                .args(&self.leading_args)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| RuntimeError::Timeout {
            command: command.clone(),
            seconds: timeout.as_secs(),
        })?
        .map_err(|source| RuntimeError::Spawn {
            command: command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(RuntimeError::NonZeroExit {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// 启动失败后按名字删除可能已经创建的容器
    async fn discard(&self, name: &str) {
        let rm = vec!["rm".to_string(), "-f".to_string(), name.to_string()];
        match self.exec(&rm, CLI_GRACE).await {
            Ok(_) => info!(container = name, "Removed container of a failed launch"),
            Err(e) => warn!(container = name, error = %e, "Failed to remove container of a failed launch"),
        }
    }
}

#[async_trait]
impl WorkerRuntime for DockerRuntime {
    async fn launch(&self, invocation: &WorkerInvocation) -> Result<WorkerHandle, RuntimeError> {
        let args = self.run_arguments(invocation);
        info!(
            job_id = %invocation.job_id,
            workspace = %invocation.workspace.display(),
            image = %self.image,
            "Starting worker container"
        );
        let name = Self::container_name(invocation);
        // A timed-out or failed `run` may still have created the container.
        let stdout = match self.exec(&args, self.launch_timeout).await {
            Ok(stdout) => stdout,
            Err(e) => {
                if !matches!(e, RuntimeError::Spawn { .. }) {
                    self.discard(&name).await;
                }
                return Err(e);
            }
        };
        let Some(handle) = WorkerHandle::parse(&stdout) else {
            self.discard(&name).await;
            return Err(RuntimeError::EmptyHandle);
        };
        info!(job_id = %invocation.job_id, container = %handle, "Worker container started");
        Ok(handle)
    }

    async fn terminate(&self, handle: &WorkerHandle) -> Result<(), RuntimeError> {
        let stop = vec![
            "stop".to_string(),
            "-t".to_string(),
            self.stop_timeout.as_secs().to_string(),
            handle.to_string(),
        ];
        self.exec(&stop, self.stop_timeout + CLI_GRACE).await?;
        info!(container = %handle, "Worker container stopped, removing");

        let rm = vec!["rm".to_string(), handle.to_string()];
        self.exec(&rm, CLI_GRACE).await?;
        info!(container = %handle, "Worker container removed");
        Ok(())
    }
}
