// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 消息解码错误
///
/// 总线上收到的消息或其中的二进制负载无法解析时返回。
/// 服务循环记录日志后丢弃该消息，不会中断循环。
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unrecognized message: {0}")]
    Unrecognized(String),
}

/// 作业工作目录错误
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Item stream decoding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl WorkspaceError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        WorkspaceError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// 隔离运行时（容器）错误
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with code {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("{command} timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("Runtime returned an empty handle")]
    EmptyHandle,
}

/// 消息总线错误
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// 作业启动失败
///
/// 工作目录无法准备或者隔离进程启动命令失败时返回，
/// 此时不会记录任何句柄，作业被视为未启动。
#[derive(Error, Debug)]
pub enum StartFailure {
    #[error("Workspace preparation failed: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Worker launch failed: {0}")]
    Launch(#[from] RuntimeError),

    #[error("Job {0} already has an active worker")]
    AlreadyRunning(String),
}

/// 服务循环错误
///
/// 仅在循环边界之外可见，例如服务初始化阶段。
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Configuration error: {0}")]
    Config(String),
}
