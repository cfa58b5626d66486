// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use chrono::Utc;
use flate2::read::MultiGzDecoder;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::domain::models::job::Hint;
use crate::domain::models::progress::CrawlItem;
use crate::domain::repositories::worker_runtime::WorkerHandle;
use crate::utils::errors::WorkspaceError;

pub const ID_FILE: &str = "id.txt";
pub const SEEDS_FILE: &str = "seeds.csv";
pub const PAGE_MODEL_FILE: &str = "page_clf.joblib";
pub const LINK_MODEL_FILE: &str = "link_model.joblib";
pub const HINTS_FILE: &str = "hints.jl";
pub const HANDLE_FILE: &str = "pid.txt";
pub const ITEMS_FILE: &str = "items.jl";
pub const LOG_FILE: &str = "spider.log";

static CHECKPOINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Q-(\d+)\.joblib$").expect("valid checkpoint regex"));

/// 作业工作目录
///
/// 每个作业一个持久目录，保存输入（种子、模型）和工作进程的输出
/// （条目流、检查点、日志、句柄）。目录不会被自动删除，清理策略由外部决定。
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    root: PathBuf,
}

impl JobWorkspace {
    /// 创建作业目录
    ///
    /// 目录名由时间戳和作业ID哈希的前12位组成，同一秒内重复使用同一ID时追加序号。
    ///
    /// # 参数
    ///
    /// * `jobs_root` - 所有作业目录的父目录
    /// * `job_id` - 作业ID
    pub async fn create(jobs_root: &Path, job_id: &str) -> Result<Self, WorkspaceError> {
        fs::create_dir_all(jobs_root)
            .await
            .map_err(|e| WorkspaceError::io(jobs_root, e))?;

        // create_dir fails on an existing directory, so concurrent creates for
        // the same id each end up with their own suffix.
        let base = Self::directory_name(job_id, Utc::now().timestamp());
        let mut root = jobs_root.join(&base);
        let mut attempt = 0;
        loop {
            match fs::create_dir(&root).await {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempt += 1;
                    root = jobs_root.join(format!("{}-{}", base, attempt));
                }
                Err(e) => return Err(WorkspaceError::io(&root, e)),
            }
        }

        let root = fs::canonicalize(&root)
            .await
            .map_err(|e| WorkspaceError::io(&root, e))?;

        let workspace = Self { root };
        workspace.write(ID_FILE, job_id.as_bytes()).await?;
        info!(job_id, workspace = %workspace.root.display(), "Workspace created");
        Ok(workspace)
    }

    /// 打开已有的作业目录
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 计算目录名：`<unix秒>_<sha256(job_id)前12位>`
    pub fn directory_name(job_id: &str, timestamp: i64) -> String {
        let digest = Sha256::digest(job_id.as_bytes());
        let hash = hex::encode(digest);
        format!("{}_{}", timestamp, &hash[..12])
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    /// 写入作业输入
    ///
    /// 任何写入失败都会返回错误，调用方必须将其视为启动失败。
    pub async fn write_inputs(
        &self,
        seeds: &[String],
        page_model: &[u8],
        link_model: Option<&[u8]>,
    ) -> Result<(), WorkspaceError> {
        let mut csv = String::new();
        for seed in seeds {
            csv.push_str(&csv_field(seed));
            csv.push('\n');
        }
        self.write(SEEDS_FILE, csv.as_bytes()).await?;
        self.write(PAGE_MODEL_FILE, page_model).await?;
        if let Some(link_model) = link_model {
            self.write(LINK_MODEL_FILE, link_model).await?;
        }
        debug!(workspace = %self.root.display(), seeds = seeds.len(), "Inputs written");
        Ok(())
    }

    /// 记录工作进程句柄
    pub async fn record_worker_handle(&self, handle: &WorkerHandle) -> Result<(), WorkspaceError> {
        self.write(HANDLE_FILE, handle.as_str().as_bytes()).await
    }

    /// 读取最后记录的工作进程句柄
    pub async fn read_worker_handle(&self) -> Result<Option<WorkerHandle>, WorkspaceError> {
        let path = self.path(HANDLE_FILE);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(WorkerHandle::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WorkspaceError::io(&path, e)),
        }
    }

    /// 用初始提示创建提示文件，没有提示时创建空文件
    pub async fn init_hints(&self, hints: &[Hint]) -> Result<(), WorkspaceError> {
        let mut data = Vec::new();
        for hint in hints {
            serde_json::to_writer(&mut data, hint)?;
            data.push(b'\n');
        }
        self.write(HINTS_FILE, &data).await
    }

    /// 追加一条提示，工作进程会读取该文件
    pub async fn append_hint(&self, hint: &Hint) -> Result<(), WorkspaceError> {
        let path = self.path(HINTS_FILE);
        let mut line = serde_json::to_vec(hint)?;
        line.push(b'\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| WorkspaceError::io(&path, e))?;
        file.write_all(&line)
            .await
            .map_err(|e| WorkspaceError::io(&path, e))?;
        file.flush().await.map_err(|e| WorkspaceError::io(&path, e))?;
        Ok(())
    }

    /// 工作进程是否已经开始写条目流
    pub async fn items_started(&self) -> bool {
        fs::try_exists(self.path(ITEMS_FILE)).await.unwrap_or(false)
    }

    /// 读取目前为止的全部条目
    ///
    /// 条目流可能仍在写入，gzip 尾部被截断或最后一行不完整时，
    /// 只返回已经完整的行。
    pub async fn read_items(&self) -> Result<Vec<CrawlItem>, WorkspaceError> {
        let path = self.path(ITEMS_FILE);
        let compressed = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WorkspaceError::io(&path, e)),
        };
        // Streams hold up to max_items lines, keep decoding off the async workers.
        let items =
            tokio::task::spawn_blocking(move || parse_items(&decompress_prefix(&compressed)))
                .await?;
        Ok(items)
    }

    /// 最新的模型检查点文件名
    pub async fn latest_checkpoint(&self) -> Result<Option<String>, WorkspaceError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| WorkspaceError::io(&self.root, e))?;

        let mut latest: Option<(u64, String)> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| WorkspaceError::io(&self.root, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(index) = checkpoint_index(&name) else {
                continue;
            };
            let newer = latest.as_ref().map_or(true, |(best, _)| index > *best);
            if newer {
                latest = Some((index, name));
            }
        }
        Ok(latest.map(|(_, name)| name))
    }

    /// 读取工作目录中的文件
    pub async fn read_file(&self, file: &str) -> Result<Vec<u8>, WorkspaceError> {
        let path = self.path(file);
        fs::read(&path).await.map_err(|e| WorkspaceError::io(&path, e))
    }

    async fn write(&self, file: &str, data: &[u8]) -> Result<(), WorkspaceError> {
        let path = self.path(file);
        fs::write(&path, data)
            .await
            .map_err(|e| WorkspaceError::io(&path, e))
    }
}

fn checkpoint_index(name: &str) -> Option<u64> {
    CHECKPOINT_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// 单列 CSV 字段，必要时加引号
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// 尽可能多地解压，遇到截断或损坏的尾部就停下
fn decompress_prefix(compressed: &[u8]) -> Vec<u8> {
    let mut decoder = MultiGzDecoder::new(compressed);
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match decoder.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) => {
                debug!(error = %e, decoded = out.len(), "Item stream truncated");
                break;
            }
        }
    }
    out
}

fn parse_items(data: &[u8]) -> Vec<CrawlItem> {
    let complete = match data.iter().rposition(|b| *b == b'\n') {
        Some(pos) => &data[..pos],
        None => return Vec::new(),
    };
    complete
        .split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .filter_map(|line| match serde_json::from_slice::<CrawlItem>(line) {
            Ok(item) => Some(item),
            Err(e) => {
                debug!(error = %e, "Skipping malformed item");
                None
            }
        })
        .collect()
}
