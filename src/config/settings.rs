// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::models::job::JobKind;

/// 应用程序配置设置
///
/// 包含消息总线、服务循环、工作进程、指标和日志等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 消息总线配置
    pub bus: BusSettings,
    /// 服务循环配置
    pub service: ServiceSettings,
    /// 工作进程配置
    pub worker: WorkerSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
    /// 日志配置
    pub logging: LoggingSettings,
}

/// 消息总线配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BusSettings {
    /// 总线类型 (redis, memory)
    pub kind: String,
    /// Redis连接URL
    pub redis_url: String,
    /// 主题名前缀，测试环境用来隔离主题
    pub queue_prefix: String,
}

/// 服务循环配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    /// 要运行的服务类型
    pub kinds: Vec<JobKind>,
    /// 单次消费的等待时间（毫秒），即一个 tick
    pub poll_timeout_ms: u64,
    /// 每隔多少个 tick 发布一次进度
    pub check_updates_every: u32,
    /// 训练作业的检查点间隔（处理的页面数）
    pub checkpoint_interval: u64,
    /// 页面样本的最大条数
    pub page_sample_size: usize,
    /// 判定页面相关的分数阈值 (0.0-1.0)
    pub relevancy_threshold: f64,
    /// 关闭服务时是否停止所有运行中的作业
    pub stop_on_shutdown: bool,
}

/// 工作进程配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// 工作进程镜像
    pub image: String,
    /// 作业目录根路径
    pub jobs_root: String,
    /// 单个作业最多处理的条目数
    pub max_items: u64,
    /// 工作进程日志级别
    pub log_level: String,
    /// 启动超时时间（秒）
    pub launch_timeout_secs: u64,
    /// 停止超时时间（秒）
    pub stop_timeout_secs: u64,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出
    pub enabled: bool,
    /// 监听地址
    pub listen_addr: String,
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 默认过滤器，`RUST_LOG` 优先
    pub filter: String,
    /// 是否输出 JSON 日志
    pub json: bool,
}

impl ServiceSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// 两次进度发布之间的间隔
    pub fn update_interval(&self) -> Duration {
        self.poll_timeout() * self.check_updates_every.max(1)
    }
}

impl WorkerSettings {
    pub fn jobs_root(&self) -> PathBuf {
        PathBuf::from(&self.jobs_root)
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从配置文件和环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("DDCRAWL")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("service.kinds")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// 仅包含默认值的配置，不读取文件和环境变量
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }

    fn builder() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        Config::builder()
            // Bus
            .set_default("bus.kind", "redis")?
            .set_default("bus.redis_url", "redis://127.0.0.1:6379")?
            .set_default("bus.queue_prefix", "")?
            // Service loop
            .set_default("service.kinds", vec!["trainer", "crawler"])?
            .set_default("service.poll_timeout_ms", 1000)?
            .set_default("service.check_updates_every", 30)?
            .set_default("service.checkpoint_interval", 1000)?
            .set_default("service.page_sample_size", 20)?
            .set_default("service.relevancy_threshold", 0.5)?
            .set_default("service.stop_on_shutdown", true)?
            // Worker
            .set_default("worker.image", "deep-deep")?
            .set_default("worker.jobs_root", "./jobs")?
            .set_default("worker.max_items", 1_000_000)?
            .set_default("worker.log_level", "INFO")?
            .set_default("worker.launch_timeout_secs", 120)?
            .set_default("worker.stop_timeout_secs", 30)?
            // Metrics
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")?
            // Logging
            .set_default("logging.filter", "info,ddcrawl=debug")?
            .set_default("logging.json", false)
    }
}
