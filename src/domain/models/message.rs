// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::models::job::{Broadness, Hint, JobKind, JobSpec};
use crate::utils::codec::decode_model_data;
use crate::utils::errors::DecodeError;

/// 控制消息
///
/// 总线以至少一次、不保证顺序的方式投递，处理方必须是幂等的。
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// 启动作业
    Start(Box<JobSpec>),
    /// 停止作业，`verbose` 目前仅记录日志
    Stop { job_id: String, verbose: bool },
    /// 为运行中的爬取作业注入提示
    Hint { workspace_id: String, hint: Hint },
    /// 服务内部关闭消息，与作业 Stop 不同
    ServiceShutdown,
}

#[derive(Debug, Deserialize)]
struct RawStop {
    id: String,
    #[serde(default)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct RawStart {
    id: String,
    workspace_id: String,
    #[serde(default)]
    page_model: Option<String>,
    seeds: Vec<String>,
    #[serde(default)]
    link_model: Option<String>,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    broadness: Option<Broadness>,
}

#[derive(Debug, Deserialize)]
struct RawHint {
    workspace_id: String,
    url: String,
    #[serde(default)]
    pinned: bool,
}

impl ControlMessage {
    /// 解码输入主题上的控制消息
    ///
    /// 负载的解释取决于服务类型：爬取服务的 Start 需要链接模型，
    /// 训练服务会忽略爬取专用字段。
    pub fn decode(payload: &[u8], kind: JobKind) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(payload)?;
        let obj = value
            .as_object()
            .ok_or_else(|| DecodeError::Unrecognized("expected a JSON object".to_string()))?;

        let is_shutdown = obj.get("from-tests").and_then(Value::as_str) == Some("stop")
            || obj.get("shutdown").and_then(Value::as_bool) == Some(true);
        if is_shutdown {
            return Ok(ControlMessage::ServiceShutdown);
        }

        if obj.get("stop").and_then(Value::as_bool) == Some(true) {
            let raw: RawStop = serde_json::from_value(value)?;
            return Ok(ControlMessage::Stop {
                job_id: raw.id,
                verbose: raw.verbose,
            });
        }

        if obj.contains_key("id") {
            let raw: RawStart = serde_json::from_value(value)?;
            return Ok(ControlMessage::Start(Box::new(raw.into_spec(kind)?)));
        }

        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        Err(DecodeError::Unrecognized(format!("keys {:?}", keys)))
    }

    /// 解码提示主题上的消息
    pub fn decode_hint(payload: &[u8]) -> Result<Self, DecodeError> {
        let raw: RawHint = serde_json::from_slice(payload)?;
        Ok(ControlMessage::Hint {
            workspace_id: raw.workspace_id,
            hint: Hint {
                url: raw.url,
                pinned: raw.pinned,
            },
        })
    }
}

impl RawStart {
    fn into_spec(self, kind: JobKind) -> Result<JobSpec, DecodeError> {
        let page_model = decode_model_data(self.page_model.as_deref())?
            .ok_or(DecodeError::MissingField("page_model"))?;

        let (link_model, hints, broadness) = match kind {
            JobKind::Training => (None, Vec::new(), None),
            JobKind::Crawling => {
                let link_model = decode_model_data(self.link_model.as_deref())?
                    .ok_or(DecodeError::MissingField("link_model"))?;
                let hints = self
                    .hints
                    .into_iter()
                    .map(|url| Hint { url, pinned: true })
                    .collect();
                (Some(link_model), hints, self.broadness)
            }
        };

        Ok(JobSpec {
            job_id: self.id,
            workspace_id: self.workspace_id,
            kind,
            seeds: self.seeds,
            page_model,
            link_model,
            hints,
            broadness,
        })
    }
}

/// 页面样本条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSample {
    pub url: String,
    /// 相关性分数，范围 [0, 100]
    pub score: f64,
}

/// 进度输出消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub id: String,
    pub progress: String,
}

/// 页面样本输出消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagesMessage {
    pub id: String,
    pub page_sample: Vec<PageSample>,
}

/// 模型输出消息（仅训练作业）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub id: String,
    /// base64 编码的链接模型
    pub link_model: String,
}

/// 序列化输出消息
pub fn encode_message<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}
