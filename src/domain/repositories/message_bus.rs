// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::models::job::JobKind;
use crate::utils::errors::BusError;

/// 消息总线特质
///
/// 有序、至少一次投递的发布/订阅原语。消费带超时，
/// 服务循环因此永远不会无限期阻塞。
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// 向主题发布一条消息
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// 从主题消费一条消息，超时返回 `None`
    async fn consume(&self, topic: &str, timeout: Duration) -> Result<Option<Vec<u8>>, BusError>;
}

#[async_trait]
impl<T: MessageBus + ?Sized> MessageBus for Arc<T> {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        (**self).publish(topic, payload).await
    }

    async fn consume(&self, topic: &str, timeout: Duration) -> Result<Option<Vec<u8>>, BusError> {
        (**self).consume(topic, timeout).await
    }
}

/// 输出消息类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCategory {
    Progress,
    Pages,
    /// 仅训练服务
    Model,
}

impl OutputCategory {
    fn as_str(&self) -> &'static str {
        match self {
            OutputCategory::Progress => "progress",
            OutputCategory::Pages => "pages",
            OutputCategory::Model => "model",
        }
    }
}

/// 某一类服务使用的主题名
#[derive(Debug, Clone)]
pub struct Topics {
    prefix: String,
    kind: JobKind,
}

impl Topics {
    pub fn new(prefix: impl Into<String>, kind: JobKind) -> Self {
        Self {
            prefix: prefix.into(),
            kind,
        }
    }

    pub fn input(&self) -> String {
        format!("{}dd-{}-input", self.prefix, self.kind.queue_name())
    }

    /// 提示输入主题，仅爬取服务
    pub fn hints_input(&self) -> Option<String> {
        match self.kind {
            JobKind::Crawling => Some(format!("{}dd-crawler-hints-input", self.prefix)),
            JobKind::Training => None,
        }
    }

    pub fn output(&self, category: OutputCategory) -> String {
        format!(
            "{}dd-{}-output-{}",
            self.prefix,
            self.kind.queue_name(),
            category.as_str()
        )
    }
}
