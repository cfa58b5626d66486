// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::repositories::message_bus::MessageBus;
use crate::utils::errors::BusError;

/// 进程内消息总线
///
/// 用于本地开发和测试，每个主题一个 FIFO 队列。
#[derive(Default)]
pub struct InMemoryBus {
    topics: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    notify: Notify,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 主题中尚未被消费的消息数
    pub async fn pending(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .await
            .get(topic)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// 取出主题中的全部消息
    pub async fn drain(&self, topic: &str) -> Vec<Vec<u8>> {
        self.topics
            .lock()
            .await
            .get_mut(topic)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.topics
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .push_back(payload);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn consume(&self, topic: &str, timeout: Duration) -> Result<Option<Vec<u8>>, BusError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so a concurrent publish is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(payload) = self
                .topics
                .lock()
                .await
                .get_mut(topic)
                .and_then(VecDeque::pop_front)
            {
                return Ok(Some(payload));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}
