// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::time::{sleep, Instant};

use crate::domain::repositories::message_bus::MessageBus;
use crate::utils::errors::BusError;

/// 空主题轮询间隔
const POLL_STEP: Duration = Duration::from_millis(50);

/// Redis 消息总线
///
/// 每个主题是一个 Redis 列表：发布端 LPUSH，消费端 RPOP，
/// 因此同一主题内的消息按发布顺序被消费。
#[derive(Clone)]
pub struct RedisBus {
    connection: MultiplexedConnection,
}

impl RedisBus {
    /// 创建新的 Redis 总线实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    pub async fn new(redis_url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut con = self.connection.clone();
        con.lpush::<_, _, ()>(topic, payload).await?;
        Ok(())
    }

    async fn consume(&self, topic: &str, timeout: Duration) -> Result<Option<Vec<u8>>, BusError> {
        let mut con = self.connection.clone();
        let deadline = Instant::now() + timeout;
        loop {
            let value: Option<Vec<u8>> = con.rpop(topic, None).await?;
            if value.is_some() {
                return Ok(value);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(POLL_STEP.min(deadline - now)).await;
        }
    }
}
