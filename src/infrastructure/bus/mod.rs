// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 消息总线模块
///
/// 提供 Redis 列表实现和进程内实现，两者都满足有序、至少一次的投递语义
pub mod memory_bus;
pub mod redis_bus;

use std::sync::Arc;

use crate::config::settings::BusSettings;
use crate::domain::repositories::message_bus::MessageBus;
use crate::utils::errors::ServiceError;

pub use memory_bus::InMemoryBus;
pub use redis_bus::RedisBus;

/// 总线工厂函数
pub async fn create_message_bus(settings: &BusSettings) -> Result<Arc<dyn MessageBus>, ServiceError> {
    match settings.kind.as_str() {
        "redis" => Ok(Arc::new(RedisBus::new(&settings.redis_url).await?)),
        "memory" => Ok(Arc::new(InMemoryBus::new())),
        other => Err(ServiceError::Config(format!(
            "Unsupported bus kind: {}",
            other
        ))),
    }
}
