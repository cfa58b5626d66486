// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ServiceError;
use async_trait::async_trait;

/// Worker trait定义
///
/// 所有长期运行的服务循环都必须实现此trait
#[async_trait]
pub trait Worker: Send {
    /// 运行直到收到关闭消息
    async fn run(&mut self) -> Result<(), ServiceError>;

    /// 获取工作器名称
    fn name(&self) -> &str;
}
