// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层依赖的外部能力，具体实现由基础设施层提供：
/// - 消息总线（message_bus）：按主题发布和消费消息
/// - 工作进程运行时（worker_runtime）：启动和终止隔离的爬虫进程
pub mod message_bus;
pub mod worker_runtime;
