// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 包含的子模块：
/// - 消息总线（bus）：Redis 列表和进程内两种实现
/// - 容器运行时（docker）：通过 docker 命令行管理工作进程
/// - 指标（metrics）：Prometheus 指标
/// - 工作目录（workspace）：作业的输入、条目流和检查点文件
pub mod bus;
pub mod docker;
pub mod metrics;
pub mod workspace;
