// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含作业模型、状态机和外部能力接口
pub mod domain;

/// 基础设施模块
///
/// 提供消息总线、容器运行时、工作目录和指标的具体实现
pub mod infrastructure;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现每种作业类型的服务循环和工作进程管理
pub mod workers;
