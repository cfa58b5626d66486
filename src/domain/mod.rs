// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：作业定义、作业状态机、控制消息和进度快照
/// - 仓库接口（repositories）：消息总线和隔离运行时的抽象接口
///
/// 领域层不依赖于任何外部实现。
pub mod models;
pub mod repositories;
