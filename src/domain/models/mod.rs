// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// - 作业（job）：作业类型、作业定义和作业状态机
/// - 消息（message）：总线上的控制消息和输出消息
/// - 进度（progress）：条目流解析结果和进度快照
pub mod job;
pub mod message;
pub mod progress;
