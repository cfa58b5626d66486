// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层单元测试
///
/// 测试工作目录布局和总线工厂
pub mod bus_factory_test;
pub mod workspace_test;
