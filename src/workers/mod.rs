// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 包括工作进程管理、作业状态机、每种作业类型的服务循环和服务管理
pub mod job_tracker;
pub mod manager;
pub mod process_manager;
pub mod service;
pub mod worker;


pub use manager::ServiceManager;
pub use service::Service;
pub use worker::Worker;
