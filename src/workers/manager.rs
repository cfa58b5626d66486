// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use futures::future::join_all;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::settings::Settings;
use crate::domain::repositories::message_bus::MessageBus;
use crate::domain::repositories::worker_runtime::WorkerRuntime;
use crate::workers::service::Service;
use crate::workers::worker::Worker;

/// 服务管理器
///
/// 为配置中的每种作业类型启动一个服务循环，并负责它们的关闭。
pub struct ServiceManager {
    bus: Arc<dyn MessageBus>,
    runtime: Arc<dyn WorkerRuntime>,
    settings: Arc<Settings>,
    shutdown: watch::Sender<bool>,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl ServiceManager {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        runtime: Arc<dyn WorkerRuntime>,
        settings: Arc<Settings>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            bus,
            runtime,
            settings,
            shutdown,
            handles: Vec::new(),
        }
    }

    /// 启动服务循环
    ///
    /// 每种作业类型一个任务，重复配置的类型只启动一次。
    pub fn start_services(&mut self) {
        let kinds = self.settings.service.kinds.clone();
        for kind in kinds {
            if self.handles.iter().any(|(name, _)| name.starts_with(kind.queue_name())) {
                continue;
            }
            let mut service = Service::new(
                kind,
                self.bus.clone(),
                self.runtime.clone(),
                &self.settings,
            )
            .with_shutdown(self.shutdown.subscribe());
            let name = service.name().to_string();
            info!("Starting {}", name);

            let task_name = name.clone();
            let handle = tokio::spawn(async move {
                if let Err(e) = service.run().await {
                    error!("{} exited with error: {}", task_name, e);
                }
            });
            self.handles.push((name, handle));
        }
    }

    /// 请求所有服务退出
    pub fn request_shutdown(&self) {
        // No receivers left means every service has already exited.
        let _ = self.shutdown.send(true);
    }

    /// 等待所有服务退出
    pub async fn join(&mut self) {
        let handles: Vec<_> = self.handles.drain(..).collect();
        let results = join_all(handles.into_iter().map(|(name, handle)| async move {
            (name, handle.await)
        }))
        .await;
        for (name, result) in results {
            match result {
                Ok(()) => info!("{} finished", name),
                Err(e) => error!("{} panicked: {}", name, e),
            }
        }
    }

    /// 等待关闭信号并关闭服务
    ///
    /// 收到 Ctrl-C 或所有服务自行退出（例如收到关闭消息）时返回。
    pub async fn wait_for_shutdown(&mut self) {
        let all_exited = async {
            while self.shutdown.receiver_count() > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        };

        tokio::select! {
            result = signal::ctrl_c() => match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(err) => error!("Unable to listen for shutdown signal: {}", err),
            },
            _ = all_exited => info!("All services exited"),
        }

        info!("Shutting down services...");
        self.request_shutdown();
        self.join().await;
        info!("Services shut down successfully");
    }
}
