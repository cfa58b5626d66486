// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use ddcrawl::config::settings::Settings;
use ddcrawl::domain::repositories::worker_runtime::WorkerRuntime;
use ddcrawl::infrastructure::bus::create_message_bus;
use ddcrawl::infrastructure::docker::DockerRuntime;
use ddcrawl::infrastructure::metrics;
use ddcrawl::utils::telemetry;
use ddcrawl::workers::ServiceManager;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务循环
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Arc::new(Settings::new()?);

    // 2. Initialize logging
    telemetry::init_telemetry(&settings.logging);
    info!("Starting ddcrawl...");
    info!("Configuration loaded");

    // Initialize Prometheus Metrics
    metrics::init_metrics(&settings.metrics);

    // 3. Connect to the message bus
    let bus = create_message_bus(&settings.bus).await?;
    info!(kind = %settings.bus.kind, "Message bus connected");

    // 4. Worker runtime
    let runtime: Arc<dyn WorkerRuntime> = Arc::new(DockerRuntime::from_settings(&settings.worker));
    info!(image = %settings.worker.image, "Docker runtime initialized");

    // 5. Start one service loop per job kind
    let mut manager = ServiceManager::new(bus, runtime, settings.clone());
    manager.start_services();

    manager.wait_for_shutdown().await;
    info!("ddcrawl stopped");
    Ok(())
}
