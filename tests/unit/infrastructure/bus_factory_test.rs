// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ddcrawl::config::settings::BusSettings;
    use ddcrawl::domain::repositories::message_bus::MessageBus;
    use ddcrawl::infrastructure::bus::create_message_bus;
    use ddcrawl::utils::errors::ServiceError;

    fn settings(kind: &str) -> BusSettings {
        BusSettings {
            kind: kind.to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            queue_prefix: String::new(),
        }
    }

    #[tokio::test]
    async fn test_memory_bus_from_settings() {
        let bus = create_message_bus(&settings("memory")).await.unwrap();
        bus.publish("topic", b"payload".to_vec()).await.unwrap();
        let received = bus.consume("topic", Duration::from_millis(10)).await.unwrap();
        assert_eq!(received, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn test_unknown_bus_kind_is_rejected() {
        let result = create_message_bus(&settings("kafka")).await;
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }
}
