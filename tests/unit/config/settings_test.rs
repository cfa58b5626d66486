// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置设置测试模块
///
/// 测试配置文件加载和环境变量覆盖

#[cfg(test)]
mod tests {
    use ddcrawl::config::settings::Settings;
    use ddcrawl::domain::models::job::JobKind;

    #[test]
    fn test_config_loading_with_env_overrides() {
        std::env::set_var("DDCRAWL__SERVICE__KINDS", "crawler");
        std::env::set_var("DDCRAWL__WORKER__MAX_ITEMS", "250");
        std::env::set_var("DDCRAWL__BUS__QUEUE_PREFIX", "staging-");

        let settings = Settings::new();

        std::env::remove_var("DDCRAWL__SERVICE__KINDS");
        std::env::remove_var("DDCRAWL__WORKER__MAX_ITEMS");
        std::env::remove_var("DDCRAWL__BUS__QUEUE_PREFIX");

        let settings = settings.expect("configuration should load");
        assert_eq!(settings.service.kinds, vec![JobKind::Crawling]);
        assert_eq!(settings.worker.max_items, 250);
        assert_eq!(settings.bus.queue_prefix, "staging-");
        // Values not overridden come from config/default.toml or built-in defaults.
        assert_eq!(settings.service.page_sample_size, 20);
        assert_eq!(settings.worker.log_level, "INFO");
    }
}
