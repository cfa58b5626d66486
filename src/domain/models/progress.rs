// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::models::message::PageSample;

/// 工作进程尚未可见地运行
///
/// 下游消费者按字面值匹配，不要修改拼写。
pub const NOT_RUNNING_YET: &str = "Craw is not running yet";

/// 工作进程已启动但还没有输出
pub const NO_UPDATES_YET: &str = "Crawl started, no updates yet";

/// 工作进程输出的单个条目
///
/// 条目流是 gzip 压缩的 JSON lines，未知字段会被忽略。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlItem {
    pub url: String,
    /// 页面分类器给出的相关概率 (0.0-1.0)
    #[serde(default)]
    pub score: Option<f64>,
}

impl CrawlItem {
    fn domain(&self) -> Option<String> {
        let url = Url::parse(&self.url).ok()?;
        let host = url.host_str()?;
        Some(host.strip_prefix("www.").unwrap_or(host).to_lowercase())
    }

    fn has_web_scheme(&self) -> bool {
        Url::parse(&self.url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }
}

/// 进度快照
///
/// 每次轮询都从工作目录中的完整条目流重新计算，不单独持久化。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// 已处理页面数
    pub pages: u64,
    /// 不同域名数
    pub domains: u64,
    /// 相关页面数
    pub relevant: u64,
    /// 平均相关性分数 (0-100)
    pub average_score: f64,
    /// 最近的模型检查点
    pub last_checkpoint: Option<String>,
}

impl ProgressSnapshot {
    /// 从完整的条目样本计算快照
    ///
    /// # 参数
    ///
    /// * `items` - 目前观察到的所有条目
    /// * `relevancy_threshold` - 判定相关的分数阈值 (0.0-1.0)
    pub fn from_items(items: &[CrawlItem], relevancy_threshold: f64) -> Self {
        let mut domains = HashSet::new();
        let mut relevant = 0u64;
        let mut score_sum = 0.0;
        let mut scored = 0u64;

        for item in items {
            if let Some(domain) = item.domain() {
                domains.insert(domain);
            }
            if let Some(score) = item.score {
                let score = score.clamp(0.0, 1.0);
                score_sum += score;
                scored += 1;
                if score >= relevancy_threshold {
                    relevant += 1;
                }
            }
        }

        let average_score = if scored > 0 {
            100.0 * score_sum / scored as f64
        } else {
            0.0
        };

        Self {
            pages: items.len() as u64,
            domains: domains.len() as u64,
            relevant,
            average_score,
            last_checkpoint: None,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: Option<String>) -> Self {
        self.last_checkpoint = checkpoint;
        self
    }

    /// 与上一次快照合并，保证计数单调不减
    ///
    /// 读取到一个仍在写入的 gzip 流时，本次样本可能比上次短；
    /// 这种情况下沿用上一次的平均分。
    pub fn merge_monotonic(self, previous: &ProgressSnapshot) -> Self {
        let average_score = if self.pages >= previous.pages {
            self.average_score
        } else {
            previous.average_score
        };
        Self {
            pages: self.pages.max(previous.pages),
            domains: self.domains.max(previous.domains),
            relevant: self.relevant.max(previous.relevant),
            average_score,
            last_checkpoint: self
                .last_checkpoint
                .or_else(|| previous.last_checkpoint.clone()),
        }
    }

    /// 人类可读的进度描述
    pub fn describe(&self) -> String {
        let mut text = format!(
            "{} pages processed from {} domains ({} relevant), average score {:.1}.",
            self.pages, self.domains, self.relevant, self.average_score
        );
        if let Some(checkpoint) = &self.last_checkpoint {
            text.push_str(&format!(" Last deep-deep model checkpoint {}.", checkpoint));
        }
        text
    }
}

/// 一次轮询的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressReport {
    /// 条目流还不存在
    NotRunning,
    /// 条目流存在但还没有完整条目
    NoUpdates,
    Snapshot(ProgressSnapshot),
    /// 启动失败
    Failed(String),
}

impl ProgressReport {
    pub fn text(&self) -> String {
        match self {
            ProgressReport::NotRunning => NOT_RUNNING_YET.to_string(),
            ProgressReport::NoUpdates => NO_UPDATES_YET.to_string(),
            ProgressReport::Snapshot(snapshot) => snapshot.describe(),
            ProgressReport::Failed(reason) => format!("Crawl failed to start: {}", reason),
        }
    }
}

/// 选取页面样本
///
/// 从最新的条目开始取，最多 `size` 条；只保留 http(s) URL，
/// 分数换算到 [0, 100]。只要有合法条目，结果就不为空。
pub fn page_sample(items: &[CrawlItem], size: usize) -> Vec<PageSample> {
    items
        .iter()
        .rev()
        .filter(|item| item.has_web_scheme())
        .take(size.max(1))
        .map(|item| PageSample {
            url: item.url.clone(),
            score: (100.0 * item.score.unwrap_or(0.0)).clamp(0.0, 100.0),
        })
        .collect()
}
