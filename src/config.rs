//! 内置默认配置与带缓存的配置读取。
//!
//! 授权链接、商务合作文案本应来自后端接口，目前以内置默认值
//! 模拟远端，读取结果写入存储层的配置缓存（1 小时 TTL）。

use chrono::{DateTime, Utc};
use log::warn;
use once_cell::sync::Lazy;

use crate::scoring::{NormEntry, NormTable, PerDimension};
use crate::storage::{KvStore, Storage};

/// 获取授权码的跳转链接，未配置时为空。
pub const DEFAULT_AUTH_LINK: &str = "";

pub const DEFAULT_BUSINESS_TEXT: &str = "商务合作，请联系客服，微信：renzhi6767";

/// 常模数据（基于 10000+ 样本），整表按版本号生效。
pub static DEFAULT_NORMS: Lazy<NormTable> = Lazy::new(|| NormTable {
    version: "2025".to_string(),
    dimensions: PerDimension {
        control_desire: Some(NormEntry { mean: 25.0, std: 8.0 }),
        jealousy_intensity: Some(NormEntry { mean: 22.0, std: 7.0 }),
        emotional_dependency: Some(NormEntry { mean: 28.0, std: 9.0 }),
        relationship_insecurity: Some(NormEntry { mean: 24.0, std: 8.0 }),
    },
});

/// 取授权链接：优先读缓存，缺失时退回默认值并刷新缓存。
pub fn auth_link<S: KvStore>(storage: &mut Storage<S>, now: DateTime<Utc>) -> String {
    if let Some(cache) = storage.config_cache_at(now) {
        if let Some(link) = cache.auth_link {
            return link;
        }
    }

    // 远端配置接口尚未接入，以默认值充当拉取结果
    let link = DEFAULT_AUTH_LINK.to_string();
    if let Err(e) = storage.save_config_cache(Some(link.clone()), None, now) {
        warn!("配置缓存写入失败: {}", e);
    }
    link
}

/// 取商务合作文案，缓存策略与 [`auth_link`] 相同。
pub fn business_text<S: KvStore>(storage: &mut Storage<S>, now: DateTime<Utc>) -> String {
    if let Some(cache) = storage.config_cache_at(now) {
        if let Some(text) = cache.business_text {
            return text;
        }
    }

    let text = DEFAULT_BUSINESS_TEXT.to_string();
    if let Err(e) = storage.save_config_cache(None, Some(text.clone()), now) {
        warn!("配置缓存写入失败: {}", e);
    }
    text
}
