//! 键值持久化层。
//!
//! 字符串键、JSON 字符串值的最小存储契约（[`KvStore`]），外加一层
//! 掌管全部逻辑键名的类型化封装（[`Storage`]）。存储句柄由调用方
//! 构造注入，库内不设全局单例。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::bank::{QuestionBank, TestKind};
use crate::record::TestRecord;
use crate::scoring::AnswerMap;
use crate::Error;

/// 逻辑键名，清理时按这张清单逐类移除。
mod keys {
    pub const AUTH_CODE: &str = "authCode";
    pub const ANSWERS: &str = "answers";
    pub const TEST_RECORDS: &str = "testRecords";
    pub const CONFIG_CACHE: &str = "configCache";
    pub const QUESTION_BANK: &str = "questionBank";
    /// 容量探测的哨兵键，写后即删
    pub const STORAGE_PROBE: &str = "__storageProbe";
}

/// 配置缓存的有效期。超龄的缓存在读取时被惰性删除。
const CONFIG_CACHE_TTL_HOURS: i64 = 1;

/// 最小键值存储契约。值是 JSON 序列化后的字符串。
pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), Error>;
    fn remove(&mut self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// 纯内存实现，测试与批处理用。
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// 单个 JSON 文件承载的存储，每次写入整体落盘。
/// 写失败（磁盘满、权限）以 [`Error::Storage`] 返回，不 panic。
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileStore {
    /// 打开或新建存储文件。文件不存在时从空表开始。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(FileStore { path, entries })
    }

    fn persist(&self) -> Result<(), Error> {
        let raw = serde_json::to_string(&self.entries)?;
        std::fs::write(&self.path, raw)
            .map_err(|e| Error::Storage(format!("{}: {}", self.path.display(), e)))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        if let Err(e) = self.persist() {
            warn!("存储文件回写失败: {}", e);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// 已验证授权码的落库形态：绑定视角与 30 天有效期。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAuthCode {
    pub code: String,
    pub test_type: TestKind,
    pub expiry_date: DateTime<Utc>,
    pub verified_at: DateTime<Utc>,
}

/// 按授权码隔离的答题进度。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnswers {
    pub auth_code: String,
    pub answers: AnswerMap,
    pub saved_at: DateTime<Utc>,
}

/// 远端配置的本地缓存（授权链接、商务合作文案）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigCache {
    pub auth_link: Option<String>,
    pub business_text: Option<String>,
    pub cached_at: DateTime<Utc>,
}

/// 逻辑键名全部收口在这层，调用方只见类型化的读写接口。
#[derive(Debug)]
pub struct Storage<S> {
    store: S,
}

impl<S: KvStore> Storage<S> {
    pub fn new(store: S) -> Self {
        Storage { store }
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                // 反序列化失败按缺失处理，坏数据不拖垮读路径
                warn!("存储键 {} 的数据无法解析: {}", key, e);
                None
            }
        }
    }

    fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), Error> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)
    }

    fn answers_key(code: &str) -> String {
        format!("{}_{}", keys::ANSWERS, code)
    }

    pub fn save_auth_code(&mut self, auth: &StoredAuthCode) -> Result<(), Error> {
        self.set_json(keys::AUTH_CODE, auth)
    }

    pub fn auth_code(&self) -> Option<StoredAuthCode> {
        self.get_json(keys::AUTH_CODE)
    }

    pub fn save_answers(
        &mut self,
        code: &str,
        answers: &AnswerMap,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let saved = SavedAnswers {
            auth_code: code.to_string(),
            answers: answers.clone(),
            saved_at: now,
        };
        self.set_json(&Self::answers_key(code), &saved)
    }

    pub fn answers(&self, code: &str) -> Option<SavedAnswers> {
        self.get_json(&Self::answers_key(code))
    }

    pub fn remove_answers(&mut self, code: &str) {
        self.store.remove(&Self::answers_key(code));
    }

    pub fn save_record(&mut self, record: &TestRecord) -> Result<(), Error> {
        let mut records = self.records();
        records.push(record.clone());
        self.set_json(keys::TEST_RECORDS, &records)
    }

    pub fn records(&self) -> Vec<TestRecord> {
        self.get_json(keys::TEST_RECORDS).unwrap_or_default()
    }

    pub fn record(&self, id: &str) -> Option<TestRecord> {
        self.records().into_iter().find(|r| r.id == id)
    }

    pub fn delete_record(&mut self, id: &str) -> Result<(), Error> {
        let records = self.records();
        let remaining: Vec<TestRecord> =
            records.into_iter().filter(|r| r.id != id).collect();
        self.set_json(keys::TEST_RECORDS, &remaining)
    }

    pub fn save_config_cache(
        &mut self,
        auth_link: Option<String>,
        business_text: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let cache = ConfigCache {
            auth_link,
            business_text,
            cached_at: now,
        };
        self.set_json(keys::CONFIG_CACHE, &cache)
    }

    /// 读取配置缓存，超过 1 小时的条目当场删除并按缺失返回。
    pub fn config_cache_at(&mut self, now: DateTime<Utc>) -> Option<ConfigCache> {
        let cache: ConfigCache = self.get_json(keys::CONFIG_CACHE)?;
        if now - cache.cached_at >= Duration::hours(CONFIG_CACHE_TTL_HOURS) {
            debug!("配置缓存已过期，惰性删除");
            self.store.remove(keys::CONFIG_CACHE);
            return None;
        }
        Some(cache)
    }

    pub fn config_cache(&mut self) -> Option<ConfigCache> {
        self.config_cache_at(Utc::now())
    }

    pub fn save_question_bank(&mut self, bank: &QuestionBank) -> Result<(), Error> {
        self.set_json(keys::QUESTION_BANK, bank)
    }

    pub fn question_bank(&self) -> Option<QuestionBank> {
        self.get_json(keys::QUESTION_BANK)
    }

    /// 容量探测：写入并删除哨兵键，报告可用与否，绝不向外抛错。
    /// 保存路径的调用方应先探测再写，空间不足时降级提示而非崩溃。
    pub fn check_storage_space(&mut self) -> bool {
        match self.store.set(keys::STORAGE_PROBE, "probe") {
            Ok(()) => {
                self.store.remove(keys::STORAGE_PROBE);
                true
            }
            Err(e) => {
                warn!("存储空间不足: {}", e);
                false
            }
        }
    }

    /// 清空本系统的全部数据，包括所有按授权码隔离的答题键。
    pub fn clear_all(&mut self) {
        for key in [
            keys::AUTH_CODE,
            keys::TEST_RECORDS,
            keys::CONFIG_CACHE,
            keys::QUESTION_BANK,
        ] {
            self.store.remove(key);
        }
        let prefix = format!("{}_", keys::ANSWERS);
        for key in self.store.keys() {
            if key.starts_with(&prefix) {
                self.store.remove(&key);
            }
        }
    }
}
