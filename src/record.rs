//! 测试记录：一次完整测评的永久产物，以及记录列表的筛选。

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bank::{Question, TestKind};
use crate::scoring::{AnswerMap, DimensionScores, RpiResult};

/// 一次已完成测评的完整快照。创建后不可变，只能按编号删除。
///
/// 题目随记录一同快照，报告渲染不依赖题库的后续版本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub id: String,
    pub auth_code: String,
    pub test_type: TestKind,
    pub dimension_scores: DimensionScores,
    pub rpi_result: RpiResult,
    pub answers: AnswerMap,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub question_bank_version: String,
}

/// 记录列表筛选条件，全部可选，空条件放行一切。
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub kind: Option<TestKind>,
    /// 只保留最近 N 天内的记录
    pub within_days: Option<i64>,
    pub min_rpi: Option<f64>,
    pub max_rpi: Option<f64>,
}

impl RecordFilter {
    pub fn matches(&self, record: &TestRecord, now: DateTime<Utc>) -> bool {
        if let Some(kind) = self.kind {
            if record.test_type != kind {
                return false;
            }
        }
        if let Some(days) = self.within_days {
            if record.created_at < now - Duration::days(days) {
                return false;
            }
        }
        if let Some(min) = self.min_rpi {
            if record.rpi_result.rpi < min {
                return false;
            }
        }
        if let Some(max) = self.max_rpi {
            if record.rpi_result.rpi > max {
                return false;
            }
        }
        true
    }
}

/// 按条件筛选并按创建时间倒序排列。
pub fn filter_records(
    records: Vec<TestRecord>,
    filter: &RecordFilter,
    now: DateTime<Utc>,
) -> Vec<TestRecord> {
    let mut records: Vec<TestRecord> = records
        .into_iter()
        .filter(|record| filter.matches(record, now))
        .collect();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// 生成记录编号：毫秒时间戳的 36 进制表示拼上随机小写字母数字段。
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let mut rng = rand::thread_rng();
    let token: String = (0..10)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}{}", to_base36(millis), token)
}

/// 展示用的日期格式：`2025-08-25 14:30`。
pub fn format_date(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}
