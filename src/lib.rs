//! 恋爱占有欲指数（RPI）测评核心。
//!
//! 三块核心逻辑：计分引擎（维度原始分 → z 分数 → RPI 百分位与
//! 分级）、授权码与会话状态机（格式校验、未使用/部分完成/已使用/
//! 已过期、可恢复进度）、以及注入式的键值持久化层。页面渲染与
//! 图表绘制不在本库范围内，由上层驱动程序调用。

pub mod bank;
pub mod config;
pub mod record;
pub mod report;
pub mod scoring;
pub mod session;
pub mod stats;
pub mod storage;

pub use bank::{Question, QuestionBank, QuizOption, TestKind};
pub use record::{filter_records, format_date, generate_id, RecordFilter, TestRecord};
pub use scoring::{
    compute_rpi, dimension_level, grade_of, tally_dimension_scores, AnswerMap, Dimension,
    DimensionScores, Level, NormEntry, NormTable, PerDimension, RpiGrade, RpiResult,
};
pub use session::{
    check_auth_code_status, validate_auth_code, verify_auth_code, AuthOracle, CodeStatus,
    LocalOracle, TestSession,
};
pub use storage::{ConfigCache, FileStore, KvStore, MemoryStore, Storage, StoredAuthCode};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 题库文档损坏：两套题目都缺失，或存在没有选项的题目
    #[error("题库数据格式错误")]
    BankFormat,
    /// 题库文件不存在，多半是资源路径问题，提示与一般读取失败不同
    #[error("找不到题库文件: {0}，请检查资源路径")]
    BankMissing(String),
    #[error("未知的测试视角: {0}")]
    UnknownTestKind(String),
    /// 常模表残缺，属配置错误
    #[error("常模表 {version} 缺少维度条目")]
    NormIncomplete { version: String },
    #[error("题号不在当前题集内")]
    IllegalQuestion,
    #[error("回答选项不存在")]
    IllegalAnswer,
    #[error("请先作答当前题目")]
    Unanswered,
    /// 提交时仍有未答题
    #[error("存在 {missing} 道未答题")]
    Incomplete { missing: usize },
    #[error("测试记录不存在: {0}")]
    RecordNotFound(String),
    /// 本地存储写入失败（空间不足或文件系统错误）
    #[error("本地存储不可用: {0}")]
    Storage(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// 批量读取答题行。
///
/// 每行首列为样本标识，其余各列按题序给出所选的选项编号；
/// 行内错误不拖垮整批，逐行返回结果。
pub fn read_bulk<R: std::io::Read>(
    reader: R,
    questions: &[Question],
) -> Vec<Result<(String, AnswerMap), Error>> {
    let mut rows = Vec::new();
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    for record in csv_reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                rows.push(Err(Error::Csv(e)));
                continue;
            }
        };
        let mut fields = record.iter();
        let id = fields.next().unwrap_or("").to_string();
        let mut answers = AnswerMap::new();
        let mut parsed = Ok(());
        for (question, field) in questions.iter().zip(fields) {
            match field.trim().parse::<u32>() {
                Ok(option_id) => {
                    answers.insert(question.question_id, option_id);
                }
                Err(_) => {
                    parsed = Err(Error::IllegalAnswer);
                    break;
                }
            }
        }
        rows.push(parsed.map(|_| (id, answers)));
    }
    rows
}
