//! 授权码校验与答题会话状态机。
//!
//! 授权码沿 未验证 → 已验证(未使用) → 答题中(部分完成) → 已完成(已使用)
//! 推进，过期与格式违规分别是终止态与拒绝态。会话持有可恢复的
//! 答题进度，答案先落库、后切题。

use chrono::{DateTime, Duration, Utc};
use log::info;

use crate::bank::{Question, TestKind};
use crate::record::{generate_id, TestRecord};
use crate::scoring::{compute_rpi, tally_dimension_scores, AnswerMap, NormTable};
use crate::storage::{KvStore, Storage, StoredAuthCode};
use crate::Error;

/// 授权码固定长度。
pub const AUTH_CODE_LEN: usize = 10;

/// 授权码自验证起的有效天数。
pub const AUTH_CODE_VALIDITY_DAYS: i64 = 30;

/// 格式检查：恰好 10 位 ASCII 字母数字。
/// 在任何状态查询之前执行，不合格立即拒绝。
pub fn validate_auth_code(code: &str) -> bool {
    code.len() == AUTH_CODE_LEN && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// 授权码状态。校验与状态结果都是普通值，不会以错误形态
/// 越过状态机边界。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeStatus {
    /// 长度或字符集不合格，未做任何状态查询
    FormatInvalid,
    /// 已过 30 天有效期，终止态
    Expired,
    /// 该码已产出测试记录，一码一测
    Used,
    /// 有未完成的答题进度，调用方应提供"恢复/重新开始"分支
    Partial { answered: usize },
    /// 可以开始新测试
    Unused,
}

impl CodeStatus {
    pub fn is_valid(self) -> bool {
        matches!(self, CodeStatus::Unused | CodeStatus::Partial { .. })
    }

    pub fn message(self) -> Option<&'static str> {
        match self {
            CodeStatus::FormatInvalid => Some("授权码格式错误（需10位字母+数字组合）"),
            CodeStatus::Expired => Some("授权码已过期，请联系管理员获取新码"),
            CodeStatus::Used => Some("授权码已完成测试，仅支持一码一测"),
            CodeStatus::Partial { .. } => Some("检测到未完成测试，是否恢复进度？"),
            CodeStatus::Unused => None,
        }
    }
}

/// 陌生授权码的鉴权口子。
///
/// 本地没有该码任何痕迹时由 oracle 裁定初始状态，真实后端
/// 接入时替换这枚实现即可，状态机其余部分不动。
pub trait AuthOracle {
    fn fresh_status(&self, code: &str) -> CodeStatus;
}

/// 本地模拟：凡格式合规且未见过的码一律按有效未使用处理。
pub struct LocalOracle;

impl AuthOracle for LocalOracle {
    fn fresh_status(&self, _code: &str) -> CodeStatus {
        CodeStatus::Unused
    }
}

/// 查询授权码状态。
///
/// `total_questions` 必须取自当前已加载题集的长度，部分完成的
/// 判定阈值始终与实际题量一致。
pub fn check_auth_code_status<S: KvStore>(
    storage: &Storage<S>,
    oracle: &dyn AuthOracle,
    code: &str,
    total_questions: usize,
    now: DateTime<Utc>,
) -> CodeStatus {
    if !validate_auth_code(code) {
        return CodeStatus::FormatInvalid;
    }

    let stored = match storage.auth_code() {
        Some(stored) if stored.code == code => stored,
        _ => return oracle.fresh_status(code),
    };

    if now > stored.expiry_date {
        return CodeStatus::Expired;
    }

    let used = storage
        .records()
        .iter()
        .any(|r| r.auth_code == code && r.test_type == stored.test_type);
    if used {
        return CodeStatus::Used;
    }

    if let Some(saved) = storage.answers(code) {
        let answered = saved.answers.len();
        if answered > 0 && answered < total_questions {
            return CodeStatus::Partial { answered };
        }
    }

    CodeStatus::Unused
}

/// 验证授权码：状态合格则落库绑定视角与 30 天有效期。
///
/// 返回进入验证时的状态，`Partial` 由调用方决定恢复还是重来。
pub fn verify_auth_code<S: KvStore>(
    storage: &mut Storage<S>,
    oracle: &dyn AuthOracle,
    code: &str,
    kind: TestKind,
    total_questions: usize,
    now: DateTime<Utc>,
) -> Result<CodeStatus, Error> {
    let status = check_auth_code_status(storage, oracle, code, total_questions, now);
    if !status.is_valid() {
        return Ok(status);
    }

    storage.save_auth_code(&StoredAuthCode {
        code: code.to_string(),
        test_type: kind,
        expiry_date: now + Duration::days(AUTH_CODE_VALIDITY_DAYS),
        verified_at: now,
    })?;
    info!("授权码验证通过: kind={} status={:?}", kind, status);
    Ok(status)
}

/// 一次进行中的答题会话。
///
/// 题目快照在会话创建时排好序，游标只在当前题已作答并持久化
/// 之后才允许前移。
pub struct TestSession<'a, S: KvStore> {
    storage: &'a mut Storage<S>,
    code: String,
    kind: TestKind,
    questions: Vec<Question>,
    answers: AnswerMap,
    cursor: usize,
}

impl<'a, S: KvStore> TestSession<'a, S> {
    /// 全新开始，丢弃该码下的既有进度。
    pub fn start(
        storage: &'a mut Storage<S>,
        code: &str,
        kind: TestKind,
        questions: Vec<Question>,
    ) -> Self {
        storage.remove_answers(code);
        TestSession {
            storage,
            code: code.to_string(),
            kind,
            questions,
            answers: AnswerMap::new(),
            cursor: 0,
        }
    }

    /// 恢复进度，从最后一道已答题的下一题续答。
    pub fn resume(
        storage: &'a mut Storage<S>,
        code: &str,
        kind: TestKind,
        questions: Vec<Question>,
    ) -> Self {
        let answers = storage
            .answers(code)
            .map(|saved| saved.answers)
            .unwrap_or_default();
        let cursor = resume_cursor(&questions, &answers);
        TestSession {
            storage,
            code: code.to_string(),
            kind,
            questions,
            answers,
            cursor,
        }
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// 当前题已选的选项编号。
    pub fn selected(&self) -> Option<u32> {
        let question = self.current()?;
        self.answers.get(&question.question_id).copied()
    }

    pub fn is_last(&self) -> bool {
        self.cursor + 1 >= self.questions.len()
    }

    /// 记录当前题的作答并立即持久化。改选同一题直接覆盖。
    /// 落库失败时本题保持未作答，游标不会越过未持久化的答案。
    pub fn answer(&mut self, option_id: u32) -> Result<(), Error> {
        let question = self.current().ok_or(Error::IllegalQuestion)?;
        if question.option(option_id).is_none() {
            return Err(Error::IllegalAnswer);
        }
        let mut updated = self.answers.clone();
        updated.insert(question.question_id, option_id);
        // 先落库，成功后才提交到内存进度
        self.storage.save_answers(&self.code, &updated, Utc::now())?;
        self.answers = updated;
        Ok(())
    }

    /// 前移游标。当前题未作答时拒绝；已在末题返回 Ok(false)。
    pub fn advance(&mut self) -> Result<bool, Error> {
        let question = self.current().ok_or(Error::IllegalQuestion)?;
        if !self.answers.contains_key(&question.question_id) {
            return Err(Error::Unanswered);
        }
        if self.is_last() {
            return Ok(false);
        }
        self.cursor += 1;
        Ok(true)
    }

    /// 回看上一题。
    pub fn back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// 尚未作答的题号，按题序排列。
    pub fn unanswered(&self) -> Vec<u32> {
        self.questions
            .iter()
            .filter(|q| !self.answers.contains_key(&q.question_id))
            .map(|q| q.question_id)
            .collect()
    }

    /// 提交：要求全部作答，聚合计分并生成不可变的测试记录。
    pub fn submit(
        self,
        norms: &NormTable,
        bank_version: &str,
        now: DateTime<Utc>,
    ) -> Result<TestRecord, Error> {
        let missing = self.unanswered();
        if !missing.is_empty() {
            return Err(Error::Incomplete {
                missing: missing.len(),
            });
        }

        let scores = tally_dimension_scores(&self.questions, &self.answers);
        let rpi_result = compute_rpi(&scores, norms);

        let record = TestRecord {
            id: generate_id(),
            auth_code: self.code.clone(),
            test_type: self.kind,
            dimension_scores: scores,
            rpi_result,
            answers: self.answers.clone(),
            questions: self.questions.clone(),
            created_at: now,
            question_bank_version: bank_version.to_string(),
        };
        self.storage.save_record(&record)?;
        info!(
            "测试记录已生成: id={} kind={} rpi={}",
            record.id, record.test_type, record.rpi_result.rpi
        );
        Ok(record)
    }
}

fn resume_cursor(questions: &[Question], answers: &AnswerMap) -> usize {
    let last_answered = match answers.keys().next_back() {
        Some(id) => *id,
        None => return 0,
    };
    match questions.iter().position(|q| q.question_id == last_answered) {
        Some(index) if index + 1 < questions.len() => index + 1,
        Some(index) => index,
        None => 0,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bank::QuizOption;
    use crate::config::DEFAULT_NORMS;
    use crate::scoring::Dimension;
    use crate::storage::MemoryStore;

    fn question(id: u32, dimension: Dimension) -> Question {
        Question {
            question_id: id,
            dimension,
            question_content: format!("测试题 {}", id),
            options: (1..=5)
                .map(|n| QuizOption {
                    option_id: n,
                    option_content: format!("选项 {}", n),
                    score: n as i32,
                })
                .collect(),
        }
    }

    fn question_set() -> Vec<Question> {
        vec![
            question(1, Dimension::ControlDesire),
            question(2, Dimension::JealousyIntensity),
            question(3, Dimension::EmotionalDependency),
            question(4, Dimension::RelationshipInsecurity),
        ]
    }

    fn storage() -> Storage<MemoryStore> {
        Storage::new(MemoryStore::default())
    }

    const CODE: &str = "ABCDE12345";

    #[test]
    fn test_format_validation() {
        assert!(validate_auth_code("ABCDE12345"));
        assert!(validate_auth_code("0123456789"));
        assert!(validate_auth_code("abcdefghij"));
        assert!(!validate_auth_code("ABCDE1234"));
        assert!(!validate_auth_code("ABCDE123456"));
        assert!(!validate_auth_code("ABCDE1234!"));
        assert!(!validate_auth_code("ABCDE 2345"));
        assert!(!validate_auth_code(""));
        // 非 ASCII 字符按字节长度与字符集双重拒绝
        assert!(!validate_auth_code("授权码12345678"));
    }

    #[test]
    fn test_fresh_code_is_unused() {
        let storage = storage();
        let status =
            check_auth_code_status(&storage, &LocalOracle, CODE, 4, Utc::now());
        assert_eq!(status, CodeStatus::Unused);
        assert!(status.is_valid());
    }

    #[test]
    fn test_format_invalid_short_circuits() {
        let storage = storage();
        let status =
            check_auth_code_status(&storage, &LocalOracle, "bad", 4, Utc::now());
        assert_eq!(status, CodeStatus::FormatInvalid);
        assert!(!status.is_valid());
        assert!(status.message().is_some());
    }

    #[test]
    fn test_expired_code_regardless_of_answers() {
        let mut storage = storage();
        let now = Utc::now();
        storage
            .save_auth_code(&StoredAuthCode {
                code: CODE.to_string(),
                test_type: TestKind::SelfReport,
                expiry_date: now - Duration::days(1),
                verified_at: now - Duration::days(31),
            })
            .unwrap();
        let mut answers = AnswerMap::new();
        answers.insert(1, 1);
        storage.save_answers(CODE, &answers, now).unwrap();

        let status = check_auth_code_status(&storage, &LocalOracle, CODE, 4, now);
        assert_eq!(status, CodeStatus::Expired);
    }

    #[test]
    fn test_partial_progress_detected() {
        let mut storage = storage();
        let now = Utc::now();
        let questions = question_set();

        verify_auth_code(
            &mut storage,
            &LocalOracle,
            CODE,
            TestKind::SelfReport,
            questions.len(),
            now,
        )
        .unwrap();

        {
            let mut session =
                TestSession::start(&mut storage, CODE, TestKind::SelfReport, questions.clone());
            session.answer(3).unwrap();
            session.advance().unwrap();
            session.answer(2).unwrap();
        }

        let status =
            check_auth_code_status(&storage, &LocalOracle, CODE, questions.len(), now);
        assert_eq!(status, CodeStatus::Partial { answered: 2 });
    }

    #[test]
    fn test_one_code_one_test() {
        let mut storage = storage();
        let now = Utc::now();
        let questions = question_set();

        verify_auth_code(
            &mut storage,
            &LocalOracle,
            CODE,
            TestKind::SelfReport,
            questions.len(),
            now,
        )
        .unwrap();

        let mut session =
            TestSession::start(&mut storage, CODE, TestKind::SelfReport, questions.clone());
        for _ in 0..questions.len() {
            session.answer(5).unwrap();
            session.advance().unwrap();
        }
        session.submit(&DEFAULT_NORMS, "1.0", now).unwrap();

        let status =
            check_auth_code_status(&storage, &LocalOracle, CODE, questions.len(), now);
        assert_eq!(status, CodeStatus::Used);
    }

    #[test]
    fn test_answer_persisted_before_advance() {
        let mut storage = storage();
        let questions = question_set();
        let mut session =
            TestSession::start(&mut storage, CODE, TestKind::SelfReport, questions);
        session.answer(4).unwrap();

        // 尚未切题，进度已经落库
        assert_eq!(
            session.storage.answers(CODE).unwrap().answers.get(&1),
            Some(&4)
        );
    }

    #[test]
    fn test_failed_write_does_not_unlock_advance() {
        /// 写必失败的桩，模拟配额耗尽。
        struct FullStore;

        impl KvStore for FullStore {
            fn get(&self, _key: &str) -> Option<String> {
                None
            }
            fn set(&mut self, _key: &str, _value: &str) -> Result<(), Error> {
                Err(Error::Storage("quota exceeded".to_string()))
            }
            fn remove(&mut self, _key: &str) {}
            fn keys(&self) -> Vec<String> {
                Vec::new()
            }
        }

        let mut storage = Storage::new(FullStore);
        let mut session =
            TestSession::start(&mut storage, CODE, TestKind::SelfReport, question_set());

        // 落库失败，本题保持未作答，游标原地拒绝
        assert!(matches!(session.answer(1), Err(Error::Storage(_))));
        assert_eq!(session.answered_count(), 0);
        assert!(matches!(session.advance(), Err(Error::Unanswered)));
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn test_advance_requires_answer() {
        let mut storage = storage();
        let questions = question_set();
        let mut session =
            TestSession::start(&mut storage, CODE, TestKind::SelfReport, questions);
        assert!(matches!(session.advance(), Err(Error::Unanswered)));
        session.answer(1).unwrap();
        assert!(session.advance().unwrap());
        assert!(session.back());
        assert_eq!(session.selected(), Some(1));
    }

    #[test]
    fn test_illegal_option_rejected() {
        let mut storage = storage();
        let questions = question_set();
        let mut session =
            TestSession::start(&mut storage, CODE, TestKind::SelfReport, questions);
        assert!(matches!(session.answer(99), Err(Error::IllegalAnswer)));
        // 失败的作答不产生进度
        assert!(session.storage.answers(CODE).is_none());
    }

    #[test]
    fn test_resume_continues_after_last_answered() {
        let mut storage = storage();
        let now = Utc::now();
        let questions = question_set();
        let mut answers = AnswerMap::new();
        answers.insert(1, 2);
        answers.insert(2, 2);
        storage.save_answers(CODE, &answers, now).unwrap();

        let session =
            TestSession::resume(&mut storage, CODE, TestKind::SelfReport, questions);
        assert_eq!(session.cursor(), 2);
        assert_eq!(session.answered_count(), 2);
    }

    #[test]
    fn test_resume_at_last_question_stays_there() {
        let mut storage = storage();
        let now = Utc::now();
        let questions = question_set();
        let mut answers = AnswerMap::new();
        for id in 1..=4 {
            answers.insert(id, 1);
        }
        storage.save_answers(CODE, &answers, now).unwrap();

        let session =
            TestSession::resume(&mut storage, CODE, TestKind::SelfReport, questions);
        assert_eq!(session.cursor(), 3);
    }

    #[test]
    fn test_restart_discards_progress() {
        let mut storage = storage();
        let now = Utc::now();
        let questions = question_set();
        let mut answers = AnswerMap::new();
        answers.insert(1, 2);
        storage.save_answers(CODE, &answers, now).unwrap();

        let session =
            TestSession::start(&mut storage, CODE, TestKind::SelfReport, questions);
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.answered_count(), 0);
        assert!(session.storage.answers(CODE).is_none());
    }

    #[test]
    fn test_submit_rejects_incomplete() {
        let mut storage = storage();
        let questions = question_set();
        let mut session =
            TestSession::start(&mut storage, CODE, TestKind::SelfReport, questions);
        session.answer(1).unwrap();
        assert!(matches!(
            session.submit(&DEFAULT_NORMS, "1.0", Utc::now()),
            Err(Error::Incomplete { missing: 3 })
        ));
    }

    #[test]
    fn test_submit_builds_record() {
        let mut storage = storage();
        let now = Utc::now();
        let questions = question_set();
        let mut session =
            TestSession::start(&mut storage, CODE, TestKind::Lover, questions.clone());
        for _ in 0..questions.len() {
            session.answer(3).unwrap();
            session.advance().unwrap();
        }
        let record = session.submit(&DEFAULT_NORMS, "1.0", now).unwrap();

        assert_eq!(record.auth_code, CODE);
        assert_eq!(record.test_type, TestKind::Lover);
        assert_eq!(record.answers.len(), 4);
        assert_eq!(record.questions.len(), 4);
        assert_eq!(record.question_bank_version, "1.0");
        assert!(record.rpi_result.rpi >= 0.0 && record.rpi_result.rpi <= 100.0);
        // 记录可按编号取回
        assert_eq!(storage.record(&record.id), Some(record));
    }
}
