//! 题库文档的数据模型与加载。
//!
//! 题库是外部 JSON 文档，含自测版与恋人版两套题目以及版本号，
//! 首次读取后由存储层缓存。

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use log::info;
use serde::{Deserialize, Serialize};

use crate::scoring::Dimension;
use crate::Error;

/// 测评视角：给自己测 / 为恋人测。
/// 授权码在其生命周期内只绑定其中一种。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestKind {
    #[serde(rename = "self")]
    SelfReport,
    #[serde(rename = "lover")]
    Lover,
}

impl TestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::SelfReport => "self",
            TestKind::Lover => "lover",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TestKind::SelfReport => "给自己测",
            TestKind::Lover => "为恋人测",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "self" => Ok(TestKind::SelfReport),
            "lover" => Ok(TestKind::Lover),
            _ => Err(Error::UnknownTestKind(value.to_string())),
        }
    }
}

/// 单个选项，分值可正可负，反向计分题由分值符号承载。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub option_id: u32,
    pub option_content: String,
    pub score: i32,
}

/// 单道题目，归属唯一维度。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_id: u32,
    pub dimension: Dimension,
    pub question_content: String,
    pub options: Vec<QuizOption>,
}

impl Question {
    /// 按选项编号取选项。
    pub fn option(&self, option_id: u32) -> Option<&QuizOption> {
        self.options.iter().find(|o| o.option_id == option_id)
    }
}

/// 题库文档：两套题目加版本号。两套都缺失视为文档损坏。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBank {
    pub question_bank_version: String,
    #[serde(default)]
    pub self_test_questions: Vec<Question>,
    #[serde(default)]
    pub lover_test_questions: Vec<Question>,
}

impl QuestionBank {
    /// 从任意读取器解析并校验题库。
    pub fn from_reader(reader: impl Read) -> Result<Self, Error> {
        let bank: QuestionBank =
            serde_json::from_reader(reader).map_err(|_| Error::BankFormat)?;
        bank.validate()?;
        Ok(bank)
    }

    /// 从文件加载题库。文件不存在单独成错，提示检查资源路径，
    /// 区别于一般的读取失败。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::BankMissing(path.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
        let bank = Self::from_reader(std::io::BufReader::new(file))?;
        info!(
            "题库加载成功: version={} self={} lover={}",
            bank.question_bank_version,
            bank.self_test_questions.len(),
            bank.lover_test_questions.len()
        );
        Ok(bank)
    }

    /// 结构校验：至少要有一套题目，且每道题都有选项。
    pub fn validate(&self) -> Result<(), Error> {
        if self.self_test_questions.is_empty() && self.lover_test_questions.is_empty() {
            return Err(Error::BankFormat);
        }
        let all = self
            .self_test_questions
            .iter()
            .chain(self.lover_test_questions.iter());
        for question in all {
            if question.options.is_empty() {
                return Err(Error::BankFormat);
            }
        }
        Ok(())
    }

    /// 取指定视角的题目，按题号升序排好。
    pub fn questions(&self, kind: TestKind) -> Vec<Question> {
        let mut questions = match kind {
            TestKind::SelfReport => self.self_test_questions.clone(),
            TestKind::Lover => self.lover_test_questions.clone(),
        };
        questions.sort_by_key(|q| q.question_id);
        questions
    }
}
