//! 计分引擎：把答题映射为四个维度的原始分，再经常模标准化
//! 合成 RPI（恋爱占有欲指数）百分位与定性分级。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bank::Question;
use crate::stats::{normal_cdf, z_score};

/// 题号 -> 所选选项编号
pub type AnswerMap = BTreeMap<u32, u32>;

/// 四个固定的心理维度。
///
/// 维度是封闭枚举而不是字符串键，常模表、得分表与题库中的
/// 维度标签一一对应，拼写错误在反序列化阶段即被拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    #[serde(rename = "控制欲望")]
    ControlDesire,
    #[serde(rename = "嫉妒强度")]
    JealousyIntensity,
    #[serde(rename = "情感依赖")]
    EmotionalDependency,
    #[serde(rename = "关系不安")]
    RelationshipInsecurity,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::ControlDesire,
        Dimension::JealousyIntensity,
        Dimension::EmotionalDependency,
        Dimension::RelationshipInsecurity,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Dimension::ControlDesire => "控制欲望",
            Dimension::JealousyIntensity => "嫉妒强度",
            Dimension::EmotionalDependency => "情感依赖",
            Dimension::RelationshipInsecurity => "关系不安",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 按维度展开的定长记录，JSON 形态仍是以维度标签为键的对象。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerDimension<T> {
    #[serde(rename = "控制欲望")]
    pub control_desire: T,
    #[serde(rename = "嫉妒强度")]
    pub jealousy_intensity: T,
    #[serde(rename = "情感依赖")]
    pub emotional_dependency: T,
    #[serde(rename = "关系不安")]
    pub relationship_insecurity: T,
}

impl<T> PerDimension<T> {
    pub fn get(&self, dimension: Dimension) -> &T {
        match dimension {
            Dimension::ControlDesire => &self.control_desire,
            Dimension::JealousyIntensity => &self.jealousy_intensity,
            Dimension::EmotionalDependency => &self.emotional_dependency,
            Dimension::RelationshipInsecurity => &self.relationship_insecurity,
        }
    }

    pub fn get_mut(&mut self, dimension: Dimension) -> &mut T {
        match dimension {
            Dimension::ControlDesire => &mut self.control_desire,
            Dimension::JealousyIntensity => &mut self.jealousy_intensity,
            Dimension::EmotionalDependency => &mut self.emotional_dependency,
            Dimension::RelationshipInsecurity => &mut self.relationship_insecurity,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(Dimension, &T) -> U) -> PerDimension<U> {
        PerDimension {
            control_desire: f(Dimension::ControlDesire, &self.control_desire),
            jealousy_intensity: f(Dimension::JealousyIntensity, &self.jealousy_intensity),
            emotional_dependency: f(Dimension::EmotionalDependency, &self.emotional_dependency),
            relationship_insecurity: f(
                Dimension::RelationshipInsecurity,
                &self.relationship_insecurity,
            ),
        }
    }
}

/// 各维度累计原始分，无作答的维度保持 0。
pub type DimensionScores = PerDimension<i32>;

/// 单个维度的常模统计量（均值、标准差）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormEntry {
    pub mean: f64,
    pub std: f64,
}

/// 整表版本化的常模数据。
///
/// 维度条目是 `Option`：缺失不是错误，计分时该维度按总体均值计
/// （z = 0），见 [`compute_rpi`]。残缺的常模表能通过 JSON 反序列化
/// （缺失键按 `None` 读入），由 [`NormTable::validate`] 在配置阶段拒绝。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormTable {
    pub version: String,
    pub dimensions: PerDimension<Option<NormEntry>>,
}

impl NormTable {
    /// 配置侧校验：常模表按版本整表生效，四个维度必须齐全。
    /// 计分侧的缺失回退（z = 0）只兜运行期意外，不豁免配置错误。
    pub fn validate(&self) -> Result<(), crate::Error> {
        let complete = Dimension::ALL
            .iter()
            .all(|&dimension| self.dimensions.get(dimension).is_some());
        if complete {
            Ok(())
        } else {
            Err(crate::Error::NormIncomplete {
                version: self.version.clone(),
            })
        }
    }
}

/// 把答题聚合为各维度原始分。
///
/// 未作答或选项编号解析失败的题目按 0 分静默跳过，完整性约束
/// 由会话流程在提交前兜底，这里不重复拦截。
pub fn tally_dimension_scores(questions: &[Question], answers: &AnswerMap) -> DimensionScores {
    let mut scores = DimensionScores::default();
    for question in questions {
        if let Some(option_id) = answers.get(&question.question_id) {
            if let Some(option) = question.option(*option_id) {
                *scores.get_mut(question.dimension) += option.score;
            }
        }
    }
    scores
}

/// RPI 计算结果，报告叙事所需的中间量一并返回。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpiResult {
    /// 0〜100 的百分位指数，保留两位小数
    pub rpi: f64,
    pub z_scores: PerDimension<f64>,
    pub raw_scores: DimensionScores,
    /// 四个维度 z 分数的等权平均
    pub composite_z: f64,
}

/// 由维度原始分与常模表计算 RPI。
///
/// 合成 z 是四个维度 z 分数的等权平均，不做加权。缺失常模的维度
/// z 取 0，等效于把该维度钉在总体均值上。
pub fn compute_rpi(scores: &DimensionScores, norms: &NormTable) -> RpiResult {
    let z_scores = scores.map(|dimension, &raw| match norms.dimensions.get(dimension) {
        Some(norm) => z_score(f64::from(raw), norm.mean, norm.std),
        None => 0.0,
    });

    let composite_z = Dimension::ALL
        .iter()
        .map(|&dimension| *z_scores.get(dimension))
        .sum::<f64>()
        / Dimension::ALL.len() as f64;

    let percentile = normal_cdf(composite_z) * 100.0;
    let rpi = ((percentile * 100.0).round() / 100.0).clamp(0.0, 100.0);

    RpiResult {
        rpi,
        z_scores,
        raw_scores: *scores,
        composite_z,
    }
}

/// 三档水平，既用于整体 RPI 分级也用于单维度解读。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

/// RPI 整体分级结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpiGrade {
    pub band: Level,
    pub level: &'static str,
    pub description: &'static str,
}

/// RPI 分级：≤30 低占有欲，≤60 中等，>60 高占有欲。
pub fn grade_of(rpi: f64) -> RpiGrade {
    if rpi <= 30.0 {
        RpiGrade {
            band: Level::Low,
            level: "低占有欲",
            description: "你在恋爱中松弛有度，尊重伴侣边界",
        }
    } else if rpi <= 60.0 {
        RpiGrade {
            band: Level::Medium,
            level: "中等占有欲",
            description: "你在恋爱中保持适度关注，偶尔会有占有欲表现",
        }
    } else {
        RpiGrade {
            band: Level::High,
            level: "高占有欲",
            description: "你在恋爱中表现出较强的占有欲，需要关注关系平衡",
        }
    }
}

/// 单维度水平判定：z < -0.5 低，z > 0.5 高，其余为中。
///
/// 与整体 RPI 分级相互独立，用于逐维度的报告叙事。
pub fn dimension_level(z: f64) -> Level {
    if z < -0.5 {
        Level::Low
    } else if z > 0.5 {
        Level::High
    } else {
        Level::Medium
    }
}
