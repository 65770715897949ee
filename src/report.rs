//! 报告叙事：整体分级加逐维度的解读与建议，输出纯文本报告。
//!
//! 单维度按 z 分数分三档取文案，与整体 RPI 分级相互独立。

use crate::record::{format_date, TestRecord};
use crate::scoring::{dimension_level, grade_of, Dimension, Level};
use crate::stats::normal_cdf;

/// 单个维度的报告素材。
#[derive(Debug, Clone)]
pub struct DimensionNarrative {
    pub dimension: Dimension,
    pub raw_score: i32,
    pub z_score: f64,
    /// 该维度单独的百分位，normal_cdf(z) * 100
    pub percentile: f64,
    pub level: Level,
    pub interpretation: &'static str,
    pub suggestion: &'static str,
}

fn interpretation_of(dimension: Dimension, level: Level) -> &'static str {
    match (dimension, level) {
        (Dimension::ControlDesire, Level::Low) => {
            "您尊重伴侣的自主性和个人空间，给予对方充分的信任和自由。这是健康关系的重要基础。"
        }
        (Dimension::ControlDesire, Level::Medium) => {
            "您对伴侣有一定的关注，但能够保持适度，不会过度干涉。"
        }
        (Dimension::ControlDesire, Level::High) => {
            "您在关系中表现出较强的控制倾向，建议给予伴侣更多自主空间，尊重对方的独立性。"
        }
        (Dimension::JealousyIntensity, Level::Low) => {
            "您能够理性看待伴侣的社交关系，保持信任和开放的态度，这是健康关系的重要特征。"
        }
        (Dimension::JealousyIntensity, Level::Medium) => {
            "您偶尔会有嫉妒情绪，但能够控制，不会过度反应。"
        }
        (Dimension::JealousyIntensity, Level::High) => {
            "您的嫉妒情绪较强，建议学会信任伴侣，减少不必要的怀疑和质问。"
        }
        (Dimension::EmotionalDependency, Level::Low) => {
            "您在情感上保持独立，能够平衡个人生活和恋爱关系，这是健康的情感状态。"
        }
        (Dimension::EmotionalDependency, Level::Medium) => {
            "您对伴侣有适度的情感依赖，能够在独立和依赖之间找到平衡。"
        }
        (Dimension::EmotionalDependency, Level::High) => {
            "您对伴侣的情感依赖较强，建议培养自己的兴趣爱好，建立独立的生活圈。"
        }
        (Dimension::RelationshipInsecurity, Level::Low) => {
            "您对关系有较强的安全感，能够稳定地维持亲密关系，这是健康关系的表现。"
        }
        (Dimension::RelationshipInsecurity, Level::Medium) => {
            "您偶尔会对关系感到不安，但能够通过沟通缓解。"
        }
        (Dimension::RelationshipInsecurity, Level::High) => {
            "您对关系的不安全感较强，建议与伴侣坦诚沟通，表达担忧，同时相信自己值得被爱。"
        }
    }
}

fn suggestion_of(dimension: Dimension, level: Level) -> &'static str {
    match (dimension, level) {
        (Dimension::ControlDesire, Level::High) => {
            "尊重伴侣的独立空间，不过度干涉对方的生活安排；用\"我\"式表达沟通代替直接要求或禁止；将注意力转移到自己的兴趣爱好上，培养独立的生活圈。"
        }
        (Dimension::ControlDesire, Level::Medium) => {
            "继续保持适度关注，同时尊重对方的独立性；明确哪些是合理的关心，哪些可能过度；定期与伴侣讨论彼此的需求和期望。"
        }
        (Dimension::ControlDesire, Level::Low) => {
            "继续保持这种平衡；在保持独立的同时，也要适度关心伴侣的需求；即使给予自由，也要保持日常的沟通和互动。"
        }
        (Dimension::JealousyIntensity, Level::High) => {
            "用\"我看到你和别人聊天，我有点在意\"替代质问；思考嫉妒的根源，是缺乏安全感还是对关系的不信任；与伴侣讨论可接受的社交边界；情绪严重影响关系时考虑寻求专业心理咨询。"
        }
        (Dimension::JealousyIntensity, Level::Medium) => {
            "保持当前的理性态度，不要让偶发的嫉妒情绪升级；感到不安时及时沟通，表达感受而非指责。"
        }
        (Dimension::JealousyIntensity, Level::Low) => {
            "继续保持这种理性态度；在保持开放的同时，关注关系的边界和底线；定期与伴侣交流对社交边界的看法。"
        }
        (Dimension::EmotionalDependency, Level::High) => {
            "发展自己的兴趣爱好，建立独立的生活圈和社交网络；学会自我调节情绪；练习独自做出决定；将生活重心分散到工作、学习、朋友等多个方面。"
        }
        (Dimension::EmotionalDependency, Level::Medium) => {
            "继续在独立和依赖之间寻找平衡点；既要有自己的空间，也要给予伴侣关注和陪伴；与伴侣讨论彼此的情感需求。"
        }
        (Dimension::EmotionalDependency, Level::Low) => {
            "继续保持独立和平衡；适度依赖伴侣是正常的；独立不等于疏离，保持与伴侣的情感连接和互动。"
        }
        (Dimension::RelationshipInsecurity, Level::High) => {
            "与伴侣坦诚表达你的担忧；相信自己的价值，不要过度自我怀疑；不要过度解读伴侣的行为，直接沟通询问而非猜测；专注于当下的关系质量。"
        }
        (Dimension::RelationshipInsecurity, Level::Medium) => {
            "保持开放的沟通，及时表达担忧和需求；通过实际行动和承诺逐步建立安全感；思考不安的根源来自自身还是关系的实际情况。"
        }
        (Dimension::RelationshipInsecurity, Level::Low) => {
            "继续保持这种安全感和稳定；关注关系的持续维护；安全不等于懈怠，继续为关系投入时间和精力。"
        }
    }
}

/// 按固定维度顺序生成四条叙事素材。
pub fn dimension_narratives(record: &TestRecord) -> Vec<DimensionNarrative> {
    Dimension::ALL
        .iter()
        .map(|&dimension| {
            let raw_score = *record.dimension_scores.get(dimension);
            let z_score = *record.rpi_result.z_scores.get(dimension);
            let level = dimension_level(z_score);
            DimensionNarrative {
                dimension,
                raw_score,
                z_score,
                percentile: normal_cdf(z_score) * 100.0,
                level,
                interpretation: interpretation_of(dimension, level),
                suggestion: suggestion_of(dimension, level),
            }
        })
        .collect()
}

/// 渲染纯文本报告，命令行驱动程序直接打印。
pub fn render_text(record: &TestRecord) -> String {
    let grade = grade_of(record.rpi_result.rpi);
    let mut out = String::new();

    out.push_str("====== 恋爱占有欲指数（RPI）测试报告 ======\n");
    out.push_str(&format!(
        "视角: {}    测试时间: {}\n",
        record.test_type.display_name(),
        format_date(record.created_at)
    ));
    out.push_str(&format!(
        "RPI 指数: {:.2}    等级: {}\n",
        record.rpi_result.rpi, grade.level
    ));
    out.push_str(&format!("{}\n", grade.description));
    out.push_str(&format!(
        "合成 z 分数: {:.2}    题库版本: {}\n\n",
        record.rpi_result.composite_z, record.question_bank_version
    ));

    for narrative in dimension_narratives(record) {
        out.push_str(&format!(
            "【{}】 原始分 {}    z 分数 {:.2}    百分位 {:.1}\n",
            narrative.dimension, narrative.raw_score, narrative.z_score, narrative.percentile
        ));
        out.push_str(&format!("  解读: {}\n", narrative.interpretation));
        out.push_str(&format!("  建议: {}\n\n", narrative.suggestion));
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bank::TestKind;
    use crate::record::generate_id;
    use crate::scoring::{AnswerMap, DimensionScores, PerDimension, RpiResult};
    use chrono::Utc;

    fn record_with_z(z: PerDimension<f64>, scores: DimensionScores, rpi: f64) -> TestRecord {
        TestRecord {
            id: generate_id(),
            auth_code: "ABCDE12345".to_string(),
            test_type: TestKind::SelfReport,
            dimension_scores: scores,
            rpi_result: RpiResult {
                rpi,
                z_scores: z,
                raw_scores: scores,
                composite_z: 0.0,
            },
            answers: AnswerMap::new(),
            questions: Vec::new(),
            created_at: Utc::now(),
            question_bank_version: "2025".to_string(),
        }
    }

    #[test]
    fn test_narrative_level_selection() {
        let z = PerDimension {
            control_desire: 1.2,
            jealousy_intensity: -1.0,
            emotional_dependency: 0.0,
            relationship_insecurity: 0.51,
        };
        let record = record_with_z(z, DimensionScores::default(), 55.0);
        let narratives = dimension_narratives(&record);

        assert_eq!(narratives.len(), 4);
        assert_eq!(narratives[0].level, Level::High);
        assert_eq!(narratives[1].level, Level::Low);
        assert_eq!(narratives[2].level, Level::Medium);
        assert_eq!(narratives[3].level, Level::High);
        assert!(narratives[0].interpretation.contains("控制倾向"));
        assert!(narratives[1].percentile < 50.0);
    }

    #[test]
    fn test_render_contains_grade_and_dimensions() {
        let record = record_with_z(PerDimension::default(), DimensionScores::default(), 72.5);
        let text = render_text(&record);
        assert!(text.contains("72.50"));
        assert!(text.contains("高占有欲"));
        for dimension in Dimension::ALL {
            assert!(text.contains(dimension.label()));
        }
    }
}
