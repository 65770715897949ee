//! 标准正态分布相关的纯函数。无状态、无副作用。

/// 误差函数 erf(x) 的近似计算。
///
/// 采用 Abramowitz & Stegun 7.1.26 的单项有理式近似，
/// 绝对误差约 1.5e-7，奇函数性质由符号位单独处理。
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    sign * y
}

/// 标准正态分布的累积分布函数。
///
/// CDF(z) = 0.5 * (1 + erf(z / sqrt(2)))，返回值落在 (0, 1) 区间。
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// z 分数：原始分相对常模均值的标准化偏差。
///
/// 常模表中的标准差均为固定正常数，std == 0 属于配置错误，
/// 不在运行时处理。
pub fn z_score(raw: f64, mean: f64, std: f64) -> f64 {
    (raw - mean) / std
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_erf_odd() {
        assert!((erf(1.0) + erf(-1.0)).abs() < 1e-12);
        assert!((erf(0.5) + erf(-0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_erf_known_values() {
        // 参考值来自数学手册，近似式误差上限 1.5e-7
        assert!((erf(0.0)).abs() < 1e-7);
        assert!((erf(1.0) - 0.842_700_79).abs() < 1.5e-7);
        assert!((erf(2.0) - 0.995_322_27).abs() < 1.5e-7);
    }

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((normal_cdf(-1.96) - 0.025).abs() < 1e-3);
        assert!(normal_cdf(6.0) < 1.0);
        assert!(normal_cdf(-6.0) > 0.0);
    }

    #[test]
    fn test_z_score() {
        assert_eq!(z_score(25.0, 25.0, 8.0), 0.0);
        assert_eq!(z_score(33.0, 25.0, 8.0), 1.0);
        assert_eq!(z_score(17.0, 25.0, 8.0), -1.0);
    }
}
