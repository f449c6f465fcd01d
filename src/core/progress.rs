//! 进度归一化：服务端可能上报任意数值（越界、小数、NaN），客户端只做区间收敛

/// 收敛到 [0, 100]，保留小数精度（存储用）；NaN 视为 0
pub fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// 收敛后四舍五入为整数百分比（展示用）
pub fn normalize(value: f64) -> u8 {
    clamp_progress(value).round() as u8
}
