//! 人类化鼠标轨迹合成
//!
//! 把一段水平距离切分成带纵向抖动的小步：前 60% 加速（大步长），
//! 中间 20% 匀速，最后 20% 减速（小步长收尾），一半概率附加一对
//! 过冲 + 回正步来模拟人手的过度修正。所有步长之和严格等于目标距离
//! （过冲对净和为零）。

use rand::Rng;

/// 一步鼠标相对位移
#[derive(Debug, Clone, Copy)]
pub struct MouseStep {
    pub dx: f64,
    pub dy: f64,
}

/// 轨迹生成器
#[derive(Debug, Clone, Copy, Default)]
pub struct TrajectoryGenerator;

impl TrajectoryGenerator {
    pub fn new() -> Self {
        Self
    }

    /// 生成覆盖 `distance` 像素的轨迹（distance <= 0 时为空）
    pub fn generate(&self, distance: f64) -> Vec<MouseStep> {
        if distance <= 0.0 {
            return Vec::new();
        }

        let mut rng = rand::thread_rng();
        let mut steps = Vec::new();
        let mut current = 0.0;

        while current < distance {
            let mut dx = if current < distance * 0.6 {
                // 加速段
                rng.gen_range(5.0..10.0)
            } else if current < distance * 0.8 {
                // 匀速段
                rng.gen_range(4.0..8.0)
            } else {
                // 减速段
                rng.gen_range(0.5..1.0)
            };

            let dy = rng.gen_range(-0.5..0.5);

            current += dx;
            if current > distance {
                // 最后一步收口，保证总位移精确到位
                dx -= current - distance;
                current = distance;
            }

            steps.push(MouseStep { dx, dy });
        }

        // 一半概率过冲再回正
        if rng.gen_bool(0.5) {
            let overshoot = rng.gen_range(5.0..10.0);
            steps.push(MouseStep {
                dx: overshoot,
                dy: 0.0,
            });
            steps.push(MouseStep {
                dx: -overshoot,
                dy: 0.0,
            });
        }

        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_dx(steps: &[MouseStep]) -> f64 {
        steps.iter().map(|s| s.dx).sum()
    }

    #[test]
    fn test_trajectory_sums_to_distance() {
        let generator = TrajectoryGenerator::new();
        for distance in [1.0, 12.5, 100.0, 260.0, 333.3] {
            for _ in 0..50 {
                let steps = generator.generate(distance);
                // 过冲对净和为零，总和必须精确等于目标距离
                assert!(
                    (total_dx(&steps) - distance).abs() < 1e-9,
                    "distance={} sum={}",
                    distance,
                    total_dx(&steps)
                );
            }
        }
    }

    #[test]
    fn test_trajectory_empty_for_non_positive_distance() {
        let generator = TrajectoryGenerator::new();
        assert!(generator.generate(0.0).is_empty());
        assert!(generator.generate(-5.0).is_empty());
    }

    #[test]
    fn test_vertical_jitter_bounded() {
        let generator = TrajectoryGenerator::new();
        for step in generator.generate(300.0) {
            assert!(step.dy.abs() <= 0.5);
        }
    }

    #[test]
    fn test_step_count_bounded() {
        let generator = TrajectoryGenerator::new();
        let distance = 400.0;
        let steps = generator.generate(distance);
        // 最小步长 0.5，外加一对可能的过冲步
        assert!(steps.len() <= (distance / 0.5) as usize + 2);
    }
}
