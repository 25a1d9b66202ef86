//! 滑块验证码状态机
//!
//! 状态流转：未检测 → 已检测 → 尝试中 → {已解决, 已耗尽}
//!
//! 每轮尝试：检测（消失即成功）→ 定位滑块 → 按升级规则选策略并执行
//! → 固定沉降等待 → 验证（成功指示可见或验证码消失）。失败则抖动退避，
//! 从第二次失败起强制整页刷新。耗尽所有尝试返回 Exhausted 并发出
//! 人工介入告警。对调用方这不是致命错误，只意味着当前页面不可用。
//!
//! 页面操作隔离在 `ChallengeOps` 接口之后，状态机本身不接触 Page。

use crate::browser::PointerDriver;
use crate::captcha::strategy::{self, CaptchaStrategy};
use crate::captcha::trajectory::MouseStep;
use crate::captcha::TrajectoryGenerator;
use crate::config::Config;
use crate::error::Result;
use crate::infrastructure::JsExecutor;
use crate::notify::{Event, Notifier};
use crate::utils::{timing, CancelToken};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// 已知的验证码容器选择器
const CAPTCHA_SELECTORS: &[&str] = &[
    "div.nc_wrapper",
    "div#nc_1_wrapper",
    "div.nc-lang-cnt",
    "div[id*='nocaptcha']",
    "span.nc_iconfont.btn_slide",
    "div.geetest_slider_button",
    "div.slider-btn",
    "iframe[src*='captcha']",
];

/// 候选的滑块手柄选择器
const SLIDER_SELECTORS: &[&str] = &[
    "span.nc_iconfont.btn_slide",
    "span.btn_slide",
    "div.geetest_slider_button",
    "div.slider-btn",
    "span[class*='btn_slide']",
    "div[class*='slider']",
    ".nc_iconfont",
    "[class*='slide']",
];

/// 破解成功的指示元素
const SUCCESS_SELECTORS: &[&str] = &[
    "div.nc-lang-cnt[data-nc-lang='_yesTEXT']",
    "span[class*='success']",
    "div[class*='success']",
    "div[class*='verified']",
    "[class*='pass']",
];

/// 滑块几何信息（手柄外接矩形 + 父容器宽度）
#[derive(Debug, Clone, Deserialize)]
pub struct SliderGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub container_width: f64,
}

impl SliderGeometry {
    fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// 一次 resolve 调用的最终结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 页面上从未出现验证码
    Clear,
    /// 验证码出现并被成功破解
    Solved,
    /// 所有尝试耗尽，页面不可用
    Exhausted,
}

impl Resolution {
    /// 页面是否可继续使用
    pub fn is_usable(&self) -> bool {
        !matches!(self, Resolution::Exhausted)
    }
}

/// 状态机需要的页面操作，真实实现走 CDP，测试里可用脚本化替身驱动
#[async_trait]
pub trait ChallengeOps: Send + Sync {
    /// 页面上是否有可见的验证码
    async fn challenge_visible(&self) -> Result<bool>;

    /// 破解成功指示是否可见
    async fn success_visible(&self) -> Result<bool>;

    /// 定位可见且可用的滑块手柄
    async fn locate_slider(&self) -> Result<Option<SliderGeometry>>;

    /// 按住后一次移动到位
    async fn fast_drag(&self, geometry: &SliderGeometry, displacement: f64) -> Result<()>;

    /// 跟随给定轨迹逐步移动
    async fn staged_drag(&self, geometry: &SliderGeometry, steps: &[MouseStep]) -> Result<()>;

    /// 在页面内直接派发合成鼠标事件
    async fn synthetic_events(&self, margin: f64) -> Result<()>;

    /// 整页刷新
    async fn reload(&self) -> Result<()>;
}

/// 滑块验证码处理器
pub struct CaptchaResolver {
    max_attempts: usize,
    trajectory: TrajectoryGenerator,
    notifier: Arc<dyn Notifier>,
}

impl CaptchaResolver {
    pub fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            max_attempts: config.max_captcha_attempts,
            trajectory: TrajectoryGenerator::new(),
            notifier,
        }
    }

    /// 检测页面上是否有可见的验证码
    pub async fn detect(&self, executor: &JsExecutor) -> Result<bool> {
        LiveChallengeOps { executor }.challenge_visible().await
    }

    /// 真实页面上的主循环入口
    pub async fn resolve(
        &self,
        executor: &JsExecutor,
        cancel: &CancelToken,
    ) -> Result<Resolution> {
        let ops = LiveChallengeOps { executor };
        self.resolve_with(&ops, cancel).await
    }

    /// 主循环：最多 `max_attempts` 次策略尝试
    pub async fn resolve_with(
        &self,
        ops: &dyn ChallengeOps,
        cancel: &CancelToken,
    ) -> Result<Resolution> {
        let mut detected = false;

        for attempt in 1..=self.max_attempts {
            cancel.ensure_active()?;
            debug!("检查验证码... 尝试 {}/{}", attempt, self.max_attempts);

            if !ops.challenge_visible().await? {
                if detected {
                    info!("✓ 验证码已消失，视为解决");
                    return Ok(Resolution::Solved);
                }
                debug!("未检测到验证码");
                return Ok(Resolution::Clear);
            }

            if !detected {
                detected = true;
                self.notifier.notify(
                    Event::CaptchaDetected,
                    "检测到滑块验证码，将尝试自动破解",
                );
            }

            timing::settle(timing::SETTLE_SECS, cancel).await?;

            let Some(geometry) = ops.locate_slider().await? else {
                warn!("验证码存在但未找到滑块手柄，等待后重试");
                sleep(Duration::from_secs(1)).await;
                continue;
            };

            let strategy = CaptchaStrategy::for_attempt(attempt);
            info!(
                "🧩 第 {} 次尝试破解验证码 (策略: {:?})",
                attempt, strategy
            );

            let solved = self
                .run_strategy(ops, strategy, &geometry)
                .await
                .unwrap_or(false);

            if solved {
                info!("✓ 验证码破解成功 (第 {} 次尝试)", attempt);
                self.notifier
                    .notify(Event::CaptchaSolved, "验证码已自动破解，继续采集");
                timing::settle(timing::SETTLE_SECS, cancel).await?;
                return Ok(Resolution::Solved);
            }

            warn!("✗ 第 {} 次尝试失败", attempt);
            timing::pause(timing::RETRY_WAIT, cancel).await?;

            if strategy::should_reload_after_failure(attempt) && attempt < self.max_attempts {
                info!("🔄 刷新页面后再次尝试");
                ops.reload().await?;
                timing::settle(3, cancel).await?;
            }
        }

        warn!("验证码在 {} 次尝试后仍未解决", self.max_attempts);
        self.notifier.notify(
            Event::CaptchaExhausted,
            "验证码无法自动破解，需要人工介入",
        );
        Ok(Resolution::Exhausted)
    }

    /// 执行单个策略并验证结果
    async fn run_strategy(
        &self,
        ops: &dyn ChallengeOps,
        strategy: CaptchaStrategy,
        geometry: &SliderGeometry,
    ) -> Result<bool> {
        let displacement = strategy.displacement(geometry.container_width, geometry.width);
        debug!(
            "目标位移: {:.1}px (容器 {:.1}px, 滑块 {:.1}px)",
            displacement, geometry.container_width, geometry.width
        );

        match strategy {
            CaptchaStrategy::FastDrag => {
                ops.fast_drag(geometry, displacement).await?;
                self.verify(ops).await
            }
            CaptchaStrategy::StagedDrag => {
                let steps = self.trajectory.generate(displacement);
                ops.staged_drag(geometry, &steps).await?;
                self.verify(ops).await
            }
            CaptchaStrategy::SyntheticEvents => {
                ops.synthetic_events(strategy.margin()).await?;
                // 合成事件链在页面里异步展开，多给一点完成时间
                sleep(Duration::from_secs(3)).await;
                self.verify(ops).await
            }
            CaptchaStrategy::AggressiveRetry => {
                // 连续三次快拖，任何一次通过即成功
                for sub_attempt in 1..=3 {
                    debug!("激进策略子尝试 {}/3", sub_attempt);
                    if let Err(e) = ops.fast_drag(geometry, displacement).await {
                        debug!("子尝试 {} 失败: {}", sub_attempt, e);
                        continue;
                    }
                    sleep(Duration::from_secs(1)).await;
                    if self.verify(ops).await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// 验证：等待服务端响应后检查成功指示或验证码消失
    async fn verify(&self, ops: &dyn ChallengeOps) -> Result<bool> {
        sleep(Duration::from_secs(timing::SETTLE_SECS)).await;

        if ops.success_visible().await.unwrap_or(false) {
            return Ok(true);
        }
        Ok(!ops.challenge_visible().await?)
    }
}

/// 真实页面上的操作实现（JS 检测 + CDP 指针拖动）
pub struct LiveChallengeOps<'a> {
    pub executor: &'a JsExecutor,
}

#[async_trait]
impl ChallengeOps for LiveChallengeOps<'_> {
    async fn challenge_visible(&self) -> Result<bool> {
        let js = any_visible_js(CAPTCHA_SELECTORS);
        Ok(self.executor.eval_as::<bool>(js).await.unwrap_or(false))
    }

    async fn success_visible(&self) -> Result<bool> {
        let js = any_visible_js(SUCCESS_SELECTORS);
        Ok(self.executor.eval_as::<bool>(js).await.unwrap_or(false))
    }

    async fn locate_slider(&self) -> Result<Option<SliderGeometry>> {
        let js = locate_slider_js(SLIDER_SELECTORS);
        self.executor.eval_as::<Option<SliderGeometry>>(js).await
    }

    async fn fast_drag(&self, geometry: &SliderGeometry, displacement: f64) -> Result<()> {
        let (cx, cy) = geometry.center();
        let mut pointer = PointerDriver::new(self.executor.page(), cx, cy);

        pointer.move_to(cx, cy).await?;
        sleep(Duration::from_millis(500)).await;

        pointer.press().await?;
        sleep(Duration::from_millis(200)).await;

        pointer.move_by(displacement, 0.0).await?;
        sleep(Duration::from_millis(500)).await;

        pointer.release().await?;
        Ok(())
    }

    async fn staged_drag(&self, geometry: &SliderGeometry, steps: &[MouseStep]) -> Result<()> {
        let (cx, cy) = geometry.center();
        let mut pointer = PointerDriver::new(self.executor.page(), cx, cy);

        pointer.move_to(cx, cy).await?;
        sleep(jitter_ms(500, 1000)).await;

        pointer.press().await?;
        sleep(jitter_ms(200, 500)).await;

        for step in steps {
            pointer.move_by(step.dx, step.dy).await?;
            sleep(jitter_ms(1, 4)).await;
        }

        sleep(jitter_ms(500, 1000)).await;
        pointer.release().await?;
        Ok(())
    }

    async fn synthetic_events(&self, margin: f64) -> Result<()> {
        let js = synthetic_events_js(SLIDER_SELECTORS, margin);
        let dispatched = self.executor.eval_as::<bool>(js).await.unwrap_or(false);
        if !dispatched {
            warn!("合成事件策略未能定位滑块");
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.executor.reload().await
    }
}

/// 取一个毫秒级抖动时长（临时 RNG，不跨 await 持有）
fn jitter_ms(low: u64, high: u64) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(low..high))
}

// ========== JS 片段构造 ==========

fn visibility_helper() -> &'static str {
    r#"const visible = (el) => {
        const r = el.getBoundingClientRect();
        const st = window.getComputedStyle(el);
        return r.width > 0 && r.height > 0 && st.display !== 'none' && st.visibility !== 'hidden';
    };"#
}

fn any_visible_js(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
            const sels = {};
            {}
            for (const sel of sels) {{
                let els;
                try {{ els = document.querySelectorAll(sel); }} catch (e) {{ continue; }}
                for (const el of els) {{
                    if (visible(el)) return true;
                }}
            }}
            return false;
        }})()"#,
        json!(selectors),
        visibility_helper()
    )
}

fn locate_slider_js(selectors: &[&str]) -> String {
    format!(
        r#"(() => {{
            const sels = {};
            {}
            for (const sel of sels) {{
                let els;
                try {{ els = document.querySelectorAll(sel); }} catch (e) {{ continue; }}
                for (const el of els) {{
                    if (!visible(el) || el.disabled) continue;
                    const r = el.getBoundingClientRect();
                    const parent = el.parentElement;
                    const pr = parent ? parent.getBoundingClientRect() : r;
                    return {{
                        x: r.x,
                        y: r.y,
                        width: r.width,
                        height: r.height,
                        container_width: pr.width
                    }};
                }}
            }}
            return null;
        }})()"#,
        json!(selectors),
        visibility_helper()
    )
}

fn synthetic_events_js(selectors: &[&str], margin: f64) -> String {
    format!(
        r#"(() => {{
            const sels = {};
            {}
            let slider = null;
            for (const sel of sels) {{
                let els;
                try {{ els = document.querySelectorAll(sel); }} catch (e) {{ continue; }}
                for (const el of els) {{
                    if (visible(el) && !el.disabled) {{ slider = el; break; }}
                }}
                if (slider) break;
            }}
            if (!slider) return false;

            const container = slider.parentElement || slider;
            const distance = container.offsetWidth - slider.offsetWidth + {margin};
            const rect = slider.getBoundingClientRect();
            const startX = rect.left + rect.width / 2;
            const y = rect.top + rect.height / 2;

            const fire = (type, x, target) => {{
                const ev = new MouseEvent(type, {{
                    bubbles: true,
                    cancelable: true,
                    clientX: x,
                    clientY: y
                }});
                target.dispatchEvent(ev);
            }};

            fire('mousedown', startX, slider);

            const steps = 20;
            for (let i = 1; i <= steps; i++) {{
                setTimeout(() => {{
                    fire('mousemove', startX + (distance * i) / steps, document);
                    if (i === steps) {{
                        setTimeout(() => fire('mouseup', startX + distance, document), 100);
                    }}
                }}, i * 20);
            }}
            return true;
        }})()"#,
        json!(selectors),
        visibility_helper(),
        margin = margin
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 脚本化的验证码页面替身：第 N 次拖动后验证码消失
    struct ScriptedChallenge {
        solve_on_drag: Option<usize>,
        drags: AtomicUsize,
        reloads: AtomicUsize,
        solved: AtomicBool,
        sequence: Mutex<Vec<&'static str>>,
    }

    impl ScriptedChallenge {
        fn new(solve_on_drag: Option<usize>) -> Self {
            Self {
                solve_on_drag,
                drags: AtomicUsize::new(0),
                reloads: AtomicUsize::new(0),
                solved: AtomicBool::new(false),
                sequence: Mutex::new(Vec::new()),
            }
        }

        fn record_drag(&self) {
            let count = self.drags.fetch_add(1, Ordering::SeqCst) + 1;
            self.sequence.lock().unwrap().push("drag");
            if Some(count) == self.solve_on_drag {
                self.solved.store(true, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl ChallengeOps for ScriptedChallenge {
        async fn challenge_visible(&self) -> Result<bool> {
            Ok(!self.solved.load(Ordering::SeqCst))
        }

        async fn success_visible(&self) -> Result<bool> {
            Ok(false)
        }

        async fn locate_slider(&self) -> Result<Option<SliderGeometry>> {
            Ok(Some(SliderGeometry {
                x: 10.0,
                y: 20.0,
                width: 40.0,
                height: 40.0,
                container_width: 300.0,
            }))
        }

        async fn fast_drag(&self, _g: &SliderGeometry, _d: f64) -> Result<()> {
            self.record_drag();
            Ok(())
        }

        async fn staged_drag(&self, _g: &SliderGeometry, _steps: &[MouseStep]) -> Result<()> {
            self.record_drag();
            Ok(())
        }

        async fn synthetic_events(&self, _margin: f64) -> Result<()> {
            self.record_drag();
            Ok(())
        }

        async fn reload(&self) -> Result<()> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            self.sequence.lock().unwrap().push("reload");
            Ok(())
        }
    }

    struct RecordingNotifier(Mutex<Vec<Event>>);

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: Event, _message: &str) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn resolver_with(notifier: Arc<dyn Notifier>) -> CaptchaResolver {
        CaptchaResolver::new(&Config::default(), notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_when_never_detected() {
        let page = ScriptedChallenge::new(None);
        page.solved.store(true, Ordering::SeqCst);

        let resolver = resolver_with(Arc::new(crate::notify::NoopNotifier));
        let resolution = resolver
            .resolve_with(&page, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::Clear);
        assert_eq!(page.drags.load(Ordering::SeqCst), 0);
    }

    /// 场景：前两次拖动失败，第 2 次失败后整页刷新，第 3 次拖动成功
    #[tokio::test(start_paused = true)]
    async fn test_solved_after_third_attempt_with_reload() {
        let page = ScriptedChallenge::new(Some(3));
        let events = Arc::new(RecordingNotifier(Mutex::new(Vec::new())));

        let resolver = resolver_with(events.clone());
        let resolution = resolver
            .resolve_with(&page, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::Solved);
        assert_eq!(page.drags.load(Ordering::SeqCst), 3);
        // 第 1 次失败不刷新，第 2 次失败后刷新，第 3 次成功
        assert_eq!(
            *page.sequence.lock().unwrap(),
            vec!["drag", "drag", "reload", "drag"]
        );
        let events = events.0.lock().unwrap();
        assert!(events.contains(&Event::CaptchaDetected));
        assert_eq!(*events.last().unwrap(), Event::CaptchaSolved);
    }

    /// 场景：验证码始终不消失，策略尝试严格不超过上限
    #[tokio::test(start_paused = true)]
    async fn test_exhausts_at_attempt_limit() {
        let page = ScriptedChallenge::new(None);
        let events = Arc::new(RecordingNotifier(Mutex::new(Vec::new())));

        let resolver = resolver_with(events.clone());
        let resolution = resolver
            .resolve_with(&page, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::Exhausted);
        let max = Config::default().max_captcha_attempts;
        assert_eq!(page.drags.load(Ordering::SeqCst), max);
        // 第 2、3、4 次失败后各刷新一次，最后一次失败不再刷新
        assert_eq!(page.reloads.load(Ordering::SeqCst), max - 2);
        assert_eq!(
            *events.0.lock().unwrap().last().unwrap(),
            Event::CaptchaExhausted
        );
    }

    #[test]
    fn test_geometry_center() {
        let g = SliderGeometry {
            x: 100.0,
            y: 200.0,
            width: 40.0,
            height: 40.0,
            container_width: 300.0,
        };
        assert_eq!(g.center(), (120.0, 220.0));
    }

    #[test]
    fn test_resolution_usability() {
        assert!(Resolution::Clear.is_usable());
        assert!(Resolution::Solved.is_usable());
        assert!(!Resolution::Exhausted.is_usable());
    }

    #[test]
    fn test_js_snippets_embed_selectors() {
        let js = any_visible_js(CAPTCHA_SELECTORS);
        assert!(js.contains("nc_wrapper"));

        let js = locate_slider_js(SLIDER_SELECTORS);
        assert!(js.contains("container_width"));

        let js = synthetic_events_js(SLIDER_SELECTORS, 8.0);
        assert!(js.contains("mousedown"));
        assert!(js.contains("+ 8"));
    }
}
