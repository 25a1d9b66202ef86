//! 浏览器会话管理
//!
//! ## 职责
//!
//! - 用隔离的临时 profile 启动浏览器（不影响本机其他 Chrome 实例）
//! - 注入反检测脚本、轮换 User-Agent
//! - 保证任何退出路径（包括异常和取消）都能释放会话资源

use crate::config::Config;
use crate::error::{Result, ScrapeError};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use rand::seq::SliceRandom;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

/// 轮换使用的 User-Agent 池
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
];

/// 每个新文档注入的反检测脚本
const STEALTH_JS: &str = r#"
Object.defineProperty(navigator, 'webdriver', {
    get: () => undefined,
    configurable: true
});
Object.defineProperty(navigator, 'plugins', {
    get: () => [1, 2, 3, 4, 5],
    configurable: true
});
Object.defineProperty(navigator, 'languages', {
    get: () => ['en-US', 'en'],
    configurable: true
});
window.chrome = {
    runtime: {},
    app: {
        isInstalled: false
    }
};
"#;

/// 一次运行期间的浏览器会话
///
/// 持有浏览器进程、事件处理任务和临时 profile 目录；
/// `close()` 在所有退出路径上都必须被调用，profile 目录随 Drop 自动删除
pub struct Session {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    _user_data_dir: TempDir,
}

impl Session {
    /// 启动一个全新的隔离会话
    pub async fn launch(config: &Config) -> Result<Self> {
        info!("🚀 启动浏览器会话...");

        let user_data_dir = tempfile::Builder::new()
            .prefix("chrome_scraper_")
            .tempdir()
            .map_err(|e| ScrapeError::file("chrome_scraper_*", e))?;
        debug!("临时 profile 目录: {:?}", user_data_dir.path());

        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let args: Vec<String> = vec![
            "--no-first-run".to_string(),
            "--no-service-autorun".to_string(),
            "--password-store=basic".to_string(),
            "--disable-background-networking".to_string(),
            "--incognito".to_string(),
            "--disable-application-cache".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-sandbox".to_string(),
            "--disable-extensions".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            format!("--user-agent={}", user_agent),
        ];

        let mut builder = BrowserConfig::builder()
            .user_data_dir(user_data_dir.path())
            .window_size(1920, 1080)
            .args(args);

        if config.headless {
            builder = builder.new_headless_mode();
        } else {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::Other(format!("浏览器配置失败: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            error!("启动浏览器失败: {}", e);
            e
        })?;
        debug!("浏览器启动成功");

        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // 等待浏览器状态同步
        sleep(Duration::from_millis(300)).await;

        let page = browser.new_page("about:blank").await.map_err(|e| {
            error!("创建页面失败: {}", e);
            e
        })?;

        // 注入反检测脚本，对之后的每个新文档生效
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS))
            .await?;

        info!("✓ 浏览器会话就绪 (UA: {})", user_agent);

        Ok(Self {
            browser,
            page,
            handler_task,
            _user_data_dir: user_data_dir,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 关闭会话并释放所有资源（尽力而为，不向上传播错误）
    pub async fn close(mut self) {
        debug!("正在关闭浏览器会话");
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        info!("✓ 浏览器会话已关闭");
    }
}
