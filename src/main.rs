use alibaba_scraper::utils::logging;
use alibaba_scraper::{AlibabaExtractor, CancelToken, Config, ExecutionSupervisor};
use anyhow::Result;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();
    info!("⚙️ 配置: headless={}, 并行会话={}", config.headless, config.parallel_sessions);

    let notifier = alibaba_scraper::notify::from_kind(&config.notifier_kind);

    // Ctrl+C 触发优雅取消
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("收到 Ctrl+C，开始优雅退出...");
                cancel.cancel();
            }
        });
    }

    let supervisor = ExecutionSupervisor::new(config, AlibabaExtractor::new(), notifier);
    let summary = supervisor.run(&cancel).await?;

    info!(
        "✅ 全部结束: {} 条验收记录, {} 个任务完成, {} 个失败",
        summary.detailed, summary.completed, summary.failed
    );
    Ok(())
}
