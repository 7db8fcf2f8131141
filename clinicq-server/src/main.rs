//! 排队服务主程序

use anyhow::{Context, Result};
use clap::Parser;
use clinicq_admin::{logging, ConfigManager, QueueRuntime};
use clinicq_workflow::QueueSubscription;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// 排队服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "clinicq-server")]
#[command(about = "门诊排队管理服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 签到数据 JSON 文件
    #[arg(short, long)]
    seed: Option<String>,

    /// 刷新间隔（秒）
    #[arg(short, long)]
    interval: Option<u64>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,

    /// 运行若干秒后退出，缺省时等待 Ctrl-C
    #[arg(long)]
    run_for: Option<u64>,

    /// 退出时导出队列的 JSON 文件，"-" 表示标准输出
    #[arg(short, long)]
    export: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_manager = Arc::new(ConfigManager::new(args.config.as_deref())?);
    let mut config = config_manager.get_config().await;
    if let Some(seed) = &args.seed {
        config.queue.seed_file = Some(seed.clone());
    }
    if let Some(interval) = args.interval {
        config.queue.refresh_interval_secs = interval;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    config_manager.update_config(config.clone()).await?;

    // 初始化日志
    logging::init_tracing(&config.logging)?;

    info!("启动排队服务...");
    info!("  刷新间隔: {} 秒", config.queue.refresh_interval_secs);
    info!("  单人就诊限制: {}", config.queue.enforce_single_in_progress);

    let mut runtime = QueueRuntime::new(config_manager).await?;
    if let Err(e) = runtime.start().await {
        error!("排队服务启动失败: {}", e);
        return Err(e);
    }

    let watcher = tokio::spawn(log_snapshots(runtime.service().subscribe().await));

    match args.run_for {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
        }
    }

    runtime.stop().await;
    watcher.abort();

    if let Some(target) = args.export.as_deref() {
        let json = runtime.service().export_json().await?;
        if target == "-" {
            println!("{}", json);
        } else {
            tokio::fs::write(target, json)
                .await
                .with_context(|| format!("Failed to write export file {}", target))?;
            info!("队列已导出到 {}", target);
        }
    }

    Ok(())
}

/// 队列快照变化时输出统计
async fn log_snapshots(mut subscription: QueueSubscription) {
    loop {
        {
            let stats = subscription.stats.borrow_and_update();
            let current = subscription.current.borrow_and_update();
            info!(
                waiting = stats.waiting,
                in_progress = stats.in_progress,
                completed = stats.completed,
                average_wait = stats.average_wait_time,
                "当前就诊: {}，预计完成时间 {}",
                current
                    .as_ref()
                    .map(|entry| entry.patient_name.as_str())
                    .unwrap_or("无"),
                stats.estimated_completion_time
            );
        }

        if subscription.stats.changed().await.is_err() {
            break;
        }
    }
}
