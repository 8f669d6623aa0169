//! 本地同步演示
//!
//! 检测本机已安装的智能体，读取其日志并上报一次。
//! 环境变量：ARDEN_HOST / ARDEN_TOKEN / ARDEN_USER_ID / ARDEN_CONFIG_DIR，日志级别用 RUST_LOG。
//!
//! ```bash
//! ARDEN_HOST=http://localhost:4000 RUST_LOG=arden_sdk=debug cargo run --example sync_demo
//! ```

use std::sync::Arc;

use anyhow::Context;
use arden_sdk::settings::home_dir;
use arden_sdk::{detect_agents, run_import, DeliveryClient, ImportOptions, SettingsStore, SyncStateTracker};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("\n==============================================");
    println!("📊 Arden 本地同步演示 (v{})", arden_sdk::SDK_VERSION);
    println!("==============================================\n");

    let home = home_dir().context("无法确定用户主目录")?;
    let store = Arc::new(SettingsStore::open(SettingsStore::default_path()));
    let settings = store
        .load()
        .await
        .with_context(|| format!("读取设置失败: {}", store.path().display()))?
        .with_env_overrides();

    let client = DeliveryClient::new(settings.delivery_config())?;
    println!("📡 上报地址: {}", client.config().endpoint_url());

    let options = ImportOptions {
        user_id: settings.user_id.clone(),
        ..Default::default()
    };

    for agent in detect_agents(&home).await {
        if !agent.installed {
            println!("⏭️  {} 未安装 ({})", agent.kind.display_name(), agent.data_dir.display());
            continue;
        }

        println!("\n🔄 同步 {} ...", agent.kind.display_name());
        let importer = agent.kind.importer(&home);
        let tracker = SyncStateTracker::new(store.clone(), agent.kind.sync_source());
        let report = run_import(importer.as_ref(), &tracker, &client, &options)
            .await
            .with_context(|| format!("{} 同步失败", agent.kind.display_name()))?;

        println!("  - 来源: {} (跳过 {}, 失败 {})", report.sources_found, report.sources_skipped, report.sources_failed);
        println!(
            "  - 事件: 发送 {}, 接受 {}, 拒绝 {}, 丢弃 {}",
            report.events_sent, report.events_accepted, report.events_rejected, report.events_dropped
        );
    }

    println!("\n✅ 同步完成");
    Ok(())
}
