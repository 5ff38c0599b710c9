// ==========================================
// 工单一致性维护层 - 维护入口
// ==========================================
// 用法: opplan-sync [db_path]
// 打开（必要时初始化）数据库，全量重建结存与资源计划
// ==========================================

use anyhow::Context;
use opplan_sync::app::{get_default_db_path, AppState};
use opplan_sync::logging;

fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} - 派生数据重建", opplan_sync::APP_NAME);
    tracing::info!("系统版本: {}", opplan_sync::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args()
        .nth(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path.clone())
        .with_context(|| format!("无法初始化数据库: {}", db_path))?;

    let summary = state
        .engine
        .rebuild_derived()
        .context("派生数据重建失败")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
