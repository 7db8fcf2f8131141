//! 排队管理演示程序
//!
//! 展示签到、叫号、结束就诊自动顺延、拖拽重排、刷新计时和导出

use clinicq_admin::{logging, ClinicqConfig, ConfigManager, QueueRuntime};
use clinicq_core::{NewQueueEntry, Priority};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = ClinicqConfig::default();
    config.queue.refresh_latency_ms = 50;
    logging::init_tracing(&config.logging)?;

    let config_manager = Arc::new(ConfigManager::from_config(config, None)?);
    let mut runtime = QueueRuntime::new(config_manager).await?;

    println!("🏥 门诊排队演示\n");

    // 1. 签到
    runtime
        .seed(vec![
            NewQueueEntry::new(1, "Maria Lopez", 1)
                .with_doctor_name("Dr. Brandt")
                .with_reason("Follow-up"),
            NewQueueEntry::new(2, "Kwame Mensah", 2)
                .with_doctor_name("Dr. Okafor")
                .with_priority(Priority::Emergency)
                .with_estimated_duration(30)
                .with_reason("Chest pain"),
            NewQueueEntry::new(3, "Li Wei", 1)
                .with_doctor_name("Dr. Brandt")
                .with_priority(Priority::Low)
                .with_reason("Prescription refill"),
        ])
        .await;
    runtime.start().await?;
    let service = runtime.service().clone();
    println!("✅ 3 位患者已签到");

    // 2. 急诊患者优先：按优先级重排整个队列
    let by_priority = service.sort_patients("priority").await;
    service.reorder_queue(&by_priority).await?;
    println!("✅ 已按优先级重排");

    // 3. 叫号并结束就诊，下一位自动开始
    let first = service.call_patient(2).await?;
    println!("📣 叫号: {}", first.patient_name);
    service.update_patient_notes(2, "ECG ordered").await?;

    let outcome = service.complete_consultation(2).await?;
    if let Some(next) = outcome.next_started {
        println!("➡️  下一位自动开始: {}", next.patient_name);
    }

    // 4. 刷新一次，候诊时间加一分钟
    let stats = service.refresh_queue().await?;
    println!("\n📊 队列统计:");
    println!("   总人数: {}", stats.total_patients);
    println!("   候诊: {}", stats.waiting);
    println!("   就诊中: {}", stats.in_progress);
    println!("   已完成: {}", stats.completed);
    println!("   平均候诊: {:.1} 分钟", stats.average_wait_time);
    println!("   预计完成: {}", stats.estimated_completion_time);
    for workload in stats.doctor_workload.values() {
        println!(
            "   {}: 就诊中 {}，候诊 {}，预计 {} 分钟",
            workload.doctor_name, workload.in_progress, workload.waiting, workload.estimated_wait_minutes
        );
    }

    // 5. 导出
    println!("\n📄 导出:\n{}", service.export_json().await?);

    runtime.stop().await;
    Ok(())
}
