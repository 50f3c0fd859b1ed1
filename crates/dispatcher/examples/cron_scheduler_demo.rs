use chrono::Utc;
use jobflow_dispatcher::{CronScheduler, Recurrence};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== 定时表达式演示 ===\n");

    let now = Utc::now();
    println!("当前时间: {}\n", now.format("%Y-%m-%d %H:%M:%S UTC"));

    for expression in [
        "*/15 * * * *",
        "0 30 9 * * Mon-Fri",
        "@daily",
        "@every 1m30s",
    ] {
        let scheduler = CronScheduler::new(expression)?;
        let kind = match scheduler.recurrence() {
            Recurrence::Cron(_) => "cron",
            Recurrence::Every(_) => "interval",
        };
        println!("{expression} ({kind}):");
        for (i, time) in scheduler.upcoming_times(now, 3).iter().enumerate() {
            println!("   第{}次: {}", i + 1, time.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if let Some(wait) = scheduler.time_until_next_execution(now) {
            println!("   距离下次执行: {}秒", wait.as_secs());
        }
        println!();
    }

    println!("无效表达式:");
    for expression in ["every tuesday", "@every 0s", "0 0 0 32 * *"] {
        if let Err(e) = CronScheduler::validate_cron_expression(expression) {
            println!("   {expression}: {e}");
        }
    }

    Ok(())
}
