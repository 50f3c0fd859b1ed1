use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use jobflow_core::{JobError, JobResult};

const EVERY_PREFIX: &str = "@every ";

/// 解析后的定时表达式
#[derive(Debug, Clone)]
pub enum Recurrence {
    Cron(Box<Schedule>),
    /// 固定间隔，从布置时刻开始计时
    Every(Duration),
}

/// 定时表达式解析和调度工具
///
/// 支持5段cron（自动补秒字段）、带秒的6/7段cron、`@daily` 等描述符，
/// 以及 `@every 1m30s` 形式的固定间隔。时间统一按UTC计算。
#[derive(Debug, Clone)]
pub struct CronScheduler {
    expression: String,
    recurrence: Recurrence,
}

impl CronScheduler {
    pub fn new(expression: &str) -> JobResult<Self> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(JobError::invalid_cron(expression, "表达式为空"));
        }

        let recurrence = if let Some(rest) = trimmed.strip_prefix(EVERY_PREFIX) {
            let interval = parse_go_duration(rest.trim())
                .ok_or_else(|| JobError::invalid_cron(expression, "无法解析的时间间隔"))?;
            if interval.is_zero() {
                return Err(JobError::invalid_cron(expression, "时间间隔必须大于0"));
            }
            Recurrence::Every(interval.max(Duration::from_secs(1)))
        } else {
            let normalized = normalize_cron(trimmed);
            let schedule = Schedule::from_str(&normalized)
                .map_err(|e| JobError::invalid_cron(expression, e.to_string()))?;
            Recurrence::Cron(Box::new(schedule))
        };

        Ok(Self {
            expression: expression.to_string(),
            recurrence,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    /// 获取下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.recurrence {
            Recurrence::Cron(schedule) => schedule.after(&from).next(),
            Recurrence::Every(interval) => chrono::Duration::from_std(*interval)
                .ok()
                .and_then(|step| from.checked_add_signed(step)),
        }
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = from;
        while times.len() < count {
            match self.next_execution_time(cursor) {
                Some(next) => {
                    times.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        times
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next_execution(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_execution_time(now)
            .and_then(|next| (next - now).to_std().ok())
    }

    /// 验证定时表达式是否有效
    pub fn validate_cron_expression(expression: &str) -> JobResult<()> {
        Self::new(expression).map(|_| ())
    }
}

/// 5段cron前补秒字段，其余原样交给 `cron` 解析
fn normalize_cron(expression: &str) -> String {
    if expression.starts_with('@') {
        return expression.to_string();
    }
    if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

/// 解析 `1h30m`、`1.5s`、`250ms` 这类时长字符串
pub fn parse_go_duration(input: &str) -> Option<Duration> {
    if input.is_empty() {
        return None;
    }
    if input == "0" {
        return Some(Duration::ZERO);
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += value * unit_nanos;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_go_duration_parsing() {
        assert_eq!(parse_go_duration("1s"), Some(Duration::from_secs(1)));
        assert_eq!(parse_go_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_go_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_go_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_go_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_go_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_go_duration(""), None);
        assert_eq!(parse_go_duration("10"), None);
        assert_eq!(parse_go_duration("5x"), None);
        assert_eq!(parse_go_duration("s"), None);
    }

    #[test]
    fn test_every_expression() {
        let scheduler = CronScheduler::new("@every 1s").unwrap();
        assert!(matches!(
            scheduler.recurrence(),
            Recurrence::Every(d) if *d == Duration::from_secs(1)
        ));

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let upcoming = scheduler.upcoming_times(now, 3);
        assert_eq!(upcoming[0].second(), 1);
        assert_eq!(upcoming[2].second(), 3);
    }

    #[test]
    fn test_every_rejects_zero_and_garbage() {
        assert!(CronScheduler::new("@every 0s").is_err());
        assert!(CronScheduler::new("@every soon").is_err());
    }

    #[test]
    fn test_sub_second_interval_rounds_up() {
        let scheduler = CronScheduler::new("@every 100ms").unwrap();
        assert!(matches!(
            scheduler.recurrence(),
            Recurrence::Every(d) if *d == Duration::from_secs(1)
        ));
    }

    #[test]
    fn test_five_field_cron_gets_seconds() {
        let scheduler = CronScheduler::new("*/5 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 30).unwrap();
        let next = scheduler.next_execution_time(now).unwrap();
        assert_eq!(next.minute(), 5);
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn test_six_field_and_descriptor() {
        assert!(CronScheduler::new("0 0 9-17 * * *").is_ok());
        let daily = CronScheduler::new("@daily").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let next = daily.next_execution_time(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_validate_cron_expression() {
        assert!(CronScheduler::validate_cron_expression("0 0 0 * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("@hourly").is_ok());
        assert!(CronScheduler::validate_cron_expression("invalid").is_err());
        assert!(CronScheduler::validate_cron_expression("0 0 0 32 * *").is_err());
        assert!(CronScheduler::validate_cron_expression("").is_err());
    }

    #[test]
    fn test_time_until_next_execution() {
        let scheduler = CronScheduler::new("0 * * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 45).unwrap();
        assert_eq!(
            scheduler.time_until_next_execution(now),
            Some(Duration::from_secs(15))
        );
    }
}
