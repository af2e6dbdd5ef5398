use chrono::NaiveTime;

/// 判断 `now` 是否落在 [start, stop] 时间窗内
///
/// - stop < start：窗口跨午夜，now >= start 或 now <= stop 即为活动
/// - start == stop：视为全天活动
/// - 其他：start <= now <= stop
pub fn is_active(now: NaiveTime, start: NaiveTime, stop: NaiveTime) -> bool {
    if start == stop {
        return true;
    }

    if stop < start {
        now >= start || now <= stop
    } else {
        start <= now && now <= stop
    }
}
