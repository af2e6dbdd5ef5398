use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use sunrise::{Coordinates, SolarDay, SolarEvent};

/// 当天的日出 / 日落（UTC）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Daylight {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

impl Daylight {
    /// 太阳是否在地平线以上
    pub fn sun_is_up<Tz: chrono::TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        let now = now.with_timezone(&Utc);
        self.sunrise <= now && now < self.sunset
    }
}

/// 时钟 + 天文时间来源
pub trait Almanac {
    fn current_local_time(&self) -> DateTime<FixedOffset>;

    /// 极昼 / 极夜时返回 None
    fn daylight(&self, date: NaiveDate) -> Option<Daylight>;
}

/// 没有配置站点位置时只提供本地时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Almanac for LocalClock {
    fn current_local_time(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    fn daylight(&self, _date: NaiveDate) -> Option<Daylight> {
        None
    }
}

/// 按站点经纬度计算日出日落
#[derive(Debug, Clone, Copy)]
pub struct SolarAlmanac {
    latitude: f64,
    longitude: f64,
}

impl SolarAlmanac {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl Almanac for SolarAlmanac {
    fn current_local_time(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    fn daylight(&self, date: NaiveDate) -> Option<Daylight> {
        let coordinates = Coordinates::new(self.latitude, self.longitude)?;
        let day = SolarDay::new(coordinates, date);

        let sunrise = day.event_time(SolarEvent::Sunrise);
        let sunset = day.event_time(SolarEvent::Sunset);
        (sunrise < sunset).then_some(Daylight { sunrise, sunset })
    }
}
