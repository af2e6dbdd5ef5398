use std::thread;
use std::time::Duration;

/// 阻塞等待，测试里替换成记录器
pub trait Pause {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// 有界的"等待后再查"策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub rechecks: u32,
    /// 每次重查前的等待
    pub delay: Duration,
}

impl RetryPolicy {
    /// 命令发出后的确认：最多再查一次，间隔 1 秒
    pub const CONFIRM: RetryPolicy = RetryPolicy {
        rechecks: 1,
        delay: Duration::from_secs(1),
    };

    /// 先检查一次；不满足时按策略等待后重查。返回最后一次观察到的值
    pub fn confirm<T, E, F, D>(&self, pause: &dyn Pause, mut check: F, done: D) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        D: Fn(&T) -> bool,
    {
        let mut observed = check()?;
        for _ in 0..self.rechecks {
            if done(&observed) {
                break;
            }
            log::debug!("Not settled yet, rechecking in {:?}", self.delay);
            pause.pause(self.delay);
            observed = check()?;
        }
        Ok(observed)
    }
}
