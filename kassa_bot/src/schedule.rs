//! The service window: when it is closed, ordinary users are turned away until the operator
//! extends it. The schedule is an explicit value passed by reference; there is no global flag.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::*;
use tokio::{sync::Mutex, task::JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowState {
    AlwaysOn,
    Open { until: DateTime<Utc> },
    Closed,
}

#[derive(Clone)]
pub struct ServiceSchedule {
    state: Arc<Mutex<WindowState>>,
}

impl ServiceSchedule {
    /// A schedule that never closes. The worker has nothing to do for it.
    pub fn always_on() -> Self {
        Self { state: Arc::new(Mutex::new(WindowState::AlwaysOn)) }
    }

    pub fn closed() -> Self {
        Self { state: Arc::new(Mutex::new(WindowState::Closed)) }
    }

    /// Opens (or lengthens) the window. Extending an open window adds to the remaining time;
    /// extending a closed one counts from now.
    pub async fn extend(&self, window: Duration) -> DateTime<Utc> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let until = match *state {
            WindowState::Open { until } if until > now => until + window,
            _ => now + window,
        };
        *state = WindowState::Open { until };
        info!("🕰️ Service window extended until {until}");
        until
    }

    pub async fn is_active(&self) -> bool {
        match *self.state.lock().await {
            WindowState::AlwaysOn => true,
            WindowState::Open { until } => Utc::now() < until,
            WindowState::Closed => false,
        }
    }

    /// Flips an elapsed window to closed. Returns whether the flip happened, so the caller can
    /// log the transition exactly once.
    pub async fn expire_if_due(&self) -> bool {
        let mut state = self.state.lock().await;
        if let WindowState::Open { until } = *state {
            if Utc::now() >= until {
                *state = WindowState::Closed;
                return true;
            }
        }
        false
    }
}

/// Starts the window expiry worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_schedule_worker(schedule: ServiceSchedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        info!("🕰️ Service window worker started");
        loop {
            timer.tick().await;
            if schedule.expire_if_due().await {
                info!("🕰️ The service window has elapsed. New orders are paused until extended");
            }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn always_on_never_expires() {
        let schedule = ServiceSchedule::always_on();
        assert!(schedule.is_active().await);
        assert!(!schedule.expire_if_due().await);
        assert!(schedule.is_active().await);
    }

    #[tokio::test]
    async fn closed_until_extended() {
        let schedule = ServiceSchedule::closed();
        assert!(!schedule.is_active().await);
        schedule.extend(Duration::minutes(30)).await;
        assert!(schedule.is_active().await);
        assert!(!schedule.expire_if_due().await);
    }

    #[tokio::test]
    async fn elapsed_windows_close_once() {
        let schedule = ServiceSchedule::closed();
        // A negative extension opens a window that is already in the past
        schedule.extend(Duration::seconds(-1)).await;
        assert!(!schedule.is_active().await);
        assert!(schedule.expire_if_due().await);
        assert!(!schedule.expire_if_due().await);
    }

    #[tokio::test]
    async fn extensions_accumulate() {
        let schedule = ServiceSchedule::closed();
        let first = schedule.extend(Duration::minutes(10)).await;
        let second = schedule.extend(Duration::minutes(10)).await;
        assert_eq!(second - first, Duration::minutes(10));
    }
}
