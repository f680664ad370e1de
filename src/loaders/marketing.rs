use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use failure::Error as FailureError;

use crate::config;
use crate::models::UserLogin;
use crate::sentry_integration::log_and_capture_error;
use crate::services::{MarketingService, MarketingServiceImpl, ServiceContext};

/// Periodically sends abandoned checkout reminders and inactivity emails.
#[derive(Clone)]
pub struct MarketingNotificationsLoader {
    busy: Arc<AtomicBool>,
    ctx: ServiceContext,
    config: Option<config::Marketing>,
    duration: Duration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MarketingStepReport {
    pub abandoned_checkout_reminders: usize,
    pub inactivity_notifications: usize,
}

impl MarketingNotificationsLoader {
    const DEFAULT_DURATION: u64 = 60 * 60;

    pub fn new(ctx: ServiceContext) -> Self {
        let config = ctx.config.marketing.clone();
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            duration: Self::duration(config.as_ref()),
            config,
            ctx,
        }
    }

    /// Runs forever; a tick that arrives while the previous step is still
    /// running is skipped.
    pub async fn start(self) {
        let settings = match self.config.clone() {
            Some(settings) => settings,
            None => {
                error!("MarketingNotificationsLoader: disabled. Config section [marketing] not set.");
                return;
            }
        };
        info!("MarketingNotificationsLoader started with config {:?}.", settings);

        let mut interval = tokio::time::interval(self.duration);
        loop {
            interval.tick().await;
            if self.busy.swap(true, Ordering::SeqCst) {
                warn!("MarketingNotificationsLoader: tried to ping MarketingNotificationsLoader, but it was busy");
                continue;
            }

            let loader = self.clone();
            let settings = settings.clone();
            tokio::spawn(async move {
                let _idle = BusyGuard(loader.busy.clone());
                match loader.make_step(settings).await {
                    Ok(report) => info!(
                        "MarketingNotificationsLoader: sent {} checkout reminders and {} inactivity notifications",
                        report.abandoned_checkout_reminders, report.inactivity_notifications
                    ),
                    Err(e) => log_and_capture_error(&e),
                }
            });
        }
    }

    pub async fn make_step(&self, settings: config::Marketing) -> Result<MarketingStepReport, FailureError> {
        let service = MarketingServiceImpl::new(self.ctx.clone(), UserLogin::System, settings);
        let abandoned_checkout_reminders = service.remind_abandoned_checkouts().await?;
        let inactivity_notifications = service.notify_inactive_users().await?;
        Ok(MarketingStepReport {
            abandoned_checkout_reminders,
            inactivity_notifications,
        })
    }

    fn duration(config: Option<&config::Marketing>) -> Duration {
        match config {
            Some(config) if config.interval_s == 0 => {
                warn!("MarketingNotificationsLoader: interval_s = 0, using 1 second instead");
                Duration::from_secs(1)
            }
            Some(config) => Duration::from_secs(config.interval_s),
            None => Duration::from_secs(Self::DEFAULT_DURATION),
        }
    }
}

/// Clears the busy flag when the step ends, even if it panicked.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_falls_back_to_an_hour() {
        assert_eq!(MarketingNotificationsLoader::duration(None), Duration::from_secs(3600));

        let settings = config::Marketing {
            interval_s: 900,
            abandoned_after_hours: 24,
            inactivity_days: 90,
        };
        assert_eq!(MarketingNotificationsLoader::duration(Some(&settings)), Duration::from_secs(900));
    }

    #[test]
    fn zero_interval_is_raised_to_one_second() {
        let settings = config::Marketing {
            interval_s: 0,
            abandoned_after_hours: 24,
            inactivity_days: 90,
        };
        assert_eq!(MarketingNotificationsLoader::duration(Some(&settings)), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn busy_flag_is_cleared_after_a_panicking_step() {
        let busy = Arc::new(AtomicBool::new(true));
        let guard_busy = busy.clone();
        let step = tokio::spawn(async move {
            let _idle = BusyGuard(guard_busy);
            panic!("step failed");
        });
        assert!(step.await.is_err());
        assert!(!busy.load(Ordering::SeqCst));
    }
}
