use crate::sdk::AvSdk;
use common::MediaKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Periodic SDK buffer maintenance.
///
/// Within each cycle the video buffer is cleared at the half-way mark and the
/// audio buffer at the end, so each kind is cleared once per cycle.
pub struct MaintenanceTask {
    sdk: Arc<dyn AvSdk>,
    av_index: i32,
    cycle: Duration,
}

impl MaintenanceTask {
    pub fn new(sdk: Arc<dyn AvSdk>, av_index: i32, cycle: Duration) -> Self {
        Self {
            sdk,
            av_index,
            cycle,
        }
    }

    /// Runs until aborted
    pub async fn run(self) {
        let half = self.cycle / 2;
        info!("🧹 Buffer maintenance started (cycle {:?})", self.cycle);

        let mut ticker = interval_at(Instant::now() + half, half);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut next = MediaKind::Video;
        loop {
            ticker.tick().await;
            match next {
                MediaKind::Video => {
                    self.sdk.clean_video_buf(self.av_index);
                    debug!("🧹 Cleared SDK video buffer");
                    next = MediaKind::Audio;
                }
                MediaKind::Audio => {
                    self.sdk.clean_audio_buf(self.av_index);
                    debug!("🧹 Cleared SDK audio buffer");
                    next = MediaKind::Video;
                }
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSdk;

    const CYCLE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_first_clear_is_video_half_a_cycle_in() {
        let sdk = Arc::new(MockSdk::new());
        let started = Instant::now();
        let task = MaintenanceTask::new(sdk.clone(), 0, CYCLE).spawn();

        tokio::time::sleep(CYCLE / 2 - Duration::from_millis(1)).await;
        assert!(sdk.cleans().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let cleans = sdk.cleans();
        assert_eq!(cleans.len(), 1);
        assert_eq!(cleans[0].0, MediaKind::Video);
        assert_eq!(cleans[0].1 - started, CYCLE / 2);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_kind_cleared_once_per_cycle() {
        let sdk = Arc::new(MockSdk::new());
        let task = MaintenanceTask::new(sdk.clone(), 0, CYCLE).spawn();

        tokio::time::sleep(CYCLE * 5 + Duration::from_millis(1)).await;
        task.abort();

        let cleans = sdk.cleans();
        for kind in [MediaKind::Video, MediaKind::Audio] {
            let times: Vec<Instant> = cleans
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, at)| *at)
                .collect();
            assert_eq!(times.len(), 5, "{} clears", kind);
            // Never faster than one cycle
            for pair in times.windows(2) {
                assert!(pair[1] - pair[0] >= CYCLE);
            }
        }

        // Kinds alternate, starting with video
        for (i, (kind, _)) in cleans.iter().enumerate() {
            let expected = if i % 2 == 0 {
                MediaKind::Video
            } else {
                MediaKind::Audio
            };
            assert_eq!(*kind, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_stops_clearing() {
        let sdk = Arc::new(MockSdk::new());
        let task = MaintenanceTask::new(sdk.clone(), 0, CYCLE).spawn();

        tokio::time::sleep(CYCLE).await;
        task.abort();
        let _ = task.await;
        let count = sdk.cleans().len();

        tokio::time::sleep(CYCLE * 3).await;
        assert_eq!(sdk.cleans().len(), count);
    }
}
