//! Periodic preview height reporting

use crate::host::{HostEvent, HostSink};
use crate::reconcile::RenderSurface;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Polls the render surface height and reports changes to the host
pub struct ResizeWatcher {
    handle: JoinHandle<()>,
}

impl ResizeWatcher {
    /// Spawn the watcher; the first poll happens one interval from now
    pub fn start(
        surface: Arc<dyn RenderSurface>,
        sink: Arc<dyn HostSink>,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut last_height = 0;
            loop {
                ticker.tick().await;

                let height = surface.measured_height();
                if height != last_height {
                    sink.dispatch(HostEvent::Resize { height });
                }
                last_height = height;
            }
        });

        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ChannelSink;
    use crate::reconcile::HeadlessSurface;

    #[tokio::test(start_paused = true)]
    async fn test_reports_only_changes() {
        let surface = Arc::new(HeadlessSurface::new());
        let (sink, mut rx) = ChannelSink::new();
        let watcher = ResizeWatcher::start(surface.clone(), Arc::new(sink), Duration::from_secs(5));

        surface.set_height(300);
        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert_eq!(rx.try_recv().ok(), Some(HostEvent::Resize { height: 300 }));

        // unchanged height is not reported
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());

        surface.set_height(420);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rx.try_recv().ok(), Some(HostEvent::Resize { height: 420 }));

        watcher.stop();
        surface.set_height(10);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(rx.try_recv().is_err());
        assert!(!watcher.is_running());
    }
}
