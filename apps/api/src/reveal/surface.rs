use tokio::sync::watch;

use super::{RevealFrame, Surface};

/// A surface that keeps the latest frame and lets any number of readers follow it.
/// Backs the HTTP snapshot and SSE endpoints.
#[derive(Debug)]
pub struct ChannelSurface {
    tx: watch::Sender<RevealFrame>,
}

impl ChannelSurface {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(RevealFrame::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> RevealFrame {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RevealFrame> {
        self.tx.subscribe()
    }
}

impl Default for ChannelSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for ChannelSurface {
    fn render(&self, frame: RevealFrame) {
        self.tx.send_replace(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(markup: &str, shown: usize) -> RevealFrame {
        RevealFrame {
            markup: markup.to_string(),
            words_shown: shown,
            total_words: 2,
            done: shown == 2,
        }
    }

    #[test]
    fn test_snapshot_tracks_latest_frame() {
        let surface = ChannelSurface::new();
        assert_eq!(surface.snapshot(), RevealFrame::default());

        surface.render(frame("a", 1));
        surface.render(frame("a b", 2));

        assert_eq!(surface.snapshot().markup, "a b");
        assert!(surface.snapshot().done);
    }

    #[tokio::test]
    async fn test_subscriber_sees_new_frames() {
        let surface = ChannelSurface::new();
        let mut rx = surface.subscribe();

        surface.render(frame("a", 1));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().markup, "a");
    }
}
