#![allow(dead_code)]

use specwatch::display::{SessionEvent, SpectrogramFrame, Visualizer};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct Recorder {
    pub frames: AtomicUsize,
    pub last_frame: Mutex<Option<SpectrogramFrame>>,
    events: Mutex<Vec<SessionEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&SessionEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| matches(e)).count()
    }
}

impl Visualizer for Recorder {
    fn frame(&self, frame: &SpectrogramFrame) {
        self.frames.fetch_add(1, Ordering::SeqCst);
        *self.last_frame.lock().unwrap() = Some(frame.clone());
    }

    fn event(&self, event: &SessionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
