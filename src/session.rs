//! Runs the [`Controller`] against real time and a real server: debounced
//! typing, platform changes and the preview button all end up here, and
//! fetches run on the tokio runtime.

use crate::api::PreviewClient;
use crate::controller::{self, Controller, PreviewCompletion, PreviewSurface, Trigger};
use crate::debounce::Debouncer;
use crate::validate::Platform;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

enum SessionEvent {
    /// The debounce window for edit number `n` closed.
    Settled(u64),
    Fetched(PreviewCompletion),
}

pub struct PreviewSession<S> {
    controller: Controller<S>,
    client: PreviewClient,
    debouncer: Debouncer,
    rt: Handle,
    tx: Sender<SessionEvent>,
    rx: Receiver<SessionEvent>,
    wake: Arc<dyn Fn() + Send + Sync>,
    edits: u64,
    // Edits up to this one were already covered by a non-typing preview.
    absorbed: u64,
}

impl<S: PreviewSurface> PreviewSession<S> {
    /// `wake` is called from background tasks whenever [`poll`](Self::poll)
    /// has something new to apply.
    pub fn new(
        controller: Controller<S>,
        client: PreviewClient,
        rt: Handle,
        wait: Duration,
        wake: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            controller,
            client,
            debouncer: Debouncer::new(rt.clone(), wait),
            rt,
            tx,
            rx,
            wake: Arc::new(wake),
            edits: 0,
            absorbed: 0,
        }
    }

    pub fn controller(&self) -> &Controller<S> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller<S> {
        &mut self.controller
    }

    pub fn set_client(&mut self, client: PreviewClient) {
        self.client = client;
    }

    /// True while an edit is waiting for the input to settle.
    pub fn is_settling(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn url_edited(&mut self, url: &str) {
        self.controller.set_url(url);
        self.edits += 1;
        let edit = self.edits;
        let tx = self.tx.clone();
        let wake = self.wake.clone();
        self.debouncer.call(move || {
            if tx.send(SessionEvent::Settled(edit)).is_ok() {
                wake();
            }
        });
    }

    pub fn set_platform(&mut self, platform: Platform) {
        if self.controller.set_platform(platform) {
            self.start(Trigger::PlatformChange);
        }
    }

    /// The preview button: fetch `url` now.
    pub fn preview_now(&mut self, url: &str) {
        self.controller.set_url(url);
        self.start(Trigger::Explicit);
    }

    /// Apply whatever the background tasks produced since the last call.
    pub fn poll(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                SessionEvent::Settled(edit) if edit <= self.absorbed => {
                    debug!(edit, "typing already covered by an earlier preview");
                }
                SessionEvent::Settled(_) => self.start(Trigger::Typing),
                SessionEvent::Fetched(done) => {
                    self.controller.complete_preview(done);
                }
            }
        }
    }

    fn start(&mut self, trigger: Trigger) {
        if trigger != Trigger::Typing {
            // this request already reflects every edit made so far
            self.debouncer.cancel();
            self.absorbed = self.edits;
        }
        let Some(ticket) = self.controller.begin_preview(trigger) else {
            return;
        };
        let client = self.client.clone();
        let tx = self.tx.clone();
        let wake = self.wake.clone();
        self.rt.spawn(async move {
            let done = controller::fetch(&client, ticket).await;
            if tx.send(SessionEvent::Fetched(done)).is_ok() {
                wake();
            }
        });
    }
}
