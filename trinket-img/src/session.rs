use crate::accessory::{AccessoryStore, ImageLoader, LoadTicket, Slot, spawn_load};
use crate::catalog::Catalog;
use crate::compositor::Compositor;
use crate::config::Config;
use crate::landmarks::{Detection, LandmarkSet};
use crate::smoother::Smoother;
use anyhow::{Error, Result};
use flume::{Receiver, Selector, Sender};
use image::RgbaImage;
use image::imageops::overlay;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Level, debug, error, info, span, trace};

/// Everything that can happen to a session. Producers on other threads only
/// ever send these; all state changes happen on the thread running the
/// session. The session owns the receiving end and ends once every sender is
/// dropped.
#[derive(Debug)]
pub enum Event {
    /// Result from the external face detector
    Detection(Detection),
    /// Overlay surface must match the video frame
    Resize { width: u32, height: u32 },
    /// Redraw the overlay on its own
    RenderTick,
    /// A camera frame to composite the overlay onto
    Frame(RgbaImage),
    Select { slot: Slot, source: Option<String> },
    Shutdown,
}

/// Whether the caller should keep feeding the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// [`Event::Shutdown`] was taken off the queue; events behind it are
    /// left queued
    Shutdown,
}

type Completion = (LoadTicket, Result<RgbaImage>);

enum Inbound {
    Event(Event),
    Loaded(Completion),
    /// No event sender is left
    Closed,
}

/// The mutable half of a session.
#[derive(Debug)]
pub struct RenderState {
    pub smoother: Smoother,
    pub store: AccessoryStore,
    pub overlay: RgbaImage,
}

impl RenderState {
    pub fn new(config: &Config) -> Self {
        Self {
            smoother: Smoother::new(config.smoothing_factor),
            store: AccessoryStore::new(),
            overlay: RgbaImage::new(0, 0),
        }
    }

    pub fn stabilized(&self) -> Option<&LandmarkSet> {
        self.smoother.state()
    }
}

pub struct Session {
    state: RenderState,
    compositor: Compositor,
    loader: Arc<dyn ImageLoader>,
    trace_anchors: bool,
    in_flight: usize,
    events: Receiver<Event>,
    done_tx: Sender<Completion>,
    done_rx: Receiver<Completion>,
}

impl Session {
    /// `events` is the receiving end of the channel producers (camera,
    /// detector, UI) post to. Image loads report back on a channel of the
    /// session's own.
    pub fn new(config: &Config, loader: Arc<dyn ImageLoader>, events: Receiver<Event>) -> Self {
        let (done_tx, done_rx) = flume::unbounded();
        Self {
            state: RenderState::new(config),
            compositor: Compositor::new(config),
            loader,
            trace_anchors: config.trace_anchors,
            in_flight: 0,
            events,
            done_tx,
            done_rx,
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn overlay(&self) -> &RgbaImage {
        &self.state.overlay
    }

    /// Loads issued but not yet reported back.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn on_detection(&mut self, detection: Detection) {
        self.state.smoother.apply(detection);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.state.overlay.dimensions() != (width, height) {
            info!("Resizing overlay to {width}x{height}");
            self.state.overlay = RgbaImage::new(width, height);
        }
    }

    /// Fire and forget: the slot switches immediately, the image is applied
    /// by whichever of `pump`, `run` or `settle` sees it arrive.
    pub fn select(&mut self, slot: Slot, source: Option<String>) {
        let ticket = match self.state.store.select(slot, source) {
            Some(ticket) => ticket,
            None => return,
        };

        self.in_flight += 1;
        let done = self.done_tx.clone();
        spawn_load(Arc::clone(&self.loader), ticket, move |ticket, result| {
            // Session gone means nobody is left to care about the image
            let _ = done.send((ticket, result));
        });
    }

    pub fn on_loaded(&mut self, ticket: LoadTicket, result: Result<RgbaImage>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.state.store.complete(ticket, result);
    }

    /// Starts browsing a catalog category. Both slots are emptied and the
    /// category's sources are returned for the caller to pick from.
    pub fn browse<'a>(&mut self, catalog: &'a Catalog, category: &str) -> Result<&'a [String]> {
        self.state.store.clear_all();
        catalog.options(category)
    }

    /// Picks option `idx` of `category` into the slot the category feeds.
    pub fn choose(&mut self, catalog: &Catalog, category: &str, idx: usize) -> Result<Slot> {
        let options = catalog.options(category)?;
        let source = options.get(idx).ok_or_else(|| {
            Error::msg(format!(
                "Category {category} has {} designs, no design #{idx}",
                options.len()
            ))
        })?;

        let slot = Slot::for_category(category);
        self.select(slot, Some(source.clone()));
        Ok(slot)
    }

    /// Redraws the overlay from the current stabilized landmarks.
    pub fn render(&mut self) -> Result<&RgbaImage> {
        let RenderState {
            smoother,
            store,
            overlay,
        } = &mut self.state;
        let drawn = self.compositor.render(smoother.state(), store, overlay)?;
        trace!("Drew {drawn} accessories");

        if self.trace_anchors {
            if let Some(landmarks) = smoother.state() {
                self.compositor.trace_anchors(landmarks, overlay)?;
            }
        }

        Ok(&self.state.overlay)
    }

    /// Resizes to `frame`, redraws the overlay and lays it over the frame.
    pub fn composite(&mut self, mut frame: RgbaImage) -> Result<RgbaImage> {
        let span = span!(Level::DEBUG, "composite");
        let _guard = span.enter();

        self.resize(frame.width(), frame.height());
        let overlay_img = self.render()?;
        overlay(&mut frame, overlay_img, 0, 0);
        Ok(frame)
    }

    /// Still capture of `frame` with the current accessories drawn on it.
    /// The live overlay is left alone.
    pub fn snapshot(&mut self, frame: &RgbaImage) -> Result<RgbaImage> {
        let landmarks = self
            .state
            .stabilized()
            .ok_or_else(|| Error::msg("Face not detected. Please try again."))?;

        let mut img = frame.clone();
        self.compositor.draw(landmarks, &self.state.store, &mut img)?;
        if self.trace_anchors {
            self.compositor.trace_anchors(landmarks, &mut img)?;
        }
        Ok(img)
    }

    /// Applies one event. Returns the image to display, if the event
    /// produced one, and `None` for everything else. `Shutdown` changes
    /// nothing here; the loops below stop on it.
    pub fn dispatch(&mut self, event: Event) -> Result<Option<RgbaImage>> {
        match event {
            Event::Detection(d) => self.on_detection(d),
            Event::Resize { width, height } => self.resize(width, height),
            Event::RenderTick => return Ok(Some(self.render()?.clone())),
            Event::Frame(frame) => return Ok(Some(self.composite(frame)?)),
            Event::Select { slot, source } => self.select(slot, source),
            Event::Shutdown => {}
        }

        Ok(None)
    }

    /// Next load completion or event, waiting until `deadline` if given.
    /// `None` means the deadline passed. Once every event sender is gone
    /// only load completions are waited for.
    fn next(&self, deadline: Option<Instant>) -> Option<Inbound> {
        let events_open = !(self.events.is_disconnected() && self.events.is_empty());
        if !events_open && self.in_flight == 0 {
            return Some(Inbound::Closed);
        }

        let mut selector = Selector::new().recv(&self.done_rx, |done| match done {
            Ok(done) => Inbound::Loaded(done),
            // The session holds a sender of its own
            Err(_) => Inbound::Closed,
        });
        if events_open {
            selector = selector.recv(&self.events, |event| match event {
                Ok(event) => Inbound::Event(event),
                Err(_) => Inbound::Closed,
            });
        }

        match deadline {
            Some(deadline) => selector.wait_deadline(deadline).ok(),
            None => Some(selector.wait()),
        }
    }

    /// Handles everything already queued without waiting for more. Stops at
    /// [`Event::Shutdown`].
    pub fn pump<F>(&mut self, mut on_output: F) -> Result<Flow>
    where
        F: FnMut(RgbaImage) -> Result<()>,
    {
        let done = self.done_rx.clone();
        for (ticket, result) in done.try_iter() {
            self.on_loaded(ticket, result);
        }

        let events = self.events.clone();
        for event in events.try_iter() {
            if matches!(event, Event::Shutdown) {
                debug!("Shutdown while pumping");
                return Ok(Flow::Shutdown);
            }
            if let Some(img) = self.dispatch(event)? {
                on_output(img)?;
            }
        }

        Ok(Flow::Continue)
    }

    /// Blocks handling events until [`Event::Shutdown`], or until every event
    /// sender is dropped and no load is outstanding. Per-event failures are
    /// logged and do not stop the loop; `on_output` errors do.
    pub fn run<F>(&mut self, mut on_output: F) -> Result<()>
    where
        F: FnMut(RgbaImage) -> Result<()>,
    {
        loop {
            let event = match self.next(None) {
                Some(Inbound::Event(event)) => event,
                Some(Inbound::Loaded((ticket, result))) => {
                    self.on_loaded(ticket, result);
                    continue;
                }
                Some(Inbound::Closed) if self.in_flight > 0 => continue,
                Some(Inbound::Closed) | None => {
                    debug!("Event senders gone, session ending");
                    break;
                }
            };

            if matches!(event, Event::Shutdown) {
                debug!("Session shutting down");
                break;
            }

            match self.dispatch(event) {
                Ok(Some(img)) => on_output(img)?,
                Ok(None) => {}
                Err(e) => error!("Failed to handle event: {e:?}"),
            }
        }

        Ok(())
    }

    /// Handles events until no image load is outstanding, or `timeout`
    /// passes. Stops early at [`Event::Shutdown`]; images produced meanwhile
    /// are dropped.
    pub fn settle(&mut self, timeout: Duration) -> Result<Flow> {
        let deadline = Instant::now() + timeout;

        while self.in_flight > 0 {
            match self.next(Some(deadline)) {
                Some(Inbound::Loaded((ticket, result))) => self.on_loaded(ticket, result),
                Some(Inbound::Event(Event::Shutdown)) => {
                    debug!("Shutdown while waiting on {} loads", self.in_flight);
                    return Ok(Flow::Shutdown);
                }
                Some(Inbound::Event(event)) => {
                    self.dispatch(event)?;
                }
                Some(Inbound::Closed) => {}
                None => {
                    return Err(Error::msg(format!(
                        "{} image loads still pending after {timeout:?}",
                        self.in_flight
                    )));
                }
            }
        }

        Ok(Flow::Continue)
    }
}
