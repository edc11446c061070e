use crate::accessory::{AccessoryStore, Slot};
use crate::anchors::{self, Anchors};
use crate::config::{AnchorConfig, Config, GatePolicy};
use crate::landmarks::LandmarkSet;
use crate::shapes::point::PointF32;
use crate::shapes::rect::RectF32;
use anyhow::Result;
use image::imageops::{FilterType, resize};
use image::{Rgba, RgbaImage};
use imageproc::drawing;
use std::collections::HashMap;
use tracing::{Level, debug, span, trace};

pub mod surface;

pub use surface::Surface;

/// An accessory already resized for drawing, valid while the slot's load
/// token is unchanged.
#[derive(Debug, Clone)]
struct Scaled {
    token: u64,
    img: RgbaImage,
}

#[derive(Debug, Clone)]
pub struct Compositor {
    earring_scale: f32,
    necklace_scale: f32,
    anchors: AnchorConfig,
    gate: GatePolicy,
    cache: HashMap<Slot, Scaled>,
}

impl Compositor {
    pub fn new(config: &Config) -> Self {
        Self {
            earring_scale: config.earring_scale,
            necklace_scale: config.necklace_scale,
            anchors: config.anchors,
            gate: config.gate,
            cache: HashMap::new(),
        }
    }

    pub fn scale(&self, slot: Slot) -> f32 {
        match slot {
            Slot::Earring => self.earring_scale,
            Slot::Necklace => self.necklace_scale,
        }
    }

    /// Clears `surface` and draws every ready accessory for the stabilized
    /// landmarks. Returns the number of images drawn.
    pub fn render<S: Surface>(
        &mut self,
        stabilized: Option<&LandmarkSet>,
        store: &AccessoryStore,
        surface: &mut S,
    ) -> Result<usize> {
        let span = span!(Level::DEBUG, "render");
        let _guard = span.enter();

        surface.clear();
        match stabilized {
            Some(landmarks) => self.draw(landmarks, store, surface),
            None => Ok(0),
        }
    }

    /// Draws accessories over whatever `surface` already holds.
    pub fn draw<S: Surface>(
        &mut self,
        landmarks: &LandmarkSet,
        store: &AccessoryStore,
        surface: &mut S,
    ) -> Result<usize> {
        if self.gate == GatePolicy::AllOrNothing && store.any_pending() {
            trace!("Accessory still loading, holding overlay");
            return Ok(0);
        }

        let (width, height) = surface.dimensions();
        let anchors = anchors::resolve(landmarks, width, height, &self.anchors)?;

        let mut drawn = 0;
        for slot in Slot::ALL {
            // Pending slots have no image, so under PerSlot they simply drop out
            let img = match store.loaded(slot) {
                Some(img) => img,
                None => continue,
            };

            let dests = self.placements(slot, img, &anchors);
            let size = match dests.first() {
                Some(dest) if !dest.is_empty() => {
                    (dest.w.round() as u32, dest.h.round() as u32)
                }
                Some(_) => {
                    trace!("{slot:?} scales below a pixel, skipping");
                    continue;
                }
                None => continue,
            };

            let scaled = self.scaled(slot, store.token(slot), img, size);
            for dest in dests {
                surface.draw_image(scaled, dest);
                drawn += 1;
            }
        }

        Ok(drawn)
    }

    /// `img` at `size`, resized once per load and reused across frames.
    fn scaled(&mut self, slot: Slot, token: u64, img: &RgbaImage, size: (u32, u32)) -> &RgbaImage {
        let fresh = self
            .cache
            .get(&slot)
            .is_some_and(|c| c.token == token && c.img.dimensions() == size);

        if !fresh {
            debug!("Scaling {slot:?} to {}x{}", size.0, size.1);
            let img = if img.dimensions() == size {
                img.clone()
            } else {
                resize(img, size.0, size.1, FilterType::Triangle)
            };
            self.cache.insert(slot, Scaled { token, img });
        }

        &self.cache[&slot].img
    }

    pub fn placements(&self, slot: Slot, img: &RgbaImage, anchors: &Anchors) -> Vec<RectF32> {
        let points: Vec<PointF32> = match slot {
            Slot::Earring => anchors.ears().to_vec(),
            Slot::Necklace => vec![anchors.neck],
        };

        let scale = self.scale(slot);
        let w = img.width() as f32 * scale;
        let h = img.height() as f32 * scale;
        points
            .into_iter()
            .map(|p| RectF32::hanging_from(p, w, h))
            .collect()
    }

    /// Marks the anchor points on `img`. Debug aid only.
    pub fn trace_anchors(&self, landmarks: &LandmarkSet, img: &mut RgbaImage) -> Result<()> {
        let anchors = anchors::resolve(landmarks, img.width(), img.height(), &self.anchors)?;

        for ear in anchors.ears() {
            drawing::draw_filled_circle_mut(
                img,
                (ear.x as i32, ear.y as i32),
                4,
                Rgba([0u8, 255u8, 0u8, 255u8]),
            );
        }
        drawing::draw_filled_circle_mut(
            img,
            (anchors.neck.x as i32, anchors.neck.y as i32),
            4,
            Rgba([255u8, 0u8, 0u8, 255u8]),
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::tests::face_mesh;
    use crate::landmarks::Landmark;

    struct Recorder {
        size: (u32, u32),
        clears: usize,
        draws: Vec<((u32, u32), RectF32)>,
    }

    impl Recorder {
        fn new(w: u32, h: u32) -> Self {
            Self {
                size: (w, h),
                clears: 0,
                draws: Vec::new(),
            }
        }
    }

    impl Surface for Recorder {
        fn dimensions(&self) -> (u32, u32) {
            self.size
        }

        fn clear(&mut self) {
            self.clears += 1;
            self.draws.clear();
        }

        fn draw_image(&mut self, img: &RgbaImage, dest: RectF32) {
            self.draws.push((img.dimensions(), dest));
        }
    }

    fn near(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn solid(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([200, 20, 20, 255]))
    }

    fn store_with(earring: Option<RgbaImage>, necklace: Option<RgbaImage>) -> AccessoryStore {
        let mut store = AccessoryStore::new();
        if let Some(img) = earring {
            let t = store.select(Slot::Earring, Some("e.png".into())).unwrap();
            store.complete(t, Ok(img));
        }
        if let Some(img) = necklace {
            let t = store.select(Slot::Necklace, Some("n.png".into())).unwrap();
            store.complete(t, Ok(img));
        }
        store
    }

    fn mesh() -> LandmarkSet {
        face_mesh((0.2, 0.3), (0.8, 0.3), (0.5, 0.9))
    }

    #[test]
    fn earring_end_to_end() -> Result<()> {
        let mut compositor = Compositor::new(&Config::default());
        let store = store_with(Some(solid(100, 100)), None);
        let mut surface = Recorder::new(1280, 720);

        let drawn = compositor.render(Some(&mesh()), &store, &mut surface)?;
        assert_eq!(drawn, 2);

        let (size, left) = surface.draws[0];
        assert_eq!(size, (7, 7));
        assert!(near(left.w, 7.) && near(left.h, 7.));
        assert!(near(left.left(), 246.5), "{left:?}");
        assert!(near(left.top(), 200.), "{left:?}");

        let (_, right) = surface.draws[1];
        assert!(near(right.left(), 1026.5), "{right:?}");
        assert!(near(right.top(), 200.), "{right:?}");
        Ok(())
    }

    #[test]
    fn necklace_hangs_below_chin() -> Result<()> {
        let mut compositor = Compositor::new(&Config::default());
        let store = store_with(None, Some(solid(200, 100)));
        let mut surface = Recorder::new(1280, 720);

        assert_eq!(compositor.render(Some(&mesh()), &store, &mut surface)?, 1);
        let (_, dest) = surface.draws[0];
        assert!(near(dest.w, 36.) && near(dest.h, 18.));
        assert!(near(dest.left(), 632. - 18.));
        assert!(near(dest.top(), 658.));
        Ok(())
    }

    #[test]
    fn no_landmarks_draws_nothing_but_clears() -> Result<()> {
        let mut compositor = Compositor::new(&Config::default());
        let store = store_with(Some(solid(10, 10)), Some(solid(10, 10)));
        let mut surface = Recorder::new(640, 480);

        assert_eq!(compositor.render(None, &store, &mut surface)?, 0);
        assert_eq!(surface.clears, 1);
        assert!(surface.draws.is_empty());
        Ok(())
    }

    #[test]
    fn pending_slot_blanks_everything_by_default() -> Result<()> {
        let mut compositor = Compositor::new(&Config::default());
        let mut store = store_with(None, Some(solid(100, 100)));
        store.select(Slot::Earring, Some("slow.png".into()));
        let mut surface = Recorder::new(1280, 720);

        assert_eq!(compositor.render(Some(&mesh()), &store, &mut surface)?, 0);
        assert!(surface.draws.is_empty());
        Ok(())
    }

    #[test]
    fn per_slot_gate_still_draws_ready_slot() -> Result<()> {
        let config = Config {
            gate: GatePolicy::PerSlot,
            ..Config::default()
        };
        let mut compositor = Compositor::new(&config);
        let mut store = store_with(None, Some(solid(100, 100)));
        store.select(Slot::Earring, Some("slow.png".into()));
        let mut surface = Recorder::new(1280, 720);

        assert_eq!(compositor.render(Some(&mesh()), &store, &mut surface)?, 1);
        Ok(())
    }

    #[test]
    fn cleared_slot_does_not_block() -> Result<()> {
        let mut compositor = Compositor::new(&Config::default());
        let mut store = store_with(Some(solid(100, 100)), Some(solid(100, 100)));
        store.clear(Slot::Earring);
        let mut surface = Recorder::new(1280, 720);

        assert_eq!(compositor.render(Some(&mesh()), &store, &mut surface)?, 1);
        Ok(())
    }

    #[test]
    fn render_clears_previous_pixels() -> Result<()> {
        let mut compositor = Compositor::new(&Config::default());
        let store = AccessoryStore::new();
        let mut surface = RgbaImage::from_pixel(32, 32, Rgba([1, 2, 3, 255]));

        compositor.render(Some(&mesh()), &store, &mut surface)?;
        assert!(surface.pixels().all(|p| p.0 == [0, 0, 0, 0]));
        Ok(())
    }

    #[test]
    fn paints_earring_pixels() -> Result<()> {
        let mut compositor = Compositor::new(&Config::default());
        let store = store_with(Some(solid(100, 100)), None);
        let mut surface = RgbaImage::new(1280, 720);

        compositor.render(Some(&mesh()), &store, &mut surface)?;
        // 7x7 from (247, 200)
        assert_eq!(surface.get_pixel(250, 203), &Rgba([200, 20, 20, 255]));
        assert_eq!(surface.get_pixel(1030, 203), &Rgba([200, 20, 20, 255]));
        assert_eq!(surface.get_pixel(240, 203), &Rgba([0, 0, 0, 0]));
        assert_eq!(surface.get_pixel(250, 198), &Rgba([0, 0, 0, 0]));
        Ok(())
    }

    #[test]
    fn short_landmark_set_is_an_error() {
        let mut compositor = Compositor::new(&Config::default());
        let store = store_with(Some(solid(10, 10)), None);
        let short: LandmarkSet = vec![Landmark::default(); 3].into();
        let mut surface = Recorder::new(100, 100);

        assert!(compositor.render(Some(&short), &store, &mut surface).is_err());
    }

    #[test]
    fn scaled_image_reused_until_reselect() -> Result<()> {
        let mut compositor = Compositor::new(&Config::default());
        let mut store = store_with(Some(solid(100, 100)), None);
        let mut surface = Recorder::new(1280, 720);

        compositor.render(Some(&mesh()), &store, &mut surface)?;
        let first = compositor.cache[&Slot::Earring].img.as_ptr();
        compositor.render(Some(&mesh()), &store, &mut surface)?;
        assert_eq!(compositor.cache[&Slot::Earring].img.as_ptr(), first);

        let t = store.select(Slot::Earring, Some("big.png".into())).unwrap();
        store.complete(t, Ok(solid(200, 200)));
        compositor.render(Some(&mesh()), &store, &mut surface)?;
        assert_eq!(compositor.cache[&Slot::Earring].img.dimensions(), (14, 14));
        assert_eq!(surface.draws[0].0, (14, 14));
        Ok(())
    }

    #[test]
    fn traces_anchor_points() -> Result<()> {
        let compositor = Compositor::new(&Config::default());
        let mut img = RgbaImage::new(1280, 720);
        compositor.trace_anchors(&mesh(), &mut img)?;

        assert_eq!(img.get_pixel(250, 200), &Rgba([0, 255, 0, 255]));
        assert_eq!(img.get_pixel(632, 658), &Rgba([255, 0, 0, 255]));
        assert_eq!(img.get_pixel(10, 10), &Rgba([0, 0, 0, 0]));
        Ok(())
    }
}
