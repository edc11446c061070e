use super::LoadTicket;
use anyhow::{Result, bail};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{Level, span};

pub trait ImageLoader: Send + Sync {
    fn load(&self, source: &str) -> Result<RgbaImage>;
}

/// Reads accessory images from disk. Sources are plain paths or `file://`
/// URLs; relative paths resolve against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    root: Option<PathBuf>,
}

impl FileLoader {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn resolve(&self, source: &str) -> Result<PathBuf> {
        let path = match source.split_once("://") {
            Some(("file", rest)) => Path::new(rest),
            Some((scheme, _)) => bail!("Unsupported image source scheme {scheme:?} in {source}"),
            None => Path::new(source),
        };

        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        })
    }
}

impl ImageLoader for FileLoader {
    fn load(&self, source: &str) -> Result<RgbaImage> {
        let span = span!(Level::DEBUG, "load_image");
        let _guard = span.enter();

        let path = self.resolve(source)?;
        Ok(image::open(path)?.into_rgba8())
    }
}

/// Runs the load for `ticket` off the calling thread and hands the result to
/// `done`. There is no cancellation; superseded loads still finish and are
/// filtered out by the store.
pub fn spawn_load<F>(loader: Arc<dyn ImageLoader>, ticket: LoadTicket, done: F)
where
    F: FnOnce(LoadTicket, Result<RgbaImage>) + Send + 'static,
{
    thread::spawn(move || {
        let result = loader.load(&ticket.source);
        done(ticket, result);
    });
}
