pub mod accessory;
pub mod anchors;
pub mod catalog;
pub mod compositor;
pub mod config;
pub mod landmarks;
pub mod session;
pub mod shapes;
pub mod smoother;
pub mod snapshot;
