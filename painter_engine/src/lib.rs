// THEORY:
// This file is the main entry point for the `painter_engine` library crate.
// It exports the `Session` and its configuration (`SessionConfig`, `FrameReport`)
// as the high-level interface of the painting engine, together with the
// `PoseFeed` that carries skeletons from an external pose estimator into the
// frame loop.
//
// The building blocks (`core_modules`) are public so hosts can drive a single
// painter, plan marks without a raster, or plug in their own drawing surface,
// but a typical host only needs `Session::tick` and `Session::compose`.

pub mod core_modules;
pub mod error;
pub mod pose_feed;
pub mod session;

pub use error::{EngineError, EngineResult};
pub use session::{FrameReport, Session, SessionConfig};
