//! An eight second miniature chase.
//!
//! Everything that moves is a function of one clock: the primary actor
//! follows an arc-length parametrised Catmull-Rom spline, the secondary
//! actor trails it on its own parametric sweep, a camera rig eases after
//! the primary and two caption lines come and go. The static diorama is
//! plain data built once; the renderers only read it.

pub mod actors;
pub mod app;
pub mod camera;
pub mod captions;
pub mod choreography;
pub mod diorama;
pub mod director;
pub mod mesh;
pub mod particles;
pub mod path;
pub mod pose;
pub mod render;
pub mod scene;
pub mod timeline;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use actors::{PrimaryActor, PrimaryPose, SecondaryActor, SecondaryPose};
pub use camera::{CameraPose, CameraRig, RigConfig};
pub use captions::{Caption, CaptionTrack};
pub use choreography::{Choreography, Poses};
pub use diorama::{Diorama, DioramaHandles};
pub use director::{Director, FrameState};
pub use path::{CatmullRomCurve, CurveError, CurveKind};
pub use pose::Pose;
pub use render::{CameraParams, Renderer};
pub use scene::{Scene, SceneNode};
pub use timeline::{Clock, Tick, TimeSource, DURATION_S};
