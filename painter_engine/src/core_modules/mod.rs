pub mod background;
pub mod brush;
pub mod depth;
pub mod hud;
pub mod noise_field;
pub mod painter;
pub mod palette;
pub mod pose_resolver;
pub mod skeleton;
pub mod surface;
pub mod vector;
