//! Collaborator traits between the core and the outside world.

pub mod messenger;
pub mod picture;

pub use messenger::Messenger;
pub use picture::{PictureSource, Renderer, Translator};
