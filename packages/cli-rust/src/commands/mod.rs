//! CLI command implementations

mod config;
mod convert;
mod image;
mod init;
mod serve;

pub use config::{ConfigArgs, cmd_config};
pub use convert::{ConvertArgs, cmd_convert};
pub use image::{ImageArgs, cmd_image};
pub use init::{InitArgs, cmd_init};
pub use serve::{ServeArgs, cmd_serve, effective_config};
