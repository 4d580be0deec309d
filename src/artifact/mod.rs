//! Artifact builders.
//!
//! - `rootfs` - Stages the BusyBox tree plus init binary into the root
//!   filesystem
//! - `image` - Provisions a raw ext4 disk image and copies the rootfs
//!   onto it

pub mod image;
pub mod rootfs;

pub use image::provision_image;
pub use rootfs::stage_rootfs;
