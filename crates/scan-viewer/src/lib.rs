// src/lib.rs
//! Interactive viewer for photo scans.
//!
//! Photos go through the `photoscan` pipeline on a worker thread; the
//! resulting point cloud is drawn by a [`session::ViewerSession`] that owns
//! the renderer, camera, orbit controls and lights for one window.

pub mod app;
pub mod camera;
pub mod config;
pub mod data;
pub mod input;
pub mod renderer;
pub mod scene;
pub mod session;
pub mod ui;
