// UI module - presentation layer for the scanner screens
//
// This module contains:
// - ScanView: everything one screen draws, rendered from a ScanSession
// - ViewBridge: bounded hand-off of views from tokio tasks to the drawing thread
// - ScreenController: maps screen intents to scan commands and keeps the view current

pub mod bridge;
pub mod controller;
pub mod view;

pub use bridge::{VIEW_CHANNEL_CAPACITY, ViewBridge};
pub use controller::ScreenController;
pub use view::{ResultCard, ScanView};
