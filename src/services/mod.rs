/// Display and sound output towards the stations.
pub mod announcer;
/// Turn loop and phase-routed event dispatch.
pub mod controller;
/// Health report.
pub mod health_service;
/// Tunes played on the station buzzers.
pub mod melodies;
/// Win detection and minigame rewards.
pub mod scoring;
/// Station WebSocket lifecycle.
pub mod websocket_service;
