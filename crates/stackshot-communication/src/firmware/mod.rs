//! Firmware and device protocol implementations
//!
//! - `marlin`: G-code/M-code dialect spoken by the stage (a Marlin 3D printer board)
//! - `ccapi`: REST resources and payloads of the camera control API

pub mod ccapi;
pub mod marlin;
