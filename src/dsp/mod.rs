//! DSP core — pure Rust procedural synthesis and PCM playback.
//!
//! Sources are sampled as functions of time in seconds. The same code drives
//! real-time playback through an [`device::OutputDevice`] and offline
//! rendering to WAV or raw f32 buffers (used by the WASM bindings).

pub mod adapter;
pub mod chord;
pub mod device;
pub mod engine;
pub mod envelope;
pub mod generator;
pub mod lfo;
pub mod mixer;
pub mod pitch;
pub mod quantize;
pub mod renderer;
pub mod source;
pub mod synth;
