//! Common, shared DSP tools for effects, triggers and grain voices.

pub mod delay;
pub mod envelope;
pub mod filters;
