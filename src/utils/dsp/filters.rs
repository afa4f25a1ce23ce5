//! Filters used by effects and triggers.

pub mod biquad;
