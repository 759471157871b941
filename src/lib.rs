//! Core of the Cardia ECG live demo: a rule-based label scorer, a synthetic
//! ECG trace generator and a simulated batch classifier, tied together by an
//! explicit workspace state container and an async session driver.

pub mod batch;
pub mod cancel;
pub mod config;
pub mod console;
pub mod logging;
pub mod params;
pub mod phase;
pub mod sampler;
pub mod scorer;
pub mod session;
pub mod source;
pub mod synth;
pub mod workspace;
