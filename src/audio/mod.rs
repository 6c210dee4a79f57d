pub mod assemble;
pub mod clip;
pub mod device;
pub mod effects;

pub use assemble::Assembler;
pub use clip::{segment_spec, Clip};
pub use device::{AudioPlayer, NullPlayer, Recorder};
pub use effects::EffectLibrary;

pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
