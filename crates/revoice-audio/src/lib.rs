//! Sample-level audio processing for revoice
//!
//! Everything here operates on mono `f32` sample buffers:
//! - **File I/O** via hound (WAV) and symphonia (compressed stems)
//! - **Resampling** via rubato
//! - **Silence detection** for trimming synthesized clips
//! - **Fades** to keep clip seams click-free
//! - **Composer** building the sequential speech track
//! - **Background mixer** splicing original and accompaniment stems
//!   with crossfades

pub mod compose;
pub mod fade;
pub mod mix;
pub mod resampling;
pub mod silence;
pub mod wav;

pub use compose::compose_track;
pub use fade::{fade_in, fade_out};
pub use mix::{merge_replacement_spans, mix_background, MixOptions};
pub use silence::{strip_silence, strip_trailing_silence, SilenceOptions};
pub use wav::{load_audio, wav_duration, write_wav, AudioBuffer};
