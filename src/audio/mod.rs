pub mod decode;
pub mod stft;
