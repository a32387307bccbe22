pub mod suno;
