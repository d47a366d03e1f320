//! Tensor backend chosen at compile time.
//!
//! `cuda` wins over `wgpu`; without either feature the CPU `ndarray` backend
//! is used.

use burn::tensor::backend::Backend;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        pub type SelectedBackend = burn::backend::Cuda;
        pub const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        pub type SelectedBackend = burn::backend::Wgpu;
        pub const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        pub type SelectedBackend = burn::backend::NdArray;
        pub const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}

pub type SelectedDevice = <SelectedBackend as Backend>::Device;

/// The default device of the selected backend.
pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}

/// One-line description for `segeval info` and the startup log.
pub fn describe(device: &SelectedDevice) -> String {
    format!("{BACKEND_NAME} on {device:?}")
}
