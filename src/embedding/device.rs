use candle_core::Device;
use tracing::{info, warn};

/// Picks the compute device for model inference.
///
/// Tries Metal, then CUDA, when the matching cargo feature is enabled; otherwise (or when
/// no GPU is usable) returns the CPU device.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    match Device::new_metal(0) {
        Ok(device) => {
            info!("Using Metal GPU for inference");
            return device;
        }
        Err(e) => warn!(error = %e, "Metal device unavailable"),
    }

    #[cfg(feature = "cuda")]
    match Device::new_cuda(0) {
        Ok(device) => {
            info!("Using CUDA GPU for inference");
            return device;
        }
        Err(e) => warn!(error = %e, "CUDA device unavailable"),
    }

    if cfg!(any(feature = "metal", feature = "cuda")) {
        warn!("Falling back to CPU device");
    } else {
        info!("No GPU backend compiled, using CPU device");
    }
    Device::Cpu
}
