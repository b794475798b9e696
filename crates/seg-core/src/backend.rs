//! Backend selection for Burn.
//!
//! Training runs on `Autodiff<NdArray>` unless the crate is built with the
//! `wgpu` feature. The device is always handed to callers explicitly.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "wgpu")]
pub type DefaultBackend = burn::backend::Wgpu<f32, i32>;

#[cfg(not(feature = "wgpu"))]
pub type DefaultBackend = burn::backend::NdArray<f32>;

/// The autodiff backend used for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Device of the default backend
pub type DefaultDevice = <DefaultBackend as Backend>::Device;

/// The device training runs on
pub fn default_device() -> DefaultDevice {
    DefaultDevice::default()
}

/// Human-readable name of the compiled backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "wgpu")]
    {
        "wgpu"
    }
    #[cfg(not(feature = "wgpu"))]
    {
        "ndarray (CPU)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_name() {
        assert!(!backend_name().is_empty());
    }

    #[test]
    fn test_default_device_is_stable() {
        assert_eq!(default_device(), default_device());
    }
}
