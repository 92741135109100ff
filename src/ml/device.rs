// ============================================================
// Layer 5 — Device Placement
// ============================================================
// Decides where a model lives.
//
//   Placement::single(device)    → one device, no replicas
//   Placement::new(vec![d0, d1]) → d0 is primary, d1 holds a
//                                  replica; batches are split
//                                  between them
//
// The inference backend is chosen at compile time:
//   feature "wgpu" (default) → burn::backend::Wgpu
//   otherwise                → burn::backend::NdArray (CPU)
//
// With Wgpu, the default device is the best adapter wgpu can
// find, which is the CPU adapter when no GPU is present.
//
// Reference: Burn Book §2 (Backends)

use burn::prelude::*;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

/// Devices a model is spread over; the first one is primary
#[derive(Debug, Clone)]
pub struct Placement<B: Backend> {
    devices: Vec<B::Device>,
}

impl<B: Backend> Placement<B> {
    /// Use the given devices; an empty list means the backend default
    pub fn new(devices: Vec<B::Device>) -> Self {
        if devices.is_empty() {
            Self::single(B::Device::default())
        } else {
            Self { devices }
        }
    }

    pub fn single(device: B::Device) -> Self {
        Self { devices: vec![device] }
    }

    pub fn primary(&self) -> &B::Device {
        &self.devices[0]
    }

    /// Devices that hold replicas of the primary model
    pub fn secondaries(&self) -> &[B::Device] {
        &self.devices[1..]
    }

    pub fn devices(&self) -> &[B::Device] {
        &self.devices
    }

    pub fn is_parallel(&self) -> bool {
        self.devices.len() > 1
    }
}

impl<B: Backend> Default for Placement<B> {
    fn default() -> Self {
        Self::single(B::Device::default())
    }
}

/// Placement for the compiled-in inference backend.
///
/// `gpus` discrete GPUs are used when more than zero are
/// requested; otherwise the backend's default device.
#[cfg(feature = "wgpu")]
pub fn select_placement(gpus: usize) -> Placement<InferBackend> {
    use burn::backend::wgpu::WgpuDevice;

    let devices: Vec<WgpuDevice> = (0..gpus).map(WgpuDevice::DiscreteGpu).collect();
    let placement = Placement::new(devices);
    tracing::info!("Using WGPU devices: {:?}", placement.devices());
    placement
}

#[cfg(not(feature = "wgpu"))]
pub fn select_placement(gpus: usize) -> Placement<InferBackend> {
    if gpus > 0 {
        tracing::warn!("Built without the wgpu feature, ignoring --gpus {} and using the CPU", gpus);
    }
    let placement = Placement::default();
    tracing::info!("Using CPU device: {:?}", placement.primary());
    placement
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_empty_list_falls_back_to_default() {
        let p = Placement::<TestBackend>::new(vec![]);
        assert_eq!(p.devices().len(), 1);
        assert!(!p.is_parallel());
        assert!(p.secondaries().is_empty());
    }

    #[test]
    fn test_first_device_is_primary() {
        let p = Placement::<TestBackend>::new(vec![NdArrayDevice::Cpu, NdArrayDevice::Cpu]);
        assert!(p.is_parallel());
        assert_eq!(p.secondaries().len(), 1);
        assert_eq!(*p.primary(), NdArrayDevice::Cpu);
    }
}
