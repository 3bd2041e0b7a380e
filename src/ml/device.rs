// ============================================================
// Layer 5 — Compute Context
// ============================================================
// The device is chosen once at startup and fixed for the run.
//
//   --cpu        → NdArray backend on host memory
//   otherwise    → probe a WGPU device with a tiny allocation;
//                  use it if that works, else fall back to host
//
// Burn backends are types, so the choice is returned as an enum
// and the application layer instantiates the generic training
// code once per arm. Inside the loop every tensor goes through
// the same ComputeContext, with no per-tensor branching.

use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Wgpu},
    prelude::*,
};
use std::panic::{self, AssertUnwindSafe};

use crate::data::batcher::CaptionBatch;

/// The device picked for this process.
#[derive(Debug, Clone)]
pub enum DeviceSelection {
    Accelerator(WgpuDevice),
    Host(NdArrayDevice),
}

impl DeviceSelection {
    pub fn select(force_cpu: bool) -> Self {
        if force_cpu {
            tracing::info!("Using host device (forced by --cpu)");
            return Self::Host(NdArrayDevice::Cpu);
        }

        let device = WgpuDevice::default();
        // WGPU panics when no adapter can be created
        let probe = catch_quietly(|| Tensor::<Wgpu, 1>::zeros([1], &device).into_data());

        match probe {
            Ok(_) => {
                tracing::info!("Using WGPU device: {:?}", device);
                Self::Accelerator(device)
            }
            Err(reason) => {
                tracing::warn!("No usable WGPU adapter ({reason}), falling back to host device");
                Self::Host(NdArrayDevice::Cpu)
            }
        }
    }
}

/// Run `f`, turning a panic into its message. The panic hook is
/// silenced for the duration and restored afterwards.
fn catch_quietly<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    let hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(hook);

    result.map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    })
}

/// The active device for one backend; all placement goes through it.
#[derive(Debug, Clone)]
pub struct ComputeContext<B: Backend> {
    device: B::Device,
}

impl<B: Backend> ComputeContext<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Move a batch onto the active device. Content is unchanged;
    /// a batch already there is returned as is.
    pub fn place_batch(&self, batch: CaptionBatch<B>) -> CaptionBatch<B> {
        CaptionBatch {
            images:   batch.images.to_device(&self.device),
            captions: batch.captions.to_device(&self.device),
            lengths:  batch.lengths,
        }
    }
}
