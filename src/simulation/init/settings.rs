use super::perf_stats::PerfStats;
use super::{FluidCore, Splat};
use crate::gpu::GpuBackend;

use super::random;

pub(super) fn enable_perf_metrics<B: GpuBackend>(core: &mut FluidCore<B>, enabled: bool) {
    core.perf_enabled = enabled;
    if !enabled {
        core.perf_stats.reset();
    }
}

pub(super) fn get_perf_stats<B: GpuBackend>(core: &FluidCore<B>) -> PerfStats {
    core.perf_stats.clone()
}

pub(super) fn set_seed<B: GpuBackend>(core: &mut FluidCore<B>, seed: u32) {
    core.rng_state = random::seed_state(seed);
}

pub(super) fn set_splat_observer<B: GpuBackend>(
    core: &mut FluidCore<B>,
    observer: Option<Box<dyn FnMut(&Splat)>>,
) {
    core.splat_observer = observer;
}
