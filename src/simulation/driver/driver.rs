//! Per-frame loop
//!
//! The driver owns the core. Producers only push pointer records and burst
//! requests; everything that touches fields happens inside `update`.

use crate::core::error::EngineResult;
use crate::domain::Rgb;
use crate::gpu::{GpuBackend, RenderTarget};

use super::{FluidCore, Pointer, DEFAULT_DT};

pub struct FrameDriver<B: GpuBackend> {
    core: FluidCore<B>,
    pointers: Vec<Pointer>,
    // Burst sizes, popped one per frame (last pushed first)
    burst_queue: Vec<u32>,
    running: bool,
}

impl<B: GpuBackend> FrameDriver<B> {
    pub fn new(core: FluidCore<B>) -> Self {
        Self {
            core,
            pointers: vec![Pointer::new(-1)],
            burst_queue: Vec::new(),
            running: false,
        }
    }

    /// Seed the startup burst and start accepting frames
    pub fn start(&mut self) -> EngineResult<()> {
        if self.running {
            return Ok(());
        }
        let count = self.core.seed_startup_burst()?;
        self.running = true;
        log::info!("frame driver started with a burst of {} splats", count);
        Ok(())
    }

    /// One frame. Returns whether the next frame should be scheduled.
    pub fn update(&mut self) -> EngineResult<bool> {
        if !self.running {
            return Ok(false);
        }

        if self.core.perf_enabled {
            self.core.perf_stats.reset();
        }

        let (w, h) = self.core.backend().surface_size();
        if (w, h) != self.core.surface_size() {
            if let Err(e) = self.core.resize(w, h) {
                log::error!("resize failed, continuing at previous size: {}", e);
            }
        }

        if let Some(count) = self.burst_queue.pop() {
            self.core.apply_random_burst(count)?;
        }

        for pointer in self.pointers.iter_mut().filter(|p| p.moved) {
            self.core.apply_pointer_splat(pointer.x, pointer.y, pointer.dx, pointer.dy, pointer.color)?;
            pointer.moved = false;
        }

        self.core.step(DEFAULT_DT)?;
        self.core.render(RenderTarget::Screen)?;
        Ok(true)
    }

    pub fn queue_random_burst(&mut self, count: u32) {
        self.burst_queue.push(count);
    }

    pub fn pending_bursts(&self) -> usize {
        self.burst_queue.len()
    }

    /// Record motion for pointer `id`, adding it on first sight
    pub fn update_pointer(&mut self, id: i32, x: f32, y: f32, dx: f32, dy: f32, color: Rgb) {
        let pointer = match self.pointers.iter().position(|p| p.id == id) {
            Some(i) => &mut self.pointers[i],
            None => {
                self.pointers.push(Pointer::new(id));
                let last = self.pointers.len() - 1;
                &mut self.pointers[last]
            }
        };
        pointer.x = x;
        pointer.y = y;
        pointer.dx = dx;
        pointer.dy = dy;
        pointer.color = color;
        pointer.moved = true;
    }

    /// Track a pointer position and derive its delta from the last one
    pub fn move_pointer(&mut self, id: i32, x: f32, y: f32) {
        match self.pointers.iter_mut().find(|p| p.id == id) {
            Some(pointer) => pointer.move_to(x, y),
            None => {
                let mut pointer = Pointer::new(id);
                pointer.x = x;
                pointer.y = y;
                self.pointers.push(pointer);
            }
        }
    }

    pub fn pointers(&self) -> &[Pointer] {
        &self.pointers
    }

    /// Halt the loop and hand every field and program back to the device
    pub fn stop(&mut self) {
        if self.running {
            log::info!("frame driver stopped at frame {}", self.core.frame());
        }
        self.running = false;
        self.burst_queue.clear();
        self.core.release();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn core(&self) -> &FluidCore<B> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut FluidCore<B> {
        &mut self.core
    }
}
