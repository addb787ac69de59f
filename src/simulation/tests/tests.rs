use super::*;
use crate::core::field::{FilterMode, Precision};
use crate::gpu::software::SoftwareBackend;
use crate::gpu::{Capabilities, FormatSupport};
use std::cell::Cell;
use std::rc::Rc;

fn float32_caps() -> Capabilities {
    Capabilities {
        half_float: FormatSupport { renderable: false, linear: false },
        full_float: FormatSupport { renderable: true, linear: true },
    }
}

fn small_config() -> SimulationConfig {
    SimulationConfig {
        sim_resolution: 32,
        dye_resolution: 64,
        ..Default::default()
    }
}

fn core_with(caps: Capabilities, config: SimulationConfig) -> FluidCore<SoftwareBackend> {
    FluidCore::new(SoftwareBackend::new(64, 64).with_capabilities(caps), config).unwrap()
}

fn sum_sq(texels: &[Texel]) -> f64 {
    texels.iter().map(|t| (t[0] as f64).powi(2)).sum()
}

fn center_push() -> Splat {
    Splat {
        position: [0.5, 0.5],
        velocity_delta: [30.0, -10.0],
        color_delta: Rgb::new(1.0, 0.5, 0.2),
        radius: 0.05,
    }
}

#[test]
fn new_core_allocates_both_tiers() {
    let core = core_with(Capabilities::full(), small_config());
    let fields = core.fields().unwrap();
    assert_eq!(fields.sim_resolution(), Resolution::new(32, 32));
    assert_eq!(fields.dye_resolution(), Resolution::new(64, 64));
    assert_eq!(fields.velocity().read().resolution(), fields.curl().resolution());
    assert_eq!(fields.pressure().write().resolution(), fields.divergence().resolution());
    // 3 pairs + curl + divergence
    assert_eq!(core.backend().live_textures(), 8);
    assert_eq!(fields.velocity().read().format().channels, 2);
    assert_eq!(fields.density().write().format().channels, 4);
    assert_eq!(fields.velocity().read().filter(), FilterMode::Linear);
    assert_eq!(fields.pressure().read().filter(), FilterMode::Nearest);
    assert_eq!(fields.divergence().filter(), FilterMode::Nearest);
    assert_eq!(core.formats().precision, Precision::Half);
}

#[test]
fn pressure_residual_shrinks_with_more_iterations() {
    let mut residuals = Vec::new();
    for iterations in [1, 5, 20, 40] {
        let mut core = core_with(float32_caps(), small_config());
        core.apply_splat(&center_push()).unwrap();
        core.compute_divergence().unwrap();
        core.solve_pressure(iterations).unwrap();
        core.subtract_gradient().unwrap();
        core.compute_divergence().unwrap();
        residuals.push(sum_sq(&core.read_field(FieldKind::Divergence).unwrap()));
    }
    for pair in residuals.windows(2) {
        assert!(pair[1] < pair[0], "residuals not decreasing: {:?}", residuals);
    }
}

#[test]
fn splat_stays_local() {
    let mut core = core_with(float32_caps(), small_config());
    assert!(core.apply_splat(&center_push()).unwrap());

    let dye = core.read_field(FieldKind::Density).unwrap();
    let at = |u: f32, v: f32| dye[(v * 64.0) as usize * 64 + (u * 64.0) as usize];
    assert!(at(0.5, 0.5)[0] > 0.9);
    // far tail of the gaussian: not exactly zero in f32, but negligible
    assert!(at(0.95, 0.95)[0].abs() < 1e-6);
    assert!(at(0.05, 0.95)[0].abs() < 1e-6);
    assert!(at(0.5, 0.05)[0].abs() < 1e-6);

    let velocity = core.read_field(FieldKind::Velocity).unwrap();
    let centre = velocity[16 * 32 + 16];
    assert!(centre[0] > 20.0 && centre[1] < -6.0);
    assert!(velocity[0][0].abs() < 1e-6 && velocity[0][1].abs() < 1e-6);
}

#[test]
fn step_swaps_every_pair_it_writes() {
    let mut core = core_with(Capabilities::full(), small_config());
    let fields = core.fields().unwrap();
    let velocity = fields.velocity().read().texture();
    let density = fields.density().read().texture();
    let pressure = fields.pressure().read().texture();

    core.step(DEFAULT_DT).unwrap();

    // velocity: vorticity, gradient, advection; pressure: decay + 20 Jacobi
    let fields = core.fields().unwrap();
    assert_ne!(fields.velocity().read().texture(), velocity);
    assert_ne!(fields.density().read().texture(), density);
    assert_ne!(fields.pressure().read().texture(), pressure);
    assert_eq!(core.frame(), 1);
}

#[test]
fn step_issues_draws_in_fixed_count() {
    let mut core = core_with(Capabilities::full(), small_config());
    core.step(DEFAULT_DT).unwrap();
    // curl, vorticity, divergence, clear, 20 Jacobi, gradient, 2 advection
    assert_eq!(core.draw_count(), 3 + 1 + 20 + 1 + 2);
}

#[test]
fn random_burst_of_zero_is_a_no_op() {
    let mut core = core_with(Capabilities::full(), small_config());
    core.apply_random_burst(0).unwrap();
    assert_eq!(core.splats_applied(), 0);
    assert_eq!(core.draw_count(), 0);
}

#[test]
fn random_burst_applies_each_splat() {
    let mut core = core_with(Capabilities::full(), small_config());
    core.apply_random_burst(3).unwrap();
    assert_eq!(core.splats_applied(), 3);
    assert_eq!(core.draw_count(), 6);
}

#[test]
fn startup_burst_is_between_5_and_24() {
    for seed in [1, 7, 99, 12345] {
        let mut core = core_with(Capabilities::full(), small_config());
        core.set_seed(seed);
        let count = core.seed_startup_burst().unwrap();
        assert!((5..=24).contains(&count), "{count}");
        assert_eq!(core.splats_applied(), count as u64);
    }
}

#[test]
fn same_seed_gives_same_burst() {
    let run = || {
        let mut core = core_with(float32_caps(), small_config());
        core.set_seed(42);
        core.apply_random_burst(4).unwrap();
        core.read_field(FieldKind::Density).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn non_finite_splat_is_dropped() {
    let mut core = core_with(Capabilities::full(), small_config());
    let applied = core
        .apply_pointer_splat(f32::NAN, 10.0, 5.0, 5.0, Rgb::new(1.0, 1.0, 1.0))
        .unwrap();
    assert!(!applied);

    let bad_color = Splat {
        color_delta: Rgb::new(f32::INFINITY, 0.0, 0.0),
        ..center_push()
    };
    assert!(!core.apply_splat(&bad_color).unwrap());

    assert_eq!(core.splats_dropped(), 2);
    assert_eq!(core.splats_applied(), 0);
    assert_eq!(core.draw_count(), 0);
    assert!(core.read_field(FieldKind::Density).unwrap().iter().all(|t| t[0] == 0.0));
}

fn all_finite(texels: &[Texel]) -> bool {
    texels.iter().all(|t| t.iter().all(|v| v.is_finite()))
}

#[test]
fn degenerate_radius_splat_is_dropped() {
    let mut core = core_with(float32_caps(), small_config());
    // zero, negative, and a radius whose square underflows to zero
    for radius in [0.0, -0.05, 1.0e-30] {
        let splat = Splat { radius, ..center_push() };
        assert!(!splat.is_well_formed());
        assert!(!core.apply_splat(&splat).unwrap(), "radius {radius}");
    }
    assert_eq!(core.splats_dropped(), 3);
    assert_eq!(core.draw_count(), 0);

    for _ in 0..5 {
        core.step(DEFAULT_DT).unwrap();
    }
    assert!(all_finite(&core.read_field(FieldKind::Density).unwrap()));
    assert!(all_finite(&core.read_field(FieldKind::Velocity).unwrap()));
}

#[test]
fn oversized_splat_is_dropped() {
    let mut core = core_with(float32_caps(), small_config());
    let huge = MAX_SPLAT_MAGNITUDE * 10.0;
    let cases = [
        Splat { color_delta: Rgb::new(huge, 0.0, 0.0), ..center_push() },
        Splat { velocity_delta: [0.0, -huge], ..center_push() },
        Splat { radius: huge, ..center_push() },
    ];
    for splat in &cases {
        assert!(!core.apply_splat(splat).unwrap(), "{splat:?}");
    }
    assert_eq!(core.splats_dropped(), 3);
    assert_eq!(core.splats_applied(), 0);
    assert!(core.read_field(FieldKind::Density).unwrap().iter().all(|t| t[0] == 0.0));
}

#[test]
fn large_legal_splat_keeps_fields_finite() {
    let mut core = core_with(float32_caps(), small_config());
    let strong = Splat {
        velocity_delta: [MAX_SPLAT_MAGNITUDE, -MAX_SPLAT_MAGNITUDE],
        color_delta: Rgb::new(MAX_SPLAT_MAGNITUDE, 1.0, 1.0),
        // wider than the domain: the whole field is pushed
        radius: 10.0,
        ..center_push()
    };
    assert!(core.apply_splat(&strong).unwrap());
    let dye = core.read_field(FieldKind::Density).unwrap();
    assert!(dye.iter().all(|t| t[0] > 0.9 * MAX_SPLAT_MAGNITUDE));

    for _ in 0..5 {
        core.step(DEFAULT_DT).unwrap();
    }
    assert!(all_finite(&core.read_field(FieldKind::Density).unwrap()));
    assert!(all_finite(&core.read_field(FieldKind::Velocity).unwrap()));
    assert!(all_finite(&core.read_field(FieldKind::Pressure).unwrap()));
}

#[test]
fn pointer_coordinates_flip_y() {
    let mut core = core_with(float32_caps(), small_config());
    let seen = Rc::new(Cell::new(None));
    let sink = seen.clone();
    core.set_splat_observer(move |s: &Splat| sink.set(Some(*s)));

    core.apply_pointer_splat(16.0, 16.0, 4.0, 2.0, Rgb::new(0.1, 0.2, 0.3)).unwrap();
    let splat = seen.get().unwrap();
    assert_eq!(splat.position, [0.25, 0.75]);
    assert_eq!(splat.velocity_delta, [4.0, -2.0]);
    assert!((splat.radius - 0.05).abs() < 1e-7);
}

#[test]
fn observer_sees_every_applied_splat() {
    let mut core = core_with(Capabilities::full(), small_config());
    let count = Rc::new(Cell::new(0u32));
    let sink = count.clone();
    core.set_splat_observer(move |_: &Splat| sink.set(sink.get() + 1));

    core.apply_random_burst(3).unwrap();
    assert_eq!(count.get(), 3);

    core.clear_splat_observer();
    core.apply_random_burst(2).unwrap();
    assert_eq!(count.get(), 3);
}

#[test]
fn perf_stats_are_zero_until_enabled() {
    let mut core = core_with(Capabilities::full(), small_config());
    core.step(DEFAULT_DT).unwrap();
    assert_eq!(core.get_perf_stats().pressure_iterations(), 0);

    core.enable_perf_metrics(true);
    core.apply_random_burst(1).unwrap();
    core.step(DEFAULT_DT).unwrap();
    let stats = core.get_perf_stats();
    assert_eq!(stats.pressure_iterations(), 20);
    assert_eq!(stats.splats_applied(), 1);
    assert!(stats.draw_calls() > 0);
    assert_eq!(stats.field_bytes() as usize, core.fields().unwrap().byte_size());

    core.enable_perf_metrics(false);
    assert_eq!(core.get_perf_stats().draw_calls(), 0);
}

#[test]
fn opaque_render_fills_background_color() {
    let config = SimulationConfig {
        background_color: Rgb::new(255.0, 0.0, 0.0),
        ..small_config()
    };
    let mut core = core_with(Capabilities::full(), config);
    core.render(RenderTarget::Screen).unwrap();
    let pixels = core.read_surface().unwrap();
    assert!(pixels.iter().all(|p| *p == [1.0, 0.0, 0.0, 1.0]));
}

#[test]
fn transparent_render_draws_gradient_on_screen_only() {
    let config = SimulationConfig {
        transparent_background: true,
        ..small_config()
    };
    let mut core = core_with(Capabilities::full(), config);
    core.render(RenderTarget::Screen).unwrap();
    let pixels = core.read_surface().unwrap();
    let center = pixels[32 * 64 + 32];
    let corner = pixels[0];
    assert!(center[0] > corner[0]);
    assert_eq!(center[3], 1.0);

    // bg + display on screen, display only into a field
    assert_eq!(core.draw_count(), 2);
    let curl = core.fields().unwrap().curl().target();
    core.render(curl).unwrap();
    assert_eq!(core.draw_count(), 3);
}

#[test]
fn render_into_field_writes_dye_at_dye_size() {
    let mut core = core_with(float32_caps(), small_config());
    core.apply_splat(&center_push()).unwrap();
    let target = core.fields().unwrap().divergence().target();
    let draws = core.draw_count();
    core.render(target).unwrap();
    // opaque: color fill + display
    assert_eq!(core.draw_count(), draws + 2);
}

#[test]
fn released_core_rejects_work() {
    let mut core = core_with(Capabilities::full(), small_config());
    core.release();
    assert!(core.is_released());
    assert_eq!(core.backend().live_textures(), 0);
    assert_eq!(core.backend().live_programs(), 0);
    assert!(matches!(core.step(DEFAULT_DT), Err(EngineError::Released)));
    assert!(matches!(core.apply_random_burst(1), Err(EngineError::Released)));
    assert!(matches!(core.resize(10, 10), Err(EngineError::Released)));
}

#[test]
fn driver_consumes_bursts_and_pointers_once() {
    let core = core_with(Capabilities::full(), small_config());
    let mut driver = FrameDriver::new(core);
    assert!(!driver.update().unwrap());

    driver.start().unwrap();
    let startup = driver.core().splats_applied();
    assert!(startup >= 5);

    driver.queue_random_burst(2);
    driver.queue_random_burst(3);
    driver.update_pointer(7, 10.0, 20.0, 1.0, 1.0, Rgb::new(0.2, 0.2, 0.2));
    assert!(driver.update().unwrap());
    // last queued burst first, plus the pointer
    assert_eq!(driver.core().splats_applied(), startup + 3 + 1);
    assert_eq!(driver.pending_bursts(), 1);
    assert!(driver.pointers().iter().all(|p| !p.moved));

    assert!(driver.update().unwrap());
    assert_eq!(driver.core().splats_applied(), startup + 3 + 1 + 2);
    assert_eq!(driver.core().frame(), 2);
}

#[test]
fn move_pointer_derives_scaled_delta() {
    let core = core_with(Capabilities::full(), small_config());
    let mut driver = FrameDriver::new(core);
    driver.move_pointer(1, 10.0, 10.0);
    driver.move_pointer(1, 12.0, 9.0);
    let p = driver.pointers().iter().find(|p| p.id == 1).copied().unwrap();
    assert_eq!((p.dx, p.dy), (20.0, -10.0));
    assert!(p.moved);
}

#[test]
fn driver_follows_surface_resize() {
    let core = core_with(Capabilities::full(), small_config());
    let mut driver = FrameDriver::new(core);
    driver.start().unwrap();

    driver.core_mut().backend_mut().resize_surface(128, 64);
    assert!(driver.update().unwrap());
    let fields = driver.core().fields().unwrap();
    assert_eq!(fields.sim_resolution(), Resolution::new(32, 16));
    assert_eq!(fields.dye_resolution(), Resolution::new(64, 32));
    assert_eq!(fields.velocity().read().resolution(), fields.velocity().write().resolution());
    assert_eq!(fields.density().write().resolution(), Resolution::new(64, 32));
    assert_eq!(driver.core().backend().live_textures(), 8);
}

#[test]
fn stop_releases_everything() {
    let core = core_with(Capabilities::full(), small_config());
    let mut driver = FrameDriver::new(core);
    driver.start().unwrap();
    driver.queue_random_burst(4);
    driver.update().unwrap();

    driver.stop();
    assert!(!driver.is_running());
    assert_eq!(driver.pending_bursts(), 0);
    assert_eq!(driver.core().backend().live_textures(), 0);
    assert_eq!(driver.core().backend().allocated_bytes(), 0);
    assert_eq!(driver.core().backend().live_programs(), 0);
    assert!(!driver.update().unwrap());
}
