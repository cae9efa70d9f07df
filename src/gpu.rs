// src/gpu.rs
//
// Accelerator backend: the same B3/S23 step as `cpu.rs`, one compute
// invocation per cell, over a pair of device-resident grids.
//
// Cells live on the device as `u32` (WGSL storage has no 8-bit scalar) and
// are converted on upload/download. Every launch is blocking: submit, wait
// for the queue, map the staging buffer, copy out.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::dispatch::Accelerator;
use crate::error::{GpuError, GpuResult};
use crate::grid::GridBuffer;

// -----------------------------
// Embedded WGSL kernel (tile edge substituted at pipeline build time)
// -----------------------------
const LIFE_WGSL: &str = r#"
struct Dims {
  width: u32,
  height: u32,
  _pad0: u32,
  _pad1: u32,
};

@group(0) @binding(0) var<uniform> dims: Dims;
@group(0) @binding(1) var<storage, read> cells_in: array<u32>;
@group(0) @binding(2) var<storage, read_write> cells_out: array<u32>;

@compute @workgroup_size(__TILE__, __TILE__, 1)
fn step_life(@builtin(global_invocation_id) gid: vec3<u32>) {
  let w = dims.width;
  let h = dims.height;
  let col = gid.x;
  let row = gid.y;
  if (col >= w || row >= h) {
    return;
  }

  let up = select(row - 1u, h - 1u, row == 0u);
  let down = select(row + 1u, 0u, row + 1u == h);
  let left = select(col - 1u, w - 1u, col == 0u);
  let right = select(col + 1u, 0u, col + 1u == w);

  let n = cells_in[up * w + left] + cells_in[up * w + col] + cells_in[up * w + right]
        + cells_in[row * w + left] + cells_in[row * w + right]
        + cells_in[down * w + left] + cells_in[down * w + col] + cells_in[down * w + right];

  let alive = cells_in[row * w + col] != 0u;
  var state = 0u;
  if (n == 3u || (alive && n == 2u)) {
    state = 1u;
  }
  cells_out[row * w + col] = state;
}
"#;

const TILE_PLACEHOLDER: &str = "__TILE__";

fn life_shader_source(tile: u32) -> String {
    LIFE_WGSL.replace(TILE_PLACEHOLDER, &tile.to_string())
}

/// Largest square workgroup edge (32, 16 or 8) the limits allow.
pub fn pick_tile(limits: &wgpu::Limits) -> Option<u32> {
    [32u32, 16, 8].into_iter().find(|&t| {
        t * t <= limits.max_compute_invocations_per_workgroup
            && t <= limits.max_compute_workgroup_size_x
            && t <= limits.max_compute_workgroup_size_y
    })
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct Dims {
    width: u32,
    height: u32,
    _pad0: u32,
    _pad1: u32,
}

// -----------------------------
// Device context (detected once per session)
// -----------------------------
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: wgpu::AdapterInfo,
    limits: wgpu::Limits,

    bgl: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,

    tile: u32,
    timestamps: bool,
}

impl GpuContext {
    /// Looks for a usable adapter. `None` means "accelerator unavailable".
    pub fn probe() -> Option<Self> {
        match Self::new() {
            Ok(ctx) => {
                log::info!(
                    "accelerator available: {} ({:?}, {:?}), tile {}x{}",
                    ctx.info.name,
                    ctx.info.device_type,
                    ctx.info.backend,
                    ctx.tile,
                    ctx.tile
                );
                Some(ctx)
            }
            Err(e) => {
                log::info!("accelerator unavailable: {e}");
                None
            }
        }
    }

    pub fn new() -> GpuResult<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> GpuResult<Self> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GpuError::AdapterNotFound(e.to_string()))?;

        let limits = adapter.limits();
        let tile = pick_tile(&limits).ok_or_else(|| {
            GpuError::Unsupported(format!(
                "workgroups limited to {} invocations",
                limits.max_compute_invocations_per_workgroup
            ))
        })?;

        let timestamps = adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY);
        let required_features = if timestamps {
            wgpu::Features::TIMESTAMP_QUERY
        } else {
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("torus-life"),
                required_features,
                required_limits: limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::default(),
            })
            .await?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("life_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("life_shader"),
            source: wgpu::ShaderSource::Wgsl(life_shader_source(tile).into()),
        });

        let pl_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("life_pl_layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("life_pipeline"),
            layout: Some(&pl_layout),
            module: &shader,
            entry_point: Some("step_life"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        if let Some(err) = device.pop_error_scope().await {
            return Err(GpuError::Shader(err.to_string()));
        }

        Ok(Self {
            device,
            queue,
            info: adapter.get_info(),
            limits,
            bgl,
            pipeline,
            tile,
            timestamps,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.info.name
    }

    /// Workgroup edge in invocations; workgroups are `tile x tile`.
    #[inline]
    pub fn tile(&self) -> u32 {
        self.tile
    }

    /// Whether step timings come from device timestamps rather than the host clock.
    #[inline]
    pub fn has_timestamps(&self) -> bool {
        self.timestamps
    }

    fn wait_idle(&self) -> GpuResult<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map(|_| ())
            .map_err(|e| GpuError::Readback(e.to_string()))
    }
}

// -----------------------------
// Device mirror of one grid
// -----------------------------
struct PassTimer {
    queries: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    period_ns: f32,
}

/// Two device grids (current/next) plus readback staging. Owned by the dispatcher.
pub struct GpuMirror {
    w: usize,
    h: usize,
    bytes: u64,
    groups: (u32, u32),

    cells: [wgpu::Buffer; 2],
    _dims: wgpu::Buffer,
    staging: wgpu::Buffer,
    // binds[i] reads cells[i] and writes cells[1 - i]
    binds: [wgpu::BindGroup; 2],
    cur: usize,

    timer: Option<PassTimer>,
    upload: Vec<u32>,
}

impl GpuMirror {
    /// Allocates device buffers sized for `grid` and uploads it.
    pub fn new(ctx: &GpuContext, grid: &GridBuffer) -> GpuResult<Self> {
        let w = grid.width();
        let h = grid.height();
        let bytes = (grid.len() * std::mem::size_of::<u32>()) as u64;

        let max_binding = ctx.limits.max_storage_buffer_binding_size as u64;
        if bytes > max_binding || bytes > ctx.limits.max_buffer_size {
            return Err(GpuError::Allocation(format!(
                "{bytes} byte grid exceeds the device's {max_binding} byte storage binding"
            )));
        }
        let groups = (
            (w as u32).div_ceil(ctx.tile),
            (h as u32).div_ceil(ctx.tile),
        );
        let max_groups = ctx.limits.max_compute_workgroups_per_dimension;
        if groups.0 > max_groups || groups.1 > max_groups {
            return Err(GpuError::Allocation(format!(
                "{}x{} workgroups exceed the per-dimension limit {max_groups}",
                groups.0, groups.1
            )));
        }

        let device = &ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let make_cells = |label: &'static str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let cells = [make_cells("life_cells_a"), make_cells("life_cells_b")];

        let dims = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("life_dims"),
            contents: bytemuck::bytes_of(&Dims {
                width: w as u32,
                height: h as u32,
                _pad0: 0,
                _pad1: 0,
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("life_staging"),
            size: bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind = |src: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("life_bind"),
                layout: &ctx.bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: dims.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: cells[src].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: cells[1 - src].as_entire_binding(),
                    },
                ],
            })
        };
        let binds = [bind(0), bind(1)];

        let timer = ctx.timestamps.then(|| PassTimer {
            queries: device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("life_timestamps"),
                ty: wgpu::QueryType::Timestamp,
                count: 2,
            }),
            resolve: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("life_ts_resolve"),
                size: 2 * wgpu::QUERY_SIZE as u64,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            readback: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("life_ts_readback"),
                size: 2 * wgpu::QUERY_SIZE as u64,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            period_ns: ctx.queue.get_timestamp_period(),
        });

        let validation = pollster::block_on(device.pop_error_scope());
        let oom = pollster::block_on(device.pop_error_scope());
        if let Some(err) = oom.or(validation) {
            return Err(GpuError::Allocation(err.to_string()));
        }

        let mut mirror = Self {
            w,
            h,
            bytes,
            groups,
            cells,
            _dims: dims,
            staging,
            binds,
            cur: 0,
            timer,
            upload: Vec::with_capacity(grid.len()),
        };
        mirror.upload(ctx, grid)?;

        log::debug!(
            "allocated device mirror {}x{} ({} KiB per buffer, {}x{} workgroups)",
            w,
            h,
            bytes / 1024,
            groups.0,
            groups.1
        );
        Ok(mirror)
    }

    fn check_shape(&self, grid: &GridBuffer) -> GpuResult<()> {
        let got = (grid.width(), grid.height());
        if got != (self.w, self.h) {
            return Err(GpuError::ShapeMismatch {
                expected: (self.w, self.h),
                got,
            });
        }
        Ok(())
    }

    /// Overwrites the current device grid with `grid`.
    pub fn upload(&mut self, ctx: &GpuContext, grid: &GridBuffer) -> GpuResult<()> {
        self.check_shape(grid)?;
        self.upload.clear();
        self.upload.extend(grid.cells().iter().map(|&v| v as u32));
        ctx.queue
            .write_buffer(&self.cells[self.cur], 0, bytemuck::cast_slice(&self.upload));
        Ok(())
    }

    /// Runs one generation on the device and downloads it into `out`.
    ///
    /// `out` is written only once the readback has succeeded, so on error it
    /// still holds whatever the caller passed in. Returns the device-side
    /// duration when timestamps are available, otherwise submit-to-idle wall time.
    pub fn step(&mut self, ctx: &GpuContext, out: &mut GridBuffer) -> GpuResult<Duration> {
        self.check_shape(out)?;
        let src = self.cur;
        let dst = 1 - src;

        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut enc = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("life_step"),
            });
        {
            let mut pass = enc.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("life_step"),
                timestamp_writes: self.timer.as_ref().map(|t| wgpu::ComputePassTimestampWrites {
                    query_set: &t.queries,
                    beginning_of_pass_write_index: Some(0),
                    end_of_pass_write_index: Some(1),
                }),
            });
            pass.set_pipeline(&ctx.pipeline);
            pass.set_bind_group(0, &self.binds[src], &[]);
            pass.dispatch_workgroups(self.groups.0, self.groups.1, 1);
        }
        enc.copy_buffer_to_buffer(&self.cells[dst], 0, &self.staging, 0, self.bytes);
        if let Some(t) = &self.timer {
            enc.resolve_query_set(&t.queries, 0..2, &t.resolve, 0);
            enc.copy_buffer_to_buffer(&t.resolve, 0, &t.readback, 0, 2 * wgpu::QUERY_SIZE as u64);
        }

        let started = Instant::now();
        ctx.queue.submit(Some(enc.finish()));

        if let Some(err) = pollster::block_on(ctx.device.pop_error_scope()) {
            return Err(GpuError::Launch(err.to_string()));
        }

        let (tx, rx) = mpsc::channel();
        let tx_ts = tx.clone();
        self.staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |r| {
                let _ = tx.send(r);
            });
        if let Some(t) = &self.timer {
            t.readback
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |r| {
                    let _ = tx_ts.send(r);
                });
        } else {
            drop(tx_ts);
        }

        ctx.wait_idle()?;
        let wall = started.elapsed();

        // A failed map leaves the mirror unusable; the dispatcher drops it.
        let maps = if self.timer.is_some() { 2 } else { 1 };
        for _ in 0..maps {
            match rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(GpuError::Readback(e.to_string())),
                Err(_) => return Err(GpuError::Readback("map callback never fired".into())),
            }
        }

        {
            let view = self.staging.slice(..).get_mapped_range();
            let words: &[u32] = bytemuck::cast_slice(&view);
            for (cell, &v) in out.cells_mut().iter_mut().zip(words) {
                *cell = (v != 0) as u8;
            }
        }
        self.staging.unmap();

        let elapsed = match &self.timer {
            Some(t) => {
                let ticks = {
                    let view = t.readback.slice(..).get_mapped_range();
                    let ts: &[u64] = bytemuck::cast_slice(&view);
                    (ts[0], ts[1])
                };
                t.readback.unmap();
                match ticks {
                    (begin, end) if end > begin => {
                        Duration::from_nanos(((end - begin) as f64 * t.period_ns as f64) as u64)
                    }
                    _ => wall,
                }
            }
            None => wall,
        };

        self.cur = dst;
        Ok(elapsed)
    }
}

impl Accelerator for GpuContext {
    type Mirror = GpuMirror;

    fn name(&self) -> &str {
        self.adapter_name()
    }

    fn allocate(&self, host: &GridBuffer) -> GpuResult<GpuMirror> {
        GpuMirror::new(self, host)
    }

    fn upload(&self, mirror: &mut GpuMirror, host: &GridBuffer) -> GpuResult<()> {
        mirror.upload(self, host)
    }

    fn step(&self, mirror: &mut GpuMirror, out: &mut GridBuffer) -> GpuResult<Duration> {
        mirror.step(self, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuKernel;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn tile_follows_limits() {
        let mut limits = wgpu::Limits::default();
        limits.max_compute_invocations_per_workgroup = 256;
        assert_eq!(pick_tile(&limits), Some(16));

        limits.max_compute_invocations_per_workgroup = 1024;
        limits.max_compute_workgroup_size_x = 1024;
        limits.max_compute_workgroup_size_y = 1024;
        assert_eq!(pick_tile(&limits), Some(32));

        limits.max_compute_invocations_per_workgroup = 16;
        assert_eq!(pick_tile(&limits), None);
    }

    #[test]
    fn shader_source_has_concrete_tile() {
        let src = life_shader_source(16);
        assert!(src.contains("@workgroup_size(16, 16, 1)"));
        assert!(!src.contains(TILE_PLACEHOLDER));
    }

    #[test]
    fn device_matches_cpu_when_present() {
        let Some(ctx) = GpuContext::probe() else {
            return;
        };
        let mut rng = StdRng::seed_from_u64(5);
        // Deliberately not a multiple of any tile size.
        let cells = (0..67 * 45).map(|_| rng.random_bool(0.35) as u8).collect();
        let start = GridBuffer::from_cells(67, 45, cells);

        let mut mirror = GpuMirror::new(&ctx, &start).unwrap();
        let mut cpu = CpuKernel::new();
        let mut host = start.clone();
        let mut device_out = start.clone();
        for g in 1..=10 {
            host = cpu.step_into_new(&host);
            mirror.step(&ctx, &mut device_out).unwrap();
            assert_eq!(device_out, host, "diverged at generation {g}");
        }
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let Some(ctx) = GpuContext::probe() else {
            return;
        };
        let mut mirror = GpuMirror::new(&ctx, &GridBuffer::new(8, 8)).unwrap();
        let mut other = GridBuffer::new(9, 8);
        assert!(matches!(
            mirror.step(&ctx, &mut other),
            Err(GpuError::ShapeMismatch { .. })
        ));
        assert_eq!(other.count_alive(), 0);
    }
}
