use crate::types::RendererError;

/// Device wiring for a renderer that never presents.
///
/// Fields drop in declaration order, which is the reverse of acquisition.
pub(crate) struct GpuContext {
    pub queue: wgpu::Queue,
    pub device: wgpu::Device,
    pub adapter_name: String,
    _instance: wgpu::Instance,
}

impl GpuContext {
    pub(crate) fn new(width: u32, height: u32) -> Result<Self, RendererError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|err| RendererError::Device(format!("no suitable GPU adapter: {err}")))?;

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let max_dimension = limits.max_texture_dimension_2d;
        if width > max_dimension || height > max_dimension {
            return Err(RendererError::Device(format!(
                "GPU max texture dimension is {max_dimension}, requested target is {width}x{height}"
            )));
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("offscreen device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| RendererError::Device(format!("failed to create GPU device: {err}")))?;

        // Anything outside an error scope would otherwise panic inside wgpu.
        device.on_uncaptured_error(Box::new(|err| {
            tracing::error!(%err, "uncaptured GPU error");
        }));

        Ok(Self {
            queue,
            device,
            adapter_name: adapter_info.name,
            _instance: instance,
        })
    }

    /// Runs `f` inside a validation error scope and reports what it caught.
    pub(crate) fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }

    /// Blocks until all submitted work has completed.
    pub(crate) fn wait_idle(&self) -> Result<(), RendererError> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|err| RendererError::Device(format!("device poll failed: {err}")))
    }
}
