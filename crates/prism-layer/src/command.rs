//! # Recorded Commands
//!
//! The recording calls the layer intercepts, and how each maps onto a
//! [`Workload`]. Sizes are derived only from what the call itself carries;
//! anything else is reported with the unknown sentinels.

use prism_core::{
    AccelerationStructureBuildKind, AccelerationStructureBuildWorkload,
    AccelerationStructureTransferKind, AccelerationStructureTransferWorkload, BufferTransferKind,
    BufferTransferWorkload, ByteCount, Count, DispatchWorkload, ImageTransferKind,
    ImageTransferWorkload, TraceRaysWorkload, Workload,
};
use prism_trackers::RenderPassBegin;

/// Width, height and depth of an image region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extent3d {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Depth in texels
    pub depth: u32,
}

impl Extent3d {
    /// Texels in the extent
    pub const fn texels(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }
}

/// One region of an image copy, blit or resolve (destination side)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageRegion {
    /// Region extent
    pub extent: Extent3d,
    /// Array layers covered
    pub layers: u32,
}

impl ImageRegion {
    fn pixels(&self) -> u64 {
        self.extent.texels() * self.layers.max(1) as u64
    }
}

/// One acceleration structure build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelerationStructureBuildInfo {
    /// Build mode
    pub mode: AccelerationStructureBuildKind,
    /// Primitives across the geometries of this build
    pub primitives: u64,
}

/// A command recorded into a command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Open a debug label
    BeginDebugLabel(&'a str),
    /// Close the innermost debug label
    EndDebugLabel,

    /// Begin (or resume) a render pass
    BeginRenderPass(RenderPassBegin),
    /// End (or suspend) a render pass
    EndRenderPass,
    /// Draw
    Draw {
        /// Vertices per instance
        vertex_count: u32,
        /// Instances
        instance_count: u32,
    },
    /// Draw with arguments read from a buffer
    DrawIndirect {
        /// Draws in the buffer
        draw_count: u32,
    },

    /// Compute dispatch
    Dispatch {
        /// Groups in X
        x: u32,
        /// Groups in Y
        y: u32,
        /// Groups in Z
        z: u32,
    },
    /// Compute dispatch with arguments read from a buffer
    DispatchIndirect,
    /// Ray tracing dispatch
    TraceRays {
        /// Rays in X
        width: u32,
        /// Rays in Y
        height: u32,
        /// Rays in Z
        depth: u32,
    },
    /// Ray tracing dispatch with arguments read from a buffer
    TraceRaysIndirect,

    /// Clear a color image; the extent is known only if the caller tracks images
    ClearColorImage {
        /// Image extent, if known
        extent: Option<Extent3d>,
        /// Layers cleared
        layers: u32,
    },
    /// Clear a depth/stencil image
    ClearDepthStencilImage {
        /// Image extent, if known
        extent: Option<Extent3d>,
        /// Layers cleared
        layers: u32,
    },
    /// Image to image copy
    CopyImage(&'a [ImageRegion]),
    /// Scaled image copy
    BlitImage(&'a [ImageRegion]),
    /// Multisample resolve
    ResolveImage(&'a [ImageRegion]),
    /// Buffer to image copy
    CopyBufferToImage(&'a [ImageRegion]),
    /// Image to buffer copy
    CopyImageToBuffer(&'a [ImageRegion]),

    /// Fill a buffer range; `size` may be the whole-size value
    FillBuffer {
        /// Declared size
        size: u64,
    },
    /// Inline buffer update
    UpdateBuffer {
        /// Bytes written
        size: u64,
    },
    /// Buffer to buffer copy
    CopyBuffer {
        /// Size of each region
        regions: &'a [u64],
    },

    /// Acceleration structure builds
    BuildAccelerationStructures(&'a [AccelerationStructureBuildInfo]),
    /// Acceleration structure builds with counts read from a buffer
    BuildAccelerationStructuresIndirect {
        /// Build mode
        mode: AccelerationStructureBuildKind,
    },
    /// Acceleration structure copy or (de)serialization
    CopyAccelerationStructure {
        /// Transfer direction
        kind: AccelerationStructureTransferKind,
    },

    /// Any command that is not a workload (binds, barriers, state)
    Other(&'static str),
}

impl Command<'_> {
    /// Command name, for logging
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BeginDebugLabel(_) => "begin_debug_label",
            Self::EndDebugLabel => "end_debug_label",
            Self::BeginRenderPass(_) => "begin_render_pass",
            Self::EndRenderPass => "end_render_pass",
            Self::Draw { .. } => "draw",
            Self::DrawIndirect { .. } => "draw_indirect",
            Self::Dispatch { .. } => "dispatch",
            Self::DispatchIndirect => "dispatch_indirect",
            Self::TraceRays { .. } => "trace_rays",
            Self::TraceRaysIndirect => "trace_rays_indirect",
            Self::ClearColorImage { .. } => "clear_color_image",
            Self::ClearDepthStencilImage { .. } => "clear_depth_stencil_image",
            Self::CopyImage(_) => "copy_image",
            Self::BlitImage(_) => "blit_image",
            Self::ResolveImage(_) => "resolve_image",
            Self::CopyBufferToImage(_) => "copy_buffer_to_image",
            Self::CopyImageToBuffer(_) => "copy_image_to_buffer",
            Self::FillBuffer { .. } => "fill_buffer",
            Self::UpdateBuffer { .. } => "update_buffer",
            Self::CopyBuffer { .. } => "copy_buffer",
            Self::BuildAccelerationStructures(_) => "build_acceleration_structures",
            Self::BuildAccelerationStructuresIndirect { .. } => {
                "build_acceleration_structures_indirect"
            }
            Self::CopyAccelerationStructure { .. } => "copy_acceleration_structure",
            Self::Other(name) => *name,
        }
    }

    /// Number of draws the command issues, if it is a draw
    pub const fn draw_count(&self) -> Option<u64> {
        match *self {
            Self::Draw { .. } => Some(1),
            Self::DrawIndirect { draw_count } => Some(draw_count as u64),
            _ => None,
        }
    }

    /// The workload this command records, if it is one
    ///
    /// Render passes are not covered here; they span two commands.
    pub fn workload(&self) -> Option<Workload> {
        let workload = match *self {
            Self::Dispatch { x, y, z } => Workload::Dispatch(DispatchWorkload::new(x, y, z)),
            Self::DispatchIndirect => Workload::Dispatch(DispatchWorkload::indirect()),
            Self::TraceRays {
                width,
                height,
                depth,
            } => Workload::TraceRays(TraceRaysWorkload::new(width, height, depth)),
            Self::TraceRaysIndirect => Workload::TraceRays(TraceRaysWorkload::indirect()),

            Self::ClearColorImage { extent, layers } => {
                image(ImageTransferKind::ClearColor, clear_pixels(extent, layers))
            }
            Self::ClearDepthStencilImage { extent, layers } => {
                image(ImageTransferKind::ClearDepthStencil, clear_pixels(extent, layers))
            }
            Self::CopyImage(regions) => image(ImageTransferKind::CopyImage, region_pixels(regions)),
            Self::BlitImage(regions) => image(ImageTransferKind::BlitImage, region_pixels(regions)),
            Self::ResolveImage(regions) => {
                image(ImageTransferKind::ResolveImage, region_pixels(regions))
            }
            Self::CopyBufferToImage(regions) => {
                image(ImageTransferKind::CopyBufferToImage, region_pixels(regions))
            }
            Self::CopyImageToBuffer(regions) => {
                image(ImageTransferKind::CopyImageToBuffer, region_pixels(regions))
            }

            Self::FillBuffer { size } => Workload::BufferTransfer(BufferTransferWorkload {
                kind: BufferTransferKind::FillBuffer,
                bytes: ByteCount::from_declared(size),
            }),
            Self::UpdateBuffer { size } => Workload::BufferTransfer(BufferTransferWorkload {
                kind: BufferTransferKind::UpdateBuffer,
                bytes: ByteCount::Known(size),
            }),
            Self::CopyBuffer { regions } => Workload::BufferTransfer(BufferTransferWorkload {
                kind: BufferTransferKind::CopyBuffer,
                bytes: ByteCount::Known(regions.iter().fold(0u64, |a, &b| a.saturating_add(b))),
            }),

            Self::BuildAccelerationStructures(infos) => {
                let kind = if !infos.is_empty()
                    && infos
                        .iter()
                        .all(|i| i.mode == AccelerationStructureBuildKind::Update)
                {
                    AccelerationStructureBuildKind::Update
                } else {
                    AccelerationStructureBuildKind::Build
                };
                Workload::AccelerationStructureBuild(AccelerationStructureBuildWorkload {
                    kind,
                    primitives: Count::sum(infos.iter().map(|i| Count::Known(i.primitives))),
                })
            }
            Self::BuildAccelerationStructuresIndirect { mode } => {
                Workload::AccelerationStructureBuild(AccelerationStructureBuildWorkload {
                    kind: mode,
                    primitives: Count::Unknown,
                })
            }
            // Serialized and compacted sizes are only known after a device query
            Self::CopyAccelerationStructure { kind } => {
                Workload::AccelerationStructureTransfer(AccelerationStructureTransferWorkload {
                    kind,
                    bytes: ByteCount::Unknown,
                })
            }

            Self::BeginDebugLabel(_)
            | Self::EndDebugLabel
            | Self::BeginRenderPass(_)
            | Self::EndRenderPass
            | Self::Draw { .. }
            | Self::DrawIndirect { .. }
            | Self::Other(_) => return None,
        };
        Some(workload)
    }
}

fn image(kind: ImageTransferKind, pixels: Count) -> Workload {
    Workload::ImageTransfer(ImageTransferWorkload { kind, pixels })
}

fn clear_pixels(extent: Option<Extent3d>, layers: u32) -> Count {
    match extent {
        Some(extent) => Count::Known(extent.texels() * layers.max(1) as u64),
        None => Count::Unknown,
    }
}

fn region_pixels(regions: &[ImageRegion]) -> Count {
    Count::sum(regions.iter().map(|r| Count::Known(r.pixels())))
}
