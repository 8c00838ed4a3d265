//! # Workload Records
//!
//! One [`Workload`] describes one unit of device work: a render pass, a
//! dispatch, a trace-rays call, a transfer, or an acceleration structure
//! operation. A [`WorkloadRecord`] pairs it with the debug labels that were
//! open when the application recorded it.
//!
//! Sizes the driver does not expose are kept as explicit sentinels
//! ([`Count::Unknown`], [`ByteCount::WholeResource`]) rather than estimated.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::labels::Labels;

// =============================================================================
// SENTINELS
// =============================================================================

/// Driver value meaning "from the offset to the end of the resource"
pub const WHOLE_SIZE: u64 = u64::MAX;

/// Wire value for an unknown count
pub const WIRE_UNKNOWN: i64 = -1;

/// Wire value for a whole-resource byte count
pub const WIRE_WHOLE_RESOURCE: i64 = -2;

/// An item, pixel or primitive count that may be unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Count {
    /// Count known at record time
    Known(u64),
    /// Count not available (indirect arguments, unexposed metadata)
    Unknown,
}

impl Count {
    /// Wire encoding: the count, or [`WIRE_UNKNOWN`]
    pub const fn to_wire(self) -> i64 {
        match self {
            Self::Known(n) => n as i64,
            Self::Unknown => WIRE_UNKNOWN,
        }
    }

    /// Sum known counts; any unknown term makes the total unknown
    pub fn sum(counts: impl IntoIterator<Item = Count>) -> Self {
        counts.into_iter().fold(Self::Known(0), |acc, c| match (acc, c) {
            (Self::Known(a), Self::Known(b)) => Self::Known(a.saturating_add(b)),
            _ => Self::Unknown,
        })
    }
}

/// A byte count that may be unknown or cover the whole resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteCount {
    /// Size known at record time
    Known(u64),
    /// Size not available
    Unknown,
    /// Operation covers the resource from its offset to the end
    WholeResource,
}

impl ByteCount {
    /// Classify a declared size, mapping [`WHOLE_SIZE`] to the sentinel
    pub const fn from_declared(size: u64) -> Self {
        if size == WHOLE_SIZE {
            Self::WholeResource
        } else {
            Self::Known(size)
        }
    }

    /// Wire encoding: the size, [`WIRE_UNKNOWN`] or [`WIRE_WHOLE_RESOURCE`]
    pub const fn to_wire(self) -> i64 {
        match self {
            Self::Known(n) => n as i64,
            Self::Unknown => WIRE_UNKNOWN,
            Self::WholeResource => WIRE_WHOLE_RESOURCE,
        }
    }
}

// =============================================================================
// RENDER PASS TAGS
// =============================================================================

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// Identity of one logical render pass across its suspended parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPassTag(u64);

impl RenderPassTag {
    /// Allocate a process-unique tag
    pub fn next() -> Self {
        Self(NEXT_TAG.fetch_add(1, Ordering::Relaxed))
    }

    /// Build a tag from a raw value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw tag value
    pub const fn get(self) -> u64 {
        self.0
    }
}

// =============================================================================
// WORKLOAD PAYLOADS
// =============================================================================

/// A logical render pass, recorded when its first part begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPassWorkload {
    /// Identity shared with any continuations
    pub tag: RenderPassTag,
    /// Render area width
    pub width: u32,
    /// Render area height
    pub height: u32,
    /// Number of attachments
    pub attachments: u32,
    /// First part ended suspended; continuations follow
    pub suspending: bool,
    /// Draw calls recorded in the first part
    pub draw_calls: u64,
    /// The device traps after this part
    pub trapped: bool,
}

/// A render pass part that resumes an earlier suspended render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationWorkload {
    /// Originating render pass, when known at record time
    pub origin: Option<RenderPassTag>,
    /// This part also ended suspended
    pub suspending: bool,
    /// Draw calls recorded in this part
    pub draw_calls: u64,
    /// The device traps after this part
    pub trapped: bool,
}

/// Compute dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchWorkload {
    /// Work groups in X
    pub x: Count,
    /// Work groups in Y
    pub y: Count,
    /// Work groups in Z
    pub z: Count,
}

impl DispatchWorkload {
    /// Direct dispatch with known dimensions
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self {
            x: Count::Known(x as u64),
            y: Count::Known(y as u64),
            z: Count::Known(z as u64),
        }
    }

    /// Indirect dispatch; every dimension is unknown
    pub const fn indirect() -> Self {
        Self {
            x: Count::Unknown,
            y: Count::Unknown,
            z: Count::Unknown,
        }
    }
}

/// Ray tracing dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRaysWorkload {
    /// Rays in X
    pub x: Count,
    /// Rays in Y
    pub y: Count,
    /// Rays in Z
    pub z: Count,
}

impl TraceRaysWorkload {
    /// Direct trace with known dimensions
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            x: Count::Known(width as u64),
            y: Count::Known(height as u64),
            z: Count::Known(depth as u64),
        }
    }

    /// Indirect trace; every dimension is unknown
    pub const fn indirect() -> Self {
        Self {
            x: Count::Unknown,
            y: Count::Unknown,
            z: Count::Unknown,
        }
    }
}

/// Image transfer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTransferKind {
    /// Clear a color image
    ClearColor,
    /// Clear a depth/stencil image
    ClearDepthStencil,
    /// Image to image copy
    CopyImage,
    /// Scaled image to image copy
    BlitImage,
    /// Multisample resolve
    ResolveImage,
    /// Buffer to image copy
    CopyBufferToImage,
    /// Image to buffer copy
    CopyImageToBuffer,
}

impl ImageTransferKind {
    /// Telemetry subtype name
    pub const fn name(self) -> &'static str {
        match self {
            Self::ClearColor => "clear_color_image",
            Self::ClearDepthStencil => "clear_depth_stencil_image",
            Self::CopyImage => "copy_image",
            Self::BlitImage => "blit_image",
            Self::ResolveImage => "resolve_image",
            Self::CopyBufferToImage => "copy_buffer_to_image",
            Self::CopyImageToBuffer => "copy_image_to_buffer",
        }
    }
}

/// Image transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTransferWorkload {
    /// Transfer kind
    pub kind: ImageTransferKind,
    /// Pixels written
    pub pixels: Count,
}

/// Buffer transfer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTransferKind {
    /// Fill with a constant
    FillBuffer,
    /// Inline data update
    UpdateBuffer,
    /// Buffer to buffer copy
    CopyBuffer,
}

impl BufferTransferKind {
    /// Telemetry subtype name
    pub const fn name(self) -> &'static str {
        match self {
            Self::FillBuffer => "fill_buffer",
            Self::UpdateBuffer => "update_buffer",
            Self::CopyBuffer => "copy_buffer",
        }
    }
}

/// Buffer transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTransferWorkload {
    /// Transfer kind
    pub kind: BufferTransferKind,
    /// Bytes written
    pub bytes: ByteCount,
}

/// Acceleration structure build mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccelerationStructureBuildKind {
    /// Full build
    Build,
    /// In-place update of an existing structure
    Update,
}

impl AccelerationStructureBuildKind {
    /// Telemetry subtype name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Update => "update",
        }
    }
}

/// Acceleration structure build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelerationStructureBuildWorkload {
    /// Build mode
    pub kind: AccelerationStructureBuildKind,
    /// Primitives consumed by the build
    pub primitives: Count,
}

/// Acceleration structure transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccelerationStructureTransferKind {
    /// Structure to structure (clone or compact)
    StructureToStructure,
    /// Structure serialized to memory
    StructureToMemory,
    /// Memory deserialized into a structure
    MemoryToStructure,
}

impl AccelerationStructureTransferKind {
    /// Telemetry subtype name
    pub const fn name(self) -> &'static str {
        match self {
            Self::StructureToStructure => "struct_to_struct",
            Self::StructureToMemory => "struct_to_mem",
            Self::MemoryToStructure => "mem_to_struct",
        }
    }
}

/// Acceleration structure transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelerationStructureTransferWorkload {
    /// Transfer direction
    pub kind: AccelerationStructureTransferKind,
    /// Bytes transferred
    pub bytes: ByteCount,
}

// =============================================================================
// WORKLOAD
// =============================================================================

/// Closed set of workload kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workload {
    /// Logical render pass
    RenderPass(RenderPassWorkload),
    /// Resumed part of a suspended render pass
    RenderPassContinuation(ContinuationWorkload),
    /// Compute dispatch
    Dispatch(DispatchWorkload),
    /// Ray tracing dispatch
    TraceRays(TraceRaysWorkload),
    /// Image transfer
    ImageTransfer(ImageTransferWorkload),
    /// Buffer transfer
    BufferTransfer(BufferTransferWorkload),
    /// Acceleration structure build
    AccelerationStructureBuild(AccelerationStructureBuildWorkload),
    /// Acceleration structure transfer
    AccelerationStructureTransfer(AccelerationStructureTransferWorkload),
}

/// Discriminant of [`Workload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    /// See [`Workload::RenderPass`]
    RenderPass,
    /// See [`Workload::RenderPassContinuation`]
    RenderPassContinuation,
    /// See [`Workload::Dispatch`]
    Dispatch,
    /// See [`Workload::TraceRays`]
    TraceRays,
    /// See [`Workload::ImageTransfer`]
    ImageTransfer,
    /// See [`Workload::BufferTransfer`]
    BufferTransfer,
    /// See [`Workload::AccelerationStructureBuild`]
    AccelerationStructureBuild,
    /// See [`Workload::AccelerationStructureTransfer`]
    AccelerationStructureTransfer,
}

impl WorkloadKind {
    /// Telemetry `type` name
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::RenderPass => "renderpass",
            Self::RenderPassContinuation => "renderpass_continuation",
            Self::Dispatch => "compute",
            Self::TraceRays => "tracerays",
            Self::ImageTransfer => "image_transfer",
            Self::BufferTransfer => "buffer_transfer",
            Self::AccelerationStructureBuild => "as_build",
            Self::AccelerationStructureTransfer => "as_transfer",
        }
    }
}

impl Workload {
    /// Get the workload kind
    pub const fn kind(&self) -> WorkloadKind {
        match self {
            Self::RenderPass(_) => WorkloadKind::RenderPass,
            Self::RenderPassContinuation(_) => WorkloadKind::RenderPassContinuation,
            Self::Dispatch(_) => WorkloadKind::Dispatch,
            Self::TraceRays(_) => WorkloadKind::TraceRays,
            Self::ImageTransfer(_) => WorkloadKind::ImageTransfer,
            Self::BufferTransfer(_) => WorkloadKind::BufferTransfer,
            Self::AccelerationStructureBuild(_) => WorkloadKind::AccelerationStructureBuild,
            Self::AccelerationStructureTransfer(_) => WorkloadKind::AccelerationStructureTransfer,
        }
    }

    /// Check if the device traps after this workload
    ///
    /// Render pass parts trap only at the end of the logical pass, and only
    /// when it was captured; every other recorded workload traps.
    pub const fn traps(&self) -> bool {
        match self {
            Self::RenderPass(w) => w.trapped,
            Self::RenderPassContinuation(w) => w.trapped,
            _ => true,
        }
    }
}

// =============================================================================
// WORKLOAD RECORD
// =============================================================================

/// A workload plus the debug labels open when it was recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRecord {
    workload: Workload,
    labels: Labels,
}

static_assertions::assert_impl_all!(WorkloadRecord: Send, Sync);

impl WorkloadRecord {
    /// Create a record
    pub fn new(workload: Workload, labels: Labels) -> Self {
        Self { workload, labels }
    }

    /// Get the workload
    pub fn workload(&self) -> &Workload {
        &self.workload
    }

    /// Get the workload mutably (render pass metadata is completed at end)
    pub fn workload_mut(&mut self) -> &mut Workload {
        &mut self.workload
    }

    /// Get the captured labels
    pub fn labels(&self) -> &Labels {
        &self.labels
    }
}
