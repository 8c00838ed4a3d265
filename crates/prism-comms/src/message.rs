//! # Telemetry Messages
//!
//! Every message is a JSON object whose `type` field names its kind. Frame
//! messages carry the frame index; workload messages carry the label stack,
//! the counters read around the workload, and kind-specific metadata.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use prism_core::{Labels, Workload};

// =============================================================================
// COUNTERS
// =============================================================================

/// A counter value, integer or floating point depending on the counter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CounterValue {
    /// Unsigned integer counter
    Integer(u64),
    /// Floating point counter
    Float(f64),
}

/// One counter reading, serialized as `{"<name>": <value>}`
#[derive(Debug, Clone, PartialEq)]
pub struct CounterReading {
    /// Counter name
    pub name: String,
    /// Value read
    pub value: CounterValue,
}

impl CounterReading {
    /// Create a reading
    pub fn new(name: impl Into<String>, value: CounterValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl Serialize for CounterReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.value)?;
        map.end()
    }
}

// =============================================================================
// WORKLOAD METADATA
// =============================================================================

/// `renderpass` metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderPassMetadata {
    /// Render pass tag
    pub tid: u64,
    /// Render area width
    pub width: u32,
    /// Render area height
    pub height: u32,
    /// Attachment count
    pub attachments: u32,
    /// Draw calls in the first part
    pub draw_calls: u64,
}

/// `compute` / `tracerays` metadata; `-1` marks an unknown dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DimensionsMetadata {
    /// X dimension
    pub x: i64,
    /// Y dimension
    pub y: i64,
    /// Z dimension
    pub z: i64,
}

/// `image_transfer` metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageTransferMetadata {
    /// Transfer kind name
    pub subtype: &'static str,
    /// Pixels written, or `-1`
    pub pixels: i64,
}

/// `buffer_transfer` / `as_transfer` metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteTransferMetadata {
    /// Transfer kind name
    pub subtype: &'static str,
    /// Bytes moved, `-1` unknown, `-2` whole resource
    pub bytes: i64,
}

/// `as_build` metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccelerationStructureBuildMetadata {
    /// Build mode name
    pub subtype: &'static str,
    /// Primitives, or `-1`
    pub primitives: i64,
}

/// Fields shared by every workload message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadMessage<M> {
    /// Debug labels open at record time, outermost first
    pub labels: Vec<String>,
    /// Counters read in the workload's trap cycle
    pub counters: Vec<CounterReading>,
    /// Kind-specific fields
    #[serde(flatten)]
    pub metadata: M,
}

// =============================================================================
// MESSAGE
// =============================================================================

/// A telemetry message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Message {
    /// First message of a workload-sampled frame
    #[serde(rename = "start_frame")]
    StartFrame {
        /// Frame index
        frame: u64,
    },
    /// Last message of a workload-sampled frame
    #[serde(rename = "end_frame")]
    EndFrame {
        /// Frame index
        frame: u64,
    },
    /// Whole-frame counters
    #[serde(rename = "frame")]
    Frame {
        /// Index of the frame the counters cover
        frame: u64,
        /// Counter readings
        counters: Vec<CounterReading>,
    },
    /// Render pass
    #[serde(rename = "renderpass")]
    RenderPass(WorkloadMessage<RenderPassMetadata>),
    /// Compute dispatch
    #[serde(rename = "compute")]
    Compute(WorkloadMessage<DimensionsMetadata>),
    /// Ray tracing dispatch
    #[serde(rename = "tracerays")]
    TraceRays(WorkloadMessage<DimensionsMetadata>),
    /// Image transfer
    #[serde(rename = "image_transfer")]
    ImageTransfer(WorkloadMessage<ImageTransferMetadata>),
    /// Buffer transfer
    #[serde(rename = "buffer_transfer")]
    BufferTransfer(WorkloadMessage<ByteTransferMetadata>),
    /// Acceleration structure build
    #[serde(rename = "as_build")]
    AccelerationStructureBuild(WorkloadMessage<AccelerationStructureBuildMetadata>),
    /// Acceleration structure transfer
    #[serde(rename = "as_transfer")]
    AccelerationStructureTransfer(WorkloadMessage<ByteTransferMetadata>),
}

impl Message {
    /// Build the message for a sampled workload
    ///
    /// Returns `None` for render pass continuations, which are sampled as
    /// part of the render pass they resume.
    pub fn from_workload(
        workload: &Workload,
        labels: &Labels,
        counters: Vec<CounterReading>,
    ) -> Option<Self> {
        fn wrap<M>(labels: &Labels, counters: Vec<CounterReading>, metadata: M) -> WorkloadMessage<M> {
            WorkloadMessage {
                labels: labels.to_vec(),
                counters,
                metadata,
            }
        }

        let message = match workload {
            Workload::RenderPass(w) => Self::RenderPass(wrap(
                labels,
                counters,
                RenderPassMetadata {
                    tid: w.tag.get(),
                    width: w.width,
                    height: w.height,
                    attachments: w.attachments,
                    draw_calls: w.draw_calls,
                },
            )),
            Workload::RenderPassContinuation(_) => return None,
            Workload::Dispatch(w) => Self::Compute(wrap(
                labels,
                counters,
                DimensionsMetadata {
                    x: w.x.to_wire(),
                    y: w.y.to_wire(),
                    z: w.z.to_wire(),
                },
            )),
            Workload::TraceRays(w) => Self::TraceRays(wrap(
                labels,
                counters,
                DimensionsMetadata {
                    x: w.x.to_wire(),
                    y: w.y.to_wire(),
                    z: w.z.to_wire(),
                },
            )),
            Workload::ImageTransfer(w) => Self::ImageTransfer(wrap(
                labels,
                counters,
                ImageTransferMetadata {
                    subtype: w.kind.name(),
                    pixels: w.pixels.to_wire(),
                },
            )),
            Workload::BufferTransfer(w) => Self::BufferTransfer(wrap(
                labels,
                counters,
                ByteTransferMetadata {
                    subtype: w.kind.name(),
                    bytes: w.bytes.to_wire(),
                },
            )),
            Workload::AccelerationStructureBuild(w) => Self::AccelerationStructureBuild(wrap(
                labels,
                counters,
                AccelerationStructureBuildMetadata {
                    subtype: w.kind.name(),
                    primitives: w.primitives.to_wire(),
                },
            )),
            Workload::AccelerationStructureTransfer(w) => {
                Self::AccelerationStructureTransfer(wrap(
                    labels,
                    counters,
                    ByteTransferMetadata {
                        subtype: w.kind.name(),
                        bytes: w.bytes.to_wire(),
                    },
                ))
            }
        };
        Some(message)
    }

    /// Value of the `type` field
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::StartFrame { .. } => "start_frame",
            Self::EndFrame { .. } => "end_frame",
            Self::Frame { .. } => "frame",
            Self::RenderPass(_) => "renderpass",
            Self::Compute(_) => "compute",
            Self::TraceRays(_) => "tracerays",
            Self::ImageTransfer(_) => "image_transfer",
            Self::BufferTransfer(_) => "buffer_transfer",
            Self::AccelerationStructureBuild(_) => "as_build",
            Self::AccelerationStructureTransfer(_) => "as_transfer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::*;
    use serde_json::json;
    use std::sync::Arc;

    fn labels(names: &[&str]) -> Labels {
        names.iter().map(|s| s.to_string()).collect::<Vec<_>>().into()
    }

    #[test]
    fn test_frame_markers() {
        let start = serde_json::to_value(Message::StartFrame { frame: 5 }).unwrap();
        assert_eq!(start, json!({"type": "start_frame", "frame": 5}));

        let end = serde_json::to_value(Message::EndFrame { frame: 5 }).unwrap();
        assert_eq!(end, json!({"type": "end_frame", "frame": 5}));
    }

    #[test]
    fn test_frame_counters_are_single_entry_maps() {
        let message = Message::Frame {
            frame: 2,
            counters: vec![
                CounterReading::new("cycles", CounterValue::Integer(1200)),
                CounterReading::new("occupancy", CounterValue::Float(0.5)),
            ],
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "frame",
                "frame": 2,
                "counters": [{"cycles": 1200}, {"occupancy": 0.5}],
            })
        );
    }

    #[test]
    fn test_indirect_dispatch_reports_unknown() {
        let workload = Workload::Dispatch(DispatchWorkload::indirect());
        let message = Message::from_workload(&workload, &labels(&["culling"]), Vec::new()).unwrap();
        assert_eq!(message.type_name(), "compute");
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "compute",
                "labels": ["culling"],
                "counters": [],
                "x": -1, "y": -1, "z": -1,
            })
        );
    }

    #[test]
    fn test_whole_buffer_fill_reports_whole_resource() {
        let workload = Workload::BufferTransfer(BufferTransferWorkload {
            kind: BufferTransferKind::FillBuffer,
            bytes: ByteCount::from_declared(WHOLE_SIZE),
        });
        let value =
            serde_json::to_value(Message::from_workload(&workload, &labels(&[]), Vec::new()))
                .unwrap();
        assert_eq!(value["subtype"], "fill_buffer");
        assert_eq!(value["bytes"], -2);
    }

    #[test]
    fn test_render_pass_metadata() {
        let tag = RenderPassTag::from_raw(42);
        let workload = Workload::RenderPass(RenderPassWorkload {
            tag,
            width: 1280,
            height: 720,
            attachments: 3,
            suspending: false,
            draw_calls: 17,
            trapped: true,
        });
        let counters = vec![CounterReading::new("cycles", CounterValue::Integer(9))];
        let message = Message::from_workload(&workload, &labels(&["gbuffer"]), counters).unwrap();

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "renderpass");
        assert_eq!(value["tid"], 42);
        assert_eq!(value["width"], 1280);
        assert_eq!(value["height"], 720);
        assert_eq!(value["attachments"], 3);
        assert_eq!(value["draw_calls"], 17);
        assert_eq!(value["counters"], json!([{"cycles": 9}]));
    }

    #[test]
    fn test_continuation_has_no_message() {
        let workload = Workload::RenderPassContinuation(ContinuationWorkload {
            origin: None,
            suspending: false,
            draw_calls: 2,
            trapped: true,
        });
        let empty: Labels = Arc::from(Vec::<String>::new());
        assert!(Message::from_workload(&workload, &empty, Vec::new()).is_none());
    }

    #[test]
    fn test_transfer_subtypes() {
        let image = Workload::ImageTransfer(ImageTransferWorkload {
            kind: ImageTransferKind::CopyImage,
            pixels: Count::Known(4096),
        });
        let value = serde_json::to_value(Message::from_workload(&image, &labels(&[]), Vec::new()))
            .unwrap();
        assert_eq!(value["subtype"], "copy_image");
        assert_eq!(value["pixels"], 4096);

        let build = Workload::AccelerationStructureBuild(AccelerationStructureBuildWorkload {
            kind: AccelerationStructureBuildKind::Update,
            primitives: Count::Unknown,
        });
        let value = serde_json::to_value(Message::from_workload(&build, &labels(&[]), Vec::new()))
            .unwrap();
        assert_eq!(value["type"], "as_build");
        assert_eq!(value["subtype"], "update");
        assert_eq!(value["primitives"], -1);
    }
}
