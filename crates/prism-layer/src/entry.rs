//! # Entrypoint Table
//!
//! Which driver entrypoints the layer handles itself. Anything not in the
//! table resolves to [`Interception::Passthrough`].

use hashbrown::HashMap;

use crate::config::ProfileConfig;

/// How an entrypoint is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interception {
    /// Routed through the layer
    Layer,
    /// Forwarded straight to the driver
    Passthrough,
}

/// Entrypoints always handled, to track device lifetime
const LIFECYCLE: &[&str] = &["vkCreateDevice", "vkDestroyDevice", "vkGetDeviceQueue"];

/// Entrypoints handled when profiling is active
const PROFILING: &[&str] = &[
    "vkAllocateCommandBuffers",
    "vkFreeCommandBuffers",
    "vkBeginCommandBuffer",
    "vkEndCommandBuffer",
    "vkResetCommandBuffer",
    "vkCmdBeginDebugUtilsLabelEXT",
    "vkCmdEndDebugUtilsLabelEXT",
    "vkCmdBeginRenderPass",
    "vkCmdBeginRenderPass2",
    "vkCmdBeginRendering",
    "vkCmdEndRenderPass",
    "vkCmdEndRenderPass2",
    "vkCmdEndRendering",
    "vkCmdDraw",
    "vkCmdDrawIndexed",
    "vkCmdDrawIndirect",
    "vkCmdDrawIndexedIndirect",
    "vkCmdDispatch",
    "vkCmdDispatchBase",
    "vkCmdDispatchIndirect",
    "vkCmdTraceRaysKHR",
    "vkCmdTraceRaysIndirectKHR",
    "vkCmdClearColorImage",
    "vkCmdClearDepthStencilImage",
    "vkCmdCopyImage",
    "vkCmdBlitImage",
    "vkCmdResolveImage",
    "vkCmdCopyBufferToImage",
    "vkCmdCopyImageToBuffer",
    "vkCmdFillBuffer",
    "vkCmdUpdateBuffer",
    "vkCmdCopyBuffer",
    "vkCmdBuildAccelerationStructuresKHR",
    "vkCmdBuildAccelerationStructuresIndirectKHR",
    "vkCmdCopyAccelerationStructureKHR",
    "vkCmdCopyAccelerationStructureToMemoryKHR",
    "vkCmdCopyMemoryToAccelerationStructureKHR",
    "vkCmdExecuteCommands",
    "vkQueueSubmit",
    "vkQueueSubmit2",
    "vkQueuePresentKHR",
];

/// Name to [`Interception`] map, built once at startup
#[derive(Debug, Clone, Default)]
pub struct EntryPointTable {
    entries: HashMap<&'static str, Interception>,
}

impl EntryPointTable {
    /// Create an empty table (everything passes through)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table for `config`
    ///
    /// With profiling inactive only device lifetime is tracked, so recording
    /// and submission calls cost nothing beyond the lookup.
    pub fn for_config(config: &ProfileConfig) -> Self {
        let mut table = Self::new();
        for &name in LIFECYCLE {
            table.register(name, Interception::Layer);
        }
        if config.is_active() {
            for &name in PROFILING {
                table.register(name, Interception::Layer);
            }
        }
        log::debug!("EntryPoints: {} intercepted", table.len());
        table
    }

    /// Set how `name` resolves
    pub fn register(&mut self, name: &'static str, interception: Interception) {
        self.entries.insert(name, interception);
    }

    /// Resolve an entrypoint
    pub fn resolve(&self, name: &str) -> Interception {
        self.entries
            .get(name)
            .copied()
            .unwrap_or(Interception::Passthrough)
    }

    /// Number of entries routed through the layer
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|&&i| i == Interception::Layer)
            .count()
    }

    /// Check if nothing is routed through the layer
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names routed through the layer
    pub fn intercepted(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .filter(|(_, &i)| i == Interception::Layer)
            .map(|(&name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_entrypoint_passes_through() {
        let table = EntryPointTable::new();
        assert_eq!(table.resolve("vkCmdDispatch"), Interception::Passthrough);
        assert!(table.is_empty());
    }

    #[test]
    fn test_inactive_config_tracks_lifecycle_only() {
        let table = EntryPointTable::for_config(&ProfileConfig::default());
        assert_eq!(table.resolve("vkCreateDevice"), Interception::Layer);
        assert_eq!(table.resolve("vkQueueSubmit"), Interception::Passthrough);
        assert_eq!(table.len(), LIFECYCLE.len());
    }

    #[test]
    fn test_active_config_intercepts_recording() {
        let config = ProfileConfig::default().with_frame_list([1]);
        let table = EntryPointTable::for_config(&config);
        assert_eq!(table.resolve("vkCmdDispatchIndirect"), Interception::Layer);
        assert_eq!(table.resolve("vkQueuePresentKHR"), Interception::Layer);
        assert_eq!(table.resolve("vkCmdSetViewport"), Interception::Passthrough);
        assert!(table.intercepted().any(|n| n == "vkCmdExecuteCommands"));
    }

    #[test]
    fn test_register_overrides() {
        let mut table = EntryPointTable::for_config(&ProfileConfig::default());
        table.register("vkGetDeviceQueue", Interception::Passthrough);
        assert_eq!(table.resolve("vkGetDeviceQueue"), Interception::Passthrough);
    }
}
