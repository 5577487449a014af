// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Engine configuration.

/// Tuning knobs for a [`Vm`](crate::Vm).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Operand stack slots allocated up front.
    pub initial_stack_size: usize,
    /// Live objects at which the first collection triggers.
    pub gc_threshold: usize,
    /// Headroom added to the live count after each collection.
    pub gc_threshold_increment: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            initial_stack_size: 4096,
            gc_threshold: 1024,
            gc_threshold_increment: 1024,
        }
    }
}

impl VmConfig {
    pub fn with_stack_size(mut self, slots: usize) -> Self {
        self.initial_stack_size = slots;
        self
    }

    pub fn with_gc_threshold(mut self, objects: usize) -> Self {
        self.gc_threshold = objects;
        self
    }

    pub fn with_gc_increment(mut self, objects: usize) -> Self {
        self.gc_threshold_increment = objects;
        self
    }
}
