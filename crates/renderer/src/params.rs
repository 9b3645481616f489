//! Live kernel-size control for the Kuwahara effects.

use crate::gpu::uniforms::UniformStore;

pub const MIN_KERNEL_SIZE: i32 = 2;
pub const MAX_KERNEL_SIZE: i32 = 15;

/// Name of the uniform the Kuwahara shaders read their kernel from.
pub(crate) const KERNEL_UNIFORM: &str = "kernel_size";

pub fn clamp_kernel(value: i32) -> i32 {
    value.clamp(MIN_KERNEL_SIZE, MAX_KERNEL_SIZE)
}

/// Holds the current kernel size and pushes every change to the shader's
/// `kernel_size` uniform in the same event turn it happens.
pub struct KernelController {
    value: i32,
}

impl KernelController {
    pub fn new(initial: i32) -> Self {
        let value = clamp_kernel(initial);
        if value != initial {
            tracing::warn!(requested = initial, clamped = value, "kernel size out of range");
        }
        Self { value }
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    /// Grows the kernel by one step; a no-op at the upper bound.
    pub fn increment(&mut self, uniforms: &mut UniformStore) -> bool {
        self.apply(self.value + 1, uniforms)
    }

    /// Shrinks the kernel by one step; a no-op at the lower bound.
    pub fn decrement(&mut self, uniforms: &mut UniformStore) -> bool {
        self.apply(self.value - 1, uniforms)
    }

    fn apply(&mut self, requested: i32, uniforms: &mut UniformStore) -> bool {
        let next = clamp_kernel(requested);
        if next == self.value {
            return false;
        }
        self.value = next;
        tracing::info!(kernel_size = next, "kernel size changed");
        uniforms.push_i32(KERNEL_UNIFORM, next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::uniforms::UniformField;

    fn kernel_store() -> UniformStore {
        UniformStore::new(
            vec![UniformField {
                name: KERNEL_UNIFORM.into(),
                offset: 0,
                size: 4,
            }],
            4,
        )
    }

    #[test]
    fn each_change_is_pushed_in_order() {
        let mut store = kernel_store();
        let mut controller = KernelController::new(5);

        assert!(controller.increment(&mut store));
        assert_eq!(store.read_i32(KERNEL_UNIFORM), Some(6));
        assert!(controller.increment(&mut store));
        assert_eq!(store.read_i32(KERNEL_UNIFORM), Some(7));
        assert!(controller.decrement(&mut store));
        assert_eq!(store.read_i32(KERNEL_UNIFORM), Some(6));
    }

    #[test]
    fn bounds_are_no_ops_not_wraparounds() {
        let mut store = kernel_store();

        let mut at_max = KernelController::new(MAX_KERNEL_SIZE);
        assert!(!at_max.increment(&mut store));
        assert_eq!(at_max.value(), MAX_KERNEL_SIZE);

        let mut at_min = KernelController::new(MIN_KERNEL_SIZE);
        assert!(!at_min.decrement(&mut store));
        assert_eq!(at_min.value(), MIN_KERNEL_SIZE);
    }

    #[test]
    fn out_of_range_initial_values_are_clamped() {
        assert_eq!(KernelController::new(0).value(), MIN_KERNEL_SIZE);
        assert_eq!(KernelController::new(99).value(), MAX_KERNEL_SIZE);
        assert_eq!(KernelController::new(5).value(), 5);
    }
}
