//! The reflected parameter block shared by every effect.
//!
//! Effects declare only the parameters they actually read, so pushes are
//! routed by name against the layout reflected from the fragment shader. A
//! push for a name the shader never declared is reported and dropped, which
//! lets the renderer feed every effect the full parameter set without
//! tailoring the host code per shader.

/// One member of the reflected uniform block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    /// Byte offset inside the block, per the shader's std140 layout.
    pub offset: u32,
    pub size: u32,
}

/// CPU-side image of the effect's uniform block plus its reflected layout.
///
/// Pushes mutate the local image; [`UniformStore::flush`] uploads it in one
/// write when anything changed since the last flush.
pub struct UniformStore {
    fields: Vec<UniformField>,
    data: Vec<u8>,
    dirty: bool,
}

/// Uniform buffers cannot be empty; shaders with no parameter block still
/// get a small zeroed allocation behind binding 0.
const MIN_BLOCK_SIZE: usize = 16;

impl UniformStore {
    pub fn new(fields: Vec<UniformField>, block_size: u32) -> Self {
        let len = (block_size as usize).max(MIN_BLOCK_SIZE);
        Self {
            fields,
            data: vec![0u8; len],
            dirty: true,
        }
    }

    /// Size of the backing buffer in bytes.
    pub fn buffer_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn push_f32(&mut self, name: &str, value: f32) -> bool {
        self.push_bytes(name, &value.to_ne_bytes())
    }

    pub fn push_i32(&mut self, name: &str, value: i32) -> bool {
        self.push_bytes(name, &value.to_ne_bytes())
    }

    fn push_bytes(&mut self, name: &str, bytes: &[u8]) -> bool {
        let Some(field) = self.fields.iter().find(|field| field.name == name) else {
            tracing::info!(name, "uniform is not declared by the active effect");
            return false;
        };
        if (field.size as usize) < bytes.len() {
            tracing::warn!(
                name,
                declared = field.size,
                pushed = bytes.len(),
                "uniform push does not fit the declared member; dropped"
            );
            return false;
        }
        let start = field.offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.dirty = true;
        true
    }

    pub fn read_f32(&self, name: &str) -> Option<f32> {
        self.read_bytes(name).map(f32::from_ne_bytes)
    }

    pub fn read_i32(&self, name: &str) -> Option<i32> {
        self.read_bytes(name).map(i32::from_ne_bytes)
    }

    fn read_bytes(&self, name: &str) -> Option<[u8; 4]> {
        let field = self.fields.iter().find(|field| field.name == name)?;
        let start = field.offset as usize;
        self.data[start..start + 4].try_into().ok()
    }

    /// Uploads the block image if any push landed since the last flush.
    pub fn flush(&mut self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        if !self.dirty {
            return;
        }
        queue.write_buffer(buffer, 0, &self.data);
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UniformStore {
        UniformStore::new(
            vec![
                UniformField {
                    name: "inv_tex_width".into(),
                    offset: 0,
                    size: 4,
                },
                UniformField {
                    name: "inv_tex_height".into(),
                    offset: 4,
                    size: 4,
                },
                UniformField {
                    name: "kernel_size".into(),
                    offset: 8,
                    size: 4,
                },
            ],
            12,
        )
    }

    #[test]
    fn pushes_land_at_reflected_offsets() {
        let mut store = store();
        assert!(store.push_f32("inv_tex_width", 0.25));
        assert!(store.push_i32("kernel_size", 7));
        assert_eq!(store.read_f32("inv_tex_width"), Some(0.25));
        assert_eq!(store.read_i32("kernel_size"), Some(7));
    }

    #[test]
    fn undeclared_names_are_dropped_not_fatal() {
        let mut store = store();
        assert!(!store.push_f32("tex_size", 42.0));
        assert_eq!(store.read_f32("tex_size"), None);
    }

    #[test]
    fn empty_layouts_still_back_a_minimum_allocation() {
        let store = UniformStore::new(Vec::new(), 0);
        assert_eq!(store.buffer_len(), 16);
    }
}
