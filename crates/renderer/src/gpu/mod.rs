pub(crate) mod context;
pub(crate) mod pipeline;
pub mod provision;
pub(crate) mod state;
pub mod uniforms;
