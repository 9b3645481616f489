//! The windowed event loop.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::gpu::state::GpuState;
use crate::types::{RenderError, ViewerConfig};

pub(crate) fn run(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = WindowBuilder::new()
        .with_title(config.window_title.clone())
        .with_inner_size(PhysicalSize::new(
            config.surface_size.0,
            config.surface_size.1,
        ))
        .build(&event_loop)
        .context("failed to create window")?;

    let mut state = GpuState::new(&window, &config)?;
    let mut pacer = FramePacer::new(config.target_fps);

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(new_size) => state.resize(new_size),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                match event.logical_key.as_ref() {
                    Key::Character("=") | Key::Character("+") => state.increment_kernel(),
                    Key::Character("-") => state.decrement_kernel(),
                    Key::Named(NamedKey::Escape) => elwt.exit(),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => match state.render() {
                Ok(()) => pacer.mark_frame(Instant::now()),
                Err(RenderError::Surface(
                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                )) => {
                    let size = state.size();
                    state.resize(size);
                }
                Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                    tracing::error!("GPU out of memory; shutting down");
                    elwt.exit();
                }
                Err(RenderError::Surface(err)) => {
                    tracing::warn!(error = %err, "transient surface error; skipping frame");
                }
                Err(RenderError::Media(err)) => {
                    tracing::error!(error = %err, "video decoding failed; shutting down");
                    elwt.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if pacer.frame_due(now) {
                window.request_redraw();
            }
            match pacer.deadline() {
                Some(deadline) => elwt.set_control_flow(ControlFlow::WaitUntil(deadline)),
                None => elwt.set_control_flow(ControlFlow::Poll),
            }
        }
        _ => {}
    })?;

    Ok(())
}

/// Caps the redraw rate when a target is set; uncapped otherwise.
struct FramePacer {
    interval: Option<Duration>,
    next_frame: Instant,
}

impl FramePacer {
    fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)));
        Self {
            interval,
            next_frame: Instant::now(),
        }
    }

    fn frame_due(&self, now: Instant) -> bool {
        match self.interval {
            None => true,
            Some(_) => now >= self.next_frame,
        }
    }

    fn mark_frame(&mut self, now: Instant) {
        let Some(interval) = self.interval else {
            return;
        };
        self.next_frame += interval;
        // Resynchronize rather than bursting after a stall.
        if self.next_frame < now {
            self.next_frame = now + interval;
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.interval.map(|_| self.next_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_pacer_is_always_due() {
        let pacer = FramePacer::new(None);
        assert!(pacer.frame_due(Instant::now()));
        assert!(pacer.deadline().is_none());
    }

    #[test]
    fn capped_pacer_waits_out_the_interval() {
        let mut pacer = FramePacer::new(Some(10.0));
        let start = Instant::now();
        assert!(pacer.frame_due(start));

        pacer.mark_frame(start);
        assert!(!pacer.frame_due(start + Duration::from_millis(50)));
        assert!(pacer.frame_due(start + Duration::from_millis(150)));
    }

    #[test]
    fn stalled_pacer_resynchronizes_instead_of_bursting() {
        let mut pacer = FramePacer::new(Some(10.0));
        let start = Instant::now();
        pacer.mark_frame(start);

        let after_stall = start + Duration::from_secs(5);
        pacer.mark_frame(after_stall);
        assert!(!pacer.frame_due(after_stall + Duration::from_millis(50)));
        assert!(pacer.frame_due(after_stall + Duration::from_millis(150)));
    }

    #[test]
    fn non_positive_rates_disable_the_cap() {
        assert!(FramePacer::new(Some(0.0)).interval.is_none());
        assert!(FramePacer::new(Some(-30.0)).interval.is_none());
    }
}
