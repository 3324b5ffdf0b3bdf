//! Windowed host for a [`GameRunner`].
//!
//! [`run_windowed`] takes ownership of a runner with an active session and
//! drives it from a winit event loop, presenting through a
//! [`WindowSink`]. Each `RedrawRequested` ticks once, logs the drained
//! events, renders and presents.
//!
//! Controls:
//!
//! | Input | Action |
//! |---|---|
//! | left click / drag | point / box select |
//! | right click | smart command |
//! | mouse wheel | zoom |
//! | arrow keys | pan |
//! | `0`-`9` | select control group |
//! | `Ctrl` + `0`-`9` | assign control group |
//! | `H`, `S` | hold, stop |
//! | `P` | pause / resume |
//! | `Esc` | quit |
//!
//! This module is feature-gated behind `present`.

use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, ModifiersState, NamedKey};
use winit::window::{WindowAttributes, WindowId};

use bwbridge_render::present::WindowSink;

use crate::camera::ScreenPoint;
use crate::events::GameEvent;
use crate::runner::{GameRunner, RunnerState};

/// Screen pixels per arrow-key press.
const PAN_STEP: f32 = 48.0;
/// Cursor travel below which a left press and release count as a click.
const DRAG_THRESHOLD: f32 = 4.0;

/// Run `runner` in a window until it is closed.
///
/// # Errors
///
/// Returns an error if the event loop cannot be created or the window or
/// GPU sink fails to initialize.
pub fn run_windowed(
    runner: GameRunner,
    window_title: &str,
    width: u32,
    height: u32,
) -> Result<(), anyhow::Error> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let mut app = App {
        state: AppState::Pending {
            runner,
            title: window_title.to_owned(),
            width,
            height,
        },
        init_failed: false,
        input: InputState::default(),
    };

    event_loop.run_app(&mut app)?;

    if app.init_failed {
        return Err(anyhow::anyhow!(
            "failed to initialize the game window (see logs for details)"
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Internal state machine
// ---------------------------------------------------------------------------

/// Winit 0.30 only allows window creation inside `resumed`, hence the
/// pending phase.
enum AppState {
    Pending {
        runner: GameRunner,
        title: String,
        width: u32,
        height: u32,
    },
    Running {
        runner: GameRunner,
        sink: WindowSink,
    },
    Transitioning,
}

#[derive(Default)]
struct InputState {
    cursor: ScreenPoint,
    drag_start: Option<ScreenPoint>,
    modifiers: ModifiersState,
}

struct App {
    state: AppState,
    init_failed: bool,
    input: InputState,
}

fn log_event(event: &GameEvent) {
    match event {
        GameEvent::FrameUpdated(_) => {}
        GameEvent::Advisory(advisory) => tracing::info!(%advisory, "advisory"),
        GameEvent::GameEnded { victory } => tracing::info!(victory, "game over"),
        other => tracing::debug!(event = ?other, "game event"),
    }
}

fn handle_key(runner: &mut GameRunner, key: &Key, modifiers: ModifiersState, event_loop: &ActiveEventLoop) {
    match key {
        Key::Named(NamedKey::Escape) => event_loop.exit(),
        Key::Named(NamedKey::ArrowLeft) => runner.pan_camera(-PAN_STEP, 0.0),
        Key::Named(NamedKey::ArrowRight) => runner.pan_camera(PAN_STEP, 0.0),
        Key::Named(NamedKey::ArrowUp) => runner.pan_camera(0.0, -PAN_STEP),
        Key::Named(NamedKey::ArrowDown) => runner.pan_camera(0.0, PAN_STEP),
        Key::Character(text) => {
            let Some(c) = text.chars().next() else {
                return;
            };
            if let Some(digit) = c.to_digit(10) {
                if modifiers.control_key() {
                    runner.assign_control_group(digit as i32);
                } else {
                    runner.select_control_group(digit as i32);
                }
                return;
            }
            match c.to_ascii_lowercase() {
                'h' => runner.hold_position(),
                's' => runner.stop_selected(),
                'p' => match runner.state() {
                    RunnerState::Running => runner.pause(),
                    RunnerState::Paused => runner.resume(),
                    _ => {}
                },
                _ => {}
            }
        }
        _ => {}
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let state = std::mem::replace(&mut self.state, AppState::Transitioning);
        match state {
            AppState::Pending {
                mut runner,
                title,
                width,
                height,
            } => {
                let attrs = WindowAttributes::default()
                    .with_title(title)
                    .with_inner_size(winit::dpi::PhysicalSize::new(width, height));
                let window = match event_loop.create_window(attrs) {
                    Ok(window) => Arc::new(window),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to create window -- exiting");
                        self.fail(event_loop, runner, width, height);
                        return;
                    }
                };
                let (fb_w, fb_h) = {
                    let fb = runner.compositor().framebuffer();
                    (fb.width(), fb.height())
                };
                match pollster::block_on(WindowSink::new(window.clone(), fb_w, fb_h)) {
                    Ok(mut sink) => {
                        let size = window.inner_size();
                        runner.set_viewport(size.width as f32, size.height as f32);
                        sink.set_zoom(runner.zoom());
                        tracing::info!(width, height, fb_w, fb_h, "game window created");
                        window.request_redraw();
                        self.state = AppState::Running { runner, sink };
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to initialize GPU sink -- exiting");
                        self.fail(event_loop, runner, width, height);
                    }
                }
            }
            running @ AppState::Running { .. } => self.state = running,
            AppState::Transitioning => {
                tracing::warn!("resumed called during state transition");
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let AppState::Running { runner, sink } = &mut self.state else {
            return;
        };
        let input = &mut self.input;
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!(frame = runner.current_frame(), "window close requested -- shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                runner.set_viewport(size.width as f32, size.height as f32);
                sink.resize(size);
            }
            WindowEvent::ModifiersChanged(mods) => input.modifiers = mods.state(),
            WindowEvent::CursorMoved { position, .. } => {
                input.cursor = ScreenPoint::new(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput { state, button, .. } => match (button, state) {
                (MouseButton::Left, ElementState::Pressed) => input.drag_start = Some(input.cursor),
                (MouseButton::Left, ElementState::Released) => {
                    if let Some(start) = input.drag_start.take() {
                        if start.distance(input.cursor) < DRAG_THRESHOLD {
                            runner.select_at(input.cursor);
                        } else {
                            runner.select_box(start, input.cursor);
                        }
                    }
                }
                (MouseButton::Right, ElementState::Pressed) => {
                    runner.command_selected_to(input.cursor, true);
                }
                _ => {}
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                runner.set_zoom(runner.zoom() * 1.1_f32.powf(steps));
                sink.set_zoom(runner.zoom());
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                handle_key(runner, &event.logical_key, input.modifiers, event_loop);
            }
            WindowEvent::RedrawRequested => {
                runner.tick();
                for event in runner.drain_events() {
                    log_event(&event);
                }
                runner.render();
                if let Err(e) = runner.present(&mut *sink) {
                    tracing::error!(error = %e, "presentation failed -- exiting");
                    event_loop.exit();
                    return;
                }
                sink.window().request_redraw();
            }
            _ => {}
        }
    }
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, runner: GameRunner, width: u32, height: u32) {
        self.init_failed = true;
        self.state = AppState::Pending {
            runner,
            title: String::new(),
            width,
            height,
        };
        event_loop.exit();
    }
}
