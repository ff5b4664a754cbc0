use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use plotconfig::PlotConfig;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};
use xyplot::gpu::{PlotRenderer, SurfaceContext, SurfaceError, SurfaceOptions};
use xyplot::{Color, DataSource, ItemSize, PlotNode, XyPlot};

use crate::signal::Signal;

const DEFAULT_WINDOW_SIZE: [u32; 2] = [960, 600];
const DEFAULT_SAMPLES: u32 = 4;
const MAX_MARKER_SEGMENTS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowOptions {
    pub size: [u32; 2],
    pub sample_count: u32,
    /// Delay between signal updates.
    pub tick: Duration,
}

impl WindowOptions {
    pub fn from_config(config: &PlotConfig) -> Self {
        let mut tick = config.signal.interval;
        if let Some(fps) = config.window.fps.filter(|fps| *fps > 0.0) {
            tick = tick.max(Duration::from_secs_f64(1.0 / f64::from(fps)));
        }
        Self {
            size: config.window.size.unwrap_or(DEFAULT_WINDOW_SIZE),
            sample_count: config
                .window
                .antialias
                .map_or(DEFAULT_SAMPLES, |setting| setting.samples()),
            tick,
        }
    }
}

/// Everything the preview loop owns. The surface is declared before the
/// window so it is dropped first.
struct PreviewState {
    surface: SurfaceContext,
    renderer: PlotRenderer,
    plot: XyPlot,
    source: DataSource,
    signal: Option<Signal>,
    root: Option<PlotNode>,
    tick: Duration,
    last_tick: Instant,
    window: Arc<Window>,
}

impl PreviewState {
    fn new(
        window: Arc<Window>,
        options: &WindowOptions,
        plot: XyPlot,
        source: DataSource,
        signal: Option<Signal>,
    ) -> Result<Self> {
        let size = window.inner_size();
        let surface = SurfaceContext::new(
            window.as_ref(),
            size.width,
            size.height,
            SurfaceOptions {
                sample_count: options.sample_count,
                ..SurfaceOptions::default()
            },
        )?;
        let renderer = PlotRenderer::new(surface.context())?;
        Ok(Self {
            surface,
            renderer,
            plot,
            source,
            signal,
            root: None,
            tick: options.tick,
            last_tick: Instant::now(),
            window,
        })
    }

    fn animating(&self) -> bool {
        self.signal.as_ref().is_some_and(|signal| !signal.is_paused())
    }

    fn next_tick(&self) -> Instant {
        self.last_tick + self.tick
    }

    fn advance_signal(&mut self, now: Instant) {
        let Some(signal) = self.signal.as_mut() else {
            return;
        };
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        match signal.tick(elapsed.as_secs_f64(), &mut self.source) {
            Ok(true) => self.plot.notify_new_data(),
            Ok(false) => {}
            Err(err) => tracing::warn!(error = %err, "failed to advance signal"),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
        self.window.request_redraw();
    }

    fn render(&mut self) -> Result<(), SurfaceError> {
        let (width, height) = self.surface.size();
        self.plot
            .set_size(ItemSize::new(f64::from(width), f64::from(height)));
        let mut root = self
            .plot
            .update_paint_node(self.root.take(), Some(&self.source));
        for event in self.plot.drain_events() {
            tracing::debug!(?event, "plot property changed");
        }
        self.plot.take_update_request();

        self.renderer
            .prepare(self.surface.context(), &mut root, (width, height));
        let renderer = &self.renderer;
        let result = self
            .surface
            .render(Color::WHITE, |pass| renderer.draw(pass, &root));
        self.root = Some(root);
        result
    }

    fn shutdown(&mut self) {
        if let Some(mut root) = self.root.take() {
            self.renderer.release(self.surface.context(), &mut root);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Handled,
    Exit,
    Ignored,
}

fn handle_key(plot: &mut XyPlot, signal: Option<&mut Signal>, key: &str) -> KeyAction {
    match key {
        "f" => {
            let enabled = !plot.fill().enabled;
            plot.set_fill_enabled(enabled);
        }
        "l" => {
            let enabled = !plot.line().enabled;
            plot.set_line_enabled(enabled);
        }
        "m" => {
            let enabled = !plot.marker().enabled;
            plot.set_marker_enabled(enabled);
        }
        "b" => {
            let border = !plot.marker().border;
            plot.set_marker_border(border);
        }
        "g" => {
            let log_y = !plot.log_y();
            plot.set_log_y(log_y);
        }
        "+" | "=" => {
            let size = plot.marker().size + 1.0;
            plot.set_marker_size(size);
        }
        "-" => {
            let size = (plot.marker().size - 1.0).max(1.0);
            plot.set_marker_size(size);
        }
        "[" => {
            let segments = fewer_segments(plot.marker().segments);
            plot.set_marker_segments(segments);
        }
        "]" => {
            let segments = more_segments(plot.marker().segments);
            plot.set_marker_segments(segments);
        }
        " " => {
            let Some(signal) = signal else {
                return KeyAction::Ignored;
            };
            let paused = signal.toggle_pause();
            tracing::info!(paused, "signal playback toggled");
        }
        "q" => return KeyAction::Exit,
        _ => return KeyAction::Ignored,
    }
    KeyAction::Handled
}

/// Steps down through polygon counts; a triangle steps back to the circle.
fn fewer_segments(segments: u32) -> u32 {
    match segments {
        0..=3 => 0,
        n => n - 1,
    }
}

/// Steps up from the circle to a triangle, then one vertex at a time.
fn more_segments(segments: u32) -> u32 {
    match segments {
        0..=2 => 3,
        n => (n + 1).min(MAX_MARKER_SEGMENTS),
    }
}

fn key_text(event: &KeyEvent) -> Option<&str> {
    match &event.logical_key {
        Key::Character(value) => Some(value.as_str()),
        Key::Named(NamedKey::Space) => Some(" "),
        Key::Named(NamedKey::Escape) => Some("q"),
        _ => None,
    }
}

pub fn run_window(
    options: WindowOptions,
    plot: XyPlot,
    source: DataSource,
    signal: Option<Signal>,
) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title("xyview")
        .with_inner_size(LogicalSize::new(options.size[0], options.size[1]))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut state = PreviewState::new(window, &options, plot, source, signal)
        .map_err(|err| anyhow!("failed to initialise window renderer: {err:#}"))?;
    tracing::info!(
        "keys: f fill, l line, m markers, b border, g log-y, +/- size, [/] segments, space pause"
    );
    state.window.request_redraw();

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                let Some(key) = key_text(&event) else {
                    return;
                };
                if handle_key(&mut state.plot, state.signal.as_mut(), key) == KeyAction::Exit {
                    elwt.exit();
                }
            }
            WindowEvent::Resized(new_size) => state.resize(new_size.width, new_size.height),
            WindowEvent::RedrawRequested => match state.render() {
                Ok(()) => {}
                Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                    state.surface.reconfigure();
                    state.window.request_redraw();
                }
                Err(SurfaceError::OutOfMemory) => {
                    tracing::error!("surface out of memory; exiting preview");
                    elwt.exit();
                }
                Err(SurfaceError::Timeout) => {
                    tracing::warn!("surface timeout; retrying next frame");
                }
                Err(other) => {
                    tracing::warn!(error = ?other, "surface error; retrying next frame");
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if state.animating() && now >= state.next_tick() {
                state.advance_signal(now);
            }
            if state.plot.take_update_request() {
                state.window.request_redraw();
            }
            if state.animating() {
                elwt.set_control_flow(ControlFlow::WaitUntil(state.next_tick()));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        Event::LoopExiting => state.shutdown(),
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
