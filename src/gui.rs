//! Live preview windows.
//!
//! winit needs to own the main thread, so [`run`] starts the event loop there and moves the
//! application onto a background thread. Frames are pushed to the event loop with [`show_image`],
//! and keyboard input flows back to the application through [`PreviewWindow`].

mod renderer;

use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{Mutex, PoisonError},
};

use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender};
use once_cell::sync::{Lazy, OnceCell};
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::WindowId,
};

use crate::{
    image::{Image, Resolution},
    termination::Termination,
};

use self::renderer::{Gpu, Renderer, Window};

/// Something that displays annotated frames and can be asked to close.
///
/// Implemented by [`PreviewWindow`]; the capture loops only depend on this trait.
pub trait Preview {
    fn show(&mut self, image: &Image) -> anyhow::Result<()>;

    /// Returns whether the user asked to quit (by pressing `q` or closing the window).
    fn quit_requested(&mut self) -> bool;
}

/// Input events forwarded from a window to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowInput {
    Char(char),
    Close,
}

#[derive(Debug)]
enum Msg {
    Image {
        key: String,
        res: Resolution,
        data: Vec<u8>,
    },
}

static PROXY: OnceCell<Mutex<EventLoopProxy<Msg>>> = OnceCell::new();

type InputChannel = (Sender<(String, WindowInput)>, Receiver<(String, WindowInput)>);
static INPUT: Lazy<InputChannel> = Lazy::new(crossbeam_channel::unbounded);

struct Gui {
    gpu: Rc<Gpu>,
    windows: HashMap<String, Renderer>,
    win_id_to_key: HashMap<WindowId, String>,
}

impl Gui {
    fn new(gpu: Gpu) -> Self {
        Self {
            gpu: Rc::new(gpu),
            windows: HashMap::new(),
            win_id_to_key: HashMap::new(),
        }
    }

    fn update_image(
        &mut self,
        target: &EventLoopWindowTarget<Msg>,
        key: String,
        res: Resolution,
        data: &[u8],
    ) -> anyhow::Result<()> {
        if !self.windows.contains_key(&key) {
            log::debug!("creating window for image '{key}' at {res}");
            let win = Window::open(target, &key, res)?;
            let win_id = win.win.id();
            let renderer = Renderer::new(win, self.gpu.clone())?;
            self.win_id_to_key.insert(win_id, key.clone());
            self.windows.insert(key.clone(), renderer);
        }

        if let Some(renderer) = self.windows.get_mut(&key) {
            if renderer.resolution() != res {
                log::warn!(
                    "image '{key}' changed resolution from {} to {res}",
                    renderer.resolution(),
                );
            }
            renderer.update_texture(res, data);
            renderer.window().request_redraw();
        }
        Ok(())
    }

    fn forward(&self, window: WindowId, input: WindowInput) {
        if let Some(key) = self.win_id_to_key.get(&window) {
            INPUT.0.send((key.clone(), input)).ok();
        }
    }

    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::Image { key, res, data }) => {
                    if let Err(e) = self.update_image(target, key, res, &data) {
                        log::error!("failed to display image: {e:#}");
                        *flow = ControlFlow::ExitWithCode(1);
                    }
                }
                Event::WindowEvent { window_id, event } => match event {
                    WindowEvent::CloseRequested => self.forward(window_id, WindowInput::Close),
                    WindowEvent::ReceivedCharacter(c) => {
                        self.forward(window_id, WindowInput::Char(c))
                    }
                    _ => {}
                },
                Event::RedrawRequested(window_id) => {
                    let Some(key) = self.win_id_to_key.get(&window_id) else {
                        return;
                    };
                    if let Some(renderer) = self.windows.get_mut(key) {
                        if let Err(e) = renderer.redraw() {
                            log::error!("{e:#}");
                        }
                    }
                }
                _ => {}
            }
        })
    }
}

/// Runs `cb` on a background thread while the main thread drives the window event loop.
///
/// The process exits once `cb` returns: with status 0 on success, 1 on failure (after reporting
/// the error), and 101 if `cb` panics.
pub fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    PROXY.get_or_init(|| Mutex::new(event_loop.create_proxy()));

    let gpu = match pollster::block_on(Gpu::open()) {
        Ok(gpu) => gpu,
        Err(e) => {
            log::error!("failed to open GPU: {e:#}");
            process::exit(1);
        }
    };

    std::thread::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(cb));
        match result {
            Ok(r) => {
                if r.is_success() {
                    process::exit(0);
                } else {
                    r.report();
                    process::exit(1);
                }
            }
            // The panic hook already printed the message; exit like libstd does.
            Err(_payload) => process::exit(101),
        }
    });

    Gui::new(gpu).run(event_loop)
}

/// Displays `image` in the window titled `key`, opening it on first use.
///
/// Fails if the event loop started by [`run`] is not running.
pub fn show_image(key: impl Into<String>, image: &Image) -> anyhow::Result<()> {
    let proxy = PROXY
        .get()
        .ok_or_else(|| anyhow!("window event loop is not running"))?;

    // Image data is RGBA8 internally, so it can be uploaded as-is.
    let msg = Msg::Image {
        key: key.into(),
        res: image.resolution(),
        data: image.data().to_vec(),
    };
    proxy
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .send_event(msg)
        .map_err(|_closed| anyhow!("window event loop has exited"))
}

/// A window showing the live camera feed.
///
/// Pressing `q` or closing the window requests the application to quit.
pub struct PreviewWindow {
    title: String,
    quit: bool,
}

impl PreviewWindow {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            quit: false,
        }
    }
}

impl Preview for PreviewWindow {
    fn show(&mut self, image: &Image) -> anyhow::Result<()> {
        show_image(self.title.as_str(), image)
    }

    fn quit_requested(&mut self) -> bool {
        for (key, input) in INPUT.1.try_iter() {
            if key != self.title {
                continue;
            }
            match input {
                WindowInput::Close | WindowInput::Char('q' | 'Q') => {
                    log::debug!("quit requested from window '{key}'");
                    self.quit = true;
                }
                WindowInput::Char(_) => {}
            }
        }
        self.quit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quits_on_q() {
        let mut preview = PreviewWindow::new("quit test");
        INPUT.0.send(("quit test".into(), WindowInput::Char('x'))).unwrap();
        INPUT.0.send(("other".into(), WindowInput::Close)).unwrap();
        assert!(!preview.quit_requested());

        INPUT.0.send(("quit test".into(), WindowInput::Char('q'))).unwrap();
        assert!(preview.quit_requested());
        // Stays set.
        assert!(preview.quit_requested());
    }

    #[test]
    fn show_without_event_loop_fails() {
        assert!(show_image("nowhere", &Image::new(4, 4)).is_err());
    }
}
