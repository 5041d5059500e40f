use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use iced::widget::{button, column, container, image as preview, row, text, text_input};
use iced::{Element, Length, Subscription, Task};
use image::DynamicImage;

use crate::camera::{worker, Camera, CameraEvent};
use crate::common::{Config, FaceGateError, Result};
use crate::core::{AuthOutcome, FaceAuthenticator};
use crate::storage::{Direction, EnrollmentStore, SessionLog, SnapshotGuard};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Message {
    Tick,
    Login,
    Logout,
    RegisterNewUser,
    NameChanged(String),
    Accept,
    TryAgain,
    DismissNotice,
    Quit,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub enum App {
    Running(Box<Session>),
    Failed { reason: String },
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let app = match Session::start() {
            Ok(session) => App::Running(Box::new(session)),
            Err(e) => {
                tracing::error!(error = %e, "startup failed");
                App::Failed {
                    reason: e.to_string(),
                }
            }
        };
        (app, Task::none())
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match self {
            App::Running(session) => session.update(message),
            App::Failed { .. } => match message {
                Message::Quit => iced::exit(),
                _ => Task::none(),
            },
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        match self {
            App::Running(session) => session.view(),
            App::Failed { reason } => failed_view(reason),
        }
    }

    pub fn subscription(&self) -> Subscription<Message> {
        match self {
            App::Running(session) => {
                iced::time::every(Duration::from_millis(session.config.ui.preview_interval_ms))
                    .map(|_| Message::Tick)
            }
            App::Failed { .. } => Subscription::none(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session: the controller proper
// ---------------------------------------------------------------------------

enum Screen {
    Idle,
    Registering {
        still: DynamicImage,
        still_preview: preview::Handle,
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoticeKind {
    Info,
    Error,
}

struct Notice {
    kind: NoticeKind,
    title: String,
    body: String,
    exit_on_dismiss: bool,
}

impl Notice {
    fn info(title: &str, body: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.to_string(),
            body: body.into(),
            exit_on_dismiss: false,
        }
    }

    fn error(title: &str, body: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.to_string(),
            body: body.into(),
            exit_on_dismiss: false,
        }
    }

    fn logged_out() -> Self {
        Self {
            kind: NoticeKind::Info,
            title: "Logged Out".to_string(),
            body: "You have been successfully logged out.".to_string(),
            exit_on_dismiss: true,
        }
    }
}

pub struct Session {
    config: Config,
    store: EnrollmentStore,
    log: SessionLog,
    authenticator: FaceAuthenticator,
    frames: Receiver<CameraEvent>,
    camera_stop: Arc<AtomicBool>,
    current_frame: Option<DynamicImage>,
    feed_preview: Option<preview::Handle>,
    screen: Screen,
    notice: Option<Notice>,
}

impl Session {
    fn start() -> Result<Self> {
        let config = Config::load()?;
        let store = EnrollmentStore::open(&config.storage.data_dir)?;
        let log = SessionLog::new(&config.storage.log_path);
        let authenticator = FaceAuthenticator::new(&config)?;

        let camera = Camera::new(&config.camera)?;
        let (frames, camera_stop) = worker::spawn(camera)?;

        Ok(Self {
            config,
            store,
            log,
            authenticator,
            frames,
            camera_stop,
            current_frame: None,
            feed_preview: None,
            screen: Screen::Idle,
            notice: None,
        })
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => self.drain_camera(),
            Message::Login => {
                if self.notice.is_none() && matches!(self.screen, Screen::Idle) {
                    self.login();
                }
            }
            Message::Logout => {
                if self.notice.is_none() && matches!(self.screen, Screen::Idle) {
                    self.notice = Some(Notice::logged_out());
                }
            }
            Message::RegisterNewUser => {
                if self.notice.is_none() && matches!(self.screen, Screen::Idle) {
                    self.open_registration();
                }
            }
            Message::NameChanged(value) => {
                if let Screen::Registering { name, .. } = &mut self.screen {
                    *name = value;
                }
            }
            Message::Accept => {
                if self.notice.is_none() {
                    self.accept_registration();
                }
            }
            Message::TryAgain => {
                if self.notice.is_none() && matches!(self.screen, Screen::Registering { .. }) {
                    self.screen = Screen::Idle;
                }
            }
            Message::DismissNotice => {
                let exit = self
                    .notice
                    .take()
                    .map_or(false, |notice| notice.exit_on_dismiss);
                if exit {
                    self.camera_stop.store(true, Ordering::Relaxed);
                    return iced::exit();
                }
            }
            Message::Quit => {}
        }
        Task::none()
    }

    /// Pull everything the capture worker produced since the last tick and
    /// keep the newest frame. Never blocks.
    fn drain_camera(&mut self) {
        let mut read_error = None;
        while let Ok(event) = self.frames.try_recv() {
            match event {
                CameraEvent::Frame(frame) => {
                    self.feed_preview = Some(rgba_handle(&frame));
                    self.current_frame = Some(frame);
                }
                CameraEvent::ReadError(reason) => read_error = Some(reason),
            }
        }

        if let Some(reason) = read_error {
            tracing::warn!(%reason, "webcam read failed");
            if self.notice.is_none() {
                self.notice = Some(Notice::error(
                    "Webcam error",
                    format!("Failed to read from the webcam: {}", reason),
                ));
            }
        }
    }

    fn login(&mut self) {
        let Some(frame) = self.current_frame.clone() else {
            self.notice = Some(Notice::error(
                "Webcam error",
                "No webcam frame available yet. Ensure the camera is functioning.",
            ));
            return;
        };

        match self.run_login(&frame) {
            Ok(AuthOutcome::Accepted { name, similarity }) => {
                tracing::info!(user = %name, similarity, "login accepted");
                if let Err(e) = self.log.append(&name, Direction::In) {
                    // Reported separately; the auth decision stands.
                    tracing::error!(error = %e, "failed to append session log");
                }
                self.notice = Some(Notice::info(
                    "Welcome back!",
                    format!("Welcome, {}.", name),
                ));
            }
            Ok(AuthOutcome::Unknown) => {
                self.notice = Some(Notice::error(
                    "Unknown user",
                    "Unknown user. Please register as a new user or try again.",
                ));
            }
            Ok(AuthOutcome::NoFace) => {
                self.notice = Some(Notice::error(
                    "No face detected",
                    "No face detected. Look at the camera and try again.",
                ));
            }
            Err(e) => {
                tracing::error!(error = %e, "login attempt failed");
                self.notice = Some(Notice::error("Login failed", e.to_string()));
            }
        }
    }

    /// The snapshot guard covers every path out of here, so the temp file
    /// never survives a login attempt.
    fn run_login(&self, frame: &DynamicImage) -> Result<AuthOutcome> {
        let _snapshot = SnapshotGuard::write(&self.config.storage.snapshot_path, frame)?;
        let records = self.store.all()?;
        self.authenticator.identify(frame, &records)
    }

    fn open_registration(&mut self) {
        let Some(frame) = self.current_frame.clone() else {
            self.notice = Some(Notice::error(
                "Webcam error",
                "No webcam frame available yet. Ensure the camera is functioning.",
            ));
            return;
        };

        let still_preview = rgba_handle(&frame);
        self.screen = Screen::Registering {
            still: frame,
            still_preview,
            name: String::new(),
        };
    }

    fn accept_registration(&mut self) {
        let (name, still) = match &self.screen {
            Screen::Registering { still, name, .. } => (name.clone(), still.clone()),
            Screen::Idle => return,
        };

        match self.authenticator.enroll(&self.store, &name, &still) {
            Ok(()) => {
                self.screen = Screen::Idle;
                self.notice = Some(Notice::info("Success!", "User was registered successfully!"));
            }
            Err(e @ FaceGateError::InvalidName(_)) => {
                self.notice = Some(Notice::error("Invalid username", e.to_string()));
            }
            Err(FaceGateError::NoFaceDetected) => {
                self.notice = Some(Notice::error(
                    "No face detected",
                    "No face detected. Try again.",
                ));
            }
            Err(e) => {
                tracing::error!(error = %e, "registration failed");
                self.notice = Some(Notice::error("Registration failed", e.to_string()));
            }
        }
    }

    // -- views --------------------------------------------------------------

    fn view(&self) -> Element<'_, Message> {
        let unlocked = self.notice.is_none();

        let content = match &self.screen {
            Screen::Idle => self.idle_view(unlocked),
            Screen::Registering {
                still_preview,
                name,
                ..
            } => self.registering_view(still_preview, name, unlocked),
        };

        let mut page = column![content].spacing(8).padding(16);
        if let Some(notice) = &self.notice {
            page = page.push(notice_view(notice));
        }
        page.height(Length::Fill).into()
    }

    fn idle_view(&self, unlocked: bool) -> Element<'_, Message> {
        let feed: Element<'_, Message> = match &self.feed_preview {
            Some(handle) => preview(handle.clone())
                .width(Length::Fill)
                .height(Length::Fill)
                .into(),
            None => container(text("Waiting for webcam..."))
                .center(Length::Fill)
                .into(),
        };

        let controls = column![
            action_button("Login", unlocked.then_some(Message::Login)),
            action_button("Logout", unlocked.then_some(Message::Logout)),
            action_button(
                "Register New User",
                unlocked.then_some(Message::RegisterNewUser)
            ),
        ]
        .spacing(24);

        row![
            container(feed).width(Length::FillPortion(7)),
            container(controls)
                .width(Length::FillPortion(3))
                .center_y(Length::Fill),
        ]
        .spacing(16)
        .height(Length::Fill)
        .into()
    }

    fn registering_view<'a>(
        &'a self,
        still_preview: &'a preview::Handle,
        name: &'a str,
        unlocked: bool,
    ) -> Element<'a, Message> {
        let still: Element<'a, Message> = preview(still_preview.clone())
            .width(Length::Fill)
            .height(Length::Fill)
            .into();

        let form = column![
            text("Please input username:").size(18),
            text_input("Username", name)
                .on_input(Message::NameChanged)
                .on_submit(Message::Accept)
                .padding(8),
            action_button("Accept", unlocked.then_some(Message::Accept)),
            action_button("Try Again", unlocked.then_some(Message::TryAgain)),
        ]
        .spacing(24);

        row![
            container(still).width(Length::FillPortion(7)),
            container(form)
                .width(Length::FillPortion(3))
                .center_y(Length::Fill),
        ]
        .spacing(16)
        .height(Length::Fill)
        .into()
    }
}

// ---------------------------------------------------------------------------
// Shared view helpers
// ---------------------------------------------------------------------------

fn action_button(label: &str, on_press: Option<Message>) -> Element<'_, Message> {
    button(text(label).size(18))
        .on_press_maybe(on_press)
        .padding([10, 24])
        .width(Length::Fill)
        .into()
}

fn notice_view(notice: &Notice) -> Element<'_, Message> {
    let ok = button(text("OK"))
        .on_press(Message::DismissNotice)
        .padding([8, 20]);
    let ok = match notice.kind {
        NoticeKind::Info => ok.style(button::primary),
        NoticeKind::Error => ok.style(button::danger),
    };

    container(
        row![
            column![
                text(notice.title.as_str()).size(16),
                text(notice.body.as_str()),
            ]
            .spacing(4)
            .width(Length::Fill),
            ok,
        ]
        .spacing(16)
        .align_y(iced::Alignment::Center),
    )
    .style(container::rounded_box)
    .padding(12)
    .width(Length::Fill)
    .into()
}

fn failed_view(reason: &str) -> Element<'_, Message> {
    container(
        column![
            text("FaceGate could not start").size(24),
            text(reason),
            button(text("Quit")).on_press(Message::Quit).padding([10, 24]),
        ]
        .spacing(16)
        .align_x(iced::Alignment::Center),
    )
    .center(Length::Fill)
    .into()
}

fn rgba_handle(frame: &DynamicImage) -> preview::Handle {
    let rgba = frame.to_rgba8();
    let (width, height) = rgba.dimensions();
    preview::Handle::from_rgba(width, height, rgba.into_raw())
}
