use std::path::{Path, PathBuf};
use std::sync::Arc;

use iced::{
    alignment, executor,
    widget::{button, column, container, row, scrollable, text, text_input, Space},
    Application, Color, Command, Element, Length, Padding, Pixels, Settings, Subscription,
    Theme as IcedTheme,
};

use crate::appimage;
use crate::backend::Backends;
use crate::config::Config;
use crate::edition::{self, Edition};
use crate::error::{OpError, PanelBusy};
use crate::model::{Action, Ecosystem, OperationRequest, Outcome, PackageRecord, SearchFilter};
use crate::panel::{Notice, PanelController, PanelState};
use crate::runner::Executor;
use crate::theme_detect::ThemeVariant;
use crate::update_checker::UpdateChecker;
use crate::utils::os_pretty_name;

mod styles;
mod theme;

use styles::{AccentTextInputStyle, CustomScrollableStyle, RoundedButtonStyle, RoundedContainerStyle};
use theme::Palette;

const LOG_LIMIT: usize = 200;

/// Everything the window needs, decided before it opens.
pub struct Flags {
    pub config: Config,
    pub theme: ThemeVariant,
    pub backends: Backends,
    pub executor: Arc<dyn Executor>,
}

fn find_icon_path() -> Option<PathBuf> {
    [
        "/usr/share/icons/hicolor/256x256/apps/findy.png",
        "/usr/share/pixmaps/findy.png",
        "/usr/share/pixmaps/system-software-install.png",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|path| path.exists())
}

pub fn run(flags: Flags) -> iced::Result {
    let mut window = iced::window::Settings {
        size: iced::Size::new(1200.0, 800.0),
        resizable: true,
        min_size: Some(iced::Size::new(800.0, 600.0)),
        ..Default::default()
    };

    if let Some(path) = find_icon_path() {
        match iced::window::icon::from_file(&path) {
            Ok(icon) => window.icon = Some(icon),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "window icon not loaded"),
        }
    }

    let mut settings = Settings::with_flags(flags);
    settings.window = window;
    settings.default_text_size = Pixels(14.0);
    settings.antialiasing = true;

    tracing::info!("starting GUI");
    FindyGui::run(settings)
}

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Ecosystem),
    SearchQueryChanged(String),
    Search,
    ClearSearch,
    FilterChanged(SearchFilter),
    Select(String),
    Install,
    Remove,
    UpdateSelected,
    UpdateAll,
    Refresh,
    ShowDetails,
    CloseDetails,
    RunSelected,
    BundlePathChanged(String),
    AddBundle,
    Completed(OperationRequest, Result<Outcome, OpError>),
    UpdatesChecked(Ecosystem, Result<Outcome, OpError>),
    UpdateTick,
    ThemeToggled,
    EditionDetected(Option<Edition>),
    OpenRepoSelector,
}

/// Per-tab input state that is not part of the panel itself.
#[derive(Debug, Default)]
struct TabInput {
    query: String,
    selected: Option<String>,
}

pub struct FindyGui {
    backends: Backends,
    panels: [PanelController; 3],
    inputs: [TabInput; 3],
    checker: UpdateChecker,
    current: Ecosystem,
    palette: Palette,
    filter: SearchFilter,
    bundle_path: String,
    appimage_dir: PathBuf,
    output_log: Vec<String>,
    os_name: Option<String>,
    edition: Option<Edition>,
    border_radius: f32,
}

fn slot(ecosystem: Ecosystem) -> usize {
    match ecosystem {
        Ecosystem::System => 0,
        Ecosystem::Sandboxed => 1,
        Ecosystem::Portable => 2,
    }
}

impl Application for FindyGui {
    type Message = Message;
    type Theme = IcedTheme;
    type Executor = executor::Default;
    type Flags = Flags;

    fn new(flags: Flags) -> (FindyGui, Command<Message>) {
        let mut gui = FindyGui {
            backends: flags.backends,
            panels: Ecosystem::ALL.map(PanelController::new),
            inputs: Default::default(),
            checker: UpdateChecker::new(flags.config.update_interval()),
            current: Ecosystem::System,
            palette: Palette::from(flags.theme),
            filter: SearchFilter::All,
            bundle_path: String::new(),
            appimage_dir: flags.config.appimage_dir(),
            output_log: Vec::new(),
            os_name: os_pretty_name(),
            edition: None,
            border_radius: 12.0,
        };

        let mut commands = Ecosystem::ALL
            .into_iter()
            .map(|ecosystem| gui.dispatch(ecosystem, PanelController::refresh))
            .collect::<Vec<_>>();
        let executor = flags.executor;
        let timeout = flags.config.query_timeout();
        commands.push(Command::perform(
            async move { edition::detect(executor.as_ref(), timeout, Path::new(edition::OS_RELEASE)).await },
            Message::EditionDetected,
        ));
        (gui, Command::batch(commands))
    }

    fn title(&self) -> String {
        match (self.edition, &self.os_name) {
            (Some(edition), _) => format!("FiNDy - Package Manager (OpenMandriva {edition})"),
            (None, Some(name)) => format!("FiNDy - Package Manager ({name})"),
            (None, None) => String::from("FiNDy - Package Manager"),
        }
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::TabSelected(ecosystem) => {
                self.current = ecosystem;
                Command::none()
            }
            Message::SearchQueryChanged(query) => {
                self.input_mut().query = query;
                Command::none()
            }
            Message::Search => {
                let query = self.input().query.clone();
                let filter = self.filter;
                self.dispatch(self.current, |panel| panel.search(&query, filter))
            }
            Message::ClearSearch => {
                self.input_mut().query.clear();
                self.panel_mut().clear_search();
                Command::none()
            }
            Message::FilterChanged(filter) => {
                self.filter = filter;
                Command::none()
            }
            Message::Select(name) => {
                self.input_mut().selected = Some(name);
                Command::none()
            }
            Message::Install => self.with_selection(Action::Install, PanelController::install),
            Message::Remove => self.with_selection(Action::Remove, PanelController::remove),
            Message::UpdateSelected => self.with_selection(Action::Update, PanelController::update),
            Message::ShowDetails => self.with_selection(Action::Info, PanelController::info),
            Message::UpdateAll => self.dispatch(self.current, |panel| panel.update("")),
            Message::Refresh => self.dispatch(self.current, PanelController::refresh),
            Message::CloseDetails => {
                self.panel_mut().clear_details();
                Command::none()
            }
            Message::RunSelected => {
                if let Some(name) = self.input().selected.clone() {
                    let path = self.appimage_dir.join(&name);
                    let notice = match appimage::launch(&path) {
                        Ok(()) => Notice::Success(format!("Launched {name}")),
                        Err(e) => Notice::Error(e.to_string()),
                    };
                    self.log(notice.to_string());
                    self.panels[slot(Ecosystem::Portable)].set_notice(notice);
                }
                Command::none()
            }
            Message::BundlePathChanged(path) => {
                self.bundle_path = path;
                Command::none()
            }
            Message::AddBundle => {
                let path = self.bundle_path.trim().to_string();
                if path.is_empty() {
                    return Command::none();
                }
                self.bundle_path.clear();
                self.dispatch(Ecosystem::Portable, |panel| panel.install(&path))
            }
            Message::Completed(request, result) => self.complete(request, result),
            Message::UpdatesChecked(ecosystem, result) => {
                self.checker.record(&mut self.panels[slot(ecosystem)], result);
                Command::none()
            }
            Message::UpdateTick => {
                let requests = self.checker.poll(self.panels.iter_mut());
                Command::batch(requests.into_iter().map(|request| self.check_updates(request)))
            }
            Message::ThemeToggled => {
                self.palette = Palette::from(self.palette.variant().toggled());
                tracing::info!(theme = self.palette.variant().as_str(), "theme toggled");
                Command::none()
            }
            Message::EditionDetected(edition) => {
                self.edition = edition;
                Command::none()
            }
            Message::OpenRepoSelector => {
                let notice = match edition::launch_repo_selector() {
                    Ok(tool) => Notice::Success(format!("Opened {tool}")),
                    Err(e) => Notice::Error(e.to_string()),
                };
                self.log(notice.to_string());
                self.panels[slot(Ecosystem::System)].set_notice(notice);
                Command::none()
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        match self.checker.interval() {
            Some(interval) => iced::time::every(interval).map(|_| Message::UpdateTick),
            None => Subscription::none(),
        }
    }

    fn view(&self) -> Element<Message> {
        let mut content = column![self.view_tabs(), self.view_search(), self.view_actions()].spacing(14);

        if self.current == Ecosystem::Portable {
            content = content.push(self.view_bundle_input());
        }
        content = content.push(self.view_status());

        let body: Element<Message> = match self.panel().details() {
            Some(details) => row![self.view_records(), self.view_details(details)]
                .spacing(14)
                .height(Length::Fill)
                .into(),
            None => self.view_records(),
        };
        content = content.push(body).push(self.view_output());

        container(content.padding(Padding::new(8.0)))
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(Padding::new(16.0))
            .style(self.card(self.palette.background(), 0.0))
            .into()
    }

    fn theme(&self) -> IcedTheme {
        self.palette.iced_theme()
    }
}

impl FindyGui {
    fn panel(&self) -> &PanelController {
        &self.panels[slot(self.current)]
    }

    fn panel_mut(&mut self) -> &mut PanelController {
        &mut self.panels[slot(self.current)]
    }

    fn input(&self) -> &TabInput {
        &self.inputs[slot(self.current)]
    }

    fn input_mut(&mut self) -> &mut TabInput {
        &mut self.inputs[slot(self.current)]
    }

    fn log(&mut self, line: String) {
        self.output_log.push(line);
        if self.output_log.len() > LOG_LIMIT {
            let excess = self.output_log.len() - LOG_LIMIT;
            self.output_log.drain(..excess);
        }
    }

    /// Asks a panel for a request and runs it, or shows why the panel refused.
    fn dispatch(
        &mut self,
        ecosystem: Ecosystem,
        start: impl FnOnce(&mut PanelController) -> Result<OperationRequest, PanelBusy>,
    ) -> Command<Message> {
        let panel = &mut self.panels[slot(ecosystem)];
        match start(panel) {
            Ok(request) => {
                if request.action.is_mutation() {
                    self.log(format!("{} {} {}", ecosystem.label(), request.action, request.target));
                }
                self.perform(request)
            }
            Err(busy) => {
                tracing::info!(%busy, "request rejected");
                panel.set_notice(Notice::Error(busy.to_string()));
                Command::none()
            }
        }
    }

    fn with_selection(
        &mut self,
        action: Action,
        start: fn(&mut PanelController, &str) -> Result<OperationRequest, PanelBusy>,
    ) -> Command<Message> {
        let ecosystem = self.current;
        match self.input().selected.clone() {
            Some(target) => self.dispatch(ecosystem, |panel| start(panel, &target)),
            None => {
                let missing = OpError::MissingTarget { ecosystem, action };
                self.panel_mut().set_notice(Notice::Error(missing.to_string()));
                Command::none()
            }
        }
    }

    fn perform(&self, request: OperationRequest) -> Command<Message> {
        let work = self.backends.perform(request.clone());
        Command::perform(work, move |result| Message::Completed(request, result))
    }

    fn check_updates(&self, request: OperationRequest) -> Command<Message> {
        let ecosystem = request.ecosystem;
        Command::perform(self.backends.perform(request), move |result| {
            Message::UpdatesChecked(ecosystem, result)
        })
    }

    fn complete(&mut self, request: OperationRequest, result: Result<Outcome, OpError>) -> Command<Message> {
        let ecosystem = request.ecosystem;
        if request.action.is_mutation() {
            match &result {
                Ok(Outcome::Completed(message)) => self.log(message.clone()),
                Ok(_) => {}
                Err(e) => self.log(format!("{}: {e}", ecosystem.label())),
            }
        }

        let panel = &mut self.panels[slot(ecosystem)];
        let follow_up = panel.complete(&request, result);

        let mut commands = Vec::new();
        if request.action.is_mutation() {
            self.checker.mark_stale(ecosystem);
        }
        if request.action == Action::List {
            if let Some(check) = self.checker.poll_panel(panel) {
                commands.push(self.check_updates(check));
            }
        }
        if let Some(next) = follow_up {
            if request.action == Action::Remove {
                self.inputs[slot(ecosystem)].selected = None;
            }
            commands.push(self.perform(next));
        }
        Command::batch(commands)
    }

    fn button_style(&self, primary: bool) -> iced::theme::Button {
        iced::theme::Button::Custom(Box::new(RoundedButtonStyle {
            is_primary: primary,
            radius: self.border_radius,
            primary_color: self.palette.primary(),
            text_color: if primary { self.palette.on_primary() } else { self.palette.text() },
            background_color: self.palette.surface(),
        }))
    }

    fn card(&self, background: Color, elevation: f32) -> iced::theme::Container {
        iced::theme::Container::Custom(Box::new(RoundedContainerStyle {
            radius: if elevation == 0.0 { 0.0 } else { self.border_radius },
            background: Some(background),
            elevation,
            ..Default::default()
        }))
    }

    fn scroll_style(&self) -> iced::theme::Scrollable {
        iced::theme::Scrollable::Custom(Box::new(CustomScrollableStyle {
            scroller_color: self.palette.primary(),
            border_radius: self.border_radius,
        }))
    }

    fn input_style(&self) -> iced::theme::TextInput {
        iced::theme::TextInput::Custom(Box::new(AccentTextInputStyle {
            radius: self.border_radius,
            accent: self.palette.primary(),
            background_color: self.palette.surface(),
            text_color: self.palette.text(),
        }))
    }

    fn action_button<'a>(&self, label: &'a str, primary: bool, message: Option<Message>) -> Element<'a, Message> {
        button(text(label).size(14))
            .on_press_maybe(message)
            .style(self.button_style(primary))
            .padding(Padding::from([8, 14]))
            .into()
    }

    fn view_tabs(&self) -> Element<Message> {
        let tabs = Ecosystem::ALL.into_iter().map(|ecosystem| self.tab_button(ecosystem));
        let total = self.checker.total();
        let summary = if total == 0 {
            String::from("Everything is up to date")
        } else {
            format!("{total} updates available")
        };

        let mut header = row(tabs.collect::<Vec<_>>()).push(Space::with_width(Length::Fill));
        if let Some(edition) = self.edition {
            let color = match edition {
                Edition::Cooker => self.palette.success(),
                Edition::Rome => self.palette.warning(),
                Edition::Rock => self.palette.primary(),
            };
            header = header.push(text(format!("Edition: {edition}")).size(13).style(iced::theme::Text::Color(color)));
        }

        container(
            header
                .push(text(summary).size(13).style(iced::theme::Text::Color(self.palette.secondary_text())))
                .push(self.action_button(
                    if self.palette.is_dark() { "Light" } else { "Dark" },
                    false,
                    Some(Message::ThemeToggled),
                ))
                .spacing(10)
                .align_items(alignment::Alignment::Center)
                .padding(Padding::new(10.0)),
        )
        .width(Length::Fill)
        .style(self.card(self.palette.card_background(), 1.0))
        .into()
    }

    fn tab_button(&self, ecosystem: Ecosystem) -> Element<Message> {
        let active = self.current == ecosystem;
        let count = self.checker.count(ecosystem);
        let label = if count > 0 {
            format!("{} ({count})", ecosystem.label())
        } else {
            ecosystem.label().to_string()
        };
        button(text(label).size(if active { 17.0 } else { 15.0 }))
            .on_press(Message::TabSelected(ecosystem))
            .style(self.button_style(active))
            .padding(Padding::from([10, 16]))
            .into()
    }

    fn view_search(&self) -> Element<Message> {
        let placeholder = match self.current {
            Ecosystem::System => "Search DNF packages...",
            Ecosystem::Sandboxed => "Search Flathub and installed apps...",
            Ecosystem::Portable => "Filter AppImages...",
        };
        let searching = self.panel().is_searching();

        let mut section = column![row![
            text_input(placeholder, &self.input().query)
                .on_input(Message::SearchQueryChanged)
                .on_submit(Message::Search)
                .padding(Padding::new(10.0))
                .width(Length::Fill)
                .style(self.input_style()),
            self.action_button(if searching { "Searching..." } else { "Search" }, true, (!searching).then_some(Message::Search)),
            self.action_button(
                "Clear",
                false,
                self.panel().search_results().is_some().then_some(Message::ClearSearch)
            ),
        ]
        .spacing(10)
        .align_items(alignment::Alignment::Center)]
        .spacing(10);

        if self.current != Ecosystem::Portable {
            let mut filters = row![text("Show:").size(13).style(iced::theme::Text::Color(self.palette.secondary_text()))]
                .spacing(8)
                .align_items(alignment::Alignment::Center);
            for filter in SearchFilter::ALL {
                filters = filters.push(
                    button(text(filter.to_string()).size(13))
                        .on_press(Message::FilterChanged(filter))
                        .style(self.button_style(self.filter == filter))
                        .padding(Padding::from([6, 12])),
                );
            }
            section = section.push(filters);
        }

        container(section)
            .width(Length::Fill)
            .padding(Padding::new(14.0))
            .style(self.card(self.palette.card_background(), 1.0))
            .into()
    }

    fn view_actions(&self) -> Element<Message> {
        let idle = !self.panel().is_busy();
        let selected = self.input().selected.as_deref();
        let record = selected.and_then(|name| self.panel().visible_records().iter().find(|r| r.name == name));
        let installed = record.is_some_and(|r| r.installed);
        let when = |enabled: bool, message: Message| (idle && enabled).then_some(message);

        let mut actions = row![].spacing(8).align_items(alignment::Alignment::Center);
        if self.current != Ecosystem::Portable {
            actions = actions.push(self.action_button("Install", true, when(record.is_some() && !installed, Message::Install)));
        }
        actions = actions.push(self.action_button("Remove", false, when(installed, Message::Remove)));
        match self.current {
            Ecosystem::Portable => {
                actions = actions
                    .push(self.action_button("Run", true, (selected.is_some()).then_some(Message::RunSelected)))
                    .push(self.action_button("Check Updates", false, when(true, Message::UpdateAll)));
            }
            _ => {
                actions = actions
                    .push(self.action_button("Update", false, when(installed, Message::UpdateSelected)))
                    .push(self.action_button("Update All", false, when(true, Message::UpdateAll)));
            }
        }
        if self.current == Ecosystem::System {
            actions = actions.push(self.action_button("Repo Selector", false, Some(Message::OpenRepoSelector)));
        }
        actions = actions
            .push(self.action_button("Details", false, when(selected.is_some(), Message::ShowDetails)))
            .push(Space::with_width(Length::Fill))
            .push(self.action_button("Refresh", false, when(true, Message::Refresh)));

        actions.into()
    }

    fn view_bundle_input(&self) -> Element<Message> {
        row![
            text_input("Path to an .AppImage file to add", &self.bundle_path)
                .on_input(Message::BundlePathChanged)
                .on_submit(Message::AddBundle)
                .padding(Padding::new(10.0))
                .width(Length::Fill)
                .style(self.input_style()),
            self.action_button(
                "Add AppImage",
                true,
                (!self.bundle_path.trim().is_empty() && !self.panel().is_busy()).then_some(Message::AddBundle)
            ),
        ]
        .spacing(10)
        .align_items(alignment::Alignment::Center)
        .into()
    }

    fn view_status(&self) -> Element<Message> {
        let panel = self.panel();
        let progress = match panel.state() {
            PanelState::Idle => None,
            PanelState::Refreshing => Some(String::from("Refreshing...")),
            PanelState::CheckingUpdates => Some(String::from("Checking for updates...")),
            PanelState::OperationInFlight(action) => Some(format!("Running {action}...")),
        };

        let (message, color) = match (progress, panel.notice()) {
            (Some(progress), _) => (progress, self.palette.primary()),
            (None, Some(notice)) => {
                let color = match notice {
                    Notice::Success(_) => self.palette.success(),
                    Notice::Cancelled => self.palette.secondary_text(),
                    Notice::Error(_) => self.palette.danger(),
                };
                (notice.to_string(), color)
            }
            (None, None) => (
                format!("{} {} shown", panel.visible_records().len(), self.current.label()),
                self.palette.secondary_text(),
            ),
        };

        text(message).size(13).style(iced::theme::Text::Color(color)).into()
    }

    fn view_records(&self) -> Element<Message> {
        let panel = self.panel();
        let records = panel.visible_records();

        if records.is_empty() {
            let empty = match (panel.error(), panel.search_results()) {
                (_, Some(_)) => String::from("No packages found"),
                (Some(error), None) => error.to_string(),
                (None, None) if panel.is_busy() => String::from("Loading..."),
                (None, None) => String::from("Nothing installed yet"),
            };
            return container(text(empty).size(15).style(iced::theme::Text::Color(self.palette.secondary_text())))
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x()
                .center_y()
                .into();
        }

        let cards = records.iter().map(|record| self.record_card(record)).collect::<Vec<_>>();
        container(scrollable(column(cards).spacing(6).padding(6)).style(self.scroll_style()))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn record_card<'a>(&self, record: &'a PackageRecord) -> Element<'a, Message> {
        let selected = self.input().selected.as_deref() == Some(record.name.as_str());
        let (title_color, detail_color) = if selected {
            (self.palette.on_primary(), self.palette.on_primary())
        } else {
            (self.palette.text(), self.palette.secondary_text())
        };

        let mut meta = Vec::new();
        if record.title() != record.name {
            meta.push(record.name.clone());
        }
        if let Some(version) = &record.version {
            meta.push(version.clone());
        }
        if let Some(origin) = &record.origin {
            meta.push(origin.clone());
        }
        if record.installed {
            meta.push(String::from("installed"));
        }

        let mut body = column![
            text(record.title()).size(16).style(iced::theme::Text::Color(title_color)),
            text(meta.join("  |  ")).size(12).style(iced::theme::Text::Color(detail_color)),
        ]
        .spacing(3)
        .width(Length::Fill);
        if let Some(description) = &record.description {
            body = body.push(text(description).size(12).style(iced::theme::Text::Color(detail_color)));
        }

        let background = if selected {
            self.palette.primary()
        } else {
            self.palette.card_background()
        };
        button(container(body).padding(Padding::new(10.0)).width(Length::Fill).style(self.card(background, 0.5)))
            .on_press(Message::Select(record.name.clone()))
            .style(iced::theme::Button::Text)
            .padding(0)
            .width(Length::Fill)
            .into()
    }

    fn view_details<'a>(&self, details: &'a str) -> Element<'a, Message> {
        container(
            column![
                row![
                    text("Details").size(16).style(iced::theme::Text::Color(self.palette.text())),
                    Space::with_width(Length::Fill),
                    self.action_button("Close", false, Some(Message::CloseDetails)),
                ]
                .align_items(alignment::Alignment::Center),
                scrollable(text(details).size(12).style(iced::theme::Text::Color(self.palette.secondary_text())))
                    .style(self.scroll_style())
                    .height(Length::Fill),
            ]
            .spacing(8),
        )
        .width(Length::FillPortion(2))
        .height(Length::Fill)
        .padding(Padding::new(12.0))
        .style(self.card(self.palette.surface(), 1.0))
        .into()
    }

    fn view_output(&self) -> Element<Message> {
        container(
            scrollable(
                text(self.output_log.join("\n"))
                    .size(12)
                    .style(iced::theme::Text::Color(self.palette.secondary_text())),
            )
            .style(self.scroll_style())
            .width(Length::Fill)
            .height(Length::Fixed(110.0)),
        )
        .width(Length::Fill)
        .padding(Padding::new(10.0))
        .style(self.card(self.palette.surface(), 1.0))
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use futures::future::BoxFuture;

    struct Silent(Ecosystem);

    impl Backend for Silent {
        fn ecosystem(&self) -> Ecosystem {
            self.0
        }

        fn perform(&self, _request: OperationRequest) -> BoxFuture<'static, Result<Outcome, OpError>> {
            Box::pin(async { Ok(Outcome::Records(Vec::new())) })
        }
    }

    fn gui() -> FindyGui {
        let backends = Backends::new(
            Arc::new(Silent(Ecosystem::System)),
            Arc::new(Silent(Ecosystem::Sandboxed)),
            Arc::new(Silent(Ecosystem::Portable)),
        );
        let flags = Flags {
            config: Config::default(),
            theme: ThemeVariant::Dark,
            backends,
            executor: Arc::new(crate::runner::MockExecutor::new()),
        };
        FindyGui::new(flags).0
    }

    #[test]
    fn startup_refreshes_every_panel() {
        let gui = gui();
        assert!(gui.panels.iter().all(|panel| panel.state() == PanelState::Refreshing));
    }

    #[test]
    fn busy_panel_turns_rejection_into_notice() {
        let mut gui = gui();
        gui.update(Message::UpdateAll);
        let notice = gui.panel().notice().expect("rejection shown");
        assert!(matches!(notice, Notice::Error(text) if text.contains("busy")));
    }

    #[test]
    fn install_without_selection_asks_for_one() {
        let mut gui = gui();
        gui.update(Message::TabSelected(Ecosystem::Sandboxed));
        gui.update(Message::Install);
        assert_eq!(
            gui.panel().notice(),
            Some(&Notice::Error("Select a flatpak package to install first".into()))
        );
    }

    fn refreshed(gui: &mut FindyGui, ecosystem: Ecosystem) {
        gui.update(Message::Completed(
            OperationRequest::list(ecosystem),
            Ok(Outcome::Records(vec![PackageRecord::new(ecosystem, "bash", true)])),
        ));
    }

    #[test]
    fn first_refresh_starts_update_check_that_holds_the_panel() {
        let mut gui = gui();
        refreshed(&mut gui, Ecosystem::System);
        assert_eq!(gui.panel().records().len(), 1);
        assert_eq!(gui.panel().state(), PanelState::CheckingUpdates);

        gui.update(Message::UpdateAll);
        assert_eq!(gui.panel().state(), PanelState::CheckingUpdates);
        assert!(matches!(gui.panel().notice(), Some(Notice::Error(text)) if text.contains("busy")));

        gui.update(Message::UpdatesChecked(Ecosystem::System, Ok(Outcome::Records(Vec::new()))));
        assert_eq!(gui.panel().state(), PanelState::Idle);
        gui.update(Message::UpdateAll);
        assert_eq!(gui.panel().state(), PanelState::OperationInFlight(Action::Update));
    }

    #[test]
    fn badge_is_rechecked_after_update_all() {
        let mut gui = gui();
        refreshed(&mut gui, Ecosystem::System);
        let pending = (0..3).map(|i| PackageRecord::new(Ecosystem::System, format!("pkg{i}"), true)).collect();
        gui.update(Message::UpdatesChecked(Ecosystem::System, Ok(Outcome::Records(pending))));
        assert_eq!(gui.checker.count(Ecosystem::System), 3);

        gui.update(Message::UpdateAll);
        gui.update(Message::Completed(
            OperationRequest::new(Ecosystem::System, Action::Update, ""),
            Ok(Outcome::Completed("Successfully updated all packages".into())),
        ));
        assert_eq!(gui.panel().state(), PanelState::Refreshing);
        refreshed(&mut gui, Ecosystem::System);
        assert_eq!(gui.panel().state(), PanelState::CheckingUpdates);

        gui.update(Message::UpdatesChecked(Ecosystem::System, Ok(Outcome::Records(Vec::new()))));
        assert_eq!(gui.checker.count(Ecosystem::System), 0);
    }

    #[test]
    fn detected_edition_names_the_window() {
        let mut gui = gui();
        gui.update(Message::EditionDetected(Some(Edition::Rome)));
        assert_eq!(gui.title(), "FiNDy - Package Manager (OpenMandriva ROME)");
    }

    #[test]
    fn theme_toggle_flips_palette() {
        let mut gui = gui();
        gui.update(Message::ThemeToggled);
        assert_eq!(gui.palette.variant(), ThemeVariant::Light);
        assert_eq!(gui.theme(), IcedTheme::Light);
    }
}
