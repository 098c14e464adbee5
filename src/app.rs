use eframe::egui;
use std::path::{Path, PathBuf};

use crate::canvas::{Canvas, PixelInfo};
use crate::components::history::{HistoryPanel, HistoryPanelAction};
use crate::io;
use crate::logger::{self, SessionEvent};
use crate::ops::dialogs::{ActiveDialog, DialogResult, HoughCircleDialog, InRangeDialog, MorphologyDialog};
use crate::session::Session;
use crate::settings::AppSettings;
use crate::{log_err, log_warn};

/// Message shown at the left of the status bar until replaced.
struct StatusMessage {
    text: String,
    is_error: bool,
}

pub struct CVisionApp {
    session: Option<Session>,
    canvas: Canvas,
    history_panel: HistoryPanel,

    // Modal dialog system (at most one open at a time)
    active_dialog: ActiveDialog,

    settings: AppSettings,
    status: Option<StatusMessage>,
    hover: Option<PixelInfo>,
}

impl CVisionApp {
    pub fn new(cc: &eframe::CreationContext<'_>, startup_files: Vec<PathBuf>) -> Self {
        let settings = AppSettings::load();
        apply_theme(&cc.egui_ctx, settings.dark_mode);

        let mut app = Self {
            session: None,
            canvas: Canvas::default(),
            history_panel: HistoryPanel::default(),
            active_dialog: ActiveDialog::None,
            settings,
            status: None,
            hover: None,
        };
        if let Some(path) = startup_files.into_iter().next() {
            app.open_file_by_path(&path);
        }
        app
    }

    fn set_status(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error: false,
        });
    }

    fn set_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        log_err!("{}", text);
        self.status = Some(StatusMessage { text, is_error: true });
    }

    // ========================================================================
    // FILE HANDLING
    // ========================================================================

    fn handle_open_file(&mut self) {
        if let Some(path) = io::pick_image_to_open(self.settings.last_dir.as_deref()) {
            self.open_file_by_path(&path);
        }
    }

    /// Replace the current session with `path`. On failure the old session stays.
    fn open_file_by_path(&mut self, path: &Path) {
        match Session::open(path) {
            Ok(mut session) => {
                let (width, height) = session.current_image().dimensions();
                logger::session_event(SessionEvent::Opened { path, width, height });
                self.active_dialog = ActiveDialog::None;
                self.history_panel.attach(&mut session.history);
                self.session = Some(session);
                self.canvas.reset();
                self.settings.last_dir = path.parent().map(Path::to_path_buf);
                self.settings.save();
                self.set_status(format!("Opened {}", path.display()));
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }

    fn handle_save_image(&mut self) {
        let Some(session) = &self.session else { return };
        let file_name = match Path::new(&session.name).file_stem() {
            Some(stem) => format!("{}_processed.png", stem.to_string_lossy()),
            None => "processed.png".to_string(),
        };
        let Some(path) = io::pick_image_save_path(self.settings.last_dir.as_deref(), &file_name) else {
            return;
        };
        match io::save_image(session.current_image(), &path) {
            Ok(()) => {
                logger::session_event(SessionEvent::ImageSaved(&path));
                self.set_status(format!("Saved {}", path.display()));
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }

    fn handle_export_recipe(&mut self) {
        let Some(session) = &self.session else { return };
        let recipe = session.recipe();
        if recipe.is_empty() {
            log_warn!("Exporting an empty recipe");
        }
        let Some(path) = io::pick_recipe_save_path(self.settings.last_dir.as_deref()) else {
            return;
        };
        match io::save_recipe(&recipe, &path) {
            Ok(()) => {
                logger::session_event(SessionEvent::RecipeExported {
                    path: &path,
                    steps: recipe.len(),
                });
                self.set_status(format!("Exported recipe with {} step(s)", recipe.len()));
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }

    // ========================================================================
    // DIALOGS
    // ========================================================================

    fn open_dialog(&mut self, dialog: ActiveDialog) {
        if let Some(session) = &mut self.session
            && session.has_preview()
        {
            session.discard();
            self.canvas.invalidate();
        }
        self.active_dialog = dialog;
    }

    fn process_active_dialog(&mut self, ctx: &egui::Context) {
        if self.active_dialog.is_none() {
            return;
        }
        let result = self.active_dialog.show(ctx);
        let Some(session) = &mut self.session else {
            self.active_dialog = ActiveDialog::None;
            return;
        };

        match result {
            DialogResult::Open => {}
            DialogResult::Changed(action) => match session.preview(&action) {
                Ok(_) => {
                    self.canvas.invalidate();
                    self.status = None;
                }
                Err(e) => self.set_error(e.to_string()),
            },
            DialogResult::Ok(action) => {
                match session.apply(action) {
                    Ok(entry) => {
                        logger::session_event(SessionEvent::Applied(&entry));
                        self.active_dialog = ActiveDialog::None;
                        self.canvas.invalidate();
                        self.set_status(entry.description());
                    }
                    // Keep the dialog open so the parameters can be fixed.
                    Err(e) => self.set_error(e.to_string()),
                }
            }
            DialogResult::Cancel => {
                session.discard();
                self.active_dialog = ActiveDialog::None;
                self.canvas.invalidate();
            }
        }
    }

    fn handle_history_action(&mut self, action: HistoryPanelAction) {
        let Some(session) = &mut self.session else { return };
        let changed = match &action {
            HistoryPanelAction::Select(entry) => {
                let ok = session.select_entry(entry);
                if ok {
                    logger::session_event(SessionEvent::Selected(entry));
                }
                ok
            }
            HistoryPanelAction::RevertTo(entry) => {
                let ok = session.revert_to(entry);
                if ok {
                    logger::session_event(SessionEvent::RevertedTo(entry));
                }
                ok
            }
        };
        if changed {
            self.active_dialog = ActiveDialog::None;
            self.canvas.invalidate();
        }
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        let has_image = self.session.is_some();
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open image...").clicked() {
                        ui.close_menu();
                        self.handle_open_file();
                    }
                    ui.separator();
                    if ui.add_enabled(has_image, egui::Button::new("Save image...")).clicked() {
                        ui.close_menu();
                        self.handle_save_image();
                    }
                    if ui
                        .add_enabled(has_image, egui::Button::new("Export recipe..."))
                        .clicked()
                    {
                        ui.close_menu();
                        self.handle_export_recipe();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ui.close_menu();
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.checkbox(&mut self.settings.show_history, "History").changed() {
                        self.settings.save();
                    }
                    if ui.checkbox(&mut self.settings.dark_mode, "Dark mode").changed() {
                        apply_theme(ctx, self.settings.dark_mode);
                        self.settings.save();
                    }
                    ui.separator();
                    if ui.add_enabled(has_image, egui::Button::new("Fit to window")).clicked() {
                        self.canvas.fit();
                        ui.close_menu();
                    }
                    if ui.add_enabled(has_image, egui::Button::new("Actual size")).clicked() {
                        self.canvas.reset_zoom();
                        ui.close_menu();
                    }
                });

                ui.add_enabled_ui(has_image, |ui| {
                    ui.menu_button("Detect", |ui| {
                        if ui.button("Hough Circle").clicked() {
                            ui.close_menu();
                            self.open_dialog(ActiveDialog::HoughCircle(HoughCircleDialog::new()));
                        }
                    });
                    ui.menu_button("Transform", |ui| {
                        if ui.button("Erosion and Dilation").clicked() {
                            ui.close_menu();
                            let live = self.settings.live_preview;
                            self.open_dialog(ActiveDialog::Morphology(MorphologyDialog::new(live)));
                        }
                        ui.menu_button("Thresholding", |ui| {
                            if ui.button("inRange").clicked() {
                                ui.close_menu();
                                let live = self.settings.live_preview;
                                self.open_dialog(ActiveDialog::InRange(InRangeDialog::new(live)));
                            }
                        });
                    });
                });
            });
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(status) = &self.status {
                    let text = egui::RichText::new(&status.text).size(11.0);
                    if status.is_error {
                        ui.label(text.color(ui.visuals().error_fg_color));
                    } else {
                        ui.label(text);
                    }
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(info) = &self.hover {
                        ui.label(egui::RichText::new(info.status_text()).size(11.0).monospace());
                    }
                    if let Some(session) = &self.session
                        && session.has_preview()
                    {
                        ui.label(egui::RichText::new("PREVIEW").size(11.0).strong());
                    }
                });
            });
        });
    }

    fn show_history_panel(&mut self, ctx: &egui::Context) -> Option<HistoryPanelAction> {
        let session = self.session.as_ref()?;
        if !self.settings.show_history {
            return None;
        }
        let mut action = None;
        egui::SidePanel::right("history_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                ui.heading("History");
                ui.separator();
                action = self
                    .history_panel
                    .show(ui, &session.history, session.current_entry());
            });
        action
    }
}

fn apply_theme(ctx: &egui::Context, dark: bool) {
    ctx.set_visuals(if dark {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    });
}

impl eframe::App for CVisionApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let title = match &self.session {
            Some(session) => format!("CVisionTool - {}", session.display_title()),
            None => "CVisionTool".to_string(),
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));

        // Drag-and-drop opens the first dropped file.
        let dropped = ctx.input(|i| i.raw.dropped_files.iter().find_map(|f| f.path.clone()));
        if let Some(path) = dropped {
            self.open_file_by_path(&path);
        }

        self.show_menu_bar(ctx);
        self.show_status_bar(ctx);
        if let Some(action) = self.show_history_panel(ctx) {
            self.handle_history_action(action);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| match &self.session {
                Some(session) => {
                    self.hover = self.canvas.show(ui, session.display_image());
                }
                None => {
                    self.hover = None;
                    ui.centered_and_justified(|ui| {
                        ui.weak("File > Open image... or drop an image here");
                    });
                }
            });

        self.process_active_dialog(ctx);
    }
}
