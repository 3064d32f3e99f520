//! Generator window
//!
//! One text input, the "Generar Texto" button and a scrollable read-only
//! output region. Requests run on the tokio runtime; results come back over
//! a channel polled each frame, so the window never blocks on sampling.

mod theme;

use crate::error::CliError;
use bloomgen::{BloomgenApp, CompletionSet, CoreError, Session, SessionState, Submission};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui::{self, Button, FontId, RichText, ScrollArea, Stroke, TextEdit};
use std::time::Duration;
use tokio::runtime::Handle;

pub const WINDOW_TITLE: &str = "Generador de Texto con BLOOM";
const WINDOW_SIZE: [f32; 2] = [700.0, 500.0];
const PROMPT_LABEL: &str = "Ingresa el texto inicial:";
const SUBMIT_LABEL: &str = "Generar Texto";

type Outcome = Result<CompletionSet, CoreError>;

/// Open the window and block until it closes
pub fn run(app: BloomgenApp, runtime: Handle) -> Result<(), CliError> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(WINDOW_SIZE)
            .with_resizable(false),
        ..Default::default()
    };

    tracing::info!("opening generator window");
    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |cc| {
            theme::apply(&cc.egui_ctx);
            Box::new(GeneratorWindow::new(app, runtime))
        }),
    )
    .map_err(|e| CliError::Gui(e.to_string()))
}

struct GeneratorWindow {
    session: Session,
    input: String,
    runtime: Handle,
    results_tx: Sender<Outcome>,
    results_rx: Receiver<Outcome>,
}

impl GeneratorWindow {
    fn new(app: BloomgenApp, runtime: Handle) -> Self {
        // At most one request is in flight.
        let (results_tx, results_rx) = crossbeam_channel::bounded(1);
        Self {
            session: Session::new(app),
            input: String::new(),
            runtime,
            results_tx,
            results_rx,
        }
    }

    fn submit(&mut self, ctx: &egui::Context) {
        match self.session.submit(&self.input) {
            Submission::Exit => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
            Submission::Generate(request) => {
                let app = self.session.app().clone();
                let tx = self.results_tx.clone();
                let ctx = ctx.clone();
                self.runtime.spawn(async move {
                    let outcome = app.submit(request).await;
                    if tx.send(outcome).is_err() {
                        tracing::debug!("window closed before generation finished");
                    }
                    ctx.request_repaint();
                });
            }
            Submission::Ignored => {}
        }
    }

    fn poll_results(&mut self) {
        while let Ok(outcome) = self.results_rx.try_recv() {
            self.session.complete(outcome);
        }
    }
}

impl eframe::App for GeneratorWindow {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_results();
        let busy = self.session.state() == SessionState::Generating;

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(theme::BACKGROUND).inner_margin(20.0))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.label(
                        RichText::new(PROMPT_LABEL)
                            .color(theme::FOREGROUND)
                            .size(14.0)
                            .strong(),
                    );
                    ui.add_space(10.0);

                    ui.add(
                        TextEdit::singleline(&mut self.input)
                            .font(FontId::proportional(14.0))
                            .text_color(theme::FOREGROUND)
                            .desired_width(560.0),
                    );
                    ui.add_space(20.0);

                    let button = Button::new(
                        RichText::new(SUBMIT_LABEL)
                            .color(theme::BUTTON_TEXT)
                            .size(14.0)
                            .strong(),
                    )
                    .fill(theme::BUTTON);
                    if ui.add_enabled(!busy, button).clicked() {
                        self.submit(ctx);
                    }

                    if busy {
                        ui.add_space(8.0);
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label(RichText::new("Generando...").color(theme::FOREGROUND));
                            if ui.button("Cancelar").clicked() {
                                self.session.cancel();
                            }
                        });
                    }
                    ui.add_space(20.0);

                    egui::Frame::none()
                        .fill(theme::OUTPUT)
                        .stroke(Stroke::new(1.0, theme::BORDER))
                        .inner_margin(8.0)
                        .show(ui, |ui| {
                            ScrollArea::vertical()
                                .auto_shrink([false, false])
                                .show(ui, |ui| {
                                    let mut output = self.session.output();
                                    ui.add(
                                        TextEdit::multiline(&mut output)
                                            .font(FontId::proportional(12.0))
                                            .text_color(theme::FOREGROUND)
                                            .desired_width(f32::INFINITY)
                                            .frame(false),
                                    );
                                });
                        });
                });
            });

        if busy {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

impl Drop for GeneratorWindow {
    fn drop(&mut self) {
        self.session.cancel();
    }
}
