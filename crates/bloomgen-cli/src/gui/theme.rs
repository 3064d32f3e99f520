//! Dark palette of the generator window

use eframe::egui::{self, Color32};

pub const BACKGROUND: Color32 = Color32::from_rgb(0x21, 0x21, 0x21);
pub const FOREGROUND: Color32 = Color32::from_rgb(0xE0, 0xE0, 0xE0);
pub const BUTTON: Color32 = Color32::from_rgb(0x3F, 0x51, 0xB5);
pub const BUTTON_TEXT: Color32 = Color32::WHITE;
pub const ENTRY: Color32 = Color32::from_rgb(0x33, 0x33, 0x33);
pub const OUTPUT: Color32 = Color32::from_rgb(0x1A, 0x1A, 0x1A);
pub const BORDER: Color32 = Color32::from_rgb(0x88, 0x88, 0x88);

pub fn apply(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = BACKGROUND;
    visuals.window_fill = BACKGROUND;
    // Single-line text edits paint this behind their text.
    visuals.extreme_bg_color = ENTRY;
    visuals.selection.bg_fill = BUTTON;
    ctx.set_visuals(visuals);
}
