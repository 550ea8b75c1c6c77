use egui::{self, Align2, Color32, FontId, Pos2, Rect, Rounding, Stroke};

use crate::parse::Point;
use crate::reference::{self, compare};
use crate::settings::Settings;
use crate::transport::DataSource;

const MEASURED_COLOR: Color32 = Color32::from_rgb(255, 140, 0);
const REFERENCE_COLOR: Color32 = Color32::from_rgb(70, 130, 220);
const GRID_DIVISIONS: usize = 5;
const AXIS_MARGIN: f32 = 48.0;

pub const TITLE: &str = "Step Response";
const X_LABEL: &str = "Time (s)";
const Y_LABEL: &str = "Response (V)";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    RunTest,
    Clear,
    Quit,
}

/// The window's actions, in button order.
pub const COMMANDS: &[(&str, Command)] = &[
    ("Run Test", Command::RunTest),
    ("Clear", Command::Clear),
    ("Quit", Command::Quit),
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

pub struct StepResponseApp {
    settings: Settings,
    source: DataSource,
    reference: Vec<Point>,
    measured: Vec<Point>,
    plotted: bool,
    status: String,
}

impl StepResponseApp {
    pub fn new(settings: Settings, source: DataSource) -> Self {
        let reference = reference::reference_curve(
            &settings.circuit,
            settings.reference_span(),
            settings.reference_step(),
        );
        let status = format!("Ready, reading from {}", source.describe());
        Self {
            settings,
            source,
            reference,
            measured: Vec::new(),
            plotted: false,
            status,
        }
    }

    pub fn measured(&self) -> &[Point] {
        &self.measured
    }

    pub fn is_plotted(&self) -> bool {
        self.plotted
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn dispatch(&mut self, command: Command) -> Flow {
        log::debug!("Command {:?}", command);
        match command {
            Command::RunTest => self.run_test(),
            Command::Clear => {
                self.measured.clear();
                self.plotted = false;
                self.status = "Cleared".to_owned();
            }
            Command::Quit => return Flow::Close,
        }
        Flow::Continue
    }

    /// Blocks the UI until the run has been received.
    fn run_test(&mut self) {
        self.plotted = true;
        match self.source.acquire(self.settings.capture.points, |_| {}) {
            Ok(capture) => {
                self.measured = capture.points;
                let mut status = format!("{} points", self.measured.len());
                if !capture.complete {
                    status.push_str(" (incomplete run)");
                }
                if let Some(c) = compare(&self.measured, &self.settings.circuit) {
                    status.push_str(&format!(
                        ", RMS deviation {:.3} V, max {:.3} V at {:.2} s",
                        c.rms_error, c.max_error, c.max_error_at
                    ));
                }
                log::info!("{}", status);
                self.status = status;
            }
            Err(e) => {
                log::error!("Run failed: {}", e);
                self.measured.clear();
                self.status = format!("Run failed: {}", e);
            }
        }
    }
}

impl eframe::App for StepResponseApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut pending = None;

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                for (label, command) in COMMANDS {
                    if ui.button(*label).clicked() {
                        pending = Some(*command);
                    }
                }
                ui.separator();
                ui.label(&self.status);
            });
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.plotted {
                draw_plot(ui, &self.reference, &self.measured);
            } else {
                draw_plot(ui, &[], &[]);
            }
        });

        if let Some(command) = pending {
            if self.dispatch(command) == Flow::Close {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }
}

/// Data range covered by the plot.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlotBounds {
    pub t_min: f64,
    pub t_max: f64,
    pub v_min: f64,
    pub v_max: f64,
}

impl PlotBounds {
    pub fn enclosing<'a>(curves: impl IntoIterator<Item = &'a [Point]>) -> Option<Self> {
        let mut bounds: Option<PlotBounds> = None;
        for p in curves.into_iter().flatten() {
            let b = bounds.get_or_insert(PlotBounds {
                t_min: p.t,
                t_max: p.t,
                v_min: p.v,
                v_max: p.v,
            });
            b.t_min = b.t_min.min(p.t);
            b.t_max = b.t_max.max(p.t);
            b.v_min = b.v_min.min(p.v);
            b.v_max = b.v_max.max(p.v);
        }
        // Always show the zero line and never collapse an axis.
        bounds.map(|mut b| {
            b.v_min = b.v_min.min(0.0);
            if b.t_max <= b.t_min {
                b.t_max = b.t_min + 1.0;
            }
            if b.v_max <= b.v_min {
                b.v_max = b.v_min + 1.0;
            }
            b
        })
    }

    pub fn to_screen(&self, rect: Rect, p: Point) -> Pos2 {
        let x = (p.t - self.t_min) / (self.t_max - self.t_min);
        let y = (p.v - self.v_min) / (self.v_max - self.v_min);
        Pos2::new(
            rect.left() + x as f32 * rect.width(),
            rect.bottom() - y as f32 * rect.height(),
        )
    }
}

fn draw_plot(ui: &mut egui::Ui, reference: &[Point], measured: &[Point]) {
    let desired = ui.available_size().max(egui::vec2(300.0, 200.0));
    let (rect, _) = ui.allocate_exact_size(desired, egui::Sense::hover());
    let painter = ui.painter_at(rect);
    let text_color = ui.visuals().text_color();
    let weak = ui.visuals().weak_text_color();

    painter.rect(
        rect,
        Rounding::same(6.0),
        ui.visuals().faint_bg_color,
        Stroke::new(1.0, weak),
    );
    painter.text(
        egui::pos2(rect.center().x, rect.top() + 6.0),
        Align2::CENTER_TOP,
        TITLE,
        FontId::proportional(16.0),
        text_color,
    );

    let area = Rect::from_min_max(
        egui::pos2(rect.left() + AXIS_MARGIN, rect.top() + 32.0),
        egui::pos2(rect.right() - 16.0, rect.bottom() - AXIS_MARGIN),
    );

    let Some(bounds) = PlotBounds::enclosing([reference, measured]) else {
        painter.text(
            rect.center(),
            Align2::CENTER_CENTER,
            "Press Run Test to capture a step response",
            FontId::proportional(14.0),
            weak,
        );
        return;
    };

    let grid = Stroke::new(0.5, weak.gamma_multiply(0.5));
    for i in 0..=GRID_DIVISIONS {
        let f = i as f64 / GRID_DIVISIONS as f64;
        let t = bounds.t_min + f * (bounds.t_max - bounds.t_min);
        let v = bounds.v_min + f * (bounds.v_max - bounds.v_min);

        let x = bounds.to_screen(area, Point { t, v: bounds.v_min }).x;
        let y = bounds.to_screen(area, Point { t: bounds.t_min, v }).y;
        painter.line_segment([egui::pos2(x, area.top()), egui::pos2(x, area.bottom())], grid);
        painter.line_segment([egui::pos2(area.left(), y), egui::pos2(area.right(), y)], grid);

        painter.text(
            egui::pos2(x, area.bottom() + 4.0),
            Align2::CENTER_TOP,
            format!("{:.2}", t),
            FontId::monospace(11.0),
            weak,
        );
        painter.text(
            egui::pos2(area.left() - 4.0, y),
            Align2::RIGHT_CENTER,
            format!("{:.2}", v),
            FontId::monospace(11.0),
            weak,
        );
    }
    painter.text(
        egui::pos2(area.center().x, rect.bottom() - 6.0),
        Align2::CENTER_BOTTOM,
        X_LABEL,
        FontId::proportional(13.0),
        text_color,
    );
    painter.text(
        egui::pos2(rect.left() + 6.0, rect.top() + 6.0),
        Align2::LEFT_TOP,
        Y_LABEL,
        FontId::proportional(13.0),
        text_color,
    );

    for (curve, color) in [(reference, REFERENCE_COLOR), (measured, MEASURED_COLOR)] {
        if curve.len() < 2 {
            continue;
        }
        let points = curve.iter().map(|p| bounds.to_screen(area, *p)).collect();
        painter.add(egui::Shape::line(points, Stroke::new(2.0, color)));
    }

    let legend = [("model", REFERENCE_COLOR), ("measured", MEASURED_COLOR)];
    for (i, (name, color)) in legend.iter().enumerate() {
        let y = area.bottom() - 12.0 - 16.0 * (legend.len() - 1 - i) as f32;
        let x = area.right() - 90.0;
        painter.line_segment(
            [egui::pos2(x, y), egui::pos2(x + 20.0, y)],
            Stroke::new(2.0, *color),
        );
        painter.text(
            egui::pos2(x + 26.0, y),
            Align2::LEFT_CENTER,
            *name,
            FontId::proportional(12.0),
            text_color,
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    fn replay_app(name: &str, contents: &str) -> (StepResponseApp, PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "step-plot-app-{}-{}.csv",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        let app = StepResponseApp::new(Settings::default(), DataSource::Replay(path.clone()));
        (app, path)
    }

    #[test]
    fn test_command_table() {
        let labels = COMMANDS.iter().map(|(l, _)| *l).collect::<Vec<_>>();
        assert_eq!(labels, vec!["Run Test", "Clear", "Quit"]);
    }

    #[test]
    fn test_run_clear_quit() {
        let (mut app, path) = replay_app("run", "0,0.0\n10,0.033\nnoise\n20,0.066\nEnd\n");
        assert!(!app.is_plotted());
        assert_eq!(app.reference.len(), 1991);

        assert_eq!(app.dispatch(Command::RunTest), Flow::Continue);
        std::fs::remove_file(&path).unwrap();
        assert!(app.is_plotted());
        assert_eq!(app.measured().len(), 3);
        assert!(app.status().starts_with("3 points (incomplete run), RMS deviation"));

        assert_eq!(app.dispatch(Command::Clear), Flow::Continue);
        assert!(!app.is_plotted());
        assert!(app.measured().is_empty());

        assert_eq!(app.dispatch(Command::Quit), Flow::Close);
    }

    #[test]
    fn test_failed_run_reports_error() {
        let mut app = StepResponseApp::new(
            Settings::default(),
            DataSource::Replay(PathBuf::from("/nonexistent/run.csv")),
        );
        app.dispatch(Command::RunTest);
        assert!(app.status().starts_with("Run failed"));
        assert!(app.measured().is_empty());
    }

    #[test]
    fn test_plot_bounds() {
        assert_eq!(PlotBounds::enclosing([&[][..], &[][..]]), None);

        let a = [Point { t: 0.0, v: 0.5 }, Point { t: 2.0, v: 3.0 }];
        let b = [Point { t: 1.0, v: 3.3 }];
        let bounds = PlotBounds::enclosing([&a[..], &b[..]]).unwrap();
        assert_eq!(
            bounds,
            PlotBounds {
                t_min: 0.0,
                t_max: 2.0,
                v_min: 0.0,
                v_max: 3.3,
            }
        );

        let rect = Rect::from_min_max(egui::pos2(10.0, 20.0), egui::pos2(110.0, 220.0));
        assert_eq!(
            bounds.to_screen(rect, Point { t: 0.0, v: 0.0 }),
            egui::pos2(10.0, 220.0)
        );
        assert_eq!(
            bounds.to_screen(rect, Point { t: 2.0, v: 3.3 }),
            egui::pos2(110.0, 20.0)
        );
    }

    #[test]
    fn test_single_point_bounds() {
        let a = [Point { t: 1.0, v: 0.0 }];
        let bounds = PlotBounds::enclosing([&a[..]]).unwrap();
        assert_eq!(bounds.t_max, 2.0);
        assert_eq!(bounds.v_max, 1.0);
    }
}
