use std::fmt::Write as _;

use glam::Vec2;
use waymark_common::Rect;

use crate::batch::BatchKey;
use crate::primitives::{BoxPrimitive, LinePrimitive, TextPrimitive};

/// Drawing surface the batch compositor flushes into.
///
/// `set_style` is called once per batch; the draw calls that follow use that
/// style until the next `set_style`.
pub trait DrawBackend {
    fn set_style(&mut self, key: &BatchKey);

    fn draw_box(&mut self, primitive: &BoxPrimitive);

    fn draw_line(&mut self, primitive: &LinePrimitive);

    fn draw_text(&mut self, primitive: &TextPrimitive);
}

/// One call received by a `RecordingBackend`.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Style(BatchKey),
    Box(Rect),
    Line(Vec2, Vec2),
    Text(String, Vec2),
}

/// Backend that records every call, for tests and frame dumps.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<DrawCall>,
    style_changes: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style_changes(&self) -> usize {
        self.style_changes
    }

    /// Boxes, lines and texts drawn.
    pub fn primitive_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| !matches!(call, DrawCall::Style(_)))
            .count()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.calls.iter().filter_map(|call| match call {
            DrawCall::Text(text, _) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.style_changes = 0;
    }
}

impl DrawBackend for RecordingBackend {
    fn set_style(&mut self, key: &BatchKey) {
        self.style_changes += 1;
        self.calls.push(DrawCall::Style(*key));
    }

    fn draw_box(&mut self, primitive: &BoxPrimitive) {
        self.calls.push(DrawCall::Box(primitive.rect));
    }

    fn draw_line(&mut self, primitive: &LinePrimitive) {
        self.calls.push(DrawCall::Line(primitive.from, primitive.to));
    }

    fn draw_text(&mut self, primitive: &TextPrimitive) {
        self.calls
            .push(DrawCall::Text(primitive.text.clone(), primitive.position));
    }
}

/// Human-readable backend for the CLI and logs.
///
/// Writes one line per style change and per primitive.
#[derive(Debug, Default)]
pub struct DebugTextBackend {
    out: String,
}

impl DebugTextBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a frame header.
    pub fn begin_frame(&mut self, frame: u64) {
        let _ = writeln!(self.out, "=== Overlay frame {frame} ===");
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    /// Return everything written so far and start over.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.out)
    }
}

impl DrawBackend for DebugTextBackend {
    fn set_style(&mut self, key: &BatchKey) {
        let [r, g, b, a] = key.color().0;
        let _ = match key {
            BatchKey::Stroke { .. } => writeln!(
                self.out,
                "style stroke rgba=({r}, {g}, {b}, {a}) thickness={:.1}",
                key.thickness().unwrap_or_default()
            ),
            BatchKey::Text { .. } => writeln!(
                self.out,
                "style text rgba=({r}, {g}, {b}, {a}) size={:.1}",
                key.font_size().unwrap_or_default()
            ),
        };
    }

    fn draw_box(&mut self, primitive: &BoxPrimitive) {
        let r = primitive.rect;
        let _ = writeln!(
            self.out,
            "  box min=({:.1}, {:.1}) max=({:.1}, {:.1})",
            r.min.x, r.min.y, r.max.x, r.max.y
        );
    }

    fn draw_line(&mut self, primitive: &LinePrimitive) {
        let _ = writeln!(
            self.out,
            "  line ({:.1}, {:.1}) -> ({:.1}, {:.1})",
            primitive.from.x, primitive.from.y, primitive.to.x, primitive.to.y
        );
    }

    fn draw_text(&mut self, primitive: &TextPrimitive) {
        let _ = writeln!(
            self.out,
            "  text \"{}\" at ({:.1}, {:.1})",
            primitive.text, primitive.position.x, primitive.position.y
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_common::Rgba;

    #[test]
    fn debug_backend_empty_frame() {
        let mut backend = DebugTextBackend::new();
        backend.begin_frame(0);
        let out = backend.take_output();
        assert!(out.contains("Overlay frame 0"));
        assert!(backend.output().is_empty());
    }

    #[test]
    fn debug_backend_writes_primitives() {
        let mut backend = DebugTextBackend::new();
        backend.set_style(&BatchKey::stroke(Rgba::rgb(255, 0, 0), 1.5));
        backend.draw_box(&BoxPrimitive {
            rect: Rect {
                min: Vec2::new(1.0, 2.0),
                max: Vec2::new(3.0, 4.0),
            },
            visible: true,
            ..BoxPrimitive::default()
        });
        backend.set_style(&BatchKey::text(Rgba::WHITE, 13.0));
        backend.draw_text(&TextPrimitive {
            text: "Enemy-3".to_string(),
            visible: true,
            ..TextPrimitive::default()
        });
        let out = backend.output();
        assert!(out.contains("style stroke rgba=(255, 0, 0, 255) thickness=1.5"));
        assert!(out.contains("box min=(1.0, 2.0) max=(3.0, 4.0)"));
        assert!(out.contains("text \"Enemy-3\""));
    }

    #[test]
    fn recording_backend_counts() {
        let mut backend = RecordingBackend::new();
        backend.set_style(&BatchKey::stroke(Rgba::WHITE, 1.0));
        backend.draw_line(&LinePrimitive::default());
        backend.draw_box(&BoxPrimitive::default());
        assert_eq!(backend.style_changes(), 1);
        assert_eq!(backend.primitive_count(), 2);
        backend.clear();
        assert!(backend.calls.is_empty());
        assert_eq!(backend.style_changes(), 0);
    }
}
