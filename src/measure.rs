use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

use crate::geom::{Rect, Size};
use crate::model::{Field, Node};

/// Live measurement of rendered field rows.
///
/// Returns the field row's current client-space rectangle, or `None` when
/// the rendering layer has no such element (not mounted, scrolled away).
pub trait Measurer {
    fn measure(&self, node_id: &str, field_id: &str) -> Option<Rect>;
}

/// Measurer for headless use: nothing is ever measurable.
pub struct NoMeasurer;

impl Measurer for NoMeasurer {
    fn measure(&self, _node_id: &str, _field_id: &str) -> Option<Rect> {
        None
    }
}

impl<F> Measurer for F
where
    F: Fn(&str, &str) -> Option<Rect>,
{
    fn measure(&self, node_id: &str, field_id: &str) -> Option<Rect> {
        self(node_id, field_id)
    }
}

/// Row geometry of table/entity nodes and text metrics for auto-sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldMetrics {
    pub header_height: f64,
    pub top_padding: f64,  // Gap between header and first row
    pub row_height: f64,
    pub row_spacing: f64,  // Extra gap between consecutive rows
    pub char_width: f64,   // Width of one narrow (width 1) character
    pub padding_x: f64,
    pub min_table_width: f64,
    pub min_table_height: f64,
}

impl Default for FieldMetrics {
    fn default() -> Self {
        Self {
            header_height: 48.0,
            top_padding: 8.0,
            row_height: 40.0,
            row_spacing: 0.0,
            char_width: 8.0,
            padding_x: 16.0,
            min_table_width: 280.0,
            min_table_height: 120.0,
        }
    }
}

impl FieldMetrics {
    /// World y of the middle of row `index` of `node`.
    pub fn row_center_y(&self, node: &Node, index: usize) -> f64 {
        node.position.y
            + self.header_height
            + self.top_padding
            + index as f64 * (self.row_height + self.row_spacing)
            + self.row_height / 2.0
    }

    pub fn text_width(&self, text: &str) -> f64 {
        let width = UnicodeWidthStr::width(text);
        width as f64 * self.char_width
    }

    /// Size that fits the label and every `name type` row.
    pub fn table_size(&self, label: &str, fields: &[Field]) -> Size {
        let header_width = self.text_width(label);

        let max_row_width = fields
            .iter()
            .map(|f| {
                self.text_width(&f.name) + self.text_width(&f.type_tag) + self.char_width * 2.0
            })
            .fold(0.0, f64::max);

        let width =
            (header_width.max(max_row_width) + self.padding_x * 2.0).max(self.min_table_width);

        let rows = fields.len() as f64 * (self.row_height + self.row_spacing);
        let height =
            (self.header_height + self.top_padding * 2.0 + rows).max(self.min_table_height);

        Size::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::model::NodeKind;

    #[test]
    fn test_ascii_width() {
        let m = FieldMetrics::default();
        assert_eq!(m.text_width("User"), 4.0 * 8.0);
    }

    #[test]
    fn test_unicode_width() {
        let m = FieldMetrics::default();
        // 全角文字は幅2
        assert_eq!(m.text_width("ユーザー"), 8.0 * 8.0);
    }

    #[test]
    fn test_row_center_y() {
        let m = FieldMetrics::default();
        let node = Node::new("t", NodeKind::Table, Point::new(0.0, 100.0));
        assert_eq!(m.row_center_y(&node, 0), 100.0 + 48.0 + 8.0 + 20.0);
        assert_eq!(m.row_center_y(&node, 2), 100.0 + 48.0 + 8.0 + 80.0 + 20.0);
    }

    #[test]
    fn test_table_size_minimums() {
        let m = FieldMetrics::default();
        assert_eq!(m.table_size("t", &[]), Size::new(280.0, 120.0));
    }

    #[test]
    fn test_table_size_grows_with_content() {
        let m = FieldMetrics::default();
        let fields: Vec<Field> = (0..4)
            .map(|i| {
                let name = "a_rather_long_column_name";
                Field::new(format!("f{}", i), name, "timestamp with time zone")
            })
            .collect();
        let size = m.table_size("users", &fields);
        assert!(size.width > 280.0);
        assert_eq!(size.height, 48.0 + 16.0 + 160.0);
    }

    #[test]
    fn test_closure_measurer() {
        let measurer = |node: &str, field: &str| {
            (node == "t" && field == "f").then(|| Rect::new(1.0, 2.0, 3.0, 4.0))
        };
        assert_eq!(measurer.measure("t", "f"), Some(Rect::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(measurer.measure("t", "g"), None);
        assert_eq!(NoMeasurer.measure("t", "f"), None);
    }
}
