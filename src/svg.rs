use std::fmt::{self, Write};

use crate::geom::{Point, Rect};
use crate::layout::NodeShape;
use crate::measure::FieldMetrics;
use crate::model::{Cardinality, Diagram, Edge, Group, Node};

/// SVG path data for a polyline: `M x y L x y …`.
pub fn path_data(points: &[Point]) -> String {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let cmd = if i == 0 { 'M' } else { 'L' };
            format!("{} {} {}", cmd, p.x, p.y)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Static rendering of a diagram with precomputed edge paths.
pub struct SvgRenderer {
    metrics: FieldMetrics,
    padding: f64,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self::new(FieldMetrics::default())
    }
}

impl SvgRenderer {
    pub fn new(metrics: FieldMetrics) -> Self {
        Self { metrics, padding: 20.0 }
    }

    /// `paths` pairs edge ids with their polylines; edges without one are skipped.
    pub fn render(&self, diagram: &Diagram, paths: &[(String, Vec<Point>)]) -> String {
        let mut svg = String::new();
        self.write_document(&mut svg, diagram, paths)
            .expect("writing to a String cannot fail");
        svg
    }

    fn extent(&self, diagram: &Diagram, paths: &[(String, Vec<Point>)]) -> Rect {
        let rects = diagram
            .nodes
            .iter()
            .map(|n| n.bounds())
            .chain(diagram.groups.iter().map(|g| g.bounds))
            .chain(
                paths
                    .iter()
                    .flat_map(|(_, pts)| pts.iter().map(|p| Rect::new(p.x, p.y, 0.0, 0.0))),
            )
            .filter(|r| r.is_finite());
        let bounds = rects.reduce(|acc, r| acc.union(&r)).unwrap_or_default();
        bounds.expand(self.padding)
    }

    fn write_document(
        &self,
        svg: &mut String,
        diagram: &Diagram,
        paths: &[(String, Vec<Point>)],
    ) -> fmt::Result {
        let view = self.extent(diagram, paths);
        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="{} {} {} {}">"#,
            view.width, view.height, view.x, view.y, view.width, view.height
        )?;

        writeln!(
            svg,
            r#"<style>
  .group {{ fill-opacity: 0.08; stroke-dasharray: 6 4; stroke-width: 1.5; }}
  .group-name {{ font-family: sans-serif; font-size: 12px; font-weight: bold; }}
  .node {{ stroke: #333; stroke-width: 1.5; }}
  .node-label {{ font-family: sans-serif; font-size: 14px; font-weight: bold; }}
  .field-text {{ font-family: monospace; font-size: 12px; }}
  .pk {{ font-weight: bold; }}
  .fk {{ font-style: italic; }}
  .edge {{ stroke: #666; stroke-width: 1.5; fill: none; }}
  .edge-label {{ font-family: sans-serif; font-size: 11px; fill: #666; }}
  .cardinality {{ font-family: monospace; font-size: 11px; fill: #333; }}
</style>"#
        )?;

        for group in &diagram.groups {
            self.write_group(svg, group)?;
        }

        // Edges behind nodes
        for (id, points) in paths {
            if let Some(edge) = diagram.edge(id)
                && points.len() >= 2
            {
                self.write_edge(svg, edge, points)?;
            }
        }

        for node in &diagram.nodes {
            self.write_node(svg, node)?;
        }

        writeln!(svg, "</svg>")
    }

    fn write_group(&self, svg: &mut String, group: &Group) -> fmt::Result {
        let b = group.bounds;
        let color = escape_xml(&group.color);
        writeln!(
            svg,
            r#"<rect class="group" x="{}" y="{}" width="{}" height="{}" rx="8" fill="{}" stroke="{}" />"#,
            b.x, b.y, b.width, b.height, color, color
        )?;
        writeln!(
            svg,
            r#"<text class="group-name" x="{}" y="{}">{}</text>"#,
            b.x + 10.0,
            b.y + 20.0,
            escape_xml(&group.name)
        )
    }

    fn write_node(&self, svg: &mut String, node: &Node) -> fmt::Result {
        let b = node.bounds();
        let fill = escape_xml(node.color.as_deref().unwrap_or("#ffffff"));
        match node.shape() {
            NodeShape::Rectangle => writeln!(
                svg,
                r#"<rect class="node" x="{}" y="{}" width="{}" height="{}" rx="4" fill="{}" />"#,
                b.x, b.y, b.width, b.height, fill
            )?,
            NodeShape::Diamond => {
                let c = b.center();
                writeln!(
                    svg,
                    r#"<polygon class="node" points="{},{} {},{} {},{} {},{}" fill="{}" />"#,
                    c.x,
                    b.y,
                    b.right(),
                    c.y,
                    c.x,
                    b.bottom(),
                    b.x,
                    c.y,
                    fill
                )?
            }
            NodeShape::Ellipse => {
                let c = b.center();
                writeln!(
                    svg,
                    r#"<ellipse class="node" cx="{}" cy="{}" rx="{}" ry="{}" fill="{}" />"#,
                    c.x,
                    c.y,
                    b.width / 2.0,
                    b.height / 2.0,
                    fill
                )?
            }
        }

        if node.fields.is_empty() {
            let c = b.center();
            return writeln!(
                svg,
                r#"<text class="node-label" x="{}" y="{}" text-anchor="middle" dominant-baseline="middle">{}</text>"#,
                c.x,
                c.y,
                escape_xml(&node.label)
            );
        }

        let header = self.metrics.header_height;
        writeln!(
            svg,
            r#"<text class="node-label" x="{}" y="{}" text-anchor="middle" dominant-baseline="middle">{}</text>"#,
            b.x + b.width / 2.0,
            b.y + header / 2.0,
            escape_xml(&node.label)
        )?;
        writeln!(
            svg,
            r##"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="#333" stroke-width="1" />"##,
            b.x,
            b.y + header,
            b.right(),
            b.y + header
        )?;
        for (i, field) in node.fields.iter().enumerate() {
            let mut class = "field-text".to_string();
            if field.primary_key {
                class.push_str(" pk");
            }
            if field.foreign_key {
                class.push_str(" fk");
            }
            let prefix = if field.primary_key { "◆ " } else { "  " };
            let text = format!("{}{}: {}", prefix, field.name, field.type_tag);
            writeln!(
                svg,
                r#"<text class="{}" x="{}" y="{}" dominant-baseline="middle">{}</text>"#,
                class,
                b.x + self.metrics.padding_x,
                self.metrics.row_center_y(node, i),
                escape_xml(&text)
            )?;
        }
        Ok(())
    }

    fn write_edge(&self, svg: &mut String, edge: &Edge, points: &[Point]) -> fmt::Result {
        writeln!(
            svg,
            r#"<path class="edge" data-edge="{}" d="{}" />"#,
            escape_xml(&edge.id),
            path_data(points)
        )?;

        let (from_mark, to_mark) = cardinality_marks(edge.cardinality);
        let offset = 15.0;
        let n = points.len();
        for (at, toward, mark) in [
            (points[0], points[1], from_mark),
            (points[n - 1], points[n - 2], to_mark),
        ] {
            let dx = toward.x - at.x;
            let dy = toward.y - at.y;
            let len = dx.hypot(dy);
            if len > 0.0 {
                writeln!(
                    svg,
                    r#"<text class="cardinality" x="{}" y="{}">{}</text>"#,
                    at.x + dx / len * offset,
                    at.y + dy / len * offset - 5.0,
                    mark
                )?;
            }
        }

        if let Some(label) = &edge.label {
            let mid = points[n / 2 - 1].midpoint(points[n / 2]);
            writeln!(
                svg,
                r#"<text class="edge-label" x="{}" y="{}" text-anchor="middle">{}</text>"#,
                mid.x,
                mid.y - 5.0,
                escape_xml(label)
            )?;
        }
        Ok(())
    }
}

fn cardinality_marks(c: Cardinality) -> (&'static str, &'static str) {
    match c {
        Cardinality::OneToOne => ("1", "1"),
        Cardinality::OneToMany => ("1", "N"),
        Cardinality::ManyToOne => ("N", "1"),
        Cardinality::ManyToMany => ("N", "M"),
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
