use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};

use crate::{clock::Clock, error::RenderError, types::EventRecord};

use super::{
    ArtifactKind, CONSOLIDATED_TITLE, RenderedArtifact, Renderer,
    layout::{self, Align, Block, LogicalPage, Table},
};

// US letter, one inch margins
const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN: f32 = 25.4;
const TOP: f32 = PAGE_HEIGHT - MARGIN;
const BOTTOM: f32 = MARGIN;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const MM_PER_PT: f32 = 0.352_778;
const MM_PER_INCH: f32 = 25.4;
const LAYER: &str = "Layer 1";

const TITLE_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
const CELL_PADDING: f32 = 1.8;
const SIGNATURE_LABEL_WIDTH: f32 = 2.5 * MM_PER_INCH;
const SIGNATURE_LINE_WIDTH: f32 = 3.5 * MM_PER_INCH;

/// Paginated renderer: a cover page summarizing every event, then one page
/// per event. Long tables continue on following pages.
pub struct PdfRenderer {
    clock: Box<dyn Clock>,
}

impl PdfRenderer {
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
        }
    }
}

impl Renderer for PdfRenderer {
    fn render(&self, events: &[EventRecord]) -> Result<RenderedArtifact, RenderError> {
        let generated_at = self.clock.now();
        let pages = layout::consolidated_pages(events, generated_at);
        let bytes = typeset(&pages)?;
        tracing::debug!(
            events = events.len(),
            pages = pages.len(),
            bytes = bytes.len(),
            "Rendered paginated report"
        );

        Ok(RenderedArtifact::new(
            ArtifactKind::Pdf,
            bytes,
            events.iter().map(|e| e.event_id.clone()).collect(),
            generated_at,
        ))
    }
}

fn typeset(pages: &[LogicalPage]) -> Result<Vec<u8>, RenderError> {
    let (doc, page, layer) =
        PdfDocument::new(CONSOLIDATED_TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
    let font = |builtin: BuiltinFont| {
        doc.add_builtin_font(builtin)
            .map_err(|e| RenderError::Typesetting(e.to_string()))
    };
    let regular = font(BuiltinFont::Helvetica)?;
    let bold = font(BuiltinFont::HelveticaBold)?;

    {
        let mut setter = Typesetter {
            layer: doc.get_page(page).get_layer(layer),
            doc: &doc,
            regular,
            bold,
            cursor: TOP,
        };
        for (index, logical) in pages.iter().enumerate() {
            if index > 0 {
                setter.new_page();
            }
            for block in &logical.blocks {
                setter.block(block);
            }
        }
    }

    doc.save_to_bytes()
        .map_err(|e| RenderError::Typesetting(e.to_string()))
}

struct Typesetter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Distance of the next free line from the bottom edge, in mm
    cursor: f32,
}

impl Typesetter<'_> {
    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = TOP;
    }

    /// Break to a fresh page unless `height` still fits. A block taller than
    /// a whole page is placed at the top and allowed to run off.
    fn reserve(&mut self, height: f32) {
        if self.cursor - height < BOTTOM && self.cursor < TOP {
            self.new_page();
        }
    }

    fn block(&mut self, block: &Block) {
        match block {
            Block::Title(text) => self.centered(text, TITLE_SIZE),
            Block::Heading(text) => self.centered(text, HEADING_SIZE),
            Block::Paragraph { lead, lines } => self.paragraph(lead.as_deref(), lines),
            Block::Table(table) => self.table(table),
            Block::Signatures(labels) => self.signatures(labels),
            Block::Spacer(points) => self.cursor = (self.cursor - points * MM_PER_PT).max(BOTTOM),
        }
    }

    fn write(&self, text: &str, size: f32, x: f32, baseline: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(printable(text), size, Mm(x), Mm(baseline), font);
    }

    fn centered(&mut self, text: &str, size: f32) {
        let line_height = line_height(size);
        for line in wrap(text, chars_per_line(CONTENT_WIDTH, size)) {
            self.reserve(line_height);
            let x = MARGIN + ((CONTENT_WIDTH - text_width(&line, size)) / 2.0).max(0.0);
            self.write(&line, size, x, self.cursor - size * MM_PER_PT, true);
            self.cursor -= line_height;
        }
    }

    fn paragraph(&mut self, lead: Option<&str>, lines: &[String]) {
        let size = BODY_SIZE;
        let line_height = line_height(size);
        let limit = chars_per_line(CONTENT_WIDTH, size);

        for (index, line) in lines.iter().enumerate() {
            let (lead, text) = match lead {
                Some(lead) if index == 0 => (Some(lead), format!("{lead} {line}")),
                _ => (None, line.clone()),
            };
            for (row, wrapped) in wrap(&text, limit).into_iter().enumerate() {
                self.reserve(line_height);
                let baseline = self.cursor - size * MM_PER_PT;
                let split = match lead {
                    Some(lead) if row == 0 => wrapped.strip_prefix(lead).map(|rest| (lead, rest)),
                    _ => None,
                };
                match split {
                    Some((lead, rest)) => {
                        self.write(lead, size, MARGIN, baseline, true);
                        self.write(rest, size, MARGIN + text_width(lead, size), baseline, false);
                    }
                    None => self.write(&wrapped, size, MARGIN, baseline, false),
                }
                self.cursor -= line_height;
            }
        }
    }

    fn table(&mut self, table: &Table) {
        let widths: Vec<f32> = table.widths.iter().map(|w| w * MM_PER_INCH).collect();
        let header = self.measure_row(table, &table.header);
        self.reserve(header.height);
        self.draw_row(table, &widths, &header, true);

        for row in &table.rows {
            let measured = self.measure_row(table, row);
            if self.cursor - measured.height < BOTTOM {
                self.new_page();
                self.draw_row(table, &widths, &header, true);
            }
            self.draw_row(table, &widths, &measured, false);
        }
    }

    fn measure_row(&self, table: &Table, cells: &[String]) -> MeasuredRow {
        let lines: Vec<Vec<String>> = cells
            .iter()
            .zip(&table.widths)
            .map(|(cell, width)| {
                let inner = width * MM_PER_INCH - 2.0 * CELL_PADDING;
                wrap(cell, chars_per_line(inner, table.font_size))
            })
            .collect();
        let tallest = lines.iter().map(Vec::len).max().unwrap_or(1).max(1);
        MeasuredRow {
            height: tallest as f32 * line_height(table.font_size) + 2.0 * CELL_PADDING,
            lines,
        }
    }

    fn draw_row(&mut self, table: &Table, widths: &[f32], row: &MeasuredRow, bold: bool) {
        let top = self.cursor;
        let bottom = top - row.height;
        let size = table.font_size;
        let mut x = MARGIN;

        self.layer.set_outline_thickness(0.5);
        for (width, lines) in widths.iter().zip(&row.lines) {
            self.layer.add_line(rectangle(x, bottom, *width, row.height));
            for (index, line) in lines.iter().enumerate() {
                let baseline =
                    top - CELL_PADDING - size * MM_PER_PT - index as f32 * line_height(size);
                let offset = match table.align {
                    Align::Left => CELL_PADDING,
                    Align::Center => ((width - text_width(line, size)) / 2.0).max(CELL_PADDING),
                };
                self.write(line, size, x + offset, baseline, bold);
            }
            x += width;
        }
        self.cursor = bottom;
    }

    fn signatures(&mut self, labels: &[String]) {
        let size = BODY_SIZE;
        let row_height = line_height(size) + 2.0 * 8.0 * MM_PER_PT;
        self.layer.set_outline_thickness(0.5);

        for label in labels {
            self.reserve(row_height);
            let baseline = self.cursor - row_height / 2.0 - size * MM_PER_PT / 3.0;
            self.write(label, size, MARGIN, baseline, false);

            let start = MARGIN + SIGNATURE_LABEL_WIDTH;
            self.layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(start), Mm(baseline)), false),
                    (Point::new(Mm(start + SIGNATURE_LINE_WIDTH), Mm(baseline)), false),
                ],
                is_closed: false,
            });
            self.cursor -= row_height;
        }
    }
}

struct MeasuredRow {
    height: f32,
    lines: Vec<Vec<String>>,
}

fn rectangle(x: f32, y: f32, width: f32, height: f32) -> Line {
    Line {
        points: vec![
            (Point::new(Mm(x), Mm(y)), false),
            (Point::new(Mm(x + width), Mm(y)), false),
            (Point::new(Mm(x + width), Mm(y + height)), false),
            (Point::new(Mm(x), Mm(y + height)), false),
        ],
        is_closed: true,
    }
}

fn line_height(size: f32) -> f32 {
    size * 1.25 * MM_PER_PT
}

/// Helvetica averages a little over half an em per character.
fn char_width(size: f32) -> f32 {
    size * 0.52 * MM_PER_PT
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * char_width(size)
}

fn chars_per_line(width: f32, size: f32) -> usize {
    ((width / char_width(size)).floor() as usize).max(1)
}

/// Greedy word wrap; words longer than a line are split.
fn wrap(text: &str, limit: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > limit {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..limit).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() { 0 } else { current.chars().count() + 1 };
        if needed + word.chars().count() > limit {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// The built-in fonts only cover a single-byte encoding.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}
