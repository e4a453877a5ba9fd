use crate::{
    errors::ServiceError,
    models::Chamber,
    services::range_query::{RangeResult, ResampledRow},
};
use printpdf::path::PaintMode;
use printpdf::{BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect, Rgb};
use std::ops::Range;

pub const CSV_HEADERS: [&str; 6] = [
    "Date",
    "Time",
    "Temperature (°C)",
    "Temperature1 (°C)",
    "Humidity (%)",
    "Humidity1 (%)",
];

// Builtin PDF fonts only cover ASCII reliably.
const PDF_HEADERS: [&str; 6] = [
    "Date",
    "Time",
    "Temperature (deg C)",
    "Temperature1 (deg C)",
    "Humidity (%)",
    "Humidity1 (%)",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// A4 landscape, millimetres.
const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 8.0;
const ROW_HEIGHT: f32 = 6.0;
const TITLE_HEIGHT: f32 = 12.0;

pub fn format_value(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

fn cells(row: &ResampledRow) -> [String; 6] {
    [
        row.date.clone(),
        row.time.clone(),
        format_value(row.temperature),
        format_value(row.pressure),
        format_value(row.humidity),
        format_value(row.co2),
    ]
}

/// `Chamber_<ch>_<start date>_<end date>_<every>.<ext>`
pub fn export_filename(result: &RangeResult, every: &str, ext: &str) -> String {
    let (start, end) = match &result.window {
        Some(w) => (
            w.start_local.date().to_string(),
            w.end_local.date().to_string(),
        ),
        None => ("all".to_string(), "all".to_string()),
    };
    format!("Chamber_{}_{}_{}_{}.{}", result.chamber, start, end, every, ext)
}

pub fn render_csv(rows: &[ResampledRow]) -> Result<Vec<u8>, ServiceError> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());

    writer
        .write_record(CSV_HEADERS)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    for row in rows {
        writer
            .write_record(cells(row))
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

/// Row index ranges per page. The first page also carries the title.
pub fn paginate(total: usize, first_page: usize, per_page: usize) -> Vec<Range<usize>> {
    let mut pages = Vec::new();
    let mut start = 0;
    let mut capacity = first_page.max(1);
    loop {
        let end = (start + capacity).min(total);
        pages.push(start..end);
        if end >= total {
            break;
        }
        start = end;
        capacity = per_page.max(1);
    }
    pages
}

fn rgb(hex: u32) -> Color {
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    Color::Rgb(Rgb::new(channel(16), channel(8), channel(0), None))
}

struct TableLayout {
    column_width: f32,
}

impl TableLayout {
    fn new() -> Self {
        Self {
            column_width: (PAGE_WIDTH - 2.0 * MARGIN) / PDF_HEADERS.len() as f32,
        }
    }

    fn draw_row(
        &self,
        layer: &PdfLayerReference,
        top: f32,
        values: &[String],
        background: Option<u32>,
        font: &IndirectFontRef,
        font_size: f32,
    ) {
        let bottom = top - ROW_HEIGHT;
        let right = PAGE_WIDTH - MARGIN;

        if let Some(color) = background {
            layer.set_fill_color(rgb(color));
            layer.add_rect(
                Rect::new(Mm(MARGIN), Mm(bottom), Mm(right), Mm(top)).with_mode(PaintMode::Fill),
            );
        }

        layer.set_outline_color(rgb(0x111111));
        layer.set_outline_thickness(0.5);
        layer.set_fill_color(rgb(0x111827));
        for (i, value) in values.iter().enumerate() {
            let left = MARGIN + i as f32 * self.column_width;
            layer.add_rect(
                Rect::new(Mm(left), Mm(bottom), Mm(left + self.column_width), Mm(top))
                    .with_mode(PaintMode::Stroke),
            );
            layer.use_text(value.as_str(), font_size, Mm(left + 2.0), Mm(bottom + 1.8), font);
        }
    }
}

/// Landscape table with a title, shaded header band repeated on every page
/// and alternating row shading.
pub fn render_pdf(
    chamber: Chamber,
    every: &str,
    rows: &[ResampledRow],
) -> Result<Vec<u8>, ServiceError> {
    let title = format!(
        "Chamber {} - Sensor Data (every {})",
        chamber.as_str().to_uppercase(),
        every
    );
    let (doc, first_page, first_layer) =
        PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Table");

    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ServiceError::Internal(format!("{:?}", e)))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ServiceError::Internal(format!("{:?}", e)))?;

    let usable = PAGE_HEIGHT - 2.0 * MARGIN - ROW_HEIGHT;
    let per_page = (usable / ROW_HEIGHT) as usize;
    let first_page_rows = ((usable - TITLE_HEIGHT) / ROW_HEIGHT) as usize;

    let headers: Vec<String> = PDF_HEADERS.iter().map(|h| h.to_string()).collect();
    let layout = TableLayout::new();

    for (page_no, range) in paginate(rows.len(), first_page_rows, per_page)
        .into_iter()
        .enumerate()
    {
        let layer = if page_no == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Table");
            doc.get_page(page).get_layer(layer)
        };

        let mut top = PAGE_HEIGHT - MARGIN;
        if page_no == 0 {
            layer.set_fill_color(rgb(0x111827));
            layer.use_text(title.as_str(), 14.0, Mm(MARGIN), Mm(top - 8.0), &bold);
            top -= TITLE_HEIGHT;
        }

        layout.draw_row(&layer, top, &headers, Some(0xf1f5f9), &bold, 10.0);
        top -= ROW_HEIGHT;

        for (offset, row) in rows[range].iter().enumerate() {
            let shade = if offset % 2 == 1 { Some(0xf7fafc) } else { None };
            layout.draw_row(&layer, top, &cells(row), shade, &font, 9.0);
            top -= ROW_HEIGHT;
        }
    }

    doc.save_to_bytes()
        .map_err(|e| ServiceError::Internal(format!("{:?}", e)))
}
