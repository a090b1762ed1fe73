//! Multi-page PDF report embedding the rendered charts, one per page with a title.

use std::path::Path;

use anyhow::{anyhow, Context};
use genpdf::elements;
use genpdf::style::Style;
use genpdf::{Alignment, Document, Element, SimplePageDecorator, Size};
use log::info;

use crate::charts::RenderedChart;
use crate::config::ReportConfig;
use crate::error::EurolensError;

/// Loads the configured font family. The directory must hold `<family>-Regular.ttf`,
/// `<family>-Bold.ttf`, `<family>-Italic.ttf` and `<family>-BoldItalic.ttf`.
fn load_fonts(config: &ReportConfig) -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>, EurolensError> {
    if !config.font_dir.is_dir() {
        return Err(anyhow!(
            "Font directory {} does not exist; place the '{}' TTF files there or point \
             report.font_dir at a directory that has them",
            config.font_dir.display(),
            config.font_family
        )
        .into());
    }
    Ok(
        genpdf::fonts::from_files(&config.font_dir, &config.font_family, None).map_err(|e| {
            anyhow!(
                "Failed to load font family '{}' from {}: {e}",
                config.font_family,
                config.font_dir.display()
            )
        })?,
    )
}

/// Assembles the report: A4 landscape, one chart per page with a centered title.
pub fn build(
    charts: &[RenderedChart],
    config: &ReportConfig,
    output: &Path,
) -> Result<(), EurolensError> {
    if charts.is_empty() {
        return Err(anyhow!("No rendered charts to include in the report").into());
    }

    let fonts = load_fonts(config)?;
    let mut document = Document::new(fonts);
    document.set_title(&config.title);
    // A4 landscape.
    document.set_paper_size(Size::new(297, 210));
    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(15);
    document.set_page_decorator(decorator);

    for (page, chart) in charts.iter().enumerate() {
        if page > 0 {
            document.push(elements::PageBreak::new());
        }
        document.push(
            elements::Paragraph::new(chart.title.as_str())
                .aligned(Alignment::Center)
                .styled(Style::new().bold().with_font_size(16)),
        );
        document.push(elements::Break::new(1));
        let image = elements::Image::from_path(&chart.path)
            .with_context(|| format!("Failed to read chart image {}", chart.path.display()))?
            .with_alignment(Alignment::Center);
        document.push(image);
    }

    document
        .render_to_file(output)
        .map_err(|e| anyhow!("Failed to write report to {}: {e}", output.display()))?;
    info!("Report with {} page(s) written to {}", charts.len(), output.display());
    Ok(())
}
