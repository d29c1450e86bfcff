//! Document renderer. Turns formatted transcript text into `.docx` bytes.
//!
//! Layout: US Letter, 1" margins, Calibri 11pt body. Titles are centred Arial
//! 20pt, numbered teaching points use "Heading 1", lyrics are grey italics and
//! bold scripture references are blue.

pub mod markup;

use std::io::Cursor;

use docx_rs::{
    AlignmentType, Docx, PageMargin, Paragraph, Run, RunFonts, Style, StyleType,
};
use tracing::debug;

use crate::errors::AppError;
use crate::render::markup::{parse_blocks, Block, Emphasis, Span};

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const BODY_FONT: &str = "Calibri";
const TITLE_FONT: &str = "Arial";
// docx sizes are half-points
const BODY_SIZE: usize = 22;
const HEADING_SIZE: usize = 28;
const TITLE_SIZE: usize = 40;
const ONE_INCH_TWIPS: i32 = 1440;

const SCRIPTURE_COLOR: &str = "0563C1";
const MUTED_COLOR: &str = "595959";
const HEADING_STYLE: &str = "Heading1";
const DIVIDER: &str = "__________________________________________________";

/// Renders `formatted` into a Word document. `fallback_title` is used when the
/// text does not open with a title of its own.
pub fn render_transcript(formatted: &str, fallback_title: &str) -> Result<Vec<u8>, AppError> {
    let mut blocks = parse_blocks(formatted);

    let has_content = blocks
        .iter()
        .any(|b| !matches!(b, Block::Blank | Block::Divider));
    if !has_content {
        return Err(AppError::Render(
            "formatted transcript has no renderable content".to_string(),
        ));
    }

    if !blocks.iter().any(|b| matches!(b, Block::Title(_))) && !fallback_title.trim().is_empty() {
        blocks.insert(0, Block::Title(fallback_title.trim().to_string()));
    }

    debug!("Rendering {} blocks", blocks.len());

    let mut docx = base_document();
    for block in &blocks {
        docx = docx.add_paragraph(paragraph_for(block));
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| AppError::Render(format!("failed to package document: {e}")))?;

    Ok(buffer.into_inner())
}

fn base_document() -> Docx {
    let heading = Style::new(HEADING_STYLE, StyleType::Paragraph)
        .name("Heading 1")
        .size(HEADING_SIZE)
        .bold();

    Docx::new()
        .page_margin(
            PageMargin::new()
                .top(ONE_INCH_TWIPS)
                .bottom(ONE_INCH_TWIPS)
                .left(ONE_INCH_TWIPS)
                .right(ONE_INCH_TWIPS),
        )
        .default_fonts(body_fonts())
        .default_size(BODY_SIZE)
        .add_style(heading)
}

fn body_fonts() -> RunFonts {
    RunFonts::new().ascii(BODY_FONT).hi_ansi(BODY_FONT).cs(BODY_FONT)
}

fn paragraph_for(block: &Block) -> Paragraph {
    match block {
        Block::Blank => Paragraph::new(),
        Block::Divider => Paragraph::new()
            .align(AlignmentType::Center)
            .add_run(Run::new().add_text(DIVIDER).color(MUTED_COLOR)),
        Block::Title(title) => Paragraph::new().align(AlignmentType::Center).add_run(
            Run::new()
                .add_text(title)
                .bold()
                .size(TITLE_SIZE)
                .fonts(RunFonts::new().ascii(TITLE_FONT).hi_ansi(TITLE_FONT)),
        ),
        Block::SectionHeading(heading) => Paragraph::new()
            .style(HEADING_STYLE)
            .add_run(Run::new().add_text(heading).bold().size(HEADING_SIZE)),
        Block::Lyric { text, notes_only } => {
            if *notes_only {
                Paragraph::new()
                    .align(AlignmentType::Center)
                    .add_run(Run::new().add_text(text))
            } else {
                Paragraph::new()
                    .align(AlignmentType::Left)
                    .add_run(Run::new().add_text(text).italic().color(MUTED_COLOR))
            }
        }
        Block::Paragraph { speaker, spans } => {
            let mut paragraph = Paragraph::new();
            if let Some(speaker) = speaker {
                let label = if spans.is_empty() {
                    format!("{speaker}:")
                } else {
                    format!("{speaker}: ")
                };
                paragraph = paragraph.add_run(Run::new().add_text(label).bold());
            }
            spans
                .iter()
                .fold(paragraph, |p, span| p.add_run(run_for(span)))
        }
    }
}

fn run_for(span: &Span) -> Run {
    let run = Run::new().add_text(&span.text);
    match span.emphasis {
        Emphasis::Plain => run,
        Emphasis::Bold if span.is_scripture() => run.bold().color(SCRIPTURE_COLOR),
        Emphasis::Bold => run.bold(),
        Emphasis::Italic if span.is_long_quote() => run.italic().color(MUTED_COLOR),
        Emphasis::Italic => run.italic(),
    }
}

/// Human title from an upload filename stem: `sunday_service-notes` → `sunday service notes`.
pub fn title_from_stem(stem: &str) -> String {
    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
