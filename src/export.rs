//! Transcript export to PDF.
//!
//! Pages are A4 with the standard Helvetica font, which only covers ASCII
//! here, so all text goes through [`sanitize`] first. Each turn renders as
//! `User: ...` then `Agent: ...`, word-wrapped, followed by a blank line.

use chrono::Local;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::AssistError;
use crate::models::{Role, Turn};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 11;
const LEADING: i64 = 14;
/// Helvetica averages about half an em per glyph.
const LINE_CHARS: usize = ((PAGE_WIDTH - 2 * MARGIN) * 2 / FONT_SIZE) as usize;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

const REPLACEMENTS: &[(char, &str)] = &[
    ('œ', "oe"),
    ('Œ', "Oe"),
    ('–', "-"),
    ('—', "-"),
    ('“', "\""),
    ('”', "\""),
    ('‘', "'"),
    ('’', "'"),
    ('•', "-"),
    ('…', "..."),
    ('€', "EUR"),
];

/// Reduce text to printable ASCII: replacement table, then accent folding,
/// then any other non-ASCII character is dropped.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if let Some((_, rep)) = REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            out.push_str(rep);
        } else if c == '\t' {
            out.push(' ');
        } else if c == '\n' || (c.is_ascii() && !c.is_ascii_control()) {
            out.push(c);
        } else if let Some(base) = fold_accent(c) {
            out.push(base);
        }
    }
    out
}

fn fold_accent(c: char) -> Option<char> {
    let base = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'ç' => 'c',
        'Ç' => 'C',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => 'O',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' | 'Ÿ' => 'Y',
        _ => return None,
    };
    Some(base)
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word;
            while word.len() > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let (head, tail) = word.split_at(width);
                lines.push(head.to_string());
                word = tail;
            }
            if !line.is_empty() && line.len() + 1 + word.len() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines
}

fn transcript_lines(turns: &[Turn]) -> Vec<String> {
    let mut lines = Vec::new();
    for turn in turns {
        for (role, text) in [(Role::User, &turn.question), (Role::Assistant, &turn.answer)] {
            let labeled = format!("{}: {}", role.display_label(), sanitize(text));
            lines.extend(wrap(&labeled, LINE_CHARS));
        }
        lines.push(String::new());
    }
    lines
}

/// Render the transcript as PDF bytes.
pub fn render_pdf(turns: &[Turn]) -> Result<Vec<u8>, AssistError> {
    let lines = transcript_lines(turns);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let empty: [String; 0] = [];
    let mut page_chunks: Vec<&[String]> = lines.chunks(LINES_PER_PAGE).collect();
    if page_chunks.is_empty() {
        page_chunks.push(&empty);
    }

    let mut kids: Vec<Object> = Vec::with_capacity(page_chunks.len());
    for page_lines in page_chunks {
        let page_id = add_page(&mut doc, pages_id, page_lines)?;
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AssistError::ExportFailed(e.to_string()))?;
    Ok(bytes)
}

fn add_page(doc: &mut Document, pages_id: ObjectId, lines: &[String]) -> Result<ObjectId, AssistError> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let encoded = content
        .encode()
        .map_err(|e| AssistError::ExportFailed(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    }))
}

/// Write `session_YYYY-MM-DD_HH-MM-SS.pdf` into `dir`, creating it if needed.
/// An existing export is never replaced: later exports in the same second
/// get a `_N` suffix.
pub fn export_to_file(turns: &[Turn], dir: &Path) -> Result<PathBuf, AssistError> {
    let bytes = render_pdf(turns)?;
    std::fs::create_dir_all(dir).map_err(|e| AssistError::ExportFailed(e.to_string()))?;

    let base = format!("session_{}", Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let mut n = 1;
    let (path, mut file) = loop {
        let name = if n == 1 {
            format!("{}.pdf", base)
        } else {
            format!("{}_{}.pdf", base, n)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => break (path, file),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
            Err(err) => return Err(AssistError::ExportFailed(err.to_string())),
        }
    };
    file.write_all(&bytes)
        .map_err(|e| AssistError::ExportFailed(e.to_string()))?;
    tracing::info!(path = %path.display(), turns = turns.len(), "transcript exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn page_text(bytes: &[u8]) -> (usize, Vec<String>) {
        let doc = Document::load_mem(bytes).unwrap();
        let pages = doc.get_pages();
        let mut shown = Vec::new();
        for page_id in pages.values() {
            let content = Content::decode(&doc.get_page_content(*page_id).unwrap()).unwrap();
            for op in content.operations {
                if op.operator == "Tj" {
                    if let Some(Object::String(raw, _)) = op.operands.first() {
                        shown.push(String::from_utf8_lossy(raw).to_string());
                    }
                }
            }
        }
        (pages.len(), shown)
    }

    #[test]
    fn test_sanitize_table_and_accents() {
        assert_eq!(sanitize("cœur – “ok” … 5€"), "coeur - \"ok\" ... 5EUR");
        assert_eq!(sanitize("fièvre élevée, Ça va"), "fievre elevee, Ca va");
        assert_eq!(sanitize("dose 💊 ok"), "dose  ok");
        assert!(sanitize("日本 ß").is_ascii());
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap(&"word ".repeat(50), 20);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.len() <= 20));
        let long = wrap(&"x".repeat(45), 20);
        assert_eq!(long, vec!["x".repeat(20), "x".repeat(20), "x".repeat(5)]);
    }

    #[test]
    fn test_render_labels_turns() {
        let turns = vec![Turn::new("Quels symptômes ?", "Fièvre — toux.")];
        let (pages, shown) = page_text(&render_pdf(&turns).unwrap());
        assert_eq!(pages, 1);
        assert_eq!(shown[0], "User: Quels symptomes ?");
        assert_eq!(shown[1], "Agent: Fievre - toux.");
        assert_eq!(shown[2], "");
    }

    #[test]
    fn test_long_transcript_paginates() {
        let turns: Vec<Turn> = (0..60)
            .map(|i| Turn::new(format!("question {}", i), format!("answer {}", i)))
            .collect();
        let (pages, shown) = page_text(&render_pdf(&turns).unwrap());
        assert_eq!(shown.len(), 180);
        assert_eq!(pages, 180usize.div_ceil(LINES_PER_PAGE));
    }

    #[test]
    fn test_empty_transcript_is_single_page() {
        let (pages, shown) = page_text(&render_pdf(&[]).unwrap());
        assert_eq!(pages, 1);
        assert!(shown.is_empty());
    }

    #[test]
    fn test_export_to_file_names_and_writes() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("exports");
        let path = export_to_file(&[Turn::new("q", "a")], &dir).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("session_") && name.ends_with(".pdf"));
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_back_to_back_exports_keep_both_files() {
        let tmp = TempDir::new().unwrap();
        let first = export_to_file(&[Turn::new("q1", "a1")], tmp.path()).unwrap();
        let second = export_to_file(&[Turn::new("q2", "a2")], tmp.path()).unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 2);

        let (_, lines) = page_text(&std::fs::read(&first).unwrap());
        assert!(lines.contains(&"User: q1".to_string()));
    }

    #[test]
    fn test_export_to_unwritable_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, "x").unwrap();
        let err = export_to_file(&[], &file).unwrap_err();
        assert!(matches!(err, AssistError::ExportFailed(_)));
    }
}
