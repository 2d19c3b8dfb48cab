//! Plain-text extraction from Office Open XML packages (docx, xlsx, pptx).
//!
//! Each format is a zip archive of XML parts. Only the parts needed for text
//! are read; styling, images and formulas are ignored.

use anyhow::{anyhow, Context};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};
use zip::ZipArchive;

/// Guard against zip bombs: no single XML part may inflate past this.
const MAX_PART_SIZE: u64 = 64 * 1024 * 1024;

struct Package<R: Read + Seek> {
    zip: ZipArchive<R>,
}

impl<R: Read + Seek> Package<R> {
    fn open(reader: R) -> anyhow::Result<Self> {
        let zip = ZipArchive::new(reader).context("not a valid Office Open XML package")?;
        Ok(Self { zip })
    }

    fn has_part(&self, name: &str) -> bool {
        self.zip.index_for_name(name).is_some()
    }

    fn read_part(&mut self, name: &str) -> anyhow::Result<String> {
        let mut file = self
            .zip
            .by_name(name)
            .with_context(|| format!("missing package part: {name}"))?;
        if file.size() > MAX_PART_SIZE {
            return Err(anyhow!("package part {name} is too large ({} bytes)", file.size()));
        }
        let mut out = String::with_capacity(file.size() as usize);
        file.read_to_string(&mut out)
            .with_context(|| format!("package part {name} is not UTF-8 XML"))?;
        Ok(out)
    }

    /// Parts named `{dir}/{stem}{N}.xml`, ordered by N.
    fn numbered_parts(&self, dir: &str, stem: &str) -> Vec<String> {
        let prefix = format!("{dir}/{stem}");
        let mut found: BTreeMap<u32, String> = BTreeMap::new();
        for name in self.zip.file_names() {
            let Some(n) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".xml"))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            found.insert(n, name.to_string());
        }
        found.into_values().collect()
    }

    /// Resolve the targets of `rel_ids` through the relationships part of `part`.
    ///
    /// Returns `None` when the relationships part is missing or any id is
    /// unresolved, so callers can fall back to part numbering.
    fn resolve_targets(&mut self, part: &str, rel_ids: &[String]) -> Option<Vec<String>> {
        let (dir, file) = part.rsplit_once('/')?;
        let rels_name = format!("{dir}/_rels/{file}.rels");
        if !self.has_part(&rels_name) {
            return None;
        }
        let rels = parse_relationships(&self.read_part(&rels_name).ok()?).ok()?;
        rel_ids
            .iter()
            .map(|id| rels.get(id).map(|target| join_part_path(dir, target)))
            .collect()
    }
}

fn join_part_path(dir: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut segs: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "." | "" => {}
            ".." => {
                segs.pop();
            }
            s => segs.push(s),
        }
    }
    segs.join("/")
}

fn local_name(e: &BytesStart<'_>) -> Vec<u8> {
    e.local_name().as_ref().to_vec()
}

fn parent_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.last().is_some_and(|n| n.as_slice() == name)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> anyhow::Result<Option<String>> {
    for a in e.attributes() {
        let a = a.context("malformed XML attribute")?;
        if a.key.as_ref() == key {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_relationships(xml: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id")?, attr(&e, b"Target")?) {
                    out.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Relationship ids of the elements named `element` (e.g. `sheet`, `sldId`), in document order.
fn ordered_rel_ids(xml: &str, element: &[u8]) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == element => {
                // The `r:id` attribute; prefixes vary, the local name does not.
                for a in e.attributes() {
                    let a = a.context("malformed XML attribute")?;
                    if a.key.local_name().as_ref() == b"id" && a.key.prefix().is_some() {
                        out.push(a.unescape_value()?.into_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------- docx

/// Body paragraphs joined with `\n`. Paragraphs inside tables are skipped.
pub fn docx_text<R: Read + Seek>(reader: R) -> anyhow::Result<String> {
    let mut pkg = Package::open(reader)?;
    let xml = pkg.read_part("word/document.xml")?;
    docx_paragraphs(&xml).map(|p| p.join("\n"))
}

fn docx_paragraphs(xml: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_slice() {
                    b"p" if parent_is(&stack, b"body") => {
                        current = Some(String::new());
                    }
                    b"t" => in_text = true,
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if let Some(text) = current.as_mut() {
                    // Only run content counts; pPr/tabs/tab is a tab stop.
                    if parent_is(&stack, b"r") {
                        match name.as_slice() {
                            b"tab" => text.push('\t'),
                            b"br" | b"cr" => text.push('\n'),
                            _ => {}
                        }
                    }
                } else if name.as_slice() == b"p" && parent_is(&stack, b"body") {
                    paragraphs.push(String::new());
                }
            }
            Event::Text(t) if in_text => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) if in_text => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => {
                let name = e.local_name().as_ref().to_vec();
                stack.pop();
                match name.as_slice() {
                    b"t" => in_text = false,
                    b"p" if parent_is(&stack, b"body") => {
                        if let Some(text) = current.take() {
                            paragraphs.push(text);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

// ---------------------------------------------------------------- xlsx

/// Every sheet, every row from 1 to the last used row, cells from column A
/// to the last used column, tab separated, one line per row.
pub fn xlsx_text<R: Read + Seek>(reader: R) -> anyhow::Result<String> {
    let mut pkg = Package::open(reader)?;

    let shared = if pkg.has_part("xl/sharedStrings.xml") {
        parse_shared_strings(&pkg.read_part("xl/sharedStrings.xml")?)?
    } else {
        Vec::new()
    };

    let sheets = sheet_parts(&mut pkg)?;
    let mut out = String::new();
    for part in sheets {
        let xml = pkg.read_part(&part)?;
        let grid = parse_sheet(&xml, &shared).with_context(|| format!("failed to read {part}"))?;
        render_grid(&grid, &mut out);
    }
    Ok(out)
}

fn sheet_parts<R: Read + Seek>(pkg: &mut Package<R>) -> anyhow::Result<Vec<String>> {
    if pkg.has_part("xl/workbook.xml") {
        let ids = ordered_rel_ids(&pkg.read_part("xl/workbook.xml")?, b"sheet")?;
        if let Some(parts) = pkg.resolve_targets("xl/workbook.xml", &ids) {
            return Ok(parts);
        }
    }
    Ok(pkg.numbered_parts("xl/worksheets", "sheet"))
}

fn parse_shared_strings(xml: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    // Phonetic runs repeat the text in another script; they are not content.
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => out.push(String::new()),
            Event::Text(t) if in_text && !in_phonetic => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => out.push(current.take().unwrap_or_default()),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

#[derive(Debug, Default)]
struct Cell {
    kind: Option<String>,
    value: String,
    inline: String,
}

/// 0-based (row, column) from an A1-style reference.
fn cell_position(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

type Grid = BTreeMap<usize, BTreeMap<usize, String>>;

fn parse_sheet(xml: &str, shared: &[String]) -> anyhow::Result<Grid> {
    let mut reader = Reader::from_str(xml);
    let mut grid = Grid::new();
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut row_idx = 0usize;
    let mut cell: Option<(usize, usize, Cell)> = None;
    let mut text_target: Option<&'static str> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                row_idx = match attr(&e, b"r")?.and_then(|r| r.parse::<usize>().ok()) {
                    Some(r) if r > 0 => r - 1,
                    _ => next_row,
                };
                next_row = row_idx + 1;
                next_col = 0;
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let (r, c) = attr(&e, b"r")?
                    .as_deref()
                    .and_then(cell_position)
                    .unwrap_or((row_idx, next_col));
                next_col = c + 1;
                let kind = attr(&e, b"t")?;
                cell = Some((r, c, Cell { kind, ..Cell::default() }));
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                // Styled but empty cell; it still counts towards the sheet width.
                let (r, c) = attr(&e, b"r")?
                    .as_deref()
                    .and_then(cell_position)
                    .unwrap_or((row_idx, next_col));
                next_col = c + 1;
                grid.entry(r).or_default().entry(c).or_default();
            }
            Event::Start(e) => match e.local_name().as_ref() {
                b"v" => text_target = Some("v"),
                b"t" => text_target = Some("t"),
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(target), Some((_, _, c))) = (text_target, cell.as_mut()) {
                    let s = t.unescape()?;
                    match target {
                        "v" => c.value.push_str(&s),
                        _ => c.inline.push_str(&s),
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => text_target = None,
                b"c" => {
                    if let Some((r, c, data)) = cell.take() {
                        grid.entry(r).or_default().insert(c, cell_text(&data, shared));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(grid)
}

/// Display text of a cell. Falsy values (empty, zero, FALSE) render empty.
fn cell_text(cell: &Cell, shared: &[String]) -> String {
    match cell.kind.as_deref() {
        Some("s") => cell
            .value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        Some("inlineStr") => cell.inline.clone(),
        Some("b") => match cell.value.trim() {
            "1" => "True".to_string(),
            _ => String::new(),
        },
        Some("str") | Some("e") => cell.value.clone(),
        _ => number_text(cell.value.trim()),
    }
}

/// Integer literals print as integers; anything written with a fraction or
/// exponent stays a float (`1.0` prints as `1.0`). Zero renders empty.
fn number_text(v: &str) -> String {
    let Ok(n) = v.parse::<f64>() else {
        return v.to_string();
    };
    if n == 0.0 {
        return String::new();
    }
    if !v.contains(['.', 'e', 'E']) {
        if let Ok(i) = v.parse::<i64>() {
            return i.to_string();
        }
    }
    if n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

fn render_grid(grid: &Grid, out: &mut String) {
    let Some(max_row) = grid.keys().next_back().copied() else {
        return;
    };
    let Some(max_col) = grid.values().filter_map(|r| r.keys().next_back().copied()).max() else {
        return;
    };
    let empty = BTreeMap::new();
    for r in 0..=max_row {
        let row = grid.get(&r).unwrap_or(&empty);
        let cells: Vec<&str> = (0..=max_col)
            .map(|c| row.get(&c).map(String::as_str).unwrap_or(""))
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
}

// ---------------------------------------------------------------- pptx

/// For every slide in order, the text of each top-level shape followed by `\n`.
pub fn pptx_text<R: Read + Seek>(reader: R) -> anyhow::Result<String> {
    let mut pkg = Package::open(reader)?;
    let slides = slide_parts(&mut pkg)?;
    let mut out = String::new();
    for part in slides {
        let xml = pkg.read_part(&part)?;
        for shape in slide_shape_texts(&xml).with_context(|| format!("failed to read {part}"))? {
            out.push_str(&shape);
            out.push('\n');
        }
    }
    Ok(out)
}

fn slide_parts<R: Read + Seek>(pkg: &mut Package<R>) -> anyhow::Result<Vec<String>> {
    if pkg.has_part("ppt/presentation.xml") {
        let ids = ordered_rel_ids(&pkg.read_part("ppt/presentation.xml")?, b"sldId")?;
        if let Some(parts) = pkg.resolve_targets("ppt/presentation.xml", &ids) {
            return Ok(parts);
        }
    }
    Ok(pkg.numbered_parts("ppt/slides", "slide"))
}

/// Text of each `p:sp` directly under the slide's shape tree.
/// Paragraphs of a shape are joined by `\n`, line breaks become `\u{b}`.
fn slide_shape_texts(xml: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut shapes = Vec::new();
    // Paragraphs of the shape being read.
    let mut shape: Option<Vec<String>> = None;
    let mut shape_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name.as_slice() == b"sp" && parent_is(&stack, b"spTree") {
                    shape = Some(Vec::new());
                    shape_depth = stack.len();
                }
                if let Some(paras) = shape.as_mut() {
                    match name.as_slice() {
                        b"p" => paras.push(String::new()),
                        b"t" => in_text = true,
                        _ => {}
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if let Some(paras) = shape.as_mut() {
                    match name.as_slice() {
                        b"p" => paras.push(String::new()),
                        b"br" => {
                            if let Some(p) = paras.last_mut() {
                                p.push('\u{b}');
                            }
                        }
                        _ => {}
                    }
                } else if name.as_slice() == b"sp" && parent_is(&stack, b"spTree") {
                    shapes.push(String::new());
                }
            }
            Event::Text(t) if in_text => {
                if let Some(p) = shape.as_mut().and_then(|paras| paras.last_mut()) {
                    p.push_str(&t.unescape()?);
                }
            }
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                if name.as_slice() == b"t" {
                    in_text = false;
                }
                if name.as_slice() == b"sp" && stack.len() == shape_depth {
                    if let Some(paras) = shape.take() {
                        shapes.push(paras.join("\n"));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(shapes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    /// Build an in-memory package from `(part name, contents)` pairs.
    pub(crate) fn package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

    pub(crate) fn xlsx_fixture() -> Vec<u8> {
        package(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            (
                "xl/sharedStrings.xml",
                r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>a</t></si><si><t>b</t></si><si><r><t>c</t></r></si></sst>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
<row r="2"><c r="A2" t="s"><v>2</v></c></row>
</sheetData></worksheet>"#,
            ),
        ])
    }

    #[test]
    fn xlsx_rows_are_tab_joined_with_empty_trailing_cells() {
        let text = xlsx_text(Cursor::new(xlsx_fixture())).unwrap();
        assert_eq!(text, "a\tb\nc\t\n");
    }

    #[test]
    fn xlsx_renders_numbers_booleans_inline_strings_and_gaps() {
        let bytes = package(&[(
            "xl/worksheets/sheet1.xml",
            r#"<worksheet><sheetData>
<row r="2"><c r="A2"><v>42</v></c><c r="C2"><v>1.5</v></c></row>
<row r="3"><c r="A3" t="b"><v>1</v></c><c r="B3" t="b"><v>0</v></c><c r="C3"><v>0</v></c></row>
<row r="4"><c r="B4" t="inlineStr"><is><t>x &amp; y</t></is></c></row>
</sheetData></worksheet>"#,
        )]);
        let text = xlsx_text(Cursor::new(bytes)).unwrap();
        assert_eq!(text, "\t\t\n42\t\t1.5\nTrue\t\t\n\tx & y\t\n");
    }

    #[test]
    fn xlsx_without_workbook_falls_back_to_sheet_numbering() {
        let sheet = |v: &str| {
            format!(r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>{v}</t></is></c></row></sheetData></worksheet>"#)
        };
        let (s2, s10) = (sheet("second"), sheet("tenth"));
        let bytes = package(&[
            ("xl/worksheets/sheet10.xml", s10.as_str()),
            ("xl/worksheets/sheet2.xml", s2.as_str()),
        ]);
        assert_eq!(xlsx_text(Cursor::new(bytes)).unwrap(), "second\ntenth\n");
    }

    #[test]
    fn float_literals_keep_their_fraction() {
        assert_eq!(number_text("42"), "42");
        assert_eq!(number_text("1.0"), "1.0");
        assert_eq!(number_text("2E3"), "2000.0");
        assert_eq!(number_text("1.5"), "1.5");
        assert_eq!(number_text("0.0"), "");
        assert_eq!(number_text("n/a"), "n/a");
    }

    #[test]
    fn cell_references_map_to_zero_based_positions() {
        assert_eq!(cell_position("A1"), Some((0, 0)));
        assert_eq!(cell_position("AB12"), Some((11, 27)));
        assert_eq!(cell_position("12"), None);
        assert_eq!(cell_position("A0"), None);
    }

    pub(crate) fn docx_fixture() -> Vec<u8> {
        package(&[(
            "word/document.xml",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Xin </w:t></w:r><w:r><w:t xml:space="preserve">chào</w:t></w:r></w:p>
<w:p/>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>in table</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>
</w:body></w:document>"#,
        )])
    }

    #[test]
    fn docx_joins_body_paragraphs() {
        let text = docx_text(Cursor::new(docx_fixture())).unwrap();
        assert_eq!(text, "Xin chào\n\na\tb\nc");
    }

    #[test]
    fn docx_ignores_tab_stop_definitions() {
        let bytes = package(&[(
            "word/document.xml",
            r#"<w:document xmlns:w="w"><w:body>
<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Title</w:t></w:r></w:p>
<w:p><w:pPr><w:tabs><w:tab w:val="right" w:pos="9000"/></w:tabs></w:pPr><w:r><w:t>Intro</w:t><w:tab/><w:t>1</w:t></w:r></w:p>
</w:body></w:document>"#,
        )]);
        let text = docx_text(Cursor::new(bytes)).unwrap();
        assert_eq!(text, "Title\nIntro\t1");
    }

    #[test]
    fn pptx_collects_top_level_shape_text_per_slide() {
        let pres = r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="257" r:id="rId3"/><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#;
        let rels = r#"<Relationships><Relationship Id="rId2" Target="slides/slide1.xml"/><Relationship Id="rId3" Target="/ppt/slides/slide2.xml"/></Relationships>"#;
        let slide1 = r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree>
<p:sp><p:txBody><a:p><a:r><a:t>Title</a:t></a:r></a:p></p:txBody></p:sp>
<p:grpSp><p:sp><p:txBody><a:p><a:r><a:t>grouped</a:t></a:r></a:p></p:txBody></p:sp></p:grpSp>
<p:sp><p:txBody><a:p><a:r><a:t>one</a:t></a:r><a:br/><a:r><a:t>two</a:t></a:r></a:p><a:p><a:r><a:t>three</a:t></a:r></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:sld>"#;
        let slide2 = r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree>
<p:sp><p:txBody><a:p><a:r><a:t>first slide</a:t></a:r></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:sld>"#;
        let bytes = package(&[
            ("ppt/presentation.xml", pres),
            ("ppt/_rels/presentation.xml.rels", rels),
            ("ppt/slides/slide1.xml", slide1),
            ("ppt/slides/slide2.xml", slide2),
        ]);
        let text = pptx_text(Cursor::new(bytes)).unwrap();
        assert_eq!(text, "first slide\nTitle\none\u{b}two\nthree\n");
    }

    #[test]
    fn relative_targets_resolve_against_part_directory() {
        assert_eq!(join_part_path("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(join_part_path("ppt/slides", "../media/x.png"), "ppt/media/x.png");
        assert_eq!(join_part_path("xl", "/xl/worksheets/s.xml"), "xl/worksheets/s.xml");
    }

    #[test]
    fn garbage_is_not_a_package() {
        assert!(docx_text(Cursor::new(b"not a zip".to_vec())).is_err());
    }
}
