use scraper::{ElementRef, Html, Selector};

/// One `<table>` from a season page, reduced to cell text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTable {
    /// Body rows in document order (header rows excluded).
    pub rows: Vec<Vec<String>>,
    /// Number of `<thead>` rows. More than one means a composite header.
    pub header_rows: usize,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows, header_rows: 0 }
    }

    pub fn with_header_rows(mut self, header_rows: usize) -> Self {
        self.header_rows = header_rows;
        self
    }

    pub fn has_composite_header(&self) -> bool {
        self.header_rows > 1
    }

    /// Cell `idx` of the first row, if any.
    pub fn first_row_cell(&self, idx: usize) -> Option<&str> {
        self.rows.first().and_then(|r| r.get(idx)).map(String::as_str)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Every table in the document, outermost first, in page order.
pub fn extract_tables(html: &str) -> Vec<RawTable> {
    let document = Html::parse_document(html);
    let Ok(table_selector) = Selector::parse("table") else {
        return Vec::new();
    };
    document.select(&table_selector).map(read_table).collect()
}

fn read_table(table: ElementRef<'_>) -> RawTable {
    let mut out = RawTable::default();
    for section in table.children().filter_map(ElementRef::wrap) {
        match section.value().name() {
            "thead" => out.header_rows += rows_of(section).count(),
            "tbody" | "tfoot" => out.rows.extend(rows_of(section).map(read_row)),
            "tr" => out.rows.push(read_row(section)),
            _ => {}
        }
    }
    out
}

fn rows_of<'a>(section: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    section
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "tr")
}

fn read_row(row: ElementRef<'_>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .map(cell_text)
        .collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
