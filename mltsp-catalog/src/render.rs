//! HTML table rendering for catalog listings.
//!
//! The output is self-describing: the table carries `id="<kind>_table"`
//! and every row carries its record's project key and id as data
//! attributes, so a page can wire up row actions without a second lookup.

use crate::catalog::CatalogRecord;

/// Render records as an HTML table.
///
/// With `name_only` set the table has a single `Name` column.
pub fn render_table<R: CatalogRecord>(records: &[R], name_only: bool) -> String {
    let kind = R::KIND;
    let columns: &[&str] = if name_only { &["Name"] } else { R::table_columns() };

    let mut html = format!(
        "<table id=\"{}\" class=\"catalog-table\" data-kind=\"{}\">\n<thead><tr>",
        kind.table_id(),
        kind
    );
    for column in columns {
        html.push_str(&format!("<th>{}</th>", escape_html(column)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for record in records {
        html.push_str(&format!(
            "<tr data-projkey=\"{}\" data-id=\"{}\">",
            escape_html(record.project_key()),
            escape_html(record.key())
        ));
        let cells = if name_only {
            vec![record.name().to_string()]
        } else {
            record.table_cells()
        };
        for cell in cells {
            html.push_str(&format!("<td>{}</td>", escape_html(&cell)));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>");
    html
}

/// Escape text for use in HTML element content or a quoted attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
