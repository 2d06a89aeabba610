use super::types::DocumentRow;

/// Separator placed between rows in the assembled context.
pub const ROW_SEPARATOR: &str = "\n";

/// Joins row contents in ranked order and hard-cuts the result to
/// `max_chars` characters.
///
/// With `source_tags` each row is prefixed by its citation, e.g.
/// `[Alameda County, Title 6, Chapter 6.04, Section 6.04.010] ...`, so the
/// model can cite what it read. An empty row set yields an empty string.
pub fn assemble_context(rows: &[DocumentRow], max_chars: usize, source_tags: bool) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let joined = rows
        .iter()
        .map(|row| match source_tag(row) {
            Some(tag) if source_tags => format!("{} {}", tag, row.content),
            _ => row.content.clone(),
        })
        .collect::<Vec<_>>()
        .join(ROW_SEPARATOR);

    truncate_chars(&joined, max_chars)
}

/// Citation tag for a row, skipping empty parts. `None` when the row carries
/// no citation metadata at all.
pub fn source_tag(row: &DocumentRow) -> Option<String> {
    let mut parts = Vec::new();
    if !row.jurisdiction.is_empty() {
        parts.push(row.jurisdiction.clone());
    }
    if !row.title.is_empty() {
        parts.push(format!("Title {}", row.title));
    }
    if !row.chapter.is_empty() {
        parts.push(format!("Chapter {}", row.chapter));
    }
    if !row.section.is_empty() {
        parts.push(format!("Section {}", row.section));
    }

    if parts.is_empty() {
        None
    } else {
        Some(format!("[{}]", parts.join(", ")))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rows_yield_empty_context() {
        assert_eq!(assemble_context(&[], 1500, true), "");
    }

    #[test]
    fn test_rows_joined_in_order() {
        let rows = vec![DocumentRow::new("1", "first"), DocumentRow::new("2", "second")];
        assert_eq!(assemble_context(&rows, 1500, false), "first\nsecond");
    }

    #[test]
    fn test_truncates_to_exact_budget() {
        let rows = vec![
            DocumentRow::new("1", "a".repeat(1000)),
            DocumentRow::new("2", "b".repeat(1000)),
        ];
        let context = assemble_context(&rows, 1500, false);
        assert_eq!(context.chars().count(), 1500);
        assert!(context.starts_with(&"a".repeat(1000)));
        assert!(context.ends_with('b'));
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let rows = vec![DocumentRow::new("1", "§§§§§")];
        let context = assemble_context(&rows, 3, false);
        assert_eq!(context, "§§§");
    }

    #[test]
    fn test_short_context_untouched() {
        let rows = vec![DocumentRow::new("1", "short")];
        assert_eq!(assemble_context(&rows, 1500, false), "short");
    }

    #[test]
    fn test_source_tags() {
        let rows = vec![
            DocumentRow::new("1", "Quiet hours begin at 10 p.m.")
                .with_jurisdiction("Alameda County")
                .with_citation("6", "6.04", "6.04.010"),
            DocumentRow::new("2", "untagged"),
        ];
        assert_eq!(
            assemble_context(&rows, 1500, true),
            "[Alameda County, Title 6, Chapter 6.04, Section 6.04.010] Quiet hours begin at 10 p.m.\nuntagged"
        );
    }

    #[test]
    fn test_source_tag_skips_empty_parts() {
        let row = DocumentRow::new("1", "x")
            .with_jurisdiction("Sierra Madre")
            .with_citation("", "", "4.2");
        assert_eq!(source_tag(&row).as_deref(), Some("[Sierra Madre, Section 4.2]"));
        assert_eq!(source_tag(&DocumentRow::new("2", "y")), None);
    }
}
