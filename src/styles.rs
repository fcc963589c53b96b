use umya_spreadsheet::{Cell, Style};

pub const LINK_COLOR: &str = "FF0000FF";
pub const LINK_UNDERLINE: &str = "single";

/// Blue, single-underlined text, the usual look of a clickable cell.
pub fn link_style(style: &mut Style) {
    let font = style.get_font_mut();
    font.set_underline(LINK_UNDERLINE);
    font.get_color_mut().set_argb(LINK_COLOR);
}

pub fn apply_link_style(cell: &mut Cell) {
    link_style(cell.get_style_mut());
}

pub fn apply_header_style(cell: &mut Cell) {
    cell.get_style_mut().get_font_mut().set_bold(true);
}

pub fn is_link_styled(cell: &Cell) -> bool {
    cell.get_style().get_font().is_some_and(|font| {
        font.get_underline().eq_ignore_ascii_case(LINK_UNDERLINE)
            && font.get_color().get_argb().eq_ignore_ascii_case(LINK_COLOR)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_style_sets_color_and_underline() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").expect("sheet");
        let cell = sheet.get_cell_mut("A1");
        assert!(!is_link_styled(cell));
        apply_link_style(cell);
        assert!(is_link_styled(cell));
    }
}
