use std::collections::BTreeMap;

use crate::history::ReadRecord;

pub const DEFAULT_COMICS_PER_PAGE: u32 = 100;

/// Paging over the id range `1..=latest`, oldest ids on page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarWindow {
    pub comics_per_page: u32,
    pub current_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCell {
    pub id: u32,
    pub read: Option<ReadRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarPage {
    pub page: u32,
    pub total_pages: u32,
    pub cells: Vec<CalendarCell>,
    pub has_prev: bool,
    pub has_next: bool,
}

impl Default for CalendarWindow {
    fn default() -> Self {
        Self::new(DEFAULT_COMICS_PER_PAGE)
    }
}

impl CalendarWindow {
    #[must_use]
    pub fn new(comics_per_page: u32) -> Self {
        Self {
            comics_per_page: comics_per_page.max(1),
            current_page: 1,
        }
    }

    #[must_use]
    pub fn total_pages(&self, latest: u32) -> u32 {
        latest.div_ceil(self.comics_per_page).max(1)
    }

    /// Moves to the page holding the latest comic.
    pub fn jump_to_latest(&mut self, latest: u32) {
        self.current_page = self.total_pages(latest);
    }

    /// Moves to `page`, clamped to the pages that exist.
    pub fn go_to_page(&mut self, page: u32, latest: u32) {
        self.current_page = page.clamp(1, self.total_pages(latest));
    }

    pub fn next_page(&mut self, latest: u32) -> bool {
        if self.current_page >= self.total_pages(latest) {
            return false;
        }
        self.current_page += 1;
        true
    }

    pub fn prev_page(&mut self) -> bool {
        if self.current_page <= 1 {
            return false;
        }
        self.current_page -= 1;
        true
    }

    /// Inclusive id range of the current page, clamped to `latest`.
    #[must_use]
    pub fn id_range(&self, latest: u32) -> Option<(u32, u32)> {
        let page = self.current_page.clamp(1, self.total_pages(latest));
        let start = self.comics_per_page.saturating_mul(page - 1).saturating_add(1);
        let end = self.comics_per_page.saturating_mul(page).min(latest);
        (start <= end).then_some((start, end))
    }

    #[must_use]
    pub fn page(&self, latest: u32, history: &BTreeMap<u32, ReadRecord>) -> CalendarPage {
        let total_pages = self.total_pages(latest);
        let page = self.current_page.clamp(1, total_pages);
        let cells = self
            .id_range(latest)
            .map(|(start, end)| {
                (start..=end)
                    .map(|id| CalendarCell {
                        id,
                        read: history.get(&id).copied(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        CalendarPage {
            page,
            total_pages,
            cells,
            has_prev: page > 1,
            has_next: page < total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};

    use super::*;

    #[test]
    fn jump_to_latest_lands_on_last_partial_page() {
        let mut window = CalendarWindow::new(100);
        window.jump_to_latest(3050);
        assert_eq!(window.current_page, 31);
        assert_eq!(window.id_range(3050), Some((3001, 3050)));
        assert!(!window.next_page(3050));
    }

    #[test]
    fn paging_is_clamped() {
        let mut window = CalendarWindow::new(100);
        assert!(!window.prev_page());
        assert!(window.next_page(250));
        assert!(window.next_page(250));
        assert!(!window.next_page(250));
        assert_eq!(window.id_range(250), Some((201, 250)));
        assert!(window.prev_page());
        assert_eq!(window.id_range(250), Some((101, 200)));
    }

    #[test]
    fn page_marks_read_cells() {
        let read = ReadRecord {
            first_read: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            last_read: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        };
        let history = BTreeMap::from([(2, read)]);

        let page = CalendarWindow::new(3).page(7, &history);
        assert_eq!(page.total_pages, 3);
        assert!(!page.has_prev);
        assert!(page.has_next);
        let ids: Vec<u32> = page.cells.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(page.cells[1].read, Some(read));
        assert_eq!(page.cells[0].read, None);
    }

    #[test]
    fn empty_range_has_no_cells() {
        let page = CalendarWindow::new(100).page(0, &BTreeMap::new());
        assert!(page.cells.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn go_to_page_clamps() {
        let mut window = CalendarWindow::new(100);
        window.go_to_page(9, 250);
        assert_eq!(window.current_page, 3);
        window.go_to_page(0, 250);
        assert_eq!(window.current_page, 1);
    }
}
