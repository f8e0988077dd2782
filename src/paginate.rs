//! Computes page windows and page-selector sequences for the article listing.
//!
//! The selector sequence follows an ellipsis-compression rule: short listings
//! (seven pages or fewer) show every page number; longer listings always show
//! the first and last page plus a window around the current page, collapsing
//! each gap into a single ellipsis marker. Two ellipses never appear
//! consecutively.

/// A pure description of one paginated listing: which page is showing, how
/// many pages exist, and the path links are built against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub current_page: usize,
    pub total_pages: usize,
    pub base_path: String,
}

/// One entry in the page-selector strip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector {
    Page(usize),
    Ellipsis,
}

impl PageWindow {
    pub fn new(current_page: usize, total_pages: usize, base_path: impl Into<String>) -> PageWindow {
        PageWindow {
            current_page,
            total_pages,
            base_path: base_path.into(),
        }
    }

    /// The ordered page-selector sequence for this window.
    pub fn selectors(&self) -> Vec<Selector> {
        use Selector::*;
        let (current, total) = (self.current_page, self.total_pages);

        if total <= 7 {
            return (1..=total).map(Page).collect();
        }
        if current <= 3 {
            // near the start
            vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(total)]
        } else if current >= total - 2 {
            // near the end
            vec![
                Page(1),
                Ellipsis,
                Page(total - 3),
                Page(total - 2),
                Page(total - 1),
                Page(total),
            ]
        } else {
            vec![
                Page(1),
                Ellipsis,
                Page(current - 1),
                Page(current),
                Page(current + 1),
                Ellipsis,
                Page(total),
            ]
        }
    }

    /// The link target for `page`. Page 1 is the bare base path; later pages
    /// carry a `page` query parameter, appended with `&` when the base path
    /// already has a query string (e.g. a search listing's `?q=term`).
    pub fn page_url(&self, page: usize) -> String {
        if page <= 1 {
            return self.base_path.clone();
        }
        let separator = match self.base_path.contains('?') {
            true => '&',
            false => '?',
        };
        format!("{}{}page={}", self.base_path, separator, page)
    }

    /// Link target for the previous page, when there is one.
    pub fn prev(&self) -> Option<String> {
        match self.current_page > 1 {
            true => Some(self.page_url(self.current_page - 1)),
            false => None,
        }
    }

    /// Link target for the next page, when there is one.
    pub fn next(&self) -> Option<String> {
        match self.current_page < self.total_pages {
            true => Some(self.page_url(self.current_page + 1)),
            false => None,
        }
    }
}

/// Number of listing pages needed for `total` posts at `per_page` posts per
/// page.
pub fn total_pages(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    match total % per_page {
        0 => total / per_page,
        _ => total / per_page + 1,
    }
}

#[cfg(test)]
mod test {
    use super::Selector::*;
    use super::*;

    fn selectors(current: usize, total: usize) -> Vec<Selector> {
        PageWindow::new(current, total, "/blog").selectors()
    }

    #[test]
    fn test_short_listing_shows_all_pages() {
        for total in 1..=7 {
            let entries = selectors(1, total);
            assert_eq!(entries.len(), total);
            assert!(entries.iter().all(|entry| matches!(entry, Page(_))));
        }
    }

    #[test]
    fn test_middle_window() {
        assert_eq!(
            selectors(5, 10),
            vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)],
        );
    }

    #[test]
    fn test_near_start_window() {
        assert_eq!(
            selectors(2, 10),
            vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(10)],
        );
    }

    #[test]
    fn test_near_end_window() {
        assert_eq!(
            selectors(9, 10),
            vec![Page(1), Ellipsis, Page(7), Page(8), Page(9), Page(10)],
        );
    }

    #[test]
    fn test_long_listing_invariants() {
        // First and last page always present; never two consecutive
        // ellipses; middle third carries exactly two ellipses.
        for total in 8..=40 {
            for current in 1..=total {
                let entries = selectors(current, total);
                assert!(entries.contains(&Page(1)), "{}/{}", current, total);
                assert!(entries.contains(&Page(total)), "{}/{}", current, total);
                assert!(
                    !entries.windows(2).any(|w| w == [Ellipsis, Ellipsis]),
                    "{}/{}",
                    current,
                    total,
                );
                if current > total / 3 && current <= total * 2 / 3 && current > 3 && current < total - 2 {
                    let ellipses =
                        entries.iter().filter(|e| matches!(e, Ellipsis)).count();
                    assert_eq!(ellipses, 2, "{}/{}", current, total);
                }
            }
        }
    }

    #[test]
    fn test_page_urls() {
        let window = PageWindow::new(1, 10, "/blog");
        assert_eq!(window.page_url(1), "/blog");
        assert_eq!(window.page_url(3), "/blog?page=3");

        let searched = PageWindow::new(1, 10, "/blog?q=rust");
        assert_eq!(searched.page_url(1), "/blog?q=rust");
        assert_eq!(searched.page_url(2), "/blog?q=rust&page=2");
    }

    #[test]
    fn test_prev_next() {
        let first = PageWindow::new(1, 3, "/blog");
        assert_eq!(first.prev(), None);
        assert_eq!(first.next(), Some("/blog?page=2".to_owned()));

        let last = PageWindow::new(3, 3, "/blog");
        assert_eq!(last.prev(), Some("/blog?page=2".to_owned()));
        assert_eq!(last.next(), None);

        let middle = PageWindow::new(2, 3, "/blog");
        assert_eq!(middle.prev(), Some("/blog".to_owned()));
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 9), 0);
        assert_eq!(total_pages(9, 9), 1);
        assert_eq!(total_pages(10, 9), 2);
        assert_eq!(total_pages(18, 9), 2);
        assert_eq!(total_pages(5, 0), 0);
    }
}
